//! CLI binary for pdf2note.
//!
//! A thin shim over the library crate that maps CLI flags to a
//! `ConversionRequest` and `ConversionContext` and prints results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use pdf2note::extract::{MODEL_ENV, PROVIDER_ENV};
use pdf2note::{
    convert, parse_tags, rebuild_note, ConversionConfig, ConversionContext,
    ConversionProgressCallback, ConversionReport, ConversionRequest, FsVault, InputCollector,
    PdfiumEngine, ProgressCallback, PromptCollector, Settings, TextExtractor, Vault,
    VisionExtractorConfig, VisionTextExtractor,
};
use std::collections::HashMap;
use std::io::{self, BufReader, IsTerminal};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::warn;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live progress bar plus one line per page.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Per-page wall-clock start times for elapsed reporting.
    start_times: Mutex<HashMap<usize, Instant>>,
    skipped: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until `on_conversion_start` tells us the page count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            skipped: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Rendering");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self, page_num: usize) -> f64 {
        self.start_times
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(&page_num)
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Rendering {total_pages} pages…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        self.start_times
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(page_num, Instant::now());
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, png_bytes: usize) {
        let secs = self.elapsed_secs(page_num);
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<10}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{:>6} KiB", png_bytes / 1024)),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_page_skipped(&self, page_num: usize, total: usize, reason: &str) {
        let secs = self.elapsed_secs(page_num);
        self.skipped.fetch_add(1, Ordering::SeqCst);

        let msg = if reason.chars().count() > 80 {
            format!("{}\u{2026}", reason.chars().take(79).collect::<String>())
        } else {
            reason.to_string()
        };

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_notice(&self, message: &str) {
        self.bar.println(format!("{} {}", cyan("◆"), message));
    }

    fn on_conversion_complete(&self, total_pages: usize, rendered: usize) {
        self.bar.finish_and_clear();
        let skipped = total_pages.saturating_sub(rendered);
        if skipped == 0 {
            eprintln!("{} {} pages rendered", green("✔"), bold(&rendered.to_string()));
        } else {
            eprintln!(
                "{} {}/{} pages rendered  ({} skipped)",
                cyan("⚠"),
                bold(&rendered.to_string()),
                total_pages,
                red(&skipped.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert a PDF in the current vault (prompts for anything missing)
  pdf2note convert

  # Fully specified
  pdf2note --vault ~/notes convert Lectures/week-1.pdf --name "Week 1" --tags "lecture, week1"

  # Transcribe each page under its image with a vision model
  pdf2note convert slides.pdf --name Slides --extract-text --provider openai --model gpt-4.1-mini

  # Rebuild a note from an existing image folder
  pdf2note assemble slides-output-1700000000000 --name "Slides (again)"

  # Show or change where images and notes go by default
  pdf2note settings --image-output Attachments --note-output Lectures

ENVIRONMENT VARIABLES:
  PDF2NOTE_VAULT          Vault directory (default: current directory)
  PDFIUM_LIB_PATH         Path to an existing libpdfium
  OPENAI_API_KEY          OpenAI API key (for --extract-text)
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID

SETUP:
  pdf2note needs the pdfium shared library. Place libpdfium next to the
  binary or in the working directory, install it system-wide, or point
  PDFIUM_LIB_PATH (or --pdfium-lib) at it.
"#;

/// Convert PDFs in a notes vault into page images plus a Markdown note.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2note",
    version,
    about = "Convert PDFs into page images plus a Markdown note inside a notes vault",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Vault directory every path is relative to.
    #[arg(long, global = true, env = "PDF2NOTE_VAULT", default_value = ".")]
    vault: PathBuf,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDF2NOTE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PDF2NOTE_QUIET")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a PDF into page images and create a note embedding them.
    Convert(ConvertArgs),
    /// Create a note from the images already in a vault folder.
    Assemble(AssembleArgs),
    /// Show or update the default image and note folders.
    Settings(SettingsArgs),
}

/// Options shared by every command that writes a note.
#[derive(Args, Debug)]
struct NoteArgs {
    /// Note name, without `.md`.
    #[arg(long)]
    name: Option<String>,

    /// Folder for the note, overriding the configured default.
    #[arg(long)]
    note_path: Option<String>,

    /// Comma-separated tags for the front matter.
    #[arg(long)]
    tags: Option<String>,

    /// Transcribe each image with a vision model.
    #[arg(long, env = "PDF2NOTE_EXTRACT_TEXT")]
    extract_text: bool,

    /// Vision provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = PROVIDER_ENV)]
    provider: Option<String>,

    /// Vision model ID (e.g. gpt-4.1-nano, gpt-4.1-mini).
    #[arg(long, env = MODEL_ENV)]
    model: Option<String>,

    /// Extra attempts per image when the vision model fails.
    #[arg(long, env = "PDF2NOTE_OCR_RETRIES", default_value_t = 0)]
    ocr_retries: u32,

    /// Print the report as JSON instead of a summary.
    #[arg(long, env = "PDF2NOTE_JSON")]
    json: bool,
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// Vault path of the PDF. Prompted for when missing.
    pdf: Option<String>,

    #[command(flatten)]
    note: NoteArgs,

    /// Rendering DPI (72–600).
    #[arg(long, env = "PDF2NOTE_DPI", default_value_t = 150,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// Per-page render timeout in seconds.
    #[arg(long, env = "PDF2NOTE_RENDER_TIMEOUT", default_value_t = 15)]
    render_timeout: u64,

    /// Path to the pdfium shared library.
    #[arg(long, env = "PDF2NOTE_PDFIUM_LIB")]
    pdfium_lib: Option<PathBuf>,

    /// Disable progress bar.
    #[arg(long, env = "PDF2NOTE_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Args, Debug)]
struct AssembleArgs {
    /// Vault folder holding the images.
    folder: String,

    #[command(flatten)]
    note: NoteArgs,
}

#[derive(Args, Debug)]
struct SettingsArgs {
    /// Default parent folder for new image folders (`/` for the vault root).
    #[arg(long)]
    image_output: Option<String>,

    /// Default folder for new notes (`/` for the vault root).
    #[arg(long)]
    note_output: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Library INFO logs are noise next to an active progress bar.
    let show_progress = match &cli.command {
        Command::Convert(args) => !cli.quiet && !args.no_progress && !args.note.json,
        _ => false,
    };
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let settings = Settings::load(&cli.vault)
        .await
        .context("Failed to load settings")?;

    match &cli.command {
        Command::Convert(args) => run_convert(&cli, args, settings, show_progress).await,
        Command::Assemble(args) => run_assemble(&cli, args, settings).await,
        Command::Settings(args) => run_settings(&cli.vault, args, settings).await,
    }
}

async fn run_convert(
    cli: &Cli,
    args: &ConvertArgs,
    settings: Settings,
    show_progress: bool,
) -> Result<()> {
    let vault: Arc<dyn Vault> = Arc::new(FsVault::new(&cli.vault));

    let mut request = if args.pdf.is_none() || args.note.name.is_none() {
        anyhow::ensure!(
            io::stdin().is_terminal(),
            "PDF path and --name are required when stdin is not a terminal"
        );
        let pdfs = vault
            .list_files()
            .await
            .context("Failed to list vault files")?;
        PromptCollector::new(BufReader::new(io::stdin()), io::stderr(), pdfs)
            .collect()
            .await
            .context("Failed to read the conversion form")?
    } else {
        ConversionRequest::default()
    };
    if let Some(pdf) = &args.pdf {
        request.source_path = pdf.clone();
    }
    apply_note_args(&mut request, &args.note);

    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };

    let mut builder = ConversionConfig::builder()
        .dpi(args.dpi)
        .render_timeout_secs(args.render_timeout);
    if let Some(cb) = progress_cb {
        builder = builder.progress_callback(cb);
    }
    let config = builder.build().context("Invalid configuration")?;

    let engine = match &args.pdfium_lib {
        Some(path) => PdfiumEngine::with_library(path),
        None => PdfiumEngine::new(),
    };

    let mut ctx = ConversionContext::new(Arc::clone(&vault), Arc::new(engine))
        .with_settings(settings)
        .with_config(config);
    ctx.extractor = build_extractor(&vault, &args.note, request.extract_text).await;

    let report = convert(&request, &ctx)
        .await
        .context("Conversion failed")?;
    print_report(&report, &args.note, cli.quiet)
}

async fn run_assemble(cli: &Cli, args: &AssembleArgs, settings: Settings) -> Result<()> {
    let vault: Arc<dyn Vault> = Arc::new(FsVault::new(&cli.vault));

    let mut request = ConversionRequest {
        destination_folder: args.folder.clone(),
        ..Default::default()
    };
    apply_note_args(&mut request, &args.note);
    anyhow::ensure!(
        !request.note_file_name.trim().is_empty(),
        "--name is required for assemble"
    );

    // The engine is never used here: nothing is rendered.
    let mut ctx = ConversionContext::new(Arc::clone(&vault), Arc::new(PdfiumEngine::new()))
        .with_settings(settings);
    ctx.extractor = build_extractor(&vault, &args.note, request.extract_text).await;

    let report = rebuild_note(&request, &ctx)
        .await
        .context("Assembling note failed")?;
    print_report(&report, &args.note, cli.quiet)
}

async fn run_settings(vault_root: &Path, args: &SettingsArgs, mut settings: Settings) -> Result<()> {
    let mut changed = false;
    if let Some(v) = &args.image_output {
        settings.image_output = v.clone();
        changed = true;
    }
    if let Some(v) = &args.note_output {
        settings.md_output = v.clone();
        changed = true;
    }
    if changed {
        settings
            .save(vault_root)
            .await
            .context("Failed to save settings")?;
    }
    println!(
        "{}",
        serde_json::to_string_pretty(&settings).context("Failed to serialise settings")?
    );
    Ok(())
}

/// Flags win over whatever the prompt collected.
fn apply_note_args(request: &mut ConversionRequest, note: &NoteArgs) {
    if let Some(name) = &note.name {
        request.note_file_name = name.clone();
    }
    if let Some(path) = &note.note_path {
        request.note_path = Some(path.clone());
    }
    if let Some(tags) = &note.tags {
        request.tags = parse_tags(tags);
    } else if request.tags.is_empty() {
        request.tags = parse_tags("");
    }
    request.extract_text |= note.extract_text;
}

/// The vision extractor, or `None` (with a warning) when no provider is set up.
async fn build_extractor(
    vault: &Arc<dyn Vault>,
    note: &NoteArgs,
    extract_text: bool,
) -> Option<Arc<dyn TextExtractor>> {
    if !extract_text {
        return None;
    }
    let config = VisionExtractorConfig {
        provider_name: note.provider.clone(),
        model: note.model.clone(),
        max_retries: note.ocr_retries,
        ..Default::default()
    };
    match VisionTextExtractor::from_config(Arc::clone(vault), config).await {
        Ok(extractor) => Some(Arc::new(extractor)),
        Err(e) => {
            warn!("Text extraction unavailable: {e}");
            None
        }
    }
}

fn print_report(report: &ConversionReport, note: &NoteArgs, quiet: bool) -> Result<()> {
    if note.json {
        let json = serde_json::to_string_pretty(report).context("Failed to serialise report")?;
        println!("{json}");
        return Ok(());
    }
    if quiet {
        return Ok(());
    }

    let skipped: Vec<String> = report
        .skipped()
        .map(|p| match p.skip_reason() {
            Some(reason) => format!("{} ({reason})", p.page_number),
            None => p.page_number.to_string(),
        })
        .collect();

    eprintln!(
        "{}  {}/{} pages  {}ms  →  {}",
        if skipped.is_empty() { green("✔") } else { cyan("⚠") },
        report.stats.rendered_pages,
        report.stats.total_pages,
        report.stats.total_duration_ms,
        bold(&report.note_path),
    );
    eprintln!("   images: {}", dim(&report.image_folder));
    if !skipped.is_empty() {
        eprintln!("   skipped: {}", red(&skipped.join(", ")));
    }
    Ok(())
}
