//! Conversion entry points.
//!
//! [`convert`] runs the whole pipeline for one request: parse the PDF, create
//! the image folder, rasterise every page into it, assemble a note from the images that
//! were actually written, and create the note. Every collaborator comes from
//! the [`ConversionContext`] the caller passes in.
//!
//! [`rebuild_note`] runs only the last two stages over an image folder that
//! already exists.

use crate::config::ConversionConfig;
use crate::engine::PdfEngine;
use crate::error::Pdf2NoteError;
use crate::extract::TextExtractor;
use crate::output::{ConversionLog, ConversionReport, ConversionStats};
use crate::pipeline::assemble::{assemble_folder, assemble_pages};
use crate::pipeline::collect::ConversionRequest;
use crate::pipeline::render::rasterize;
use crate::pipeline::write::{image_folder_path, resolve_note_path, write_note};
use crate::settings::Settings;
use crate::vault::{normalize_path, Vault};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing::info;

/// The collaborators a conversion runs against.
#[derive(Clone)]
pub struct ConversionContext {
    pub vault: Arc<dyn Vault>,
    pub engine: Arc<dyn PdfEngine>,
    /// `None` when no text extractor is available.
    pub extractor: Option<Arc<dyn TextExtractor>>,
    pub settings: Settings,
    pub config: ConversionConfig,
}

impl ConversionContext {
    /// A context with default settings and config and no extractor.
    pub fn new(vault: Arc<dyn Vault>, engine: Arc<dyn PdfEngine>) -> Self {
        Self {
            vault,
            engine,
            extractor: None,
            settings: Settings::default(),
            config: ConversionConfig::default(),
        }
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_config(mut self, config: ConversionConfig) -> Self {
        self.config = config;
        self
    }

    fn notice(&self, message: &str) {
        if let Some(cb) = &self.config.progress_callback {
            cb.on_notice(message);
        }
    }
}

/// Convert one PDF into page images plus a note.
///
/// # Returns
/// `Ok(ConversionReport)` on success, even if some pages were skipped
/// (see [`ConversionReport::skipped`]).
///
/// # Errors
/// Returns `Err(Pdf2NoteError)` only for fatal errors:
/// - the source cannot be read or is not a PDF (no folder is created)
/// - the image folder already exists or cannot be created
/// - a page image or the note cannot be written (including a note that
///   already exists)
pub async fn convert(
    request: &ConversionRequest,
    ctx: &ConversionContext,
) -> Result<ConversionReport, Pdf2NoteError> {
    let total_start = Instant::now();
    let mut log = ConversionLog::new();
    info!("Starting conversion: {}", request.source_path);

    // ── Step 1: Image folder ─────────────────────────────────────────────
    let image_folder = if request.destination_folder.trim().is_empty() {
        image_folder_path(&request.source_path, &ctx.settings, now_millis())
    } else {
        normalize_path(&request.destination_folder)
    };

    // ── Step 2: Rasterise (creates the folder once the PDF parses) ──────
    let render_start = Instant::now();
    let rasterized = rasterize(
        ctx.vault.as_ref(),
        Arc::clone(&ctx.engine),
        &request.source_path,
        &image_folder,
        &ctx.config,
        &mut log,
    )
    .await?;
    let render_duration_ms = render_start.elapsed().as_millis() as u64;

    let skipped: Vec<String> = rasterized
        .pages
        .iter()
        .filter(|p| !p.is_rendered())
        .map(|p| p.page_number.to_string())
        .collect();
    ctx.notice("PDF successfully converted to images");
    if !skipped.is_empty() {
        ctx.notice(&format!("Skipped pages: {}", skipped.join(", ")));
    }

    // ── Step 3: Assemble ─────────────────────────────────────────────────
    let assemble_start = Instant::now();
    let note = assemble_pages(
        &request.tags,
        &rasterized.written,
        request.extract_text,
        ctx.extractor.as_deref(),
        &mut log,
    )
    .await
    .render();
    let assemble_duration_ms = assemble_start.elapsed().as_millis() as u64;

    // ── Step 4: Write ────────────────────────────────────────────────────
    let note_path = resolve_note_path(
        &request.note_file_name,
        request.note_path.as_deref(),
        &ctx.settings,
    );
    write_note(ctx.vault.as_ref(), &note_path, &note).await?;
    log.info(format!("Note created: {note_path}"));
    ctx.notice(&format!("Note created: {note_path}"));

    let stats = ConversionStats {
        total_pages: rasterized.pages.len(),
        rendered_pages: rasterized.written.len(),
        skipped_pages: skipped.len(),
        render_duration_ms,
        assemble_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };
    info!(
        "Conversion complete: {}/{} pages, {}ms",
        stats.rendered_pages, stats.total_pages, stats.total_duration_ms
    );

    Ok(ConversionReport {
        image_folder,
        note_path,
        pages: rasterized.pages,
        note,
        stats,
        log,
    })
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    request: &ConversionRequest,
    ctx: &ConversionContext,
) -> Result<ConversionReport, Pdf2NoteError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Pdf2NoteError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(request, ctx))
}

/// Build and write a note from images already in `request.destination_folder`.
///
/// Images are the direct children of the folder, oldest first. The source
/// path is ignored and nothing is rendered, so the report has no pages.
pub async fn rebuild_note(
    request: &ConversionRequest,
    ctx: &ConversionContext,
) -> Result<ConversionReport, Pdf2NoteError> {
    let total_start = Instant::now();
    let mut log = ConversionLog::new();
    let image_folder = normalize_path(&request.destination_folder);

    let assemble_start = Instant::now();
    let note = assemble_folder(
        ctx.vault.as_ref(),
        &image_folder,
        &request.tags,
        request.extract_text,
        ctx.extractor.as_deref(),
        &mut log,
    )
    .await?;
    let assemble_duration_ms = assemble_start.elapsed().as_millis() as u64;

    let note_path = resolve_note_path(
        &request.note_file_name,
        request.note_path.as_deref(),
        &ctx.settings,
    );
    write_note(ctx.vault.as_ref(), &note_path, &note).await?;
    log.info(format!("Note created: {note_path}"));
    ctx.notice(&format!("Note created: {note_path}"));

    Ok(ConversionReport {
        image_folder,
        note_path,
        pages: Vec::new(),
        note,
        stats: ConversionStats {
            assemble_duration_ms,
            total_duration_ms: total_start.elapsed().as_millis() as u64,
            ..Default::default()
        },
        log,
    })
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}
