//! # pdf2note
//!
//! Turn a PDF in a notes vault into one PNG per page plus a Markdown note
//! that embeds them, optionally with each page's text transcribed under its
//! image.
//!
//! ## Why images?
//!
//! Lecture slides, scanned handouts and papers read best as they were laid
//! out. Embedding page images keeps the layout intact inside the note, and
//! the optional extracted text makes the note searchable.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF (in the vault)
//!  │
//!  ├─ 1. Collect   request: PDF path, note name, tags, extract-text flag
//!  ├─ 2. Render    rasterise pages via pdfium (worker thread, per-page deadline)
//!  ├─ 3. Store     page-<n>.png into a fresh image folder
//!  ├─ 4. Assemble  front matter + ![[…]] per image (+ vision-model text)
//!  └─ 5. Write     <name>.md at the resolved note path
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2note::{convert, ConversionContext, ConversionRequest, FsVault, PdfiumEngine};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let ctx = ConversionContext::new(
//!         Arc::new(FsVault::new("/home/me/notes")),
//!         Arc::new(PdfiumEngine::new()),
//!     );
//!     let request = ConversionRequest {
//!         source_path: "Lectures/week-1.pdf".into(),
//!         note_file_name: "Week 1".into(),
//!         tags: pdf2note::parse_tags("lecture, week1"),
//!         ..Default::default()
//!     };
//!     let report = convert(&request, &ctx).await?;
//!     println!("{} → {}", report.image_folder, report.note_path);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2note` binary (clap + indicatif + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdf2note = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod engine;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod settings;
pub mod vault;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder};
pub use convert::{convert, convert_sync, rebuild_note, ConversionContext};
pub use engine::{EngineError, PageSize, PdfEngine, PdfPages, PdfiumEngine};
pub use error::{Pdf2NoteError, SkipReason};
pub use extract::{ExtractError, TextExtractor, VisionExtractorConfig, VisionTextExtractor};
pub use output::{
    ConversionLog, ConversionReport, ConversionStats, NoteDocument, NoteSection, PageImage,
    PageStatus,
};
pub use pipeline::collect::{parse_tags, ConversionRequest, InputCollector, PromptCollector};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use settings::Settings;
pub use vault::{FsVault, MemoryVault, Vault, VaultError, VaultFile};
