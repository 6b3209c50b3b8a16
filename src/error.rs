//! Error types for the pdf2note library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Pdf2NoteError`]: **Fatal**: the request cannot proceed at all
//!   (unreadable source, not a PDF, a write collided with an existing file).
//!   Returned as `Err(Pdf2NoteError)` from the top-level `convert*` functions.
//!
//! * [`SkipReason`]: **Non-fatal**: a single page could not be rendered but
//!   the batch carries on. Stored inside [`crate::output::PageImage`] so
//!   callers can see exactly which pages are missing from the note and why.
//!
//! Text-extraction failures never surface as errors at all: the assembler
//! substitutes a sentinel string (see [`crate::pipeline::assemble`]).

use crate::vault::VaultError;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf2note library.
#[derive(Debug, Error)]
pub enum Pdf2NoteError {
    // ── Source errors ─────────────────────────────────────────────────────
    /// The source document could not be read from the vault.
    #[error("Could not read '{path}': {source}")]
    SourceUnreadable {
        path: String,
        #[source]
        source: VaultError,
    },

    /// The bytes were read but pdfium refused to parse them.
    #[error("'{path}' is not a readable PDF: {detail}")]
    CorruptPdf { path: String, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Place libpdfium next to the binary, install it system-wide, or set\n\
PDFIUM_LIB_PATH=/path/to/libpdfium (or pass --pdfium-lib).\n"
    )]
    PdfiumBindingFailed(String),

    // ── Storage errors ────────────────────────────────────────────────────
    /// The image folder could not be created (it may already exist).
    #[error("Failed to create folder '{path}': {source}")]
    FolderCreateFailed {
        path: String,
        #[source]
        source: VaultError,
    },

    /// A rendered page image could not be written.
    #[error("Failed to write image '{path}': {source}")]
    ImageWriteFailed {
        path: String,
        #[source]
        source: VaultError,
    },

    /// The note could not be created (already exists, or its folder is missing).
    #[error("Failed to create note '{path}': {source}")]
    NoteWriteFailed {
        path: String,
        #[source]
        source: VaultError,
    },

    /// Listing the vault failed while collecting images for a note.
    #[error("Failed to list images under '{folder}': {source}")]
    ListingFailed {
        folder: String,
        #[source]
        source: VaultError,
    },

    // ── Settings errors ───────────────────────────────────────────────────
    /// The settings blob could not be read or written.
    #[error("Settings I/O failed for '{path}': {source}")]
    SettingsIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The settings blob exists but is not valid JSON.
    #[error("Settings file '{path}' is malformed: {source}")]
    SettingsMalformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Text extraction was requested but no vision provider could be set up.
    #[error("Provider '{provider}' is not configured: {hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Why a single page is missing from the output.
///
/// Every variant means "one attempt was made, it failed, the batch moved on".
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum SkipReason {
    /// The page object could not be obtained from the document.
    #[error("failed to load: {detail}")]
    LoadFailed { detail: String },

    /// The renderer returned an error for this page.
    #[error("render failed: {detail}")]
    RenderFailed { detail: String },

    /// The render did not finish within the configured timeout.
    #[error("render timed out after {millis}ms")]
    Timeout { millis: u64 },

    /// The bitmap could not be encoded as PNG.
    #[error("PNG encoding failed: {detail}")]
    EncodeFailed { detail: String },

    /// The render worker stopped before this page was attempted.
    #[error("render worker exited before this page")]
    WorkerGone,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_reason_display() {
        let r = SkipReason::Timeout { millis: 15_000 };
        assert_eq!(r.to_string(), "render timed out after 15000ms");

        let r = SkipReason::LoadFailed {
            detail: "PdfiumLibraryInternalError".into(),
        };
        assert!(r.to_string().starts_with("failed to load"));
    }

    #[test]
    fn source_unreadable_mentions_path() {
        let e = Pdf2NoteError::SourceUnreadable {
            path: "docs/missing.pdf".into(),
            source: VaultError::NotFound {
                path: "docs/missing.pdf".into(),
            },
        };
        assert!(e.to_string().contains("docs/missing.pdf"), "got: {e}");
    }

    #[test]
    fn note_write_failed_display() {
        let e = Pdf2NoteError::NoteWriteFailed {
            path: "Lecture.md".into(),
            source: VaultError::AlreadyExists {
                path: "Lecture.md".into(),
            },
        };
        let msg = e.to_string();
        assert!(msg.contains("Lecture.md"));
        assert!(msg.contains("already exists"), "got: {msg}");
    }
}
