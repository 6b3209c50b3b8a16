//! Pipeline stages for PDF-to-note conversion.
//!
//! Each submodule implements one step, so each can be tested on its own and
//! a stage can be swapped (e.g. a different input form) without touching the
//! others.
//!
//! ## Data Flow
//!
//! ```text
//! collect ──▶ render ──▶ encode ──▶ vault ──▶ assemble ──▶ write
//! (request)   (pdfium)   (PNG)     (images)  (+ OCR text)  (note)
//! ```
//!
//! 1. [`collect`]: gather a [`collect::ConversionRequest`] from the user
//! 2. [`render`]: rasterise every page on a worker thread, one at a time,
//!    with a per-page timeout; failed pages are skipped, not fatal
//! 3. [`encode`]: PNG-encode each page image; base64-wrap images for the
//!    vision extractor
//! 4. [`assemble`]: front matter plus one `![[…]]` block per image, with
//!    optional extracted text cleaned by [`postprocess`]
//! 5. [`write`]: pick the image folder and note path, create the note

pub mod assemble;
pub mod collect;
pub mod encode;
pub mod postprocess;
pub mod render;
pub mod write;
