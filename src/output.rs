//! Output types: what a conversion produces and reports back.

use crate::error::SkipReason;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Outcome of rasterising one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageStatus {
    Rendered,
    Skipped(SkipReason),
}

/// One source page and where its image lives (or would have lived).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageImage {
    /// 1-indexed page number.
    pub page_number: usize,
    /// Vault path of `page-<n>.png`. Nothing exists there for skipped pages.
    pub file_path: String,
    pub status: PageStatus,
}

impl PageImage {
    pub fn is_rendered(&self) -> bool {
        matches!(self.status, PageStatus::Rendered)
    }

    pub fn skip_reason(&self) -> Option<&SkipReason> {
        match &self.status {
            PageStatus::Skipped(r) => Some(r),
            PageStatus::Rendered => None,
        }
    }
}

/// Vault paths of the pages that were actually written, in page order.
pub fn written_paths(pages: &[PageImage]) -> Vec<String> {
    pages
        .iter()
        .filter(|p| p.is_rendered())
        .map(|p| p.file_path.clone())
        .collect()
}

/// One image block in a generated note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteSection {
    /// Vault path used in the `![[…]]` embed.
    pub image_reference: String,
    /// Extracted text, a sentinel, or empty.
    pub text: String,
}

/// A generated note before it is rendered to Markdown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteDocument {
    /// Tags listed under `tags:` in the YAML front matter.
    pub front_matter: Vec<String>,
    pub sections: Vec<NoteSection>,
}

impl NoteDocument {
    /// Render the note body.
    ///
    /// ```text
    /// ---
    /// tags:
    ///   - a
    /// ---
    ///
    /// ![[folder/page-1.png]]
    /// extracted text
    ///
    /// ![[folder/page-2.png]]
    /// ```
    pub fn render(&self) -> String {
        let mut out = String::from("---\ntags:\n");
        for tag in &self.front_matter {
            out.push_str("  - ");
            out.push_str(tag);
            out.push('\n');
        }
        out.push_str("---\n");

        let blocks: Vec<String> = self
            .sections
            .iter()
            .map(|s| {
                let text = s.text.trim_end();
                if text.is_empty() {
                    format!("![[{}]]", s.image_reference)
                } else {
                    format!("![[{}]]\n{}", s.image_reference, text)
                }
            })
            .collect();

        if !blocks.is_empty() {
            out.push('\n');
            out.push_str(&blocks.join("\n\n"));
            out.push('\n');
        }
        out
    }
}

/// Diagnostic lines for one request, in the order they happened.
///
/// Each line is also emitted through `tracing`, so the log doubles as the
/// end-of-run report without needing a subscriber.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionLog {
    lines: Vec<String>,
}

impl ConversionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&mut self, line: impl Into<String>) {
        let line = line.into();
        info!("{}", line);
        self.lines.push(line);
    }

    pub fn warn(&mut self, line: impl Into<String>) {
        let line = line.into();
        warn!("{}", line);
        self.lines.push(line);
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Counters and timings for a conversion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionStats {
    pub total_pages: usize,
    pub rendered_pages: usize,
    pub skipped_pages: usize,
    pub render_duration_ms: u64,
    pub assemble_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Everything a finished conversion reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionReport {
    /// Vault folder holding the page images.
    pub image_folder: String,
    /// Vault path of the created note.
    pub note_path: String,
    /// Every page of the source, rendered or skipped.
    pub pages: Vec<PageImage>,
    /// The note exactly as written.
    pub note: String,
    pub stats: ConversionStats,
    pub log: ConversionLog,
}

impl ConversionReport {
    pub fn skipped(&self) -> impl Iterator<Item = &PageImage> {
        self.pages.iter().filter(|p| !p.is_rendered())
    }
}
