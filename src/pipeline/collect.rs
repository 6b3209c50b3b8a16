//! Input collection: gather one [`ConversionRequest`] from the user.
//!
//! Nothing is validated here. An empty source path, a non-PDF or a note name
//! that already exists all pass through and fail later in the pipeline with a
//! specific error.

use crate::vault::VaultFile;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::{self, BufRead, Write};

/// Maximum number of PDF suggestions shown by [`PromptCollector`].
pub const MAX_SUGGESTIONS: usize = 10;

/// Everything one conversion needs to know about what the user asked for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionRequest {
    /// Vault path of the PDF.
    pub source_path: String,
    /// Folder for the page images. Empty means "pick one for me".
    pub destination_folder: String,
    /// Note name without the `.md` extension.
    pub note_file_name: String,
    /// Folder for the note, overriding the configured default.
    pub note_path: Option<String>,
    pub tags: Vec<String>,
    pub extract_text: bool,
}

/// Split a comma-separated tag string.
///
/// Each item is trimmed. Blank input yields a single empty tag, which shows
/// up as an empty list item in the note's front matter.
pub fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(',').map(|t| t.trim().to_string()).collect()
}

/// PDFs in `files` whose path contains `query` (case-insensitive), sorted by path.
pub fn suggest_pdfs(files: &[VaultFile], query: &str) -> Vec<String> {
    let query = query.trim().to_lowercase();
    let mut matches: Vec<String> = files
        .iter()
        .filter(|f| f.extension.eq_ignore_ascii_case("pdf"))
        .filter(|f| f.path.to_lowercase().contains(&query))
        .map(|f| f.path.clone())
        .collect();
    matches.sort();
    matches
}

/// Source of a [`ConversionRequest`].
///
/// Resolves exactly once; there is no cancel path. Errors are I/O failures
/// talking to the user, never validation.
#[async_trait]
pub trait InputCollector: Send {
    async fn collect(&mut self) -> io::Result<ConversionRequest>;
}

/// A line-based terminal form.
///
/// Asks for the PDF (offering numbered suggestions from `pdfs`), the note
/// name, tags, an optional note folder and whether to extract text. Reaching
/// end of input leaves the remaining fields empty.
///
/// Reads and writes are blocking, so [`InputCollector::collect`] runs the
/// form on tokio's blocking pool.
pub struct PromptCollector<R, W> {
    form: Option<PromptForm<R, W>>,
}

struct PromptForm<R, W> {
    input: R,
    output: W,
    pdfs: Vec<VaultFile>,
}

impl<R, W> PromptCollector<R, W> {
    pub fn new(input: R, output: W, pdfs: Vec<VaultFile>) -> Self {
        Self {
            form: Some(PromptForm { input, output, pdfs }),
        }
    }

    /// The output stream, e.g. to inspect a transcript.
    ///
    /// `None` if a [`collect`](InputCollector::collect) was dropped mid-way.
    pub fn into_output(self) -> Option<W> {
        self.form.map(|f| f.output)
    }
}

impl<R: BufRead, W: Write> PromptForm<R, W> {
    fn ask(&mut self, label: &str) -> io::Result<String> {
        write!(self.output, "{label}: ")?;
        self.output.flush()?;
        let mut line = String::new();
        self.input.read_line(&mut line)?;
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    fn ask_pdf(&mut self) -> io::Result<String> {
        let query = self.ask("PDF file (type to search)")?;
        let suggestions: Vec<String> = suggest_pdfs(&self.pdfs, &query)
            .into_iter()
            .take(MAX_SUGGESTIONS)
            .collect();
        if suggestions.is_empty() || suggestions.iter().any(|s| *s == query) {
            return Ok(query);
        }

        for (i, path) in suggestions.iter().enumerate() {
            writeln!(self.output, "  {}) {}", i + 1, path)?;
        }
        let pick = self.ask("Pick a number, or press Enter to keep what you typed")?;
        Ok(match pick.trim().parse::<usize>() {
            Ok(n) if (1..=suggestions.len()).contains(&n) => suggestions[n - 1].clone(),
            _ if pick.trim().is_empty() => query,
            _ => pick,
        })
    }

    fn fill(&mut self) -> io::Result<ConversionRequest> {
        let source_path = self.ask_pdf()?;
        let note_file_name = self.ask("Note name")?;
        let tags = parse_tags(&self.ask("Tags (comma-separated)")?);
        let note_path =
            Some(self.ask("Note folder (blank for default)")?).filter(|p| !p.trim().is_empty());
        let extract_text = matches!(
            self.ask("Extract text? [y/N]")?.trim().to_lowercase().as_str(),
            "y" | "yes"
        );

        Ok(ConversionRequest {
            source_path,
            destination_folder: String::new(),
            note_file_name,
            note_path,
            tags,
            extract_text,
        })
    }
}

#[async_trait]
impl<R, W> InputCollector for PromptCollector<R, W>
where
    R: BufRead + Send + 'static,
    W: Write + Send + 'static,
{
    async fn collect(&mut self) -> io::Result<ConversionRequest> {
        let mut form = self
            .form
            .take()
            .ok_or_else(|| io::Error::other("prompt form was lost by an earlier collect"))?;
        let (form, request) = tokio::task::spawn_blocking(move || {
            let request = form.fill();
            (form, request)
        })
        .await
        .map_err(io::Error::other)?;
        self.form = Some(form);
        request
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufReader, Cursor, Read};
    use std::sync::mpsc;
    use std::time::{Duration, UNIX_EPOCH};

    fn vault_files(paths: &[&str]) -> Vec<VaultFile> {
        paths.iter().map(|p| VaultFile::new(p, UNIX_EPOCH)).collect()
    }

    #[test]
    fn tags_are_split_and_trimmed() {
        assert_eq!(parse_tags("a, b,c"), vec!["a", "b", "c"]);
        assert_eq!(parse_tags(" lecture "), vec!["lecture"]);
    }

    #[test]
    fn blank_tags_yield_one_empty_tag() {
        assert_eq!(parse_tags(""), vec![""]);
    }

    #[test]
    fn suggestions_filter_pdfs_case_insensitively() {
        let files = vault_files(&["Lectures/Week1.PDF", "Lectures/week1.md", "week2.pdf", "misc/other.pdf"]);
        assert_eq!(
            suggest_pdfs(&files, "week"),
            vec!["Lectures/Week1.PDF".to_string(), "week2.pdf".to_string()]
        );
        assert_eq!(suggest_pdfs(&files, "").len(), 3);
    }

    #[tokio::test]
    async fn prompt_picks_suggestion_by_number() {
        let input = Cursor::new("week\n2\nWeek 2\nmath, exam\n\ny\n");
        let files = vault_files(&["Lectures/week1.pdf", "week2.pdf"]);
        let mut collector = PromptCollector::new(input, Vec::new(), files);
        let req = collector.collect().await.unwrap();

        assert_eq!(req.source_path, "week2.pdf");
        assert_eq!(req.note_file_name, "Week 2");
        assert_eq!(req.tags, vec!["math", "exam"]);
        assert_eq!(req.note_path, None);
        assert!(req.extract_text);
        let transcript = String::from_utf8(collector.into_output().unwrap()).unwrap();
        assert!(transcript.contains("1) Lectures/week1.pdf"));
    }

    #[tokio::test]
    async fn prompt_accepts_verbatim_path_and_stops_at_eof() {
        let input = Cursor::new("scans/raw.bin\n");
        let req = PromptCollector::new(input, Vec::new(), Vec::new())
            .collect()
            .await
            .unwrap();
        assert_eq!(req.source_path, "scans/raw.bin");
        assert_eq!(req.note_file_name, "");
        assert_eq!(req.tags, vec![""]);
        assert!(!req.extract_text);
    }

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "terminal closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn prompt_reports_write_failures() {
        let err = PromptCollector::new(Cursor::new("deck.pdf\n"), ClosedPipe, Vec::new())
            .collect()
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    /// Input that has nothing to read until another task opens the gate.
    struct GatedInput {
        gate: mpsc::Receiver<()>,
        open: bool,
        data: Cursor<&'static str>,
    }

    impl Read for GatedInput {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if !self.open {
                self.gate
                    .recv_timeout(Duration::from_secs(2))
                    .map_err(|e| io::Error::new(io::ErrorKind::TimedOut, e))?;
                self.open = true;
            }
            self.data.read(buf)
        }
    }

    #[tokio::test]
    async fn prompt_waits_for_input_without_stalling_the_runtime() {
        // Single-threaded runtime: the opener only runs if collect yields.
        let (opener, gate) = mpsc::channel();
        let input = BufReader::new(GatedInput {
            gate,
            open: false,
            data: Cursor::new("deck.pdf\nDeck\n"),
        });
        let open_gate = tokio::spawn(async move { opener.send(()).unwrap() });

        let req = PromptCollector::new(input, Vec::new(), Vec::new())
            .collect()
            .await
            .unwrap();
        open_gate.await.unwrap();

        assert_eq!(req.source_path, "deck.pdf");
        assert_eq!(req.note_file_name, "Deck");
    }
}
