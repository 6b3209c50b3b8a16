//! Cleanup of text returned by a text extractor before it lands in a note.
//!
//! Vision models asked to transcribe a page image tend to add the same few
//! artefacts: an outer ` ```text ` fence, `\r\n` line endings, placeholder
//! image links for figures they cannot transcribe, zero-width characters and
//! long runs of blank lines. The note puts each page's text directly under
//! its `![[…]]` embed, so the result must also carry no trailing blank lines.
//!
//! ## Rule Order
//!
//! Fences are stripped first so the remaining rules see the body only; line
//! endings are normalised before any per-line rule runs.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply every cleanup rule to raw extractor output.
///
/// 1. Strip an outer code fence
/// 2. Normalise line endings (CRLF → LF)
/// 3. Trim trailing whitespace per line
/// 4. Collapse runs of blank lines to a single blank line
/// 5. Replace placeholder image links with their alt text
/// 6. Strip invisible Unicode
/// 7. Trim surrounding blank lines
///
/// Returns an empty string when nothing but whitespace remains.
pub fn clean_extracted_text(input: &str) -> String {
    let s = strip_outer_fence(input);
    let s = normalise_line_endings(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    let s = remove_placeholder_images(&s);
    let s = remove_invisible_chars(&s);
    trim_blank_edges(&s)
}

// ── Rule 1: Strip outer fence ────────────────────────────────────────────────

static RE_OUTER_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^```(?:markdown|md|text|plaintext)?\r?\n(.*?)\r?\n```\s*$").unwrap()
});

fn strip_outer_fence(input: &str) -> String {
    match RE_OUTER_FENCE.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

// ── Rule 2: Line endings ─────────────────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Trailing whitespace ──────────────────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 4: Blank-line runs ──────────────────────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}

// ── Rule 5: Placeholder image links ──────────────────────────────────────────
//
// A transcription has no business linking images. Keep `![alt](url)` only for
// absolute http(s) URLs; anything else becomes `*alt*` so the caption text
// survives.

static RE_IMAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"!\[([^\]]*)\]\(([^)]*)\)").unwrap());

fn is_placeholder_url(url: &str) -> bool {
    let u = url.trim();
    if !u.starts_with("http://") && !u.starts_with("https://") {
        return true;
    }
    ["example.com", "placeholder.com", "dummyimage.com", "placehold.it"]
        .iter()
        .any(|d| u.contains(d))
}

fn remove_placeholder_images(input: &str) -> String {
    RE_IMAGE
        .replace_all(input, |caps: &regex::Captures<'_>| {
            let alt = caps[1].trim();
            if !is_placeholder_url(&caps[2]) {
                caps[0].to_string()
            } else if alt.is_empty() {
                String::new()
            } else {
                format!("*{alt}*")
            }
        })
        .to_string()
}

// ── Rule 6: Invisible Unicode ────────────────────────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 7: Surrounding blank lines ──────────────────────────────────────────

fn trim_blank_edges(input: &str) -> String {
    input.trim_start_matches('\n').trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_fences() {
        assert_eq!(strip_outer_fence("```text\nHello\nWorld\n```"), "Hello\nWorld");
        assert_eq!(strip_outer_fence("```\nHello\n```"), "Hello");
        assert_eq!(strip_outer_fence("Hello"), "Hello");
    }

    #[test]
    fn inner_fences_survive() {
        let input = "Intro\n```rust\nfn main() {}\n```\nOutro";
        assert_eq!(strip_outer_fence(input), input);
    }

    #[test]
    fn line_endings() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn trailing_whitespace() {
        assert_eq!(trim_trailing_whitespace("  hi   \nthere\t"), "  hi\nthere");
    }

    #[test]
    fn blank_runs_collapse() {
        assert_eq!(collapse_blank_lines("a\n\n\n\n\nb"), "a\n\nb");
        assert_eq!(collapse_blank_lines("a\n\nb"), "a\n\nb");
    }

    #[test]
    fn placeholder_images_become_captions() {
        assert_eq!(remove_placeholder_images("![Chart](chart.png)"), "*Chart*");
        assert_eq!(remove_placeholder_images("![](image-url)"), "");
        let real = "![Fig](https://arxiv.org/fig1.png)";
        assert_eq!(remove_placeholder_images(real), real);
    }

    #[test]
    fn invisible_chars() {
        assert_eq!(
            remove_invisible_chars("a\u{200B}b\u{FEFF}c\u{00AD}d"),
            "abcd"
        );
    }

    #[test]
    fn full_cleanup() {
        let input = "```markdown\r\n\r\nLecture 3\u{200B}   \r\n\r\n\r\n\r\nEntropy\r\n![Plot](plot.png)\r\n\r\n```";
        assert_eq!(clean_extracted_text(input), "Lecture 3\n\nEntropy\n*Plot*");
    }

    #[test]
    fn whitespace_only_is_empty() {
        assert_eq!(clean_extracted_text("  \n\n \r\n"), "");
    }
}
