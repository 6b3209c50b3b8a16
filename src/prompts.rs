//! Prompts for vision-model text extraction.
//!
//! Kept in one place so the wording can change without touching the retry
//! and caching logic in [`crate::extract`], and so tests can inspect it.
//!
//! Callers can override the default via
//! [`crate::extract::VisionExtractorConfig::system_prompt`].

/// Default system prompt for transcribing one page image.
///
/// The output goes directly under the page's image embed in a note, so the
/// model is asked for plain reading-order text with light Markdown only.
pub const DEFAULT_OCR_PROMPT: &str = r#"You transcribe the text visible in an image of a single document page.

Follow these rules precisely:

1. TEXT
   - Transcribe ALL legible text exactly as written
   - Keep the reading order a human would use
   - Keep the original language; do not translate

2. LAYOUT
   - Keep paragraph breaks as blank lines
   - Use - for bullet lists and 1. 2. 3. for numbered lists
   - Render tables as GFM pipe tables
   - Render formulas as LaTeX: $inline$ and $$display$$

3. WHAT TO IGNORE
   - Page numbers and running headers/footers
   - Pictures, charts and decorations; never describe them and never emit image links

4. OUTPUT FORMAT
   - Output ONLY the transcribed text
   - Do NOT wrap the output in code fences
   - Do NOT add commentary
   - If the page has no legible text, output nothing"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_forbids_fences_and_image_links() {
        assert!(DEFAULT_OCR_PROMPT.contains("code fences"));
        assert!(DEFAULT_OCR_PROMPT.contains("never emit image links"));
    }
}
