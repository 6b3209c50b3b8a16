//! Note assembly: page images (+ optional extracted text) → note body.
//!
//! Two entry points share the same section builder:
//!
//! * [`assemble_pages`] takes the files the rasteriser just wrote. This is
//!   what a conversion uses, so it never depends on what the vault listing
//!   happens to show.
//! * [`assemble_folder`] lists an existing image folder instead, for
//!   rebuilding a note from images already in the vault.
//!
//! Text extraction never fails a note. A missing or unwilling extractor, or an
//! empty result, yields [`EXTRACTION_FAILED`]; an extractor error yields
//! [`EXTRACTION_ERROR`].

use crate::error::Pdf2NoteError;
use crate::extract::TextExtractor;
use crate::output::{ConversionLog, NoteDocument, NoteSection};
use crate::vault::{is_direct_child, normalize_path, Vault, VaultFile};
use std::cmp::Ordering;

pub const EXTRACTION_FAILED: &str = "Text extraction failed.";
pub const EXTRACTION_ERROR: &str = "Error during text extraction.";

/// Extensions recognised as note images (compared case-insensitively).
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "svg"];

pub fn is_image_file(file: &VaultFile) -> bool {
    IMAGE_EXTENSIONS
        .iter()
        .any(|ext| ext.eq_ignore_ascii_case(&file.extension))
}

/// Build a note from the given images, in the order given.
pub async fn assemble_pages(
    tags: &[String],
    images: &[VaultFile],
    extract_text: bool,
    extractor: Option<&dyn TextExtractor>,
    log: &mut ConversionLog,
) -> NoteDocument {
    if extract_text && extractor.is_none() {
        log.warn("Text extraction requested but no extractor is available");
    }

    let mut sections = Vec::with_capacity(images.len());
    for file in images {
        let text = section_text(file, extract_text, extractor, log).await;
        sections.push(NoteSection {
            image_reference: file.path.clone(),
            text,
        });
    }

    NoteDocument {
        front_matter: tags.to_vec(),
        sections,
    }
}

/// Build a note body from the images directly inside `folder`.
///
/// Images are ordered by creation time, oldest first.
pub async fn assemble_folder(
    vault: &dyn Vault,
    folder: &str,
    tags: &[String],
    extract_text: bool,
    extractor: Option<&dyn TextExtractor>,
    log: &mut ConversionLog,
) -> Result<String, Pdf2NoteError> {
    let images = list_folder_images(vault, folder).await?;
    log.info(format!(
        "Found {} image(s) in: {}",
        images.len(),
        normalize_path(folder)
    ));
    let note = assemble_pages(tags, &images, extract_text, extractor, log).await;
    Ok(note.render())
}

/// Image files directly inside `folder`, oldest first.
///
/// Files in sibling folders that merely share a name prefix
/// (`deck-2/` when asked for `deck`) and files in subfolders are excluded.
/// Equal creation times fall back to natural name order, so `page-2.png`
/// sorts before `page-10.png`.
pub async fn list_folder_images(
    vault: &dyn Vault,
    folder: &str,
) -> Result<Vec<VaultFile>, Pdf2NoteError> {
    let mut images: Vec<VaultFile> = vault
        .list_files()
        .await
        .map_err(|source| Pdf2NoteError::ListingFailed {
            folder: folder.to_string(),
            source,
        })?
        .into_iter()
        .filter(|f| is_direct_child(folder, &f.path) && is_image_file(f))
        .collect();

    images.sort_by(|a, b| {
        a.created
            .cmp(&b.created)
            .then_with(|| natural_cmp(&a.name, &b.name))
    });
    Ok(images)
}

async fn section_text(
    file: &VaultFile,
    extract_text: bool,
    extractor: Option<&dyn TextExtractor>,
    log: &mut ConversionLog,
) -> String {
    if !extract_text {
        return String::new();
    }
    let Some(extractor) = extractor else {
        return EXTRACTION_FAILED.to_string();
    };
    if !extractor.can_file_be_extracted(&file.path) {
        log.warn(format!("Cannot extract text from: {}", file.path));
        return EXTRACTION_FAILED.to_string();
    }

    if extractor.is_in_cache(file).await {
        log.info(format!("Using cached text for: {}", file.path));
    } else {
        log.info(format!("Extracting text from: {}", file.path));
    }

    match extractor.extract_text(file).await {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) => {
            log.warn(format!("No text found in: {}", file.path));
            EXTRACTION_FAILED.to_string()
        }
        Err(e) => {
            log.warn(format!("Text extraction failed for {}: {}", file.path, e));
            EXTRACTION_ERROR.to_string()
        }
    }
}

/// Compare names treating runs of ASCII digits as numbers.
fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut a = a.as_bytes();
    let mut b = b.as_bytes();
    loop {
        match (a.first(), b.first()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let (na, ra) = split_digits(a);
                let (nb, rb) = split_digits(b);
                let ord = compare_digit_runs(na, nb);
                if ord != Ordering::Equal {
                    return ord;
                }
                a = ra;
                b = rb;
            }
            (Some(x), Some(y)) => {
                let ord = x.cmp(y);
                if ord != Ordering::Equal {
                    return ord;
                }
                a = &a[1..];
                b = &b[1..];
            }
        }
    }
}

fn split_digits(s: &[u8]) -> (&[u8], &[u8]) {
    let end = s.iter().position(|c| !c.is_ascii_digit()).unwrap_or(s.len());
    s.split_at(end)
}

fn compare_digit_runs(a: &[u8], b: &[u8]) -> Ordering {
    let trim = |s: &[u8]| s.iter().position(|&c| c != b'0').unwrap_or(s.len());
    let a = &a[trim(a)..];
    let b = &b[trim(b)..];
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ExtractError;
    use crate::vault::MemoryVault;
    use async_trait::async_trait;
    use std::time::{Duration, UNIX_EPOCH};

    struct ScriptedExtractor;

    #[async_trait]
    impl TextExtractor for ScriptedExtractor {
        async fn extract_text(&self, file: &VaultFile) -> Result<String, ExtractError> {
            match file.name.as_str() {
                "page-1.png" => Ok("Slide one".into()),
                "page-2.png" => Ok("   ".into()),
                _ => Err(ExtractError::Provider {
                    attempts: 1,
                    detail: "boom".into(),
                }),
            }
        }

        fn can_file_be_extracted(&self, path: &str) -> bool {
            !path.ends_with(".svg")
        }

        async fn is_in_cache(&self, _file: &VaultFile) -> bool {
            false
        }
    }

    fn tags(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn natural_order() {
        let mut names = vec!["page-10.png", "page-2.png", "page-1.png", "page-02.png"];
        names.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(names, vec!["page-1.png", "page-2.png", "page-02.png", "page-10.png"]);
    }

    #[test]
    fn image_extensions_are_case_insensitive() {
        assert!(is_image_file(&VaultFile::new("a/B.PNG", UNIX_EPOCH)));
        assert!(is_image_file(&VaultFile::new("a/b.Svg", UNIX_EPOCH)));
        assert!(!is_image_file(&VaultFile::new("a/b.pdf", UNIX_EPOCH)));
    }

    #[tokio::test]
    async fn listing_is_direct_child_and_ordered_by_creation() {
        let vault = MemoryVault::new();
        let t = |ms| UNIX_EPOCH + Duration::from_millis(ms);
        vault.insert_with_time("deck/page-2.png", b"2".to_vec(), t(20));
        vault.insert_with_time("deck/page-1.png", b"1".to_vec(), t(10));
        vault.insert_with_time("deck/page-10.png", b"x".to_vec(), t(20));
        vault.insert_with_time("deck/notes.md", b"n".to_vec(), t(5));
        vault.insert_with_time("deck-2/page-1.png", b"s".to_vec(), t(1));
        vault.insert_with_time("deck/sub/page-1.png", b"d".to_vec(), t(1));

        let paths: Vec<String> = list_folder_images(&vault, "deck")
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.path)
            .collect();
        assert_eq!(
            paths,
            vec!["deck/page-1.png", "deck/page-2.png", "deck/page-10.png"]
        );
    }

    #[tokio::test]
    async fn no_extraction_means_empty_text() {
        let files = vec![VaultFile::new("deck/page-1.png", UNIX_EPOCH)];
        let mut log = ConversionLog::new();
        let note = assemble_pages(
            &tags(&["a"]),
            &files,
            false,
            Some(&ScriptedExtractor),
            &mut log,
        )
        .await;
        assert_eq!(note.sections[0].text, "");
    }

    #[tokio::test]
    async fn missing_extractor_yields_sentinel() {
        let files = vec![
            VaultFile::new("deck/page-1.png", UNIX_EPOCH),
            VaultFile::new("deck/page-2.png", UNIX_EPOCH),
        ];
        let mut log = ConversionLog::new();
        let note = assemble_pages(&tags(&[""]), &files, true, None, &mut log).await;
        assert!(note.sections.iter().all(|s| s.text == EXTRACTION_FAILED));
        assert!(!log.is_empty());
    }

    #[tokio::test]
    async fn extractor_outcomes_map_to_sentinels() {
        let files = vec![
            VaultFile::new("deck/page-1.png", UNIX_EPOCH),
            VaultFile::new("deck/page-2.png", UNIX_EPOCH),
            VaultFile::new("deck/page-3.png", UNIX_EPOCH),
            VaultFile::new("deck/figure.svg", UNIX_EPOCH),
        ];
        let mut log = ConversionLog::new();
        let note =
            assemble_pages(&tags(&["a"]), &files, true, Some(&ScriptedExtractor), &mut log).await;
        let texts: Vec<&str> = note.sections.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["Slide one", EXTRACTION_FAILED, EXTRACTION_ERROR, EXTRACTION_FAILED]
        );
    }

    #[tokio::test]
    async fn assemble_folder_renders_body() {
        let vault = MemoryVault::new();
        vault.insert("deck/page-1.png", b"1".to_vec());
        vault.insert("deck/page-2.png", b"2".to_vec());
        let mut log = ConversionLog::new();
        let body = assemble_folder(&vault, "deck", &tags(&["a", "b"]), false, None, &mut log)
            .await
            .unwrap();
        assert_eq!(
            body,
            "---\ntags:\n  - a\n  - b\n---\n\n![[deck/page-1.png]]\n\n![[deck/page-2.png]]\n"
        );
    }
}
