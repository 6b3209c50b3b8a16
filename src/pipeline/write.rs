//! Destinations: where a request's images and note go, and the note write.

use crate::error::Pdf2NoteError;
use crate::settings::Settings;
use crate::vault::{join, normalize_path, Vault, VaultFile, ROOT};
use tracing::info;

/// Vault path of the note for a request.
///
/// An explicit, non-blank `note_path` wins; otherwise the configured default
/// note folder; otherwise the vault root. `.md` is always appended.
pub fn resolve_note_path(note_file_name: &str, note_path: Option<&str>, settings: &Settings) -> String {
    let file_name = format!("{note_file_name}.md");
    match note_path.map(str::trim).filter(|p| !p.is_empty()) {
        Some(explicit) => join(explicit, &file_name),
        None => match settings.note_output_folder() {
            Some(default) => join(&default, &file_name),
            None => join(ROOT, &file_name),
        },
    }
}

/// Vault folder for a request's page images.
///
/// Always carries `millis` so repeated runs on the same PDF never collide:
/// `<stem>-output-<millis>` at the root, or `<image_output>/<stem>-<millis>`
/// when a default image folder is configured.
pub fn image_folder_path(source_path: &str, settings: &Settings, millis: u128) -> String {
    let stem = document_stem(source_path);
    match settings.image_output_folder() {
        Some(base) => join(&base, &format!("{stem}-{millis}")),
        None => normalize_path(&format!("{stem}-output-{millis}")),
    }
}

/// File name of `path` without its last extension.
pub fn document_stem(path: &str) -> String {
    let normalized = normalize_path(path);
    let name = normalized.rsplit('/').next().unwrap_or_default();
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => name.to_string(),
    }
}

/// Create the note. Fails if a file already exists at `path` or its folder
/// is missing.
pub async fn write_note(vault: &dyn Vault, path: &str, text: &str) -> Result<VaultFile, Pdf2NoteError> {
    let file = vault
        .create_file(path, text)
        .await
        .map_err(|source| Pdf2NoteError::NoteWriteFailed {
            path: path.to_string(),
            source,
        })?;
    info!("Note created: {}", file.path);
    Ok(file)
}
