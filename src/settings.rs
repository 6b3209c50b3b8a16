//! Persisted vault settings: where image folders and notes go by default.
//!
//! Stored as a small JSON blob at `<vault>/.pdf2note/data.json`. Keys missing
//! from the blob fall back to their defaults and unknown keys are ignored, so
//! older and newer blobs both load without migration.

use crate::error::Pdf2NoteError;
use crate::vault::{normalize_path, ROOT};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const SETTINGS_DIR: &str = ".pdf2note";
pub const SETTINGS_FILE: &str = "data.json";

/// Vault-wide defaults. `/` (or blank) means the vault root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// Folder new image folders are created under.
    pub image_output: String,
    /// Folder notes are written to when a request names no path.
    pub md_output: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            image_output: ROOT.to_string(),
            md_output: ROOT.to_string(),
        }
    }
}

impl Settings {
    /// The configured image folder, or `None` for the vault root.
    pub fn image_output_folder(&self) -> Option<String> {
        non_root(&self.image_output)
    }

    /// The configured note folder, or `None` for the vault root.
    pub fn note_output_folder(&self) -> Option<String> {
        non_root(&self.md_output)
    }

    /// Load settings for the vault at `vault_root`; defaults if none are saved.
    pub async fn load(vault_root: &Path) -> Result<Self, Pdf2NoteError> {
        let path = settings_path(vault_root);
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No settings at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => return Err(Pdf2NoteError::SettingsIo { path, source }),
        };
        serde_json::from_slice(&raw)
            .map_err(|source| Pdf2NoteError::SettingsMalformed { path, source })
    }

    /// Persist settings for the vault at `vault_root`.
    pub async fn save(&self, vault_root: &Path) -> Result<(), Pdf2NoteError> {
        let path = settings_path(vault_root);
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|source| Pdf2NoteError::SettingsIo {
                    path: path.clone(),
                    source,
                })?;
        }
        let json = serde_json::to_vec_pretty(self).map_err(|source| {
            Pdf2NoteError::SettingsMalformed {
                path: path.clone(),
                source,
            }
        })?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|source| Pdf2NoteError::SettingsIo { path, source })
    }
}

/// Location of the settings blob for a vault.
pub fn settings_path(vault_root: &Path) -> PathBuf {
    vault_root.join(SETTINGS_DIR).join(SETTINGS_FILE)
}

fn non_root(value: &str) -> Option<String> {
    let normalized = normalize_path(value);
    (normalized != ROOT).then_some(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_root() {
        let s = Settings::default();
        assert_eq!(s.image_output, "/");
        assert_eq!(s.md_output, "/");
        assert_eq!(s.image_output_folder(), None);
        assert_eq!(s.note_output_folder(), None);
    }

    #[test]
    fn blank_counts_as_root() {
        let s = Settings {
            image_output: "  ".trim().to_string(),
            md_output: "Notes/".into(),
        };
        assert_eq!(s.image_output_folder(), None);
        assert_eq!(s.note_output_folder(), Some("Notes".to_string()));
    }

    #[test]
    fn missing_keys_take_defaults() {
        let s: Settings = serde_json::from_str(r#"{"mdOutput":"Notes","legacy":1}"#).unwrap();
        assert_eq!(s.md_output, "Notes");
        assert_eq!(s.image_output, "/");
    }

    #[tokio::test]
    async fn load_missing_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let s = Settings::load(dir.path()).await.unwrap();
        assert_eq!(s, Settings::default());
    }

    #[tokio::test]
    async fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let s = Settings {
            image_output: "Attachments".into(),
            md_output: "Lectures".into(),
        };
        s.save(dir.path()).await.unwrap();
        assert!(settings_path(dir.path()).exists());
        assert_eq!(Settings::load(dir.path()).await.unwrap(), s);
    }

    #[tokio::test]
    async fn malformed_blob_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(SETTINGS_DIR)).unwrap();
        std::fs::write(settings_path(dir.path()), b"not json").unwrap();
        let err = Settings::load(dir.path()).await.unwrap_err();
        assert!(matches!(err, Pdf2NoteError::SettingsMalformed { .. }));
    }
}
