//! Vault storage: the notes directory every request path is relative to.
//!
//! A vault path is always `/`-separated and relative to the vault root, e.g.
//! `Lectures/week-1.pdf`. The root itself is spelled `/`. All components talk
//! to storage through the [`Vault`] trait so the pipeline never reaches for an
//! ambient filesystem handle:
//!
//! * [`FsVault`]    : a directory on disk, via `tokio::fs`
//! * [`MemoryVault`]: in-process storage with a logical creation clock,
//!   used by tests and by embedders that post-process the output themselves

use async_trait::async_trait;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// The vault root as spelled in settings and normalized paths.
pub const ROOT: &str = "/";

/// Errors raised by a [`Vault`] implementation.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("'{path}' does not exist")]
    NotFound { path: String },

    #[error("'{path}' already exists")]
    AlreadyExists { path: String },

    #[error("parent folder of '{path}' does not exist")]
    ParentMissing { path: String },

    /// The path escapes the vault root or is otherwise unusable.
    #[error("invalid vault path '{path}'")]
    InvalidPath { path: String },

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// A file known to the vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VaultFile {
    /// Normalized vault path, e.g. `scans/page-1.png`.
    pub path: String,
    /// Final path segment, e.g. `page-1.png`.
    pub name: String,
    /// Extension without the dot, as written (case preserved).
    pub extension: String,
    /// Creation time; filesystems without birth time report mtime instead.
    pub created: SystemTime,
}

impl VaultFile {
    pub fn new(path: &str, created: SystemTime) -> Self {
        let path = normalize_path(path);
        let name = path.rsplit('/').next().unwrap_or_default().to_string();
        let extension = match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => ext.to_string(),
            _ => String::new(),
        };
        Self {
            path,
            name,
            extension,
            created,
        }
    }

    /// Folder containing this file; [`ROOT`] for top-level files.
    pub fn parent(&self) -> &str {
        parent_of(&self.path)
    }
}

/// Normalize a user-supplied vault path.
///
/// Backslashes become `/`, repeated separators collapse, leading and trailing
/// separators are dropped and non-breaking spaces become plain spaces. An
/// empty result is the root, [`ROOT`].
pub fn normalize_path(path: &str) -> String {
    let cleaned: String = path
        .chars()
        .map(|c| match c {
            '\\' => '/',
            '\u{00A0}' | '\u{202F}' => ' ',
            c => c,
        })
        .collect();

    let joined = cleaned
        .split('/')
        .filter(|seg| !seg.is_empty())
        .collect::<Vec<_>>()
        .join("/");

    if joined.is_empty() {
        ROOT.to_string()
    } else {
        joined
    }
}

/// Join a folder and a relative name into a normalized vault path.
pub fn join(folder: &str, name: &str) -> String {
    let folder = normalize_path(folder);
    if folder == ROOT {
        normalize_path(name)
    } else {
        normalize_path(&format!("{folder}/{name}"))
    }
}

/// Parent folder of a normalized path; [`ROOT`] for top-level entries.
pub fn parent_of(path: &str) -> &str {
    match path.rsplit_once('/') {
        Some((parent, _)) if !parent.is_empty() => parent,
        _ => ROOT,
    }
}

/// Whether `path` sits directly inside `folder`.
///
/// Compares whole path segments, so `notes-2/a.png` is not inside `notes`.
pub fn is_direct_child(folder: &str, path: &str) -> bool {
    let path = normalize_path(path);
    path != ROOT && parent_of(&path) == normalize_path(folder)
}

/// The storage adapter every pipeline stage writes through.
#[async_trait]
pub trait Vault: Send + Sync {
    /// Read a whole file.
    async fn read_binary(&self, path: &str) -> Result<Vec<u8>, VaultError>;

    /// Write (or overwrite) a file. The parent folder must exist.
    async fn write_binary(&self, path: &str, data: &[u8]) -> Result<VaultFile, VaultError>;

    /// Create a folder, including missing ancestors. Fails if it already exists.
    async fn create_folder(&self, path: &str) -> Result<(), VaultError>;

    /// Create a new text file. Fails if it exists or its parent is missing.
    async fn create_file(&self, path: &str, text: &str) -> Result<VaultFile, VaultError>;

    /// Every file in the vault, in no particular order.
    async fn list_files(&self) -> Result<Vec<VaultFile>, VaultError>;
}

// ── Filesystem vault ─────────────────────────────────────────────────────────

/// A vault backed by a directory on disk.
///
/// Entries whose name starts with `.` (e.g. the settings folder) are not
/// listed.
#[derive(Debug, Clone)]
pub struct FsVault {
    root: PathBuf,
}

impl FsVault {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a vault path onto the filesystem, refusing anything that escapes.
    fn resolve(&self, path: &str) -> Result<PathBuf, VaultError> {
        let normalized = normalize_path(path);
        if normalized == ROOT {
            return Ok(self.root.clone());
        }
        let mut full = self.root.clone();
        for seg in normalized.split('/') {
            if seg == ".." || seg == "." || seg.contains(':') {
                return Err(VaultError::InvalidPath {
                    path: path.to_string(),
                });
            }
            full.push(seg);
        }
        Ok(full)
    }

    async fn stat(&self, path: &str, full: &Path) -> Result<VaultFile, VaultError> {
        let meta = tokio::fs::metadata(full).await.map_err(|e| io_err(path, e))?;
        Ok(VaultFile::new(path, created_time(&meta)))
    }
}

fn created_time(meta: &std::fs::Metadata) -> SystemTime {
    meta.created()
        .or_else(|_| meta.modified())
        .unwrap_or(UNIX_EPOCH)
}

fn io_err(path: &str, source: std::io::Error) -> VaultError {
    match source.kind() {
        ErrorKind::NotFound => VaultError::NotFound {
            path: path.to_string(),
        },
        ErrorKind::AlreadyExists => VaultError::AlreadyExists {
            path: path.to_string(),
        },
        _ => VaultError::Io {
            path: path.to_string(),
            source,
        },
    }
}

#[async_trait]
impl Vault for FsVault {
    async fn read_binary(&self, path: &str) -> Result<Vec<u8>, VaultError> {
        let full = self.resolve(path)?;
        tokio::fs::read(&full).await.map_err(|e| io_err(path, e))
    }

    async fn write_binary(&self, path: &str, data: &[u8]) -> Result<VaultFile, VaultError> {
        let full = self.resolve(path)?;
        ensure_parent_dir(&full, path).await?;
        tokio::fs::write(&full, data)
            .await
            .map_err(|e| io_err(path, e))?;
        debug!("Wrote {} bytes → {}", data.len(), path);
        self.stat(path, &full).await
    }

    async fn create_folder(&self, path: &str) -> Result<(), VaultError> {
        let full = self.resolve(path)?;
        if tokio::fs::try_exists(&full).await.map_err(|e| io_err(path, e))? {
            return Err(VaultError::AlreadyExists {
                path: path.to_string(),
            });
        }
        tokio::fs::create_dir_all(&full)
            .await
            .map_err(|e| io_err(path, e))
    }

    async fn create_file(&self, path: &str, text: &str) -> Result<VaultFile, VaultError> {
        let full = self.resolve(path)?;
        ensure_parent_dir(&full, path).await?;
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&full)
            .await
            .map_err(|e| io_err(path, e))?;
        file.write_all(text.as_bytes())
            .await
            .map_err(|e| io_err(path, e))?;
        file.flush().await.map_err(|e| io_err(path, e))?;
        self.stat(path, &full).await
    }

    async fn list_files(&self) -> Result<Vec<VaultFile>, VaultError> {
        let mut files = Vec::new();
        let mut pending = vec![(self.root.clone(), String::new())];

        while let Some((dir, prefix)) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir)
                .await
                .map_err(|e| io_err(&prefix, e))?;
            while let Some(entry) = entries.next_entry().await.map_err(|e| io_err(&prefix, e))? {
                let name = entry.file_name().to_string_lossy().to_string();
                if name.starts_with('.') {
                    continue;
                }
                let rel = if prefix.is_empty() {
                    name
                } else {
                    format!("{prefix}/{name}")
                };
                let meta = entry.metadata().await.map_err(|e| io_err(&rel, e))?;
                if meta.is_dir() {
                    pending.push((entry.path(), rel));
                } else if meta.is_file() {
                    files.push(VaultFile::new(&rel, created_time(&meta)));
                }
            }
        }

        Ok(files)
    }
}

async fn ensure_parent_dir(full: &Path, path: &str) -> Result<(), VaultError> {
    let Some(parent) = full.parent() else {
        return Ok(());
    };
    match tokio::fs::metadata(parent).await {
        Ok(m) if m.is_dir() => Ok(()),
        _ => Err(VaultError::ParentMissing {
            path: path.to_string(),
        }),
    }
}

// ── In-memory vault ──────────────────────────────────────────────────────────

#[derive(Default)]
struct MemoryState {
    files: BTreeMap<String, (Vec<u8>, SystemTime)>,
    folders: BTreeSet<String>,
    clock_ms: u64,
}

impl MemoryState {
    fn tick(&mut self) -> SystemTime {
        self.clock_ms += 1;
        UNIX_EPOCH + Duration::from_millis(self.clock_ms)
    }

    fn folder_exists(&self, folder: &str) -> bool {
        folder == ROOT || self.folders.contains(folder)
    }

    fn add_folder_chain(&mut self, folder: &str) {
        let mut current = String::new();
        for seg in folder.split('/') {
            if !current.is_empty() {
                current.push('/');
            }
            current.push_str(seg);
            self.folders.insert(current.clone());
        }
    }
}

/// A vault held entirely in memory.
///
/// Every write advances a logical clock by one millisecond, so creation
/// order is exact and deterministic.
#[derive(Default)]
pub struct MemoryVault {
    state: Mutex<MemoryState>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a file, creating any missing folders on the way.
    pub fn insert(&self, path: &str, data: impl Into<Vec<u8>>) -> VaultFile {
        let path = normalize_path(path);
        let mut state = self.lock();
        let parent = parent_of(&path).to_string();
        if parent != ROOT {
            state.add_folder_chain(&parent);
        }
        let created = state.tick();
        state.files.insert(path.clone(), (data.into(), created));
        VaultFile::new(&path, created)
    }

    /// Seed a file with an explicit creation time.
    pub fn insert_with_time(&self, path: &str, data: impl Into<Vec<u8>>, created: SystemTime) {
        let path = normalize_path(path);
        let mut state = self.lock();
        let parent = parent_of(&path).to_string();
        if parent != ROOT {
            state.add_folder_chain(&parent);
        }
        state.files.insert(path, (data.into(), created));
    }

    /// Contents of a file as UTF-8, if present.
    pub fn read_text(&self, path: &str) -> Option<String> {
        let state = self.lock();
        state
            .files
            .get(&normalize_path(path))
            .map(|(data, _)| String::from_utf8_lossy(data).into_owned())
    }

    pub fn folder_exists(&self, path: &str) -> bool {
        self.lock().folder_exists(&normalize_path(path))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        // A poisoned lock only means another test thread panicked mid-write;
        // the map itself is still consistent.
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[async_trait]
impl Vault for MemoryVault {
    async fn read_binary(&self, path: &str) -> Result<Vec<u8>, VaultError> {
        self.lock()
            .files
            .get(&normalize_path(path))
            .map(|(data, _)| data.clone())
            .ok_or_else(|| VaultError::NotFound {
                path: path.to_string(),
            })
    }

    async fn write_binary(&self, path: &str, data: &[u8]) -> Result<VaultFile, VaultError> {
        let normalized = normalize_path(path);
        let mut state = self.lock();
        if !state.folder_exists(parent_of(&normalized)) {
            return Err(VaultError::ParentMissing {
                path: path.to_string(),
            });
        }
        let created = match state.files.get(&normalized) {
            Some((_, created)) => *created,
            None => state.tick(),
        };
        state
            .files
            .insert(normalized.clone(), (data.to_vec(), created));
        Ok(VaultFile::new(&normalized, created))
    }

    async fn create_folder(&self, path: &str) -> Result<(), VaultError> {
        let normalized = normalize_path(path);
        let mut state = self.lock();
        if state.folder_exists(&normalized) || state.files.contains_key(&normalized) {
            return Err(VaultError::AlreadyExists {
                path: path.to_string(),
            });
        }
        state.add_folder_chain(&normalized);
        Ok(())
    }

    async fn create_file(&self, path: &str, text: &str) -> Result<VaultFile, VaultError> {
        let normalized = normalize_path(path);
        let mut state = self.lock();
        if state.files.contains_key(&normalized) {
            return Err(VaultError::AlreadyExists {
                path: path.to_string(),
            });
        }
        if !state.folder_exists(parent_of(&normalized)) {
            return Err(VaultError::ParentMissing {
                path: path.to_string(),
            });
        }
        let created = state.tick();
        state
            .files
            .insert(normalized.clone(), (text.as_bytes().to_vec(), created));
        Ok(VaultFile::new(&normalized, created))
    }

    async fn list_files(&self) -> Result<Vec<VaultFile>, VaultError> {
        Ok(self
            .lock()
            .files
            .iter()
            .map(|(path, (_, created))| VaultFile::new(path, *created))
            .collect())
    }
}
