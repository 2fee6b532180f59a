//! Directory-keyed temp files mirroring the browser's editable fields.
//!
//! Layout under the per-run root:
//!
//! ```text
//! <root>/<dir>/<windowId>/<tabId>/<host>/<fileName>
//! ```
//!
//! `dir` is either the regular or the private-browsing subtree. The path for a
//! key is computed only by [`temp_file_path`]; storage goes through a
//! [`StoreBackend`] so tests can run against memory.

mod backend;

use crate::config::{is_single_component, TMP_FILES_DIR, TMP_FILES_PRIVATE_DIR};
use crate::error::{HostError, HostResult};
use crate::{log_debug, log_debug_content};
use std::io;
use std::path::{Component, Path, PathBuf};

pub use backend::{FsBackend, MemoryBackend, StoreBackend};

/// Scope of one temp file: which subtree, window, tab and site it belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TempFileKey {
    pub dir: String,
    pub window_id: String,
    pub tab_id: String,
    pub host: String,
}

impl TempFileKey {
    fn components(&self) -> [&str; 4] {
        [
            self.dir.as_str(),
            self.window_id.as_str(),
            self.tab_id.as_str(),
            self.host.as_str(),
        ]
    }

    /// All four parts present.
    pub fn is_complete(&self) -> bool {
        self.components().iter().all(|part| !part.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TempFileRecord {
    /// Present for records produced by [`TempFileStore::create`].
    pub key: Option<TempFileKey>,
    pub file_name: String,
    pub file_path: PathBuf,
    pub content: String,
    /// Modification time in ms since the epoch; 0 when unknown.
    pub timestamp: u64,
}

/// Pure key-to-path mapping.
pub fn temp_file_path(root: &Path, key: &TempFileKey, file_name: &str) -> PathBuf {
    let mut path = root.to_path_buf();
    for part in key.components() {
        path.push(part);
    }
    path.push(file_name);
    path
}

pub struct TempFileStore<B: StoreBackend = FsBackend> {
    root: PathBuf,
    backend: B,
}

impl TempFileStore<FsBackend> {
    pub fn on_disk(root: impl Into<PathBuf>) -> Self {
        Self::new(root, FsBackend)
    }
}

impl<B: StoreBackend> TempFileStore<B> {
    pub fn new(root: impl Into<PathBuf>, backend: B) -> Self {
        Self {
            root: root.into(),
            backend,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn regular_dir(&self) -> PathBuf {
        self.root.join(TMP_FILES_DIR)
    }

    pub fn private_dir(&self) -> PathBuf {
        self.root.join(TMP_FILES_PRIVATE_DIR)
    }

    /// Create both subtrees; run once at startup.
    pub fn prepare(&mut self) -> HostResult<()> {
        for dir in [self.regular_dir(), self.private_dir()] {
            self.backend
                .create_dir_all(&dir)
                .map_err(|err| HostError::fs(&dir, err))?;
        }
        Ok(())
    }

    /// Write `content` to the file for `key`/`file_name`.
    ///
    /// `Ok(None)` means the request is not temp-file backed: a key part or the
    /// file name is missing, or one of them is not a plain path component.
    pub fn create(
        &mut self,
        key: &TempFileKey,
        file_name: &str,
        content: &str,
    ) -> HostResult<Option<TempFileRecord>> {
        if !key.is_complete() || file_name.is_empty() {
            return Ok(None);
        }
        let all_plain = key
            .components()
            .iter()
            .chain(std::iter::once(&file_name))
            .all(|part| is_single_component(part));
        if !all_plain {
            log_debug("temp file request rejected: key contains path separators");
            tracing::warn!("rejected temp file key with non-plain component");
            return Ok(None);
        }

        let file_path = temp_file_path(&self.root, key, file_name);
        let dir_path = file_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());
        self.backend
            .create_dir_all(&dir_path)
            .map_err(|err| HostError::fs(&dir_path, err))?;
        self.backend
            .write_file(&file_path, content)
            .map_err(|err| HostError::fs(&file_path, err))?;
        let timestamp = self.backend.modified_millis(&file_path).unwrap_or(0);

        log_debug_content(&format!("temp file written: {}", file_path.display()));
        Ok(Some(TempFileRecord {
            key: Some(key.clone()),
            file_name: file_name.to_string(),
            file_path,
            content: content.to_string(),
            timestamp,
        }))
    }

    /// Current content and modification time of a temp file.
    ///
    /// Never fails: an absent path, a path outside the store, or a file that
    /// cannot be read yields empty content and timestamp 0.
    pub fn fetch_with_timestamp(&self, file_path: Option<&Path>) -> TempFileRecord {
        let Some(path) = file_path.filter(|p| !p.as_os_str().is_empty()) else {
            return TempFileRecord::default();
        };
        let mut record = TempFileRecord {
            file_name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            file_path: path.to_path_buf(),
            ..TempFileRecord::default()
        };
        if !self.contains(path) {
            log_debug_content(&format!("fetch outside temp root: {}", path.display()));
            tracing::warn!("temp file fetch outside the store root");
            return record;
        }

        // Stamp is taken before the read, never after.
        record.timestamp = self.backend.modified_millis(path).unwrap_or(0);
        match self.backend.read_file(path) {
            Ok(content) => record.content = content,
            Err(err) => {
                if err.kind() != io::ErrorKind::NotFound {
                    log_debug(&format!("temp file read failed: {err}"));
                }
                record.timestamp = 0;
            }
        }
        record
    }

    /// Remove everything under the private subtree, then recreate its root.
    pub fn purge_private(&mut self) -> HostResult<()> {
        let private = self.private_dir();
        match self.backend.remove_dir_all(&private) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(HostError::fs(&private, err)),
        }
        self.backend
            .create_dir_all(&private)
            .map_err(|err| HostError::fs(&private, err))?;
        tracing::info!("private temp files purged");
        Ok(())
    }

    /// Best-effort removal of the whole per-run root on shutdown.
    pub fn purge_all(&mut self) {
        if let Err(err) = self.backend.remove_dir_all(&self.root) {
            if err.kind() != io::ErrorKind::NotFound {
                log_debug(&format!("temp root cleanup failed: {err}"));
            }
        }
    }

    /// Lexical containment check; rejects `..` anywhere in the path.
    fn contains(&self, path: &Path) -> bool {
        path.starts_with(&self.root)
            && !path
                .components()
                .any(|c| matches!(c, Component::ParentDir | Component::CurDir))
    }
}
