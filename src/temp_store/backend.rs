//! Persistence backends for the temp-file store.

use crate::fs_util::system_time_millis;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Storage operations the store needs. Paths are always absolute and already
/// validated by the store.
pub trait StoreBackend {
    /// Idempotent: an existing directory chain is not an error.
    fn create_dir_all(&mut self, path: &Path) -> io::Result<()>;
    fn write_file(&mut self, path: &Path, contents: &str) -> io::Result<()>;
    fn read_file(&self, path: &Path) -> io::Result<String>;
    fn modified_millis(&self, path: &Path) -> io::Result<u64>;
    /// Fails with `NotFound` when `path` does not exist.
    fn remove_dir_all(&mut self, path: &Path) -> io::Result<()>;
}

/// The real filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsBackend;

impl StoreBackend for FsBackend {
    fn create_dir_all(&mut self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn write_file(&mut self, path: &Path, contents: &str) -> io::Result<()> {
        fs::write(path, contents)
    }

    fn read_file(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }

    fn modified_millis(&self, path: &Path) -> io::Result<u64> {
        Ok(system_time_millis(fs::metadata(path)?.modified()?))
    }

    fn remove_dir_all(&mut self, path: &Path) -> io::Result<()> {
        fs::remove_dir_all(path)
    }
}

#[derive(Debug, Clone)]
struct MemoryFile {
    contents: String,
    modified: u64,
}

/// In-process backend for tests. Every write advances a logical clock so
/// timestamps are strictly increasing.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    dirs: BTreeSet<PathBuf>,
    files: BTreeMap<PathBuf, MemoryFile>,
    clock: u64,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_dir(&self, path: &Path) -> bool {
        self.dirs.contains(path)
    }

    /// Number of files and directories strictly below `path`.
    pub fn entries_under(&self, path: &Path) -> usize {
        let below = |p: &&PathBuf| p.starts_with(path) && p.as_path() != path;
        self.dirs.iter().filter(below).count() + self.files.keys().filter(below).count()
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("{} does not exist", path.display()),
    )
}

impl StoreBackend for MemoryBackend {
    fn create_dir_all(&mut self, path: &Path) -> io::Result<()> {
        if self.files.contains_key(path) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} is a file", path.display()),
            ));
        }
        for ancestor in path.ancestors() {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            self.dirs.insert(ancestor.to_path_buf());
        }
        Ok(())
    }

    fn write_file(&mut self, path: &Path, contents: &str) -> io::Result<()> {
        let parent = path.parent().ok_or_else(|| not_found(path))?;
        if !self.dirs.contains(parent) {
            return Err(not_found(parent));
        }
        self.clock += 1;
        self.files.insert(
            path.to_path_buf(),
            MemoryFile {
                contents: contents.to_string(),
                modified: self.clock,
            },
        );
        Ok(())
    }

    fn read_file(&self, path: &Path) -> io::Result<String> {
        self.files
            .get(path)
            .map(|f| f.contents.clone())
            .ok_or_else(|| not_found(path))
    }

    fn modified_millis(&self, path: &Path) -> io::Result<u64> {
        self.files
            .get(path)
            .map(|f| f.modified)
            .ok_or_else(|| not_found(path))
    }

    fn remove_dir_all(&mut self, path: &Path) -> io::Result<()> {
        if !self.dirs.contains(path) {
            return Err(not_found(path));
        }
        self.dirs.retain(|d| !d.starts_with(path));
        self.files.retain(|f, _| !f.starts_with(path));
        Ok(())
    }
}
