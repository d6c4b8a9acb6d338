//! Storage backend seam
//!
//! `FileOperations` never calls `std::fs` directly; it goes through a
//! `FileStore` so virtual namespaces can provide their own backend.

use std::io;
use std::path::{Path, PathBuf};

pub trait FileStore: Send + Sync {
    /// Whether anything (including a dangling link) exists at `path`.
    fn exists(&self, path: &Path) -> bool;

    /// Whether `path` is a real directory. Links to directories are not.
    fn is_dir(&self, path: &Path) -> bool;

    /// Direct children of a directory.
    fn list(&self, path: &Path) -> io::Result<Vec<PathBuf>>;

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    fn remove_file(&self, path: &Path) -> io::Result<()>;

    /// Remove an empty directory.
    fn remove_dir(&self, path: &Path) -> io::Result<()>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NativeStore;

impl FileStore for NativeStore {
    fn exists(&self, path: &Path) -> bool {
        std::fs::symlink_metadata(path).is_ok()
    }

    fn is_dir(&self, path: &Path) -> bool {
        std::fs::symlink_metadata(path)
            .map(|m| m.file_type().is_dir())
            .unwrap_or(false)
    }

    fn list(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        std::fs::read_dir(path)?
            .map(|entry| entry.map(|e| e.path()))
            .collect()
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        std::fs::rename(from, to)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }

    fn remove_dir(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_dir(path)
    }
}
