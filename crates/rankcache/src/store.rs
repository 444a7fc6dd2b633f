//! Raw blob storage primitives
//!
//! The cache never touches the filesystem directly for blob bytes; it goes
//! through a [`BlobStore`] so tests and embedders can substitute their own.

use crate::persist::TEMP_PREFIX;
use crate::{Error, Result};
use std::collections::BTreeSet;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;

/// File-level operations the cache consumes
pub trait BlobStore: Send + Sync {
    /// Write `bytes` so that readers see either the old file or the full new one
    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<()>;

    /// Read a whole file
    fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Delete a file
    ///
    /// Deleting a missing file is an error whose [`Error::is_not_found`] is true.
    fn delete(&self, path: &Path) -> Result<()>;

    /// Atomically move a file over `to`, replacing it
    fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    /// Names of the regular files directly inside `dir`
    fn list(&self, dir: &Path) -> Result<BTreeSet<String>>;

    /// Whether anything exists at `path`
    fn exists(&self, path: &Path) -> bool;

    /// Whether `path` is a directory
    fn is_dir(&self, path: &Path) -> bool;

    /// Create `dir` and its parents
    fn create_dir_all(&self, dir: &Path) -> Result<()>;
}

/// [`BlobStore`] backed by the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FsBlobStore;

impl BlobStore for FsBlobStore {
    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let dir = path
            .parent()
            .ok_or_else(|| Error::configuration(format!("{} has no parent", path.display())))?;

        // Temp file in the destination directory keeps the rename on one filesystem
        let mut tmp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(dir)
            .map_err(|e| Error::io(e, dir, "create_temp"))?;
        tmp.write_all(bytes)
            .map_err(|e| Error::io(e, tmp.path(), "write"))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| Error::io(e, tmp.path(), "sync_all"))?;
        tmp.persist(path)
            .map_err(|e| Error::io(e.error, path, "rename"))?;
        Ok(())
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        fs::read(path).map_err(|e| Error::io(e, path, "read"))
    }

    fn delete(&self, path: &Path) -> Result<()> {
        fs::remove_file(path).map_err(|e| Error::io(e, path, "remove_file"))
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        fs::rename(from, to).map_err(|e| Error::io(e, to, "rename"))
    }

    fn list(&self, dir: &Path) -> Result<BTreeSet<String>> {
        let mut names = BTreeSet::new();
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(names),
            Err(e) => return Err(Error::io(e, dir, "read_dir")),
        };
        for entry in entries {
            let entry = entry.map_err(|e| Error::io(e, dir, "read_dir"))?;
            let file_type = entry
                .file_type()
                .map_err(|e| Error::io(e, entry.path(), "file_type"))?;
            if file_type.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.insert(name.to_string());
            }
        }
        Ok(names)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn create_dir_all(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir).map_err(|e| Error::io(e, dir, "create_dir_all"))
    }
}
