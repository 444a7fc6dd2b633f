//! The cache facade
//!
//! [`PriorityCache`] is the single owner of the index. Every mutation runs
//! under the exclusive side of one `RwLock`, so the admission check and the
//! change it admits are atomic with respect to other callers. Queries only
//! take the shared side and see a consistent snapshot.
//!
//! A mutation is prepared on a staged copy of the index, committed to disk,
//! and only then made live. Blobs that the new index no longer references are
//! deleted after the commit, so a failed commit never leaves the live index
//! pointing at missing files.

use crate::capacity::{self, CapacityProbe, DiskCapacity};
use crate::config::CacheConfig;
use crate::fingerprint::{Fingerprint, extension_hint, fingerprint};
use crate::index::{Index, Item, blob_file_name};
use crate::persist::{self, INDEX_FILE_NAME, TEMP_PREFIX};
use crate::store::{BlobStore, FsBlobStore};
use crate::{Error, Result};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Counters since the cache was opened
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Saves that took effect
    pub saves: u64,
    /// Saves refused by the admission check
    pub rejected_saves: u64,
    /// Items dropped to restore the size bound
    pub evictions: u64,
}

struct CacheState {
    index: Index,
    stats: CacheStats,
}

/// Size-bounded, priority-ordered disk cache
pub struct PriorityCache {
    directory: PathBuf,
    store: Arc<dyn BlobStore>,
    capacity: Arc<dyn CapacityProbe>,
    state: RwLock<CacheState>,
}

impl fmt::Debug for PriorityCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("PriorityCache")
            .field("directory", &self.directory)
            .field("items", &state.index.len())
            .field("total_size", &state.index.total_size())
            .field("max_total_size", &state.index.max_total_size())
            .finish_non_exhaustive()
    }
}

impl PriorityCache {
    /// Open a cache on the local filesystem
    pub fn open(config: &CacheConfig) -> Result<Self> {
        Self::with_backends(config, Arc::new(FsBlobStore), Arc::new(DiskCapacity))
    }

    /// Open a cache in `directory` with default options
    pub fn open_in(directory: impl Into<PathBuf>, default_max_total_size: u64) -> Result<Self> {
        Self::open(&CacheConfig::new(directory, default_max_total_size))
    }

    /// Open a cache with explicit blob storage and free-space probe
    ///
    /// Fails with [`Error::CorruptIndex`] if a committed index exists but
    /// cannot be read back.
    pub fn with_backends(
        config: &CacheConfig,
        store: Arc<dyn BlobStore>,
        capacity: Arc<dyn CapacityProbe>,
    ) -> Result<Self> {
        let directory = config.resolve_directory()?;
        store.create_dir_all(&directory)?;
        if !store.is_dir(&directory) {
            return Err(Error::configuration(format!(
                "cache path {} is not a directory",
                directory.display()
            )));
        }

        let index = persist::load(&directory, config.default_max_total_size)?;

        let cache = Self {
            directory,
            store,
            capacity,
            state: RwLock::new(CacheState {
                index,
                stats: CacheStats::default(),
            }),
        };

        {
            let state = cache.state.read();
            if config.prune_orphans_on_open {
                cache.prune_orphans(&state.index)?;
            }
            if config.persist_on_open {
                persist::commit(&state.index, &cache.directory)?;
            }
            tracing::info!(
                directory = %cache.directory.display(),
                items = state.index.len(),
                total_size = state.index.total_size(),
                max_total_size = state.index.max_total_size(),
                "Opened priority cache"
            );
        }

        Ok(cache)
    }

    /// Directory holding the blobs and the index file
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    // ==========================================================================
    // Admission and mutation
    // ==========================================================================

    /// Whether saving `size` bytes under `key` at `priority` would succeed
    ///
    /// Side-effect free; callers can use it before fetching any bytes.
    #[must_use]
    pub fn can_save(&self, priority: u64, size: u64, key: &str) -> bool {
        let state = self.state.read();
        self.admits(&state.index, priority, size, &fingerprint(key))
    }

    /// Store `bytes` under `key` at `priority`
    ///
    /// Returns `Ok(false)` without touching the disk when the admission check
    /// fails. Otherwise writes the blob, replaces any entry with the same
    /// key, evicts from the tail until the bound holds, and commits. If the
    /// commit fails, the live index and every live blob are left as they were.
    pub fn save(&self, priority: u64, bytes: &[u8], key: &str) -> Result<bool> {
        let fp = fingerprint(key);
        let size = bytes.len() as u64;
        let mut state = self.state.write();

        if !self.admits(&state.index, priority, size, &fp) {
            state.stats.rejected_saves += 1;
            tracing::debug!(key = %fp, priority, size, "Save rejected by admission check");
            return Ok(false);
        }

        let item = Item::new(fp, priority, size, extension_hint(key));
        let file_name = item.file_name();
        let path = self.directory.join(&file_name);

        // A live blob is only overwritten once the index describing the new
        // bytes has been committed
        let overwrites_live = state
            .index
            .get(&item.key)
            .is_some_and(|old| old.file_name() == file_name);
        let write_path = if overwrites_live {
            self.directory.join(format!("{TEMP_PREFIX}{file_name}"))
        } else {
            path.clone()
        };
        self.store.write_atomic(&write_path, bytes)?;

        let mut staged = state.index.clone();
        let replaced = staged.insert(item);
        let evicted = staged.evict_overflow();

        if let Err(e) = persist::commit(&staged, &self.directory) {
            self.discard(&write_path);
            return Err(e);
        }

        if overwrites_live && let Err(e) = self.store.rename(&write_path, &path) {
            self.discard(&write_path);
            if let Err(restore) = persist::commit(&state.index, &self.directory) {
                tracing::warn!(
                    path = %path.display(),
                    "Could not restore the previous cache index: {restore}"
                );
            }
            return Err(e);
        }

        let mut stale = evicted;
        let evictions = stale.len() as u64;
        if let Some(old) = replaced
            && old.file_name() != file_name
        {
            stale.push(old);
        }

        state.index = staged;
        state.stats.saves += 1;
        state.stats.evictions += evictions;
        tracing::debug!(
            file = %file_name,
            priority,
            size,
            evicted = evictions,
            total_size = state.index.total_size(),
            "Saved cache item"
        );

        self.delete_blobs(&stale)?;
        Ok(true)
    }

    /// Move `key` to `new_priority`
    ///
    /// Returns `Ok(false)` if the key is not cached or already has that
    /// priority. Size and extension are preserved.
    pub fn change_priority(&self, new_priority: u64, key: &str) -> Result<bool> {
        let fp = fingerprint(key);
        let mut state = self.state.write();

        match state.index.get(&fp) {
            Some(item) if item.priority != new_priority => {}
            _ => return Ok(false),
        }

        let mut staged = state.index.clone();
        staged.reprioritize(&fp, new_priority);
        let evicted = staged.evict_overflow();
        persist::commit(&staged, &self.directory)?;

        state.index = staged;
        state.stats.evictions += evicted.len() as u64;
        tracing::debug!(key = %fp, new_priority, "Changed cache item priority");

        self.delete_blobs(&evicted)?;
        Ok(true)
    }

    /// Remove `key` and its blob
    ///
    /// Commits only if the key was cached. Returns whether it was.
    pub fn remove(&self, key: &str) -> Result<bool> {
        let fp = fingerprint(key);
        let mut state = self.state.write();

        let mut staged = state.index.clone();
        let Some(item) = staged.remove(&fp) else {
            // A blob left behind by an interrupted save may still be there
            let path = self
                .directory
                .join(blob_file_name(&fp, &extension_hint(key)));
            if self.store.exists(&path) {
                self.discard(&path);
            }
            return Ok(false);
        };

        persist::commit(&staged, &self.directory)?;
        state.index = staged;
        tracing::debug!(key = %fp, "Removed cache item");

        self.delete_blobs(std::slice::from_ref(&item))?;
        Ok(true)
    }

    /// Change the size bound, evicting immediately if the cache is over it
    pub fn set_max_total_size(&self, max_total_size: u64) -> Result<()> {
        let mut state = self.state.write();

        let mut staged = state.index.clone();
        staged.set_max_total_size(max_total_size);
        let evicted = staged.evict_overflow();
        persist::commit(&staged, &self.directory)?;

        state.index = staged;
        state.stats.evictions += evicted.len() as u64;
        tracing::debug!(
            max_total_size,
            evicted = evicted.len(),
            "Updated cache size bound"
        );

        self.delete_blobs(&evicted)
    }

    /// Drop every item and every blob, keeping the size bound
    ///
    /// Afterwards the directory holds only the freshly committed, empty
    /// index. Calling it again is harmless.
    pub fn clear(&self) -> Result<()> {
        let mut state = self.state.write();

        self.store.create_dir_all(&self.directory)?;
        let mut staged = state.index.clone();
        let dropped = staged.clear();
        persist::commit(&staged, &self.directory)?;
        state.index = staged;

        let mut first_error = None;
        for name in self.store.list(&self.directory)? {
            if name == INDEX_FILE_NAME {
                continue;
            }
            let path = self.directory.join(&name);
            match self.store.delete(&path) {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        tracing::info!(
            directory = %self.directory.display(),
            items = dropped.len(),
            "Cleared priority cache"
        );
        first_error.map_or(Ok(()), Err)
    }

    // ==========================================================================
    // Queries
    // ==========================================================================

    /// Whether `key` is cached
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.state.read().index.contains(&fingerprint(key))
    }

    /// Path of the blob for `key`, if cached
    #[must_use]
    pub fn local_path(&self, key: &str) -> Option<PathBuf> {
        let state = self.state.read();
        state
            .index
            .get(&fingerprint(key))
            .map(|item| self.directory.join(item.file_name()))
    }

    /// Bytes stored for `key`, if cached
    ///
    /// A blob that vanished behind the cache's back surfaces as an I/O error.
    pub fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let state = self.state.read();
        let Some(item) = state.index.get(&fingerprint(key)) else {
            return Ok(None);
        };

        let path = self.directory.join(item.file_name());
        let bytes = self.store.read(&path)?;
        if bytes.len() as u64 != item.size {
            tracing::warn!(
                path = %path.display(),
                expected = item.size,
                actual = bytes.len(),
                "Cached blob size does not match the index"
            );
        }
        Ok(Some(bytes))
    }

    /// Current size bound in bytes
    #[must_use]
    pub fn max_total_size(&self) -> u64 {
        self.state.read().index.max_total_size()
    }

    /// Bytes currently accounted to cached items
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.state.read().index.total_size()
    }

    /// Number of cached items
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().index.len()
    }

    /// Whether nothing is cached
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.read().index.is_empty()
    }

    /// Snapshot of the items, head (kept longest) first
    #[must_use]
    pub fn entries(&self) -> Vec<Item> {
        self.state.read().index.items().to_vec()
    }

    /// Counters since open
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.state.read().stats
    }

    // ==========================================================================
    // Internals
    // ==========================================================================

    fn admits(&self, index: &Index, priority: u64, size: u64, key: &Fingerprint) -> bool {
        if size > index.max_total_size() {
            return false;
        }
        let available = self.capacity.available_space(&self.directory);
        if capacity::exceeds_available(available, size) {
            tracing::debug!(size, ?available, "Not enough free disk space");
            return false;
        }
        index.admits(priority, size, key)
    }

    /// Delete blobs of items the live index no longer references
    ///
    /// Already-missing blobs are logged and skipped. Other failures are
    /// reported after every deletion has been attempted.
    fn delete_blobs(&self, items: &[Item]) -> Result<()> {
        let mut first_error = None;
        for item in items {
            let path = self.directory.join(item.file_name());
            match self.store.delete(&path) {
                Ok(()) => {
                    tracing::trace!(path = %path.display(), "Deleted blob");
                }
                Err(e) if e.is_not_found() => {
                    tracing::warn!(path = %path.display(), "Blob already missing");
                }
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Best-effort delete for cleanup paths that already have an error to report
    fn discard(&self, path: &Path) {
        if let Err(e) = self.store.delete(path)
            && !e.is_not_found()
        {
            tracing::warn!(path = %path.display(), "Could not delete blob: {e}");
        }
    }

    /// Delete files that `index` does not account for
    fn prune_orphans(&self, index: &Index) -> Result<usize> {
        let keep: HashSet<String> = index
            .items()
            .iter()
            .map(Item::file_name)
            .chain(std::iter::once(INDEX_FILE_NAME.to_string()))
            .collect();

        let mut pruned = 0;
        for name in self.store.list(&self.directory)? {
            if keep.contains(&name) {
                continue;
            }
            let path = self.directory.join(&name);
            match self.store.delete(&path) {
                Ok(()) => pruned += 1,
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }

        if pruned > 0 {
            tracing::info!(
                directory = %self.directory.display(),
                pruned,
                "Pruned files not referenced by the cache index"
            );
        }
        Ok(pruned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capacity::FixedCapacity;
    use tempfile::TempDir;

    fn open(temp: &TempDir, max: u64) -> PriorityCache {
        PriorityCache::with_backends(
            &CacheConfig::new(temp.path(), max),
            Arc::new(FsBlobStore),
            Arc::new(FixedCapacity(None)),
        )
        .unwrap()
    }

    #[test]
    fn debug_output_mentions_directory() {
        let temp = TempDir::new().unwrap();
        let cache = open(&temp, 10);
        assert!(format!("{cache:?}").contains("PriorityCache"));
    }

    #[test]
    fn stats_count_saves_rejections_and_evictions() {
        let temp = TempDir::new().unwrap();
        let cache = open(&temp, 2);
        assert!(cache.save(1, b"a", "A").unwrap());
        assert!(cache.save(1, b"b", "B").unwrap());
        assert!(cache.save(2, b"c", "C").unwrap());
        assert!(!cache.save(9, b"too big", "D").unwrap());

        assert_eq!(
            cache.stats(),
            CacheStats {
                saves: 3,
                rejected_saves: 1,
                evictions: 1,
            }
        );
    }

    #[test]
    fn free_space_gates_admission() {
        let temp = TempDir::new().unwrap();
        let cache = PriorityCache::with_backends(
            &CacheConfig::new(temp.path(), 1_000),
            Arc::new(FsBlobStore),
            Arc::new(FixedCapacity(Some(4))),
        )
        .unwrap();

        assert!(cache.can_save(1, 4, "small"));
        assert!(!cache.can_save(1, 5, "large"));
        assert!(!cache.save(1, b"12345", "large").unwrap());
        assert!(cache.is_empty());
    }

    #[test]
    fn zero_free_space_means_unknown() {
        let temp = TempDir::new().unwrap();
        let cache = PriorityCache::with_backends(
            &CacheConfig::new(temp.path(), 1_000),
            Arc::new(FsBlobStore),
            Arc::new(FixedCapacity(Some(0))),
        )
        .unwrap();
        assert!(cache.can_save(1, 500, "k"));
    }

    #[test]
    fn prune_counts_removed_files() {
        let temp = TempDir::new().unwrap();
        let cache = open(&temp, 100);
        cache.save(1, b"keep", "keep").unwrap();
        std::fs::write(temp.path().join("stray"), b"x").unwrap();

        let state = cache.state.read();
        assert_eq!(cache.prune_orphans(&state.index).unwrap(), 1);
        assert!(!temp.path().join("stray").exists());
        assert!(temp.path().join(INDEX_FILE_NAME).exists());
    }
}
