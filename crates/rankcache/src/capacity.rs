//! Free-space queries used to gate admission

use std::path::Path;

/// Reports how many bytes can still be written under a path
pub trait CapacityProbe: Send + Sync {
    /// Available bytes, or `None` when the platform cannot tell
    ///
    /// `Some(0)` is treated the same as `None` by the cache.
    fn available_space(&self, path: &Path) -> Option<u64>;
}

/// Queries the filesystem holding the cache directory
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskCapacity;

impl CapacityProbe for DiskCapacity {
    fn available_space(&self, path: &Path) -> Option<u64> {
        match fs4::available_space(path) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::debug!(path = %path.display(), "Free space unknown: {e}");
                None
            }
        }
    }
}

/// Reports a fixed amount of free space regardless of the path
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FixedCapacity(pub Option<u64>);

impl CapacityProbe for FixedCapacity {
    fn available_space(&self, _path: &Path) -> Option<u64> {
        self.0
    }
}

/// Whether the probe's answer rules out writing `size` bytes
pub(crate) fn exceeds_available(available: Option<u64>, size: u64) -> bool {
    match available {
        Some(0) | None => false,
        Some(free) => size > free,
    }
}
