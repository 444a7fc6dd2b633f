//! Size-bounded, priority-ordered disk cache
//!
//! Items are stored as individual blobs in one directory and tracked by an
//! index ordered by priority. When the total size goes over the configured
//! bound, items are evicted from the tail of that order:
//! - lower priority is evicted first
//! - among equal priorities, the oldest insertion is evicted first
//! - nothing ever expires on a timer
//!
//! # Overview
//!
//! ```no_run
//! use rankcache::PriorityCache;
//!
//! # fn main() -> rankcache::Result<()> {
//! let cache = PriorityCache::open_in("/tmp/my-cache", 64 * 1024 * 1024)?;
//! if cache.can_save(10, 1024, "https://example.com/logo.png") {
//!     let bytes = vec![0u8; 1024];
//!     cache.save(10, &bytes, "https://example.com/logo.png")?;
//! }
//! assert!(cache.contains("https://example.com/logo.png"));
//! # Ok(())
//! # }
//! ```
//!
//! The index is committed to `index.json` after every change by writing a
//! temporary file and renaming it into place, so a crash leaves either the
//! previous or the new index on disk.

// TODO(rankcache-docs): Add # Errors documentation to all fallible public functions
#![expect(
    clippy::missing_errors_doc,
    reason = "Error documentation to be added incrementally"
)]

pub mod cache;
pub mod capacity;
pub mod config;
mod error;
pub mod fingerprint;
pub mod index;
pub mod location;
pub mod persist;
pub mod store;

// Re-export error types at crate root
pub use error::{Error, Result};

// Re-export main types
pub use cache::{CacheStats, PriorityCache};
pub use capacity::{CapacityProbe, DiskCapacity, FixedCapacity};
pub use config::CacheConfig;
pub use fingerprint::{Fingerprint, extension_hint, fingerprint};
pub use index::{Index, Item};
pub use store::{BlobStore, FsBlobStore};
