//! Priority-ordered index of cached items
//!
//! The index is a vector kept sorted by non-increasing priority. Within a
//! priority band the most recently inserted (or re-prioritized) item sits
//! first, so popping from the tail evicts the lowest priority and, among
//! equals, the oldest item.
//!
//! Nothing in this module touches the disk. The facade in [`crate::cache`]
//! pairs every structural change here with the matching blob operations.

use crate::fingerprint::{Fingerprint, is_valid_extension};
use serde::{Deserialize, Serialize};

/// A cached item's bookkeeping record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// On-disk identity of the item
    pub key: Fingerprint,
    /// Caller-assigned rank; higher survives longer
    pub priority: u64,
    /// Exact byte length of the backing blob
    pub size: u64,
    /// File extension of the blob, empty for none
    #[serde(rename = "pathExtension", default)]
    pub extension: String,
}

impl Item {
    /// Create an item record
    #[must_use]
    pub fn new(key: Fingerprint, priority: u64, size: u64, extension: impl Into<String>) -> Self {
        Self {
            key,
            priority,
            size,
            extension: extension.into(),
        }
    }

    /// Name of the backing blob inside the cache directory
    #[must_use]
    pub fn file_name(&self) -> String {
        blob_file_name(&self.key, &self.extension)
    }
}

/// `<fingerprint>` or `<fingerprint>.<extension>`
#[must_use]
pub fn blob_file_name(key: &Fingerprint, extension: &str) -> String {
    if extension.is_empty() {
        key.to_string()
    } else {
        format!("{key}.{extension}")
    }
}

/// Ordered record of every cached item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    max_total_size: u64,
    items: Vec<Item>,
    total_size: u64,
}

impl Index {
    /// Create an empty index
    #[must_use]
    pub fn new(max_total_size: u64) -> Self {
        Self {
            max_total_size,
            items: Vec::new(),
            total_size: 0,
        }
    }

    /// Rebuild an index from persisted parts, rejecting anything that breaks
    /// the ordering or size invariants, or whose blob name would not sit
    /// directly inside the cache directory
    pub fn from_parts(max_total_size: u64, items: Vec<Item>) -> Result<Self, String> {
        let mut total: u64 = 0;
        let mut seen = std::collections::HashSet::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            if !item.key.is_well_formed() {
                return Err(format!("malformed key {:?} at position {i}", item.key.as_str()));
            }
            if !is_valid_extension(&item.extension) {
                return Err(format!(
                    "malformed extension {:?} at position {i}",
                    item.extension
                ));
            }
            if !seen.insert(&item.key) {
                return Err(format!("duplicate key {}", item.key));
            }
            if i > 0 && items[i - 1].priority < item.priority {
                return Err(format!(
                    "items out of priority order at position {i} ({} before {})",
                    items[i - 1].priority,
                    item.priority
                ));
            }
            total = total
                .checked_add(item.size)
                .ok_or_else(|| "total size overflows u64".to_string())?;
        }
        if total > max_total_size {
            return Err(format!(
                "total size {total} exceeds maximum {max_total_size}"
            ));
        }
        Ok(Self {
            max_total_size,
            items,
            total_size: total,
        })
    }

    /// Configured size bound in bytes
    #[must_use]
    pub fn max_total_size(&self) -> u64 {
        self.max_total_size
    }

    /// Sum of all item sizes
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Number of items
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the index holds no items
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items in eviction order, head first
    #[must_use]
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Look up an item by key
    #[must_use]
    pub fn get(&self, key: &Fingerprint) -> Option<&Item> {
        self.items.iter().find(|item| &item.key == key)
    }

    /// Whether an item with this key is present
    #[must_use]
    pub fn contains(&self, key: &Fingerprint) -> bool {
        self.position(key).is_some()
    }

    fn position(&self, key: &Fingerprint) -> Option<usize> {
        self.items.iter().position(|item| &item.key == key)
    }

    /// Slot for a new item of `priority`: ahead of every item whose
    /// priority is `<= priority`
    fn insertion_point(&self, priority: u64) -> usize {
        self.items.partition_point(|item| item.priority > priority)
    }

    /// Predict whether an item of `size` at `priority` can be stored
    ///
    /// Items with priority `>= priority` are counted as competing for space;
    /// an existing item with the same key is ignored because a save would
    /// replace it. Pure: nothing is modified.
    #[must_use]
    pub fn admits(&self, priority: u64, size: u64, key: &Fingerprint) -> bool {
        if size > self.max_total_size {
            return false;
        }

        let mut running: u64 = 0;
        for item in &self.items {
            if item.priority < priority {
                break;
            }
            if &item.key == key {
                continue;
            }
            running = running.saturating_add(item.size);
            if running.saturating_add(size) > self.max_total_size {
                return false;
            }
        }

        running.saturating_add(size) <= self.max_total_size
    }

    /// Insert `item`, replacing any item with the same key
    ///
    /// The old item is removed first so the new one is positioned from
    /// scratch. Returns the replaced item. Does not evict.
    pub fn insert(&mut self, item: Item) -> Option<Item> {
        let replaced = self.remove(&item.key);
        let at = self.insertion_point(item.priority);
        self.total_size = self.total_size.saturating_add(item.size);
        self.items.insert(at, item);
        replaced
    }

    /// Remove the item with this key
    pub fn remove(&mut self, key: &Fingerprint) -> Option<Item> {
        let pos = self.position(key)?;
        let item = self.items.remove(pos);
        self.total_size = self.total_size.saturating_sub(item.size);
        Some(item)
    }

    /// Move an item to the slot for `priority`
    ///
    /// Returns `false` if the key is absent or already has that priority.
    pub fn reprioritize(&mut self, key: &Fingerprint, priority: u64) -> bool {
        let Some(pos) = self.position(key) else {
            return false;
        };
        if self.items[pos].priority == priority {
            return false;
        }

        let mut item = self.items.remove(pos);
        item.priority = priority;
        let at = self.insertion_point(priority);
        self.items.insert(at, item);
        true
    }

    /// Change the size bound. Does not evict.
    pub fn set_max_total_size(&mut self, max_total_size: u64) {
        self.max_total_size = max_total_size;
    }

    /// Pop tail items until the total fits the bound
    ///
    /// Returns the evicted items, lowest priority first.
    pub fn evict_overflow(&mut self) -> Vec<Item> {
        let mut evicted = Vec::new();
        while self.total_size > self.max_total_size {
            let Some(item) = self.items.pop() else {
                break;
            };
            self.total_size = self.total_size.saturating_sub(item.size);
            evicted.push(item);
        }
        evicted
    }

    /// Drop every item, keeping the size bound
    pub fn clear(&mut self) -> Vec<Item> {
        self.total_size = 0;
        std::mem::take(&mut self.items)
    }
}
