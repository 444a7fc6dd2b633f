//! Index persistence with write-temp-then-rename commits

use crate::index::{Index, Item};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// File name of the persisted index inside the cache directory
pub const INDEX_FILE_NAME: &str = "index.json";

/// Prefix of temporary files that are renamed into place once complete
pub(crate) const TEMP_PREFIX: &str = ".rankcache-tmp";

/// On-disk shape of the index
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexDocument {
    max_total_size: u64,
    #[serde(default)]
    items: Vec<Item>,
}

/// Location of the index file for a cache directory
#[must_use]
pub fn index_path(directory: &Path) -> PathBuf {
    directory.join(INDEX_FILE_NAME)
}

/// Load the committed index, or start empty with `default_max`
///
/// A file that exists but cannot be parsed, or whose contents break the
/// index invariants, is an [`Error::CorruptIndex`].
pub fn load(directory: &Path, default_max: u64) -> Result<Index> {
    let path = index_path(directory);
    let bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "No index file; starting empty");
            return Ok(Index::new(default_max));
        }
        Err(e) => return Err(Error::io(e, &path, "read")),
    };

    let document: IndexDocument =
        serde_json::from_slice(&bytes).map_err(|e| Error::corrupt_index(&path, e.to_string()))?;
    let index = Index::from_parts(document.max_total_size, document.items)
        .map_err(|msg| Error::corrupt_index(&path, msg))?;

    tracing::debug!(
        path = %path.display(),
        items = index.len(),
        total_size = index.total_size(),
        max_total_size = index.max_total_size(),
        "Loaded cache index"
    );
    Ok(index)
}

/// Atomically replace the committed index with `index`
///
/// The document is written and synced to a fresh temporary file in the same
/// directory, then renamed over the index file. Readers and later loads see
/// either the previous commit or this one.
pub fn commit(index: &Index, directory: &Path) -> Result<()> {
    let document = IndexDocument {
        max_total_size: index.max_total_size(),
        items: index.items().to_vec(),
    };
    let json = serde_json::to_vec_pretty(&document)
        .map_err(|e| Error::serialization(format!("Failed to serialize cache index: {e}")))?;

    let mut tmp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .tempfile_in(directory)
        .map_err(|e| Error::io(e, directory, "create_temp"))?;
    write_synced(&mut tmp, &json)?;

    let path = index_path(directory);
    tmp.persist(&path)
        .map_err(|e| Error::io(e.error, &path, "rename"))?;

    tracing::trace!(path = %path.display(), items = index.len(), "Committed cache index");
    Ok(())
}

fn write_synced(tmp: &mut NamedTempFile, bytes: &[u8]) -> Result<()> {
    tmp.write_all(bytes)
        .map_err(|e| Error::io(e, tmp.path(), "write_all"))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| Error::io(e, tmp.path(), "sync_all"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::fingerprint;
    use tempfile::TempDir;

    fn sample_index() -> Index {
        let mut index = Index::new(1_000);
        index.insert(Item::new(fingerprint("a"), 3, 100, "png"));
        index.insert(Item::new(fingerprint("b"), 3, 50, ""));
        index.insert(Item::new(fingerprint("c"), 9, 10, "js"));
        index
    }

    #[test]
    fn load_missing_file_starts_empty() {
        let temp = TempDir::new().unwrap();
        let index = load(temp.path(), 4096).unwrap();
        assert!(index.is_empty());
        assert_eq!(index.max_total_size(), 4096);
    }

    #[test]
    fn commit_then_load_round_trips() {
        let temp = TempDir::new().unwrap();
        let index = sample_index();
        commit(&index, temp.path()).unwrap();

        let loaded = load(temp.path(), 1).unwrap();
        assert_eq!(loaded, index);
    }

    #[test]
    fn commit_overwrites_previous_commit() {
        let temp = TempDir::new().unwrap();
        let mut index = sample_index();
        commit(&index, temp.path()).unwrap();

        index.remove(&fingerprint("a"));
        index.set_max_total_size(500);
        commit(&index, temp.path()).unwrap();

        let loaded = load(temp.path(), 1).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.max_total_size(), 500);
    }

    #[test]
    fn commit_leaves_only_index_file() {
        let temp = TempDir::new().unwrap();
        commit(&sample_index(), temp.path()).unwrap();
        let names: Vec<_> = fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec![INDEX_FILE_NAME.to_string()]);
    }

    #[test]
    fn document_uses_camel_case_fields() {
        let temp = TempDir::new().unwrap();
        commit(&sample_index(), temp.path()).unwrap();
        let raw: serde_json::Value =
            serde_json::from_slice(&fs::read(index_path(temp.path())).unwrap()).unwrap();
        assert_eq!(raw["maxTotalSize"], 1_000);
        assert_eq!(raw["items"][0]["priority"], 9);
        assert_eq!(raw["items"][0]["pathExtension"], "js");
        assert_eq!(raw["items"][1]["key"], fingerprint("b").to_string());
    }

    #[test]
    fn garbage_file_is_corrupt() {
        let temp = TempDir::new().unwrap();
        fs::write(index_path(temp.path()), b"{not json").unwrap();
        let err = load(temp.path(), 10).unwrap_err();
        assert!(matches!(err, Error::CorruptIndex { .. }));
    }

    #[test]
    fn unsorted_document_is_corrupt() {
        let temp = TempDir::new().unwrap();
        let doc = serde_json::json!({
            "maxTotalSize": 100,
            "items": [
                {"key": fingerprint("a").as_str(), "priority": 1, "size": 1, "pathExtension": ""},
                {"key": fingerprint("b").as_str(), "priority": 2, "size": 1, "pathExtension": ""}
            ]
        });
        fs::write(index_path(temp.path()), doc.to_string()).unwrap();
        let err = load(temp.path(), 10).unwrap_err();
        assert!(matches!(err, Error::CorruptIndex { .. }));
    }

    #[test]
    fn key_escaping_directory_is_corrupt() {
        let temp = TempDir::new().unwrap();
        let doc = serde_json::json!({
            "maxTotalSize": 100,
            "items": [{"key": "../victim", "priority": 1, "size": 8, "pathExtension": "txt"}]
        });
        fs::write(index_path(temp.path()), doc.to_string()).unwrap();
        let err = load(temp.path(), 10).unwrap_err();
        assert!(matches!(err, Error::CorruptIndex { .. }));
    }

    #[test]
    fn missing_items_field_means_empty() {
        let temp = TempDir::new().unwrap();
        fs::write(index_path(temp.path()), br#"{"maxTotalSize": 64}"#).unwrap();
        let index = load(temp.path(), 10).unwrap();
        assert!(index.is_empty());
        assert_eq!(index.max_total_size(), 64);
    }
}
