//! Stable on-disk identities for cache keys

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use url::Url;

/// Longest file extension accepted from a key's suffix
const MAX_EXTENSION_LEN: usize = 8;

/// Hex-encoded SHA-256 of an identifying key
///
/// Used verbatim as the blob's file name, so it never contains path
/// separators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Wrap an already computed fingerprint (e.g. read back from the index)
    #[must_use]
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    /// The fingerprint as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this looks like something [`fingerprint`] produced
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.0.len() == 64 && self.0.bytes().all(|b| b.is_ascii_hexdigit())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Compute the fingerprint of an identifying key
#[must_use]
pub fn fingerprint(key: &str) -> Fingerprint {
    let digest = Sha256::digest(key.as_bytes());
    Fingerprint(hex::encode(digest))
}

/// Derive a file extension from the key's own suffix
///
/// URLs contribute the extension of their last path segment; anything else
/// is treated as a `/`-separated path with query and fragment stripped.
/// Returns an empty string when no usable extension exists.
#[must_use]
pub fn extension_hint(key: &str) -> String {
    let last_segment = match Url::parse(key) {
        Ok(url) if !url.cannot_be_a_base() => url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .map(str::to_string),
        _ => {
            let path = key.split(['?', '#']).next().unwrap_or_default();
            path.rsplit('/').next().map(str::to_string)
        }
    };

    let Some(segment) = last_segment else {
        return String::new();
    };
    let Some((stem, ext)) = segment.rsplit_once('.') else {
        return String::new();
    };
    if stem.is_empty() || ext.is_empty() || !is_valid_extension(ext) {
        return String::new();
    }
    ext.to_ascii_lowercase()
}

/// Whether `ext` can follow a fingerprint in a blob file name
///
/// Empty means no extension. Anything else must be 1 to 8 ASCII
/// alphanumerics, so the file name never leaves the cache directory.
#[must_use]
pub fn is_valid_extension(ext: &str) -> bool {
    ext.len() <= MAX_EXTENSION_LEN && ext.bytes().all(|b| b.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_deterministic_hex() {
        let a = fingerprint("https://example.com/a.png");
        let b = fingerprint("https://example.com/a.png");
        assert_eq!(a, b);
        assert!(a.is_well_formed());
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn fingerprint_differs_per_key() {
        assert_ne!(fingerprint("a"), fingerprint("b"));
    }

    #[test]
    fn fingerprint_matches_known_digest() {
        assert_eq!(
            fingerprint("").as_str(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn extension_from_url_path() {
        assert_eq!(extension_hint("https://example.com/img/photo.JPG"), "jpg");
        assert_eq!(
            extension_hint("https://example.com/video.mp4?token=abc#t=10"),
            "mp4"
        );
    }

    #[test]
    fn extension_ignores_host_and_directories() {
        assert_eq!(extension_hint("https://example.com"), "");
        assert_eq!(extension_hint("https://example.com/dir.d/"), "");
        assert_eq!(extension_hint("https://example.com/archive"), "");
    }

    #[test]
    fn extension_from_plain_path() {
        assert_eq!(extension_hint("assets/fonts/mono.woff2"), "woff2");
        assert_eq!(extension_hint("notes.txt?v=2"), "txt");
        assert_eq!(extension_hint("plain-key"), "");
    }

    #[test]
    fn extension_rejects_odd_suffixes() {
        assert_eq!(extension_hint(".hidden"), "");
        assert_eq!(extension_hint("file.with space"), "");
        assert_eq!(extension_hint("file.averyverylongext"), "");
        assert_eq!(extension_hint("trailing."), "");
    }

    #[test]
    fn valid_extensions() {
        assert!(is_valid_extension(""));
        assert!(is_valid_extension("woff2"));
        assert!(!is_valid_extension("../x"));
        assert!(!is_valid_extension("a/b"));
        assert!(!is_valid_extension("toolongext"));
    }

    #[test]
    fn well_formed_rejects_path_like_keys() {
        assert!(!Fingerprint::from_hex("../victim").is_well_formed());
        assert!(!Fingerprint::from_hex("ab").is_well_formed());
    }

    #[test]
    fn fingerprint_serializes_as_plain_string() {
        let fp = Fingerprint::from_hex("abc");
        assert_eq!(serde_json::to_string(&fp).unwrap(), "\"abc\"");
    }
}
