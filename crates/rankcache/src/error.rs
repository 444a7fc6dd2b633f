//! Error types for the rankcache crate

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use miette::Diagnostic;
use std::path::Path;
use thiserror::Error;

/// Error type for cache operations
///
/// Running out of room is not an error: `save` and `can_save` report it as
/// `false`. Everything here is a hard failure the caller has to see.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// I/O error while touching a blob, the index file or the cache directory
    #[error("I/O {operation} failed: {}", path.display())]
    #[diagnostic(
        code(rankcache::io),
        help("Check file permissions and free space in the cache directory")
    )]
    Io {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// Path that caused the error
        path: Box<Path>,
        /// Operation that failed (e.g., "read", "write", "rename")
        operation: String,
    },

    /// The persisted index exists but cannot be trusted
    #[error("Corrupt cache index at {}: {message}", path.display())]
    #[diagnostic(
        code(rankcache::corrupt_index),
        help("The cache refuses to open a damaged index. Remove the cache directory to start over")
    )]
    CorruptIndex {
        /// Location of the index file
        path: Box<Path>,
        /// What was wrong with it
        message: String,
    },

    /// Configuration or validation error
    #[error("Cache configuration error: {message}")]
    #[diagnostic(code(rankcache::config))]
    Configuration {
        /// Error message describing the configuration issue
        message: String,
    },

    /// Serialization error
    #[error("Serialization error: {message}")]
    #[diagnostic(code(rankcache::serialization))]
    Serialization {
        /// Error message describing the serialization issue
        message: String,
    },
}

impl Error {
    /// Create a configuration error
    #[must_use]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration {
            message: msg.into(),
        }
    }

    /// Create an I/O error with path context
    #[must_use]
    pub fn io(
        source: std::io::Error,
        path: impl AsRef<Path>,
        operation: impl Into<String>,
    ) -> Self {
        Self::Io {
            source,
            path: path.as_ref().into(),
            operation: operation.into(),
        }
    }

    /// Create a corrupt index error
    #[must_use]
    pub fn corrupt_index(path: impl AsRef<Path>, msg: impl Into<String>) -> Self {
        Self::CorruptIndex {
            path: path.as_ref().into(),
            message: msg.into(),
        }
    }

    /// Create a serialization error
    #[must_use]
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
        }
    }

    /// Whether this is an I/O error whose source is `NotFound`
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

/// Result type for cache operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_display_includes_path_and_operation() {
        let err = Error::io(
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            "/cache/abc",
            "write",
        );
        let msg = err.to_string();
        assert!(msg.contains("write"));
        assert!(msg.contains("/cache/abc"));
    }

    #[test]
    fn not_found_detection() {
        let missing = Error::io(
            std::io::Error::from(std::io::ErrorKind::NotFound),
            "/x",
            "delete",
        );
        assert!(missing.is_not_found());
        assert!(!Error::configuration("bad").is_not_found());
    }

    #[test]
    fn corrupt_index_mentions_location() {
        let err = Error::corrupt_index("/cache/index.json", "expected value at line 1");
        assert!(err.to_string().contains("/cache/index.json"));
        assert!(err.to_string().contains("expected value"));
    }
}
