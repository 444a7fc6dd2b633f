//! Options for opening a [`crate::PriorityCache`]

use crate::location::{self, CACHE_DIR_ENV};
use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Environment variable holding the default size bound in bytes
pub const MAX_SIZE_ENV: &str = "RANKCACHE_MAX_SIZE";
/// Environment variable toggling the commit at open
pub const PERSIST_ON_OPEN_ENV: &str = "RANKCACHE_PERSIST_ON_OPEN";
/// Environment variable toggling orphan pruning at open
pub const PRUNE_ORPHANS_ENV: &str = "RANKCACHE_PRUNE_ORPHANS";

/// Default size bound used when no index has been committed yet (512 MiB)
pub const DEFAULT_MAX_TOTAL_SIZE: u64 = 512 * 1024 * 1024;

/// How a cache is opened
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Cache directory; resolved with [`location::default_cache_dir`] when `None`
    pub directory: Option<PathBuf>,
    /// Size bound for a cache without a committed index
    ///
    /// Ignored once an index exists: the committed bound wins.
    pub default_max_total_size: u64,
    /// Commit the index as soon as the cache opens, so the index file
    /// exists before the first mutation
    pub persist_on_open: bool,
    /// Delete files in the directory that the index does not reference
    pub prune_orphans_on_open: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            directory: None,
            default_max_total_size: DEFAULT_MAX_TOTAL_SIZE,
            persist_on_open: true,
            prune_orphans_on_open: false,
        }
    }
}

impl CacheConfig {
    /// Configuration for a specific directory with default options
    pub fn new(directory: impl Into<PathBuf>, default_max_total_size: u64) -> Self {
        Self {
            directory: Some(directory.into()),
            default_max_total_size,
            ..Self::default()
        }
    }

    /// Sets the cache directory.
    #[must_use]
    pub fn with_directory<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.directory = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the default size bound in bytes.
    #[must_use]
    pub fn with_default_max_total_size(mut self, bytes: u64) -> Self {
        self.default_max_total_size = bytes;
        self
    }

    /// Sets whether the index is committed at open.
    #[must_use]
    pub fn with_persist_on_open(mut self, enabled: bool) -> Self {
        self.persist_on_open = enabled;
        self
    }

    /// Sets whether unreferenced files are deleted at open.
    #[must_use]
    pub fn with_prune_orphans_on_open(mut self, enabled: bool) -> Self {
        self.prune_orphans_on_open = enabled;
        self
    }

    /// Loads configuration from environment variables.
    ///
    /// - `RANKCACHE_DIR`: cache directory
    /// - `RANKCACHE_MAX_SIZE`: default size bound in bytes
    /// - `RANKCACHE_PERSIST_ON_OPEN`: `true`/`false`/`1`/`0`
    /// - `RANKCACHE_PRUNE_ORPHANS`: `true`/`false`/`1`/`0`
    ///
    /// Unset or blank variables keep their defaults.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(dir) = env_value(CACHE_DIR_ENV) {
            config.directory = Some(PathBuf::from(dir));
        }
        if let Some(raw) = env_value(MAX_SIZE_ENV) {
            config.default_max_total_size = raw.parse::<u64>().map_err(|_| {
                Error::configuration(format!("{MAX_SIZE_ENV} must be a byte count, got {raw:?}"))
            })?;
        }
        if let Some(raw) = env_value(PERSIST_ON_OPEN_ENV) {
            config.persist_on_open = parse_flag(PERSIST_ON_OPEN_ENV, &raw)?;
        }
        if let Some(raw) = env_value(PRUNE_ORPHANS_ENV) {
            config.prune_orphans_on_open = parse_flag(PRUNE_ORPHANS_ENV, &raw)?;
        }

        Ok(config)
    }

    /// The configured directory, or the resolved default
    pub fn resolve_directory(&self) -> Result<PathBuf> {
        match &self.directory {
            Some(dir) => Ok(dir.clone()),
            None => location::default_cache_dir(),
        }
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.trim().is_empty())
}

fn parse_flag(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::configuration(format!(
            "{name} must be true or false, got {raw:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_VARS: [&str; 4] = [
        CACHE_DIR_ENV,
        MAX_SIZE_ENV,
        PERSIST_ON_OPEN_ENV,
        PRUNE_ORPHANS_ENV,
    ];

    #[test]
    fn default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.directory, None);
        assert_eq!(config.default_max_total_size, 512 * 1024 * 1024);
        assert!(config.persist_on_open);
        assert!(!config.prune_orphans_on_open);
    }

    #[test]
    fn builder_methods() {
        let config = CacheConfig::default()
            .with_directory("/custom/path")
            .with_default_max_total_size(1024)
            .with_persist_on_open(false)
            .with_prune_orphans_on_open(true);

        assert_eq!(config.directory, Some(PathBuf::from("/custom/path")));
        assert_eq!(config.default_max_total_size, 1024);
        assert!(!config.persist_on_open);
        assert!(config.prune_orphans_on_open);
    }

    #[test]
    fn from_env_reads_all_variables() {
        temp_env::with_vars(
            [
                (CACHE_DIR_ENV, Some("/tmp/rankcache-env")),
                (MAX_SIZE_ENV, Some("2048")),
                (PERSIST_ON_OPEN_ENV, Some("false")),
                (PRUNE_ORPHANS_ENV, Some("1")),
            ],
            || {
                let config = CacheConfig::from_env().unwrap();
                assert_eq!(config.directory, Some(PathBuf::from("/tmp/rankcache-env")));
                assert_eq!(config.default_max_total_size, 2048);
                assert!(!config.persist_on_open);
                assert!(config.prune_orphans_on_open);
            },
        );
    }

    #[test]
    fn from_env_defaults_when_unset() {
        temp_env::with_vars_unset(ALL_VARS, || {
            let config = CacheConfig::from_env().unwrap();
            assert_eq!(config, CacheConfig::default());
        });
    }

    #[test]
    fn from_env_rejects_bad_size() {
        temp_env::with_vars(
            [
                (CACHE_DIR_ENV, None),
                (MAX_SIZE_ENV, Some("lots")),
                (PERSIST_ON_OPEN_ENV, None),
                (PRUNE_ORPHANS_ENV, None),
            ],
            || {
                let err = CacheConfig::from_env().unwrap_err();
                assert!(matches!(err, Error::Configuration { .. }));
            },
        );
    }

    #[test]
    fn from_env_rejects_bad_flag() {
        temp_env::with_vars(
            [
                (CACHE_DIR_ENV, None),
                (MAX_SIZE_ENV, None),
                (PERSIST_ON_OPEN_ENV, Some("sometimes")),
                (PRUNE_ORPHANS_ENV, None),
            ],
            || {
                assert!(CacheConfig::from_env().is_err());
            },
        );
    }

    #[test]
    fn explicit_directory_is_resolved_as_is() {
        let config = CacheConfig::new("/var/cache/app", 10);
        assert_eq!(
            config.resolve_directory().unwrap(),
            PathBuf::from("/var/cache/app")
        );
    }
}
