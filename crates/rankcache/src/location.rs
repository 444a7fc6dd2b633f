//! Default cache directory resolution

use crate::{Error, Result};
use dirs::{cache_dir, home_dir};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable that pins the cache directory
pub const CACHE_DIR_ENV: &str = "RANKCACHE_DIR";

/// Directory name under the platform cache root
const APP_DIR: &str = "rankcache";

/// Backup-exclusion marker, see <https://bford.info/cachedir/>
const CACHEDIR_TAG: &str = "CACHEDIR.TAG";
const CACHEDIR_TAG_CONTENTS: &str = "Signature: 8a477f597d28d172789f06886806bc55\n\
# This file is a cache directory tag created by rankcache.\n\
# For information about cache directory tags, see https://bford.info/cachedir/\n";

/// Inputs for determining the cache directory
#[derive(Debug, Clone)]
struct LocationInputs {
    override_dir: Option<PathBuf>,
    xdg_cache_home: Option<PathBuf>,
    os_cache_dir: Option<PathBuf>,
    home_dir: Option<PathBuf>,
    temp_dir: PathBuf,
    namespace: String,
}

fn resolve_from_inputs(inputs: LocationInputs) -> Result<PathBuf> {
    // Resolution order (first writable wins):
    // 1) RANKCACHE_DIR (explicit override, used as-is)
    // 2) XDG_CACHE_HOME/rankcache/<namespace>
    // 3) OS cache dir/rankcache/<namespace>
    // 4) ~/.cache/rankcache/<namespace>
    // 5) TMPDIR/rankcache/<namespace>
    let mut candidates: Vec<(PathBuf, bool)> = Vec::new();

    if let Some(dir) = inputs.override_dir.filter(|p| !p.as_os_str().is_empty()) {
        candidates.push((dir, false));
    }
    let tagged = |root: PathBuf| (root.join(APP_DIR).join(&inputs.namespace), true);
    if let Some(xdg) = inputs.xdg_cache_home {
        candidates.push(tagged(xdg));
    }
    if let Some(os_cache) = inputs.os_cache_dir {
        candidates.push(tagged(os_cache));
    }
    if let Some(home) = inputs.home_dir {
        candidates.push(tagged(home.join(".cache")));
    }
    candidates.push(tagged(inputs.temp_dir));

    for (path, tag_parent) in candidates {
        if path.starts_with("/homeless-shelter") {
            continue;
        }
        if !is_writable_dir(&path) {
            continue;
        }
        if tag_parent && let Some(parent) = path.parent() {
            write_cachedir_tag(parent);
        }
        return Ok(path);
    }
    Err(Error::configuration(
        "Failed to determine a writable cache directory",
    ))
}

fn is_writable_dir(path: &Path) -> bool {
    // Some CI environments provide read-only cache directories under $HOME
    if path.exists() {
        let probe = path.join(".write_probe");
        return match fs::OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&probe)
        {
            Ok(_) => {
                let _ = fs::remove_file(&probe);
                true
            }
            Err(_) => false,
        };
    }
    fs::create_dir_all(path).is_ok()
}

fn write_cachedir_tag(dir: &Path) {
    let tag = dir.join(CACHEDIR_TAG);
    if tag.exists() {
        return;
    }
    if let Err(e) = fs::write(&tag, CACHEDIR_TAG_CONTENTS) {
        tracing::warn!(path = %tag.display(), "Could not write cache directory tag: {e}");
    }
}

/// Name of the running executable, used to keep processes apart
fn process_namespace() -> String {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "default".to_string())
}

/// Resolve (and create) the default cache directory for this process
///
/// The directory is private to the running executable and sits below a
/// `rankcache` folder carrying a `CACHEDIR.TAG`, so backup tools skip it
/// while the cache directory itself only ever holds blobs and the index.
pub fn default_cache_dir() -> Result<PathBuf> {
    let inputs = LocationInputs {
        override_dir: std::env::var(CACHE_DIR_ENV)
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from),
        xdg_cache_home: std::env::var("XDG_CACHE_HOME")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from),
        os_cache_dir: cache_dir(),
        home_dir: home_dir(),
        temp_dir: std::env::temp_dir(),
        namespace: process_namespace(),
    };
    resolve_from_inputs(inputs)
}
