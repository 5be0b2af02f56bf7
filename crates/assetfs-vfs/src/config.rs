//! Mount table configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::vfs::{VfsError, VfsResult};

/// Environment variable holding the routing verbosity (an integer).
pub const VERBOSE_ENV: &str = "ASSETFS_VERBOSE";

/// Default cache directory name, under the platform temp directory.
pub const DEFAULT_CACHE_DIR: &str = "assetfs_cache";

/// Mount table configuration.
///
/// ```toml
/// fallthrough = true
///
/// [remote]
/// max_threads = 4
/// cache_dir = "assetfs_cache"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VfsConfig {
    /// Keep trying later mounts when a matching mount fails to open a path.
    pub fallthrough: bool,
    pub remote: RemoteConfig,
}

/// Settings shared by all URL mounts of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Download worker threads; 0 means one per processor.
    pub max_threads: usize,
    /// Cache directory. Relative paths are taken under the platform temp
    /// directory.
    pub cache_dir: PathBuf,
}

impl Default for VfsConfig {
    fn default() -> Self {
        Self {
            fallthrough: true,
            remote: RemoteConfig::default(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            max_threads: 0,
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
        }
    }
}

impl VfsConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(s: &str) -> VfsResult<Self> {
        toml::from_str(s).map_err(|e| VfsError::Config(e.to_string()))
    }

    /// Load a TOML file.
    pub fn load(path: impl AsRef<Path>) -> VfsResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| VfsError::from_io(path.display().to_string(), e))?;
        Self::from_toml_str(&text)
            .map_err(|e| VfsError::Config(format!("{}: {e}", path.display())))
    }
}

/// Current verbosity from [`VERBOSE_ENV`].
///
/// `None` when unset; a value that isn't an integer counts as 0.
pub fn verbosity_from_env() -> Option<i32> {
    std::env::var(VERBOSE_ENV)
        .ok()
        .map(|v| v.trim().parse().unwrap_or(0))
}
