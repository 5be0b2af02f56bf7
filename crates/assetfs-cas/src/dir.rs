//! The on-disk cache directory.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{CasError, CasResult};
use crate::key::CacheKey;

/// A flat directory of cached downloads, one file per [`CacheKey`].
///
/// There is no locking between writers: two concurrent downloads of the same
/// URL write the same file and the last writer wins.
#[derive(Debug, Clone)]
pub struct CacheDir {
    root: PathBuf,
}

impl CacheDir {
    /// Use `root` as the cache directory, creating it (and its parents) if
    /// it doesn't exist.
    pub fn open(root: impl Into<PathBuf>) -> CasResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| CasError::CreateDir {
            path: root.clone(),
            source,
        })?;
        debug!(root = %root.display(), "cache directory ready");
        Ok(Self { root })
    }

    /// Cache directory `name` under the platform temp directory.
    ///
    /// An absolute `name` is used as-is.
    pub fn in_temp_dir(name: impl AsRef<Path>) -> CasResult<Self> {
        Self::open(std::env::temp_dir().join(name))
    }

    /// The directory holding the cache files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the cache file for `key`. The file may not exist.
    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.file_name())
    }

    /// Whether a cache file for `key` exists.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.path_for(key).is_file()
    }

    /// Create (or truncate) the cache file for `key`, opened for writing.
    pub fn create(&self, key: &CacheKey) -> CasResult<File> {
        let path = self.path_for(key);
        File::create(&path).map_err(|source| CasError::Io {
            operation: "create",
            path,
            source,
        })
    }

    /// Open the cache file for `key` for reading.
    pub fn open_read(&self, key: &CacheKey) -> CasResult<File> {
        let path = self.path_for(key);
        File::open(&path).map_err(|source| CasError::Io {
            operation: "open",
            path,
            source,
        })
    }

    /// Delete the cache file for `key`.
    ///
    /// Returns `false` if there was nothing to delete.
    pub fn remove(&self, key: &CacheKey) -> CasResult<bool> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(CasError::Io {
                operation: "remove",
                path,
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    #[test]
    fn test_open_creates_nested_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("a/b/cache");
        let dir = CacheDir::open(&root).unwrap();
        assert!(root.is_dir());
        assert_eq!(dir.root(), root.as_path());
    }

    #[test]
    fn test_path_is_flat_hex_name() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = CacheDir::open(tmp.path()).unwrap();
        let key = CacheKey::for_url("http://example.com/x.png");
        let path = dir.path_for(&key);
        assert_eq!(path.parent(), Some(tmp.path()));
        assert_eq!(path.file_name().unwrap().to_str().unwrap(), key.file_name());
    }

    #[test]
    fn test_create_read_remove() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = CacheDir::open(tmp.path()).unwrap();
        let key = CacheKey::for_url("http://example.com/data.bin");

        assert!(!dir.contains(&key));
        dir.create(&key).unwrap().write_all(b"cached").unwrap();
        assert!(dir.contains(&key));

        let mut contents = String::new();
        dir.open_read(&key)
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        assert_eq!(contents, "cached");

        assert!(dir.remove(&key).unwrap());
        assert!(!dir.contains(&key));
        assert!(!dir.remove(&key).unwrap());
    }

    #[test]
    fn test_create_truncates_existing() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = CacheDir::open(tmp.path()).unwrap();
        let key = CacheKey::for_url("http://example.com/data.bin");

        dir.create(&key).unwrap().write_all(b"long old contents").unwrap();
        dir.create(&key).unwrap().write_all(b"new").unwrap();

        let mut contents = Vec::new();
        dir.open_read(&key).unwrap().read_to_end(&mut contents).unwrap();
        assert_eq!(contents, b"new");
    }

    #[test]
    fn test_open_read_missing_is_io_error() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = CacheDir::open(tmp.path()).unwrap();
        let key = CacheKey::for_url("http://example.com/missing");
        assert!(matches!(dir.open_read(&key), Err(CasError::Io { .. })));
    }
}
