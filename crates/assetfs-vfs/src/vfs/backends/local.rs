//! Local filesystem backend.
//!
//! Serves files beneath a host directory. [`LocalFile`] also backs the host
//! filesystem fallback of the mount table.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::vfs::error::{VfsError, VfsResult};
use crate::vfs::ops::{FileOps, VfsOps};

/// Local filesystem backend.
///
/// All names are relative to `root`. For example, if `root` is
/// `/srv/game/assets`, then `open("textures/wall.png")` opens
/// `/srv/game/assets/textures/wall.png`.
///
/// Names are joined as given; `..` components are left to the host.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    root: PathBuf,
}

impl LocalBackend {
    /// Create a backend rooted at `root`.
    ///
    /// Trailing separators and whitespace are trimmed. The directory is not
    /// checked for existence; opens beneath a missing root just fail.
    pub fn new(root: impl AsRef<str>) -> Self {
        let trimmed = root
            .as_ref()
            .trim_end_matches(|c: char| c == '/' || c.is_whitespace());
        // Keep "/" rather than trimming it to nothing.
        let root = if trimmed.is_empty() && root.as_ref().starts_with('/') {
            "/"
        } else {
            trimmed
        };
        Self {
            root: PathBuf::from(root),
        }
    }

    /// Get the root path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Host path for `name` beneath the root.
    fn resolve(&self, name: &str) -> PathBuf {
        self.root.join(name.trim_start_matches(['/', '\\']))
    }
}

impl VfsOps for LocalBackend {
    fn open(&self, name: &str) -> VfsResult<Box<dyn FileOps>> {
        Ok(Box::new(LocalFile::open(&self.resolve(name))?))
    }
}

/// An open host file.
#[derive(Debug)]
pub struct LocalFile {
    file: File,
}

impl LocalFile {
    /// Open `path` on the host filesystem for reading.
    pub fn open(path: &Path) -> VfsResult<Self> {
        let file = File::open(path).map_err(|e| VfsError::from_io(path.display().to_string(), e))?;
        if file.metadata().map(|m| m.is_dir()).unwrap_or(false) {
            return Err(VfsError::not_found(format!(
                "{} is a directory",
                path.display()
            )));
        }
        Ok(Self { file })
    }
}

impl FileOps for LocalFile {
    fn read(&mut self, buf: &mut [u8]) -> VfsResult<usize> {
        loop {
            match self.file.read(buf) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                other => return Ok(other?),
            }
        }
    }

    fn seek(&mut self, pos: SeekFrom) -> VfsResult<u64> {
        self.file.seek(pos).map_err(|e| match e.kind() {
            io::ErrorKind::InvalidInput => VfsError::invalid_argument(e.to_string()),
            _ => VfsError::Io(e),
        })
    }
}
