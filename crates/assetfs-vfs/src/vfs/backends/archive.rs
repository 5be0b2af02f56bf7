//! Tar archive backend.

use std::io::SeekFrom;
use std::path::Path;
use std::sync::Arc;

use crate::tar::{TarEntry, TarIndex};
use crate::vfs::error::{VfsError, VfsResult};
use crate::vfs::ops::{FileOps, VfsOps};
use crate::vfs::types::resolve_seek;

/// Serves the members of an indexed tar archive.
#[derive(Debug, Clone)]
pub struct ArchiveBackend {
    index: Arc<TarIndex>,
}

impl ArchiveBackend {
    /// Index the archive at `path`.
    pub fn load(path: impl AsRef<Path>) -> VfsResult<Self> {
        Ok(Self::new(TarIndex::load(path)?))
    }

    pub fn new(index: TarIndex) -> Self {
        Self {
            index: Arc::new(index),
        }
    }

    pub fn index(&self) -> &TarIndex {
        &self.index
    }
}

impl VfsOps for ArchiveBackend {
    fn open(&self, name: &str) -> VfsResult<Box<dyn FileOps>> {
        let entry = self
            .index
            .find(name)
            .cloned()
            .ok_or_else(|| VfsError::not_found(name))?;
        Ok(Box::new(ArchiveFile {
            index: Arc::clone(&self.index),
            entry,
            pos: 0,
        }))
    }
}

/// A cursor over one archive member.
#[derive(Debug)]
pub struct ArchiveFile {
    index: Arc<TarIndex>,
    entry: TarEntry,
    pos: u64,
}

impl ArchiveFile {
    pub fn entry(&self) -> &TarEntry {
        &self.entry
    }
}

impl FileOps for ArchiveFile {
    fn read(&mut self, buf: &mut [u8]) -> VfsResult<usize> {
        if self.pos >= self.entry.size {
            return Ok(0);
        }
        let remaining = self.entry.size - self.pos;
        let want = usize::try_from(remaining).map_or(buf.len(), |r| r.min(buf.len()));

        let n = self
            .index
            .read_at(self.entry.offset + self.pos, &mut buf[..want])?;
        self.pos += n as u64;
        Ok(n)
    }

    fn seek(&mut self, pos: SeekFrom) -> VfsResult<u64> {
        self.pos = resolve_seek(pos, self.pos, self.entry.size)?;
        Ok(self.pos)
    }
}
