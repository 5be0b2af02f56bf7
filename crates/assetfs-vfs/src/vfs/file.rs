//! The caller-facing file handle.

use std::fmt;
use std::io::{self, SeekFrom};
use std::sync::Arc;

use tracing::warn;

use super::error::{VfsError, VfsResult};
use super::ops::{FileOps, VfsOps};
use super::types::{MountKind, Whence};

/// An open asset, whichever backend (or the host filesystem) served it.
///
/// Holds a reference to the owning backend, so clearing the mount table does
/// not invalidate open files. Dropping an unclosed file closes it; call
/// [`AssetFile::close`] to observe the close result.
pub struct AssetFile {
    ops: Option<Box<dyn FileOps>>,
    kind: Option<MountKind>,
    backend: Option<Arc<dyn VfsOps>>,
}

impl AssetFile {
    pub(crate) fn from_mount(
        ops: Box<dyn FileOps>,
        kind: MountKind,
        backend: Arc<dyn VfsOps>,
    ) -> Self {
        Self {
            ops: Some(ops),
            kind: Some(kind),
            backend: Some(backend),
        }
    }

    pub(crate) fn from_host(ops: Box<dyn FileOps>) -> Self {
        Self {
            ops: Some(ops),
            kind: None,
            backend: None,
        }
    }

    /// Kind of the mount that served this file, `None` for the host
    /// filesystem fallback.
    pub fn kind(&self) -> Option<MountKind> {
        self.kind
    }

    /// Whether the file came from a mount rather than the host fallback.
    pub fn is_mounted(&self) -> bool {
        self.backend.is_some()
    }

    fn ops(&mut self) -> VfsResult<&mut Box<dyn FileOps>> {
        self.ops
            .as_mut()
            .ok_or_else(|| VfsError::invalid_argument("file is closed"))
    }

    /// Read up to `buf.len()` bytes. `Ok(0)` means end of file.
    pub fn read(&mut self, buf: &mut [u8]) -> VfsResult<usize> {
        self.ops()?.read(buf)
    }

    /// Move the cursor, returning the new absolute position.
    pub fn seek(&mut self, pos: SeekFrom) -> VfsResult<u64> {
        self.ops()?.seek(pos)
    }

    /// Seek with a C-style origin (`0` = set, `1` = current, `2` = end).
    pub fn seek_raw(&mut self, offset: i64, whence: i32) -> VfsResult<u64> {
        let pos = Whence::from_raw(whence)?.seek_from(offset)?;
        self.seek(pos)
    }

    /// Current position.
    pub fn tell(&mut self) -> VfsResult<u64> {
        self.seek(SeekFrom::Current(0))
    }

    /// Read one byte, `None` at end of file.
    pub fn read_byte(&mut self) -> VfsResult<Option<u8>> {
        let mut byte = [0u8; 1];
        match self.read(&mut byte)? {
            0 => Ok(None),
            _ => Ok(Some(byte[0])),
        }
    }

    /// Append one line to `buf`, reading at most `limit - 1` bytes and
    /// stopping after a `\n`.
    ///
    /// Returns the number of bytes appended; `0` means end of file (or a
    /// `limit` below 2).
    pub fn read_line(&mut self, buf: &mut Vec<u8>, limit: usize) -> VfsResult<usize> {
        let max = limit.saturating_sub(1);
        let mut count = 0;
        while count < max {
            match self.read_byte()? {
                Some(byte) => {
                    buf.push(byte);
                    count += 1;
                    if byte == b'\n' {
                        break;
                    }
                }
                None => break,
            }
        }
        Ok(count)
    }

    /// Read everything from the cursor to the end of the file.
    pub fn read_to_end(&mut self, buf: &mut Vec<u8>) -> VfsResult<usize> {
        let start = buf.len();
        let mut chunk = [0u8; 8192];
        loop {
            let n = self.read(&mut chunk)?;
            if n == 0 {
                return Ok(buf.len() - start);
            }
            buf.try_reserve(n)
                .map_err(|_| VfsError::out_of_memory("read buffer"))?;
            buf.extend_from_slice(&chunk[..n]);
        }
    }

    /// Close the file, reporting any error from the backend.
    pub fn close(mut self) -> VfsResult<()> {
        match self.ops.take() {
            Some(ops) => ops.close(),
            None => Ok(()),
        }
    }
}

impl Drop for AssetFile {
    fn drop(&mut self) {
        if let Some(ops) = self.ops.take()
            && let Err(e) = ops.close()
        {
            warn!(error = %e, "closing asset file failed");
        }
    }
}

impl fmt::Debug for AssetFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetFile")
            .field("kind", &self.kind)
            .field("open", &self.ops.is_some())
            .finish()
    }
}

impl io::Read for AssetFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        AssetFile::read(self, buf).map_err(io::Error::from)
    }
}

impl io::Seek for AssetFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        AssetFile::seek(self, pos).map_err(io::Error::from)
    }
}
