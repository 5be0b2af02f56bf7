//! Backend capability traits.
//!
//! A backend resolves names to open handles; a handle is a readable,
//! seekable stream. The MountTable handles prefix routing and hands the
//! backend the remainder of the path with the prefix (and any following
//! separators) stripped.

use std::io::SeekFrom;

use super::VfsResult;

/// A mountable asset source.
///
/// Built-in backends cover host directories, tar archives and URLs; any
/// other type implementing this trait can be registered as a user backend.
pub trait VfsOps: Send + Sync {
    /// Open `name`, relative to this backend's root.
    fn open(&self, name: &str) -> VfsResult<Box<dyn FileOps>>;
}

/// An open asset stream.
pub trait FileOps: Send {
    /// Read up to `buf.len()` bytes. `Ok(0)` means end of stream.
    fn read(&mut self, buf: &mut [u8]) -> VfsResult<usize>;

    /// Move the cursor, returning the new absolute position.
    ///
    /// A negative resulting position is an `InvalidArgument` error.
    fn seek(&mut self, pos: SeekFrom) -> VfsResult<u64>;

    /// Release the handle. The default just drops it.
    fn close(self: Box<Self>) -> VfsResult<()> {
        Ok(())
    }
}
