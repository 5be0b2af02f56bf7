//! Virtual Filesystem abstraction.
//!
//! Key components:
//!
//! - [`VfsOps`] / [`FileOps`] - Backend and open-handle traits
//! - [`MountTable`] - Routes opens to backends based on path prefix
//! - [`AssetFile`] - Uniform handle returned for every backend
//! - [`LocalBackend`] - Host directory (with path security)
//! - [`ArchiveBackend`] - Members of an indexed tar archive
//! - [`RemoteBackend`] - URLs fetched into an on-disk cache
//!
//! ## Design Decisions
//!
//! - **Open/read/seek only**: assets are read-only streams; there is no
//!   directory listing, stat, or write path.
//! - **Newest mount first**: later registrations shadow earlier ones;
//!   fallthrough decides whether a failed open tries the next match.
//! - **Host fallback**: a path no mount can open is opened as-is on the
//!   host filesystem.

pub mod backends;
mod error;
mod file;
mod mount;
mod ops;
mod types;

pub use backends::{
    ArchiveBackend, ArchiveFile, JobStatus, LocalBackend, LocalFile, RemoteBackend, RemoteFile,
};
pub use error::{VfsError, VfsResult};
pub use file::AssetFile;
pub use mount::MountTable;
pub use ops::{FileOps, VfsOps};
pub use types::{MountInfo, MountKind, Whence};
