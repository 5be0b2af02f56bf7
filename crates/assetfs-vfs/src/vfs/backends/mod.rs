//! VFS backends.
//!
//! Backends implement [`VfsOps`](super::VfsOps) for different asset sources.

mod archive;
mod local;
mod remote;

pub use archive::{ArchiveBackend, ArchiveFile};
pub use local::{LocalBackend, LocalFile};
pub use remote::{JobStatus, RemoteBackend, RemoteFile};
