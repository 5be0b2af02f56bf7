//! VFS error types.

use std::io;
use thiserror::Error;

use assetfs_cas::CasError;
use assetfs_pool::PoolError;

/// VFS error type.
#[derive(Debug, Error)]
pub enum VfsError {
    /// No backend (and not the host filesystem) could open the asset.
    #[error("not found: {0}")]
    NotFound(String),

    /// Bad seek origin, negative position, malformed URL, ...
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An allocation failed.
    #[error("out of memory: {0}")]
    OutOfMemory(String),

    /// A tar archive could not be indexed.
    #[error("invalid archive {path}: {reason}")]
    InvalidArchive { path: String, reason: String },

    /// Configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Worker pool error.
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// Download cache error.
    #[error(transparent)]
    Cache(#[from] CasError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl VfsError {
    /// Create a NotFound error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create an InvalidArgument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create an OutOfMemory error.
    pub fn out_of_memory(what: impl Into<String>) -> Self {
        Self::OutOfMemory(what.into())
    }

    /// Create an InvalidArchive error.
    pub fn invalid_archive(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArchive {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Convert an I/O error about `path`, keeping missing files as NotFound.
    pub fn from_io(path: impl Into<String>, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.into()),
            _ => Self::Io(err),
        }
    }

    /// The errno-style code for this error.
    ///
    /// Transport failures surface as `NotFound` and therefore `ENOENT`; the
    /// distinction between e.g. a 403 and a 404 is not preserved.
    pub fn errno(&self) -> i32 {
        match self {
            VfsError::NotFound(_) => libc::ENOENT,
            VfsError::InvalidArgument(_) | VfsError::Config(_) => libc::EINVAL,
            VfsError::InvalidArchive { .. } => libc::EINVAL,
            VfsError::OutOfMemory(_) => libc::ENOMEM,
            VfsError::Pool(PoolError::Spawn { source, .. }) => io_errno(source),
            VfsError::Pool(PoolError::ShutDown) => libc::EINVAL,
            VfsError::Cache(CasError::CreateDir { source, .. })
            | VfsError::Cache(CasError::Io { source, .. }) => io_errno(source),
            VfsError::Cache(CasError::InvalidKey(_)) => libc::EINVAL,
            VfsError::Io(e) => io_errno(e),
        }
    }
}

fn io_errno(err: &io::Error) -> i32 {
    if let Some(code) = err.raw_os_error() {
        return code;
    }
    match err.kind() {
        io::ErrorKind::NotFound => libc::ENOENT,
        io::ErrorKind::InvalidInput => libc::EINVAL,
        io::ErrorKind::OutOfMemory => libc::ENOMEM,
        io::ErrorKind::PermissionDenied => libc::EACCES,
        _ => libc::EIO,
    }
}

/// Convert VfsError to std::io::Error for compatibility.
impl From<VfsError> for io::Error {
    fn from(e: VfsError) -> Self {
        match e {
            VfsError::NotFound(msg) => io::Error::new(io::ErrorKind::NotFound, msg),
            VfsError::InvalidArgument(msg) => io::Error::new(io::ErrorKind::InvalidInput, msg),
            VfsError::OutOfMemory(msg) => io::Error::new(io::ErrorKind::OutOfMemory, msg),
            VfsError::Io(e) => e,
            other => io::Error::other(other.to_string()),
        }
    }
}

/// VFS result type.
pub type VfsResult<T> = Result<T, VfsError>;
