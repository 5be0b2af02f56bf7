//! Cache error types.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Cache error type.
#[derive(Debug, Error)]
pub enum CasError {
    /// The cache directory could not be created.
    #[error("failed to create cache directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A cache file operation failed.
    #[error("{operation} failed for {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A string was not a valid cache key.
    #[error("invalid cache key: {0}")]
    InvalidKey(String),
}

/// Cache result type.
pub type CasResult<T> = Result<T, CasError>;
