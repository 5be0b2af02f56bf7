//! Worker pool error types.

use std::io;
use thiserror::Error;

/// Worker pool error type.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The OS refused to start a worker thread.
    #[error("failed to spawn worker thread {index}: {source}")]
    Spawn {
        /// Ordinal of the worker that failed to start.
        index: usize,
        /// The underlying spawn error.
        #[source]
        source: io::Error,
    },

    /// The pool has been shut down and accepts no more work.
    #[error("worker pool is shut down")]
    ShutDown,
}

/// Worker pool result type.
pub type PoolResult<T> = Result<T, PoolError>;
