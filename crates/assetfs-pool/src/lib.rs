//! # assetfs-pool
//!
//! A fixed-size worker thread pool consuming a single FIFO job queue.
//!
//! The pool knows nothing about assets. It is used by the remote backend in
//! `assetfs-vfs` to run downloads, but any `Send` closure can be queued.
//!
//! ```text
//!  enqueue ──▶ [ job | job | job ] ──▶ worker 0 ─┐
//!                                  ──▶ worker 1 ─┼──▶ completion broadcast
//!                                  ──▶ worker N ─┘      (condvar + event channel)
//! ```
//!
//! ## Waiting
//!
//! Three wait primitives share one completion broadcast:
//!
//! - [`WorkerPool::wait`] blocks until the queue is empty and no job runs.
//! - [`WorkerPool::wait_pending`] blocks until `queued + active <= target`.
//!   To wait for exactly one more job to finish without racing between the
//!   check and the sleep: `pool.wait_pending(pool.pending_jobs() - 1)`.
//! - [`WorkerPool::timed_wait`] is `wait` with a deadline, returning the
//!   time actually spent.
//!
//! [`WorkerPool::completion_events`] mirrors every broadcast onto a channel
//! for callers that integrate with their own event loop.
//!
//! ## Sharing
//!
//! Share a pool with `Arc<WorkerPool>`. Threads are joined when the last
//! owner drops the pool (or on an explicit [`WorkerPool::shutdown`]).

mod error;
mod pool;

pub use error::{PoolError, PoolResult};
pub use pool::{WorkerPool, num_processors};
