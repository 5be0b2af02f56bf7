//! The worker pool itself.

use std::cell::Cell;
use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, error, warn};

use crate::error::{PoolError, PoolResult};

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    /// `(pool id, worker ordinal)` for pool worker threads.
    static WORKER: Cell<Option<(u64, usize)>> = const { Cell::new(None) };
}

/// Number of logical processors, falling back to 1 if it can't be queried.
pub fn num_processors() -> usize {
    thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

/// A queued job. Owned by the queue until a worker dequeues it.
struct WorkItem {
    task: Box<dyn FnOnce() + Send + 'static>,
}

impl WorkItem {
    fn run(self) {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(self.task)) {
            let message = payload
                .downcast_ref::<&str>()
                .copied()
                .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
                .unwrap_or("<non-string panic payload>");
            error!(panic = message, "worker job panicked");
        }
    }
}

/// Queue bookkeeping, guarded by `Shared::queue`.
struct Queue {
    items: VecDeque<WorkItem>,
    active: usize,
    quit: bool,
}

impl Queue {
    fn pending(&self) -> usize {
        self.items.len() + self.active
    }
}

struct Shared {
    id: u64,
    queue: Mutex<Queue>,
    /// Idle workers sleep here.
    work_cv: Condvar,
    /// Broadcast after every finished job.
    done_cv: Condvar,
    in_batch: AtomicBool,
    events: OnceLock<(Sender<()>, Receiver<()>)>,
}

impl Shared {
    fn broadcast_done(&self) {
        self.done_cv.notify_all();
        if let Some((tx, _)) = self.events.get() {
            // The receiver half lives in `events` too, so this can't disconnect.
            let _ = tx.send(());
        }
    }

    fn worker_loop(&self, index: usize) {
        WORKER.with(|w| w.set(Some((self.id, index))));

        let mut queue = self.queue.lock();
        while !queue.quit {
            let Some(item) = queue.items.pop_front() else {
                self.work_cv.wait(&mut queue);
                continue;
            };
            queue.active += 1;
            MutexGuard::unlocked(&mut queue, || item.run());
            queue.active -= 1;
            self.broadcast_done();
        }
    }
}

/// A fixed set of long-lived worker threads consuming a FIFO job queue.
///
/// Jobs run in submission order (modulo the number of workers). A job's
/// completion callback runs on the same worker right after its work
/// callback.
///
/// # Example
///
/// ```rust
/// use assetfs_pool::WorkerPool;
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// let pool = WorkerPool::new(4).unwrap();
/// let counter = Arc::new(AtomicUsize::new(0));
///
/// pool.begin_batch();
/// for _ in 0..100 {
///     let counter = Arc::clone(&counter);
///     pool.execute(move || {
///         counter.fetch_add(1, Ordering::SeqCst);
///     })
///     .unwrap();
/// }
/// pool.end_batch();
///
/// pool.wait();
/// assert_eq!(counter.load(Ordering::SeqCst), 100);
/// ```
pub struct WorkerPool {
    shared: Arc<Shared>,
    threads: Mutex<Vec<JoinHandle<()>>>,
    num_threads: usize,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("id", &self.shared.id)
            .field("num_threads", &self.num_threads)
            .finish_non_exhaustive()
    }
}

impl WorkerPool {
    /// Start a pool with `num_threads` workers.
    ///
    /// `0` spawns one worker per logical processor.
    pub fn new(num_threads: usize) -> PoolResult<Self> {
        let num_threads = if num_threads == 0 {
            num_processors()
        } else {
            num_threads
        };

        let shared = Arc::new(Shared {
            id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
            queue: Mutex::new(Queue {
                items: VecDeque::new(),
                active: 0,
                quit: false,
            }),
            work_cv: Condvar::new(),
            done_cv: Condvar::new(),
            in_batch: AtomicBool::new(false),
            events: OnceLock::new(),
        });

        let pool = Self {
            shared,
            threads: Mutex::new(Vec::with_capacity(num_threads)),
            num_threads,
        };

        for index in 0..num_threads {
            let shared = Arc::clone(&pool.shared);
            let handle = thread::Builder::new()
                .name(format!("assetfs-worker-{index}"))
                .spawn(move || shared.worker_loop(index))
                // Dropping `pool` joins the workers that did start.
                .map_err(|source| PoolError::Spawn { index, source })?;
            pool.threads.lock().push(handle);
        }

        debug!(pool = pool.shared.id, num_threads, "worker pool started");
        Ok(pool)
    }

    /// Number of worker threads.
    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// Queue `work(&mut data)` at the tail.
    pub fn enqueue<T, W>(&self, data: T, work: W) -> PoolResult<()>
    where
        T: Send + 'static,
        W: FnOnce(&mut T) + Send + 'static,
    {
        self.push(WorkItem {
            task: Box::new(move || {
                let mut data = data;
                work(&mut data);
            }),
        })
    }

    /// Queue `work(&mut data)` followed by `done(data)` on the same worker.
    pub fn enqueue_with_done<T, W, D>(&self, data: T, work: W, done: D) -> PoolResult<()>
    where
        T: Send + 'static,
        W: FnOnce(&mut T) + Send + 'static,
        D: FnOnce(T) + Send + 'static,
    {
        self.push(WorkItem {
            task: Box::new(move || {
                let mut data = data;
                work(&mut data);
                done(data);
            }),
        })
    }

    /// Queue a closure.
    pub fn execute<F>(&self, f: F) -> PoolResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.push(WorkItem { task: Box::new(f) })
    }

    fn push(&self, item: WorkItem) -> PoolResult<()> {
        {
            let mut queue = self.shared.queue.lock();
            if queue.quit {
                return Err(PoolError::ShutDown);
            }
            queue.items.push_back(item);
        }
        if !self.shared.in_batch.load(Ordering::Acquire) {
            self.shared.work_cv.notify_one();
        }
        Ok(())
    }

    /// Hold back worker wake-ups until [`end_batch`](Self::end_batch).
    pub fn begin_batch(&self) {
        self.shared.in_batch.store(true, Ordering::Release);
    }

    /// Close a batch and wake every worker once.
    pub fn end_batch(&self) {
        self.shared.in_batch.store(false, Ordering::Release);
        self.shared.work_cv.notify_all();
    }

    /// Drop every queued job without running it. Running jobs are unaffected.
    pub fn clear(&self) {
        let discarded = std::mem::take(&mut self.shared.queue.lock().items);
        drop(discarded);
        self.shared.done_cv.notify_all();
    }

    /// Jobs waiting in the queue.
    pub fn queued_jobs(&self) -> usize {
        self.shared.queue.lock().items.len()
    }

    /// Jobs currently executing.
    pub fn active_jobs(&self) -> usize {
        self.shared.queue.lock().active
    }

    /// Queued plus executing jobs.
    pub fn pending_jobs(&self) -> usize {
        self.shared.queue.lock().pending()
    }

    /// Block until the queue is empty and no job is running.
    ///
    /// Must not be called from inside a job of the same pool.
    pub fn wait(&self) {
        self.wait_pending(0);
    }

    /// Block until at most `target` jobs are queued or running.
    pub fn wait_pending(&self, target: usize) {
        let mut queue = self.shared.queue.lock();
        while queue.pending() > target {
            self.shared.done_cv.wait(&mut queue);
        }
    }

    /// Like [`wait`](Self::wait) but gives up after `timeout`.
    ///
    /// Returns the time spent waiting.
    pub fn timed_wait(&self, timeout: Duration) -> Duration {
        let start = Instant::now();
        let deadline = start + timeout;

        let mut queue = self.shared.queue.lock();
        while queue.pending() > 0 {
            if self
                .shared
                .done_cv
                .wait_until(&mut queue, deadline)
                .timed_out()
            {
                break;
            }
        }
        drop(queue);
        start.elapsed()
    }

    /// A channel that receives one `()` per completed job.
    ///
    /// Events are only recorded after the first call. The channel is
    /// unbounded: drain it (e.g. with `try_iter`) after every wake-up.
    pub fn completion_events(&self) -> Receiver<()> {
        self.shared
            .events
            .get_or_init(crossbeam_channel::unbounded)
            .1
            .clone()
    }

    /// Ordinal of the calling worker thread, or `None` outside this pool.
    pub fn thread_id(&self) -> Option<usize> {
        WORKER
            .with(Cell::get)
            .filter(|(pool, _)| *pool == self.shared.id)
            .map(|(_, index)| index)
    }

    /// Discard queued jobs, stop the workers and join them.
    ///
    /// Jobs already running are not interrupted; this waits for them.
    /// Calling it more than once is harmless.
    pub fn shutdown(&self) {
        let discarded = {
            let mut queue = self.shared.queue.lock();
            queue.quit = true;
            std::mem::take(&mut queue.items)
        };
        if !discarded.is_empty() {
            debug!(pool = self.shared.id, discarded = discarded.len(), "dropping queued jobs");
        }
        drop(discarded);
        self.shared.work_cv.notify_all();

        let handles = std::mem::take(&mut *self.threads.lock());
        if handles.is_empty() {
            return;
        }

        debug!(pool = self.shared.id, threads = handles.len(), "waiting for worker threads to stop");
        let current = thread::current().id();
        for handle in handles {
            // The last owner may be dropped from inside one of our own jobs.
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                warn!(pool = self.shared.id, "worker thread exited abnormally");
            }
        }

        // Wake anyone still parked in a wait call.
        self.shared.broadcast_done();
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
