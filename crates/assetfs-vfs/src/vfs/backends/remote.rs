//! Remote URL backend with an on-disk download cache.
//!
//! Opening a name resolves it against the mount's base URL and starts a
//! download into the cache directory on the shared worker pool. `open`
//! returns once the first bytes have arrived (or the transfer finished);
//! every later read, seek or close on the handle waits for the download to
//! complete.
//!
//! ```text
//! Unknown ──first chunk──▶ Started ──┬──▶ Done
//!    │                               └──▶ Error
//!    └──────────────────────────────────▶ Done | Error
//! ```

use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, warn};
use url::Url;

use assetfs_cas::{CacheDir, CacheKey};
use assetfs_pool::WorkerPool;

use crate::transport::{Transport, TransportError};
use crate::vfs::error::{VfsError, VfsResult};
use crate::vfs::ops::{FileOps, VfsOps};

/// Progress of one download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// Queued or connecting; no data yet.
    Unknown,
    /// Data is arriving.
    Started,
    /// The transfer failed.
    Error,
    /// The transfer completed and the cache file is open for reading.
    Done,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Error | JobStatus::Done)
    }
}

struct JobState {
    status: JobStatus,
    writer: Option<File>,
    reader: Option<File>,
}

/// One download into the cache, shared by the worker running it and the
/// handle reading it.
struct DownloadJob {
    url: Url,
    key: CacheKey,
    cache: Arc<CacheDir>,
    state: Mutex<JobState>,
    changed: Condvar,
}

impl DownloadJob {
    fn new(url: Url, key: CacheKey, cache: Arc<CacheDir>, writer: File) -> Self {
        Self {
            url,
            key,
            cache,
            state: Mutex::new(JobState {
                status: JobStatus::Unknown,
                writer: Some(writer),
                reader: None,
            }),
            changed: Condvar::new(),
        }
    }

    /// Move to `status` and wake waiters. Terminal states never change.
    fn advance(&self, state: &mut JobState, status: JobStatus) {
        if state.status.is_terminal() || state.status == status {
            return;
        }
        debug!(url = %self.url, from = ?state.status, to = ?status, "download state");
        state.status = status;
        self.changed.notify_all();
    }

    /// Block until the job has left `Unknown`.
    fn wait_started(&self) -> JobStatus {
        let mut state = self.state.lock();
        while state.status == JobStatus::Unknown {
            self.changed.wait(&mut state);
        }
        state.status
    }

    /// Block until the job is `Done` or `Error`.
    fn wait_finished(&self) -> MutexGuard<'_, JobState> {
        let mut state = self.state.lock();
        while !state.status.is_terminal() {
            self.changed.wait(&mut state);
        }
        state
    }

    /// Worker side: stream the body into the cache file.
    fn run(&self, transport: &dyn Transport) {
        let Some(file) = self.state.lock().writer.take() else {
            return;
        };
        let mut writer = BufWriter::new(file);
        let mut started = false;

        let transfer = transport.fetch(&self.url, &mut |chunk| {
            writer.write_all(chunk)?;
            if !started {
                started = true;
                self.advance(&mut self.state.lock(), JobStatus::Started);
            }
            Ok(())
        });

        let flushed = transfer.and_then(|()| writer.flush().map_err(TransportError::Sink));
        drop(writer);
        let finished = match flushed {
            Ok(()) => self.cache.open_read(&self.key).map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        let mut state = self.state.lock();
        match finished {
            Ok(reader) => {
                state.reader = Some(reader);
                self.advance(&mut state, JobStatus::Done);
            }
            Err(error) => {
                warn!(url = %self.url, %error, "download failed");
                self.advance(&mut state, JobStatus::Error);
            }
        }
    }

    /// Fail the job unless it already finished.
    fn abandon(&self) {
        let mut state = self.state.lock();
        state.writer = None;
        self.advance(&mut state, JobStatus::Error);
    }

    /// Close the job's files and delete the cache file.
    fn discard(&self) {
        {
            let mut state = self.state.lock();
            state.writer = None;
            state.reader = None;
        }
        match self.cache.remove(&self.key) {
            Ok(removed) => {
                debug!(url = %self.url, key = %self.key, removed, "discarded cache file")
            }
            Err(e) => warn!(url = %self.url, error = %e, "failed to remove cache file"),
        }
    }
}

/// A job on its way through the pool. Dropping it without finishing (pool
/// shutdown discarded it, or the transport panicked) fails the job so
/// nobody waits forever.
struct JobTicket {
    job: Arc<DownloadJob>,
    transport: Arc<dyn Transport>,
}

impl JobTicket {
    fn run(self) {
        self.job.run(self.transport.as_ref());
    }
}

impl Drop for JobTicket {
    fn drop(&mut self) {
        self.job.abandon();
    }
}

/// Serves names beneath a base URL, caching each download on disk.
///
/// The pool and cache directory are usually shared by every URL mount of a
/// [`MountTable`](crate::MountTable).
pub struct RemoteBackend {
    base: Url,
    pool: Arc<WorkerPool>,
    cache: Arc<CacheDir>,
    transport: Arc<dyn Transport>,
}

impl RemoteBackend {
    /// Create a backend for `base_url`.
    ///
    /// The base must be an absolute URL; a trailing `/` is added if missing
    /// so names resolve beneath it.
    pub fn new(
        base_url: &str,
        pool: Arc<WorkerPool>,
        cache: Arc<CacheDir>,
        transport: Arc<dyn Transport>,
    ) -> VfsResult<Self> {
        let mut base = Url::parse(base_url)
            .map_err(|e| VfsError::invalid_argument(format!("bad base URL {base_url}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(VfsError::invalid_argument(format!(
                "{base_url} cannot be used as a base URL"
            )));
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        Ok(Self {
            base,
            pool,
            cache,
            transport,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub fn cache(&self) -> &CacheDir {
        &self.cache
    }

    /// Full URL for `name`.
    pub fn resolve(&self, name: &str) -> VfsResult<Url> {
        let name = name.trim_start_matches(['/', '\\']);
        self.base
            .join(name)
            .map_err(|e| VfsError::invalid_argument(format!("cannot resolve {name}: {e}")))
    }

    fn download(&self, url: Url) -> VfsResult<RemoteFile> {
        let key = CacheKey::for_url(url.as_str());
        let writer = self.cache.create(&key)?;
        debug!(url = %url, key = %key, "queueing download");

        let job = Arc::new(DownloadJob::new(url, key, Arc::clone(&self.cache), writer));
        let ticket = JobTicket {
            job: Arc::clone(&job),
            transport: Arc::clone(&self.transport),
        };
        if let Err(e) = self.pool.execute(move || ticket.run()) {
            job.discard();
            return Err(e.into());
        }

        match job.wait_started() {
            JobStatus::Error => {
                job.discard();
                Err(VfsError::not_found(job.url.as_str()))
            }
            _ => Ok(RemoteFile { job }),
        }
    }
}

impl VfsOps for RemoteBackend {
    fn open(&self, name: &str) -> VfsResult<Box<dyn FileOps>> {
        let url = self.resolve(name)?;
        Ok(Box::new(self.download(url)?))
    }
}

impl fmt::Debug for RemoteBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteBackend")
            .field("base", &self.base.as_str())
            .field("cache", &self.cache.root())
            .finish_non_exhaustive()
    }
}

/// Handle on a downloaded (or downloading) file.
pub struct RemoteFile {
    job: Arc<DownloadJob>,
}

impl RemoteFile {
    /// Current download status, without waiting.
    pub fn status(&self) -> JobStatus {
        self.job.state.lock().status
    }

    pub fn url(&self) -> &Url {
        &self.job.url
    }

    fn with_reader<T>(&self, f: impl FnOnce(&mut File) -> io::Result<T>) -> VfsResult<T> {
        let mut guard = self.job.wait_finished();
        let state = &mut *guard;
        match state.reader.as_mut() {
            Some(reader) if state.status == JobStatus::Done => Ok(f(reader)?),
            _ => Err(VfsError::not_found(self.job.url.as_str())),
        }
    }
}

impl FileOps for RemoteFile {
    fn read(&mut self, buf: &mut [u8]) -> VfsResult<usize> {
        self.with_reader(|reader| loop {
            match reader.read(buf) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                other => return other,
            }
        })
    }

    fn seek(&mut self, pos: SeekFrom) -> VfsResult<u64> {
        self.with_reader(|reader| reader.seek(pos))
            .map_err(|e| match e {
                VfsError::Io(err) if err.kind() == io::ErrorKind::InvalidInput => {
                    VfsError::invalid_argument(err.to_string())
                }
                other => other,
            })
    }

    fn close(self: Box<Self>) -> VfsResult<()> {
        let status = {
            let mut state = self.job.wait_finished();
            state.reader = None;
            state.status
        };
        if status == JobStatus::Error {
            self.job.discard();
        }
        Ok(())
    }
}

impl fmt::Debug for RemoteFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteFile")
            .field("url", &self.job.url.as_str())
            .field("status", &self.status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static [u8]);

    impl Transport for Fixed {
        fn fetch(
            &self,
            _url: &Url,
            sink: &mut dyn FnMut(&[u8]) -> io::Result<()>,
        ) -> Result<(), TransportError> {
            for chunk in self.0.chunks(3) {
                sink(chunk).map_err(TransportError::Sink)?;
            }
            Ok(())
        }
    }

    fn backend(base: &str, body: &'static [u8]) -> (RemoteBackend, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let backend = RemoteBackend::new(
            base,
            Arc::new(WorkerPool::new(1).unwrap()),
            Arc::new(CacheDir::open(dir.path()).unwrap()),
            Arc::new(Fixed(body)),
        )
        .unwrap();
        (backend, dir)
    }

    #[test]
    fn test_base_gets_trailing_slash() {
        let (fs, _dir) = backend("http://example.com/assets", b"");
        assert_eq!(fs.base_url().as_str(), "http://example.com/assets/");
        assert_eq!(
            fs.resolve("img/a.png").unwrap().as_str(),
            "http://example.com/assets/img/a.png"
        );
        assert_eq!(
            fs.resolve("/img/a.png").unwrap().as_str(),
            "http://example.com/assets/img/a.png"
        );
    }

    #[test]
    fn test_bad_base_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let result = RemoteBackend::new(
            "not a url",
            Arc::new(WorkerPool::new(1).unwrap()),
            Arc::new(CacheDir::open(dir.path()).unwrap()),
            Arc::new(Fixed(b"")),
        );
        assert!(matches!(result, Err(VfsError::InvalidArgument(_))));
    }

    #[test]
    fn test_download_then_read() {
        let (fs, _dir) = backend("http://example.com/", b"remote body");
        let mut f = fs.open("file.txt").unwrap();
        let mut buf = [0u8; 64];
        let n = f.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"remote body");

        let key = CacheKey::for_url("http://example.com/file.txt");
        assert!(fs.cache().contains(&key));
        f.close().unwrap();
        assert!(fs.cache().contains(&key));
    }

    #[test]
    fn test_empty_body_is_done() {
        let (fs, _dir) = backend("http://example.com/", b"");
        let mut f = fs.open("empty").unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(f.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_abandoned_ticket_fails_job() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(CacheDir::open(dir.path()).unwrap());
        let url = Url::parse("http://example.com/x").unwrap();
        let key = CacheKey::for_url(url.as_str());
        let writer = cache.create(&key).unwrap();
        let job = Arc::new(DownloadJob::new(url, key, cache, writer));

        drop(JobTicket {
            job: Arc::clone(&job),
            transport: Arc::new(Fixed(b"never")),
        });
        assert_eq!(job.wait_started(), JobStatus::Error);
    }
}
