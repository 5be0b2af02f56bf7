//! VFS mount table with prefix routing and fallthrough.
//!
//! Routes opens to the appropriate backend based on path prefix. Mounts are
//! checked newest first; if none of them opens the path, it is tried on the
//! host filesystem as given.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use assetfs_cas::CacheDir;
use assetfs_pool::WorkerPool;

use super::backends::{ArchiveBackend, LocalBackend, LocalFile, RemoteBackend};
use super::error::VfsResult;
use super::file::AssetFile;
use super::ops::VfsOps;
use super::types::{MountInfo, MountKind};
use crate::config::{RemoteConfig, VfsConfig, verbosity_from_env};
use crate::transport::Transport;

/// Routing diagnostics: `info` when verbose, `debug` otherwise.
macro_rules! route_event {
    ($table:expr, $($arg:tt)+) => {
        if $table.verbosity() > 0 {
            info!($($arg)+)
        } else {
            debug!($($arg)+)
        }
    };
}

struct Mount {
    prefix: Option<String>,
    kind: MountKind,
    backend: Arc<dyn VfsOps>,
}

impl Mount {
    /// The name to hand the backend, if `path` falls under this mount.
    fn strip<'p>(&self, path: &'p str) -> Option<&'p str> {
        let rest = match self.prefix.as_deref() {
            Some(prefix) => path.strip_prefix(prefix)?,
            None => path,
        };
        Some(rest.trim_start_matches(['/', '\\']))
    }

    fn info(&self) -> MountInfo {
        MountInfo {
            prefix: self.prefix.clone(),
            kind: self.kind,
        }
    }
}

/// Worker pool and cache directory shared by a table's URL mounts.
#[derive(Clone)]
struct RemoteShared {
    pool: Arc<WorkerPool>,
    cache: Arc<CacheDir>,
}

/// Routes asset opens to mounted backends.
///
/// The most recently registered mount is tried first. A mount matches when
/// its prefix is a literal prefix of the requested path (a mount without a
/// prefix matches everything); the backend then sees the rest of the path
/// with leading separators removed. For example, with `data` mounted on an
/// archive, `data/img/foo.jpg` asks the archive for `img/foo.jpg`.
///
/// When a matching backend fails to open the path, the table moves on to the
/// next matching mount if fallthrough is enabled (the default), or returns
/// that backend's error otherwise. Paths that no mount opens are tried on
/// the host filesystem.
pub struct MountTable {
    mounts: RwLock<Vec<Mount>>,
    fallthrough: AtomicBool,
    verbose: AtomicI32,
    last_errno: AtomicI32,
    remote_config: RemoteConfig,
    remote: Mutex<Option<RemoteShared>>,
}

impl fmt::Debug for MountTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MountTable")
            .field("mounts", &self.list_mounts())
            .field("fallthrough", &self.fallthrough())
            .finish_non_exhaustive()
    }
}

impl Default for MountTable {
    fn default() -> Self {
        Self::new()
    }
}

impl MountTable {
    /// Create an empty mount table with the default configuration.
    pub fn new() -> Self {
        Self::with_config(VfsConfig::default())
    }

    /// Create an empty mount table.
    pub fn with_config(config: VfsConfig) -> Self {
        Self {
            mounts: RwLock::new(Vec::new()),
            fallthrough: AtomicBool::new(config.fallthrough),
            verbose: AtomicI32::new(verbosity_from_env().unwrap_or(0)),
            last_errno: AtomicI32::new(0),
            remote_config: config.remote,
            remote: Mutex::new(None),
        }
    }

    /// Mount `backend` under `prefix`, ahead of every existing mount.
    ///
    /// `None` or an empty prefix matches every path.
    pub fn register(&self, prefix: Option<&str>, kind: MountKind, backend: Arc<dyn VfsOps>) {
        self.refresh_verbosity();
        let prefix = prefix.filter(|p| !p.is_empty()).map(str::to_owned);
        route_event!(self, prefix = prefix.as_deref().unwrap_or(""), %kind, "mounted");
        self.mounts.write().insert(
            0,
            Mount {
                prefix,
                kind,
                backend,
            },
        );
    }

    /// Mount a host directory.
    pub fn add_path(&self, prefix: Option<&str>, dir: &str) {
        self.register(prefix, MountKind::Path, Arc::new(LocalBackend::new(dir)));
    }

    /// Index and mount a tar archive.
    pub fn add_archive(&self, prefix: Option<&str>, archive: impl AsRef<Path>) -> VfsResult<()> {
        let backend = ArchiveBackend::load(archive)?;
        self.register(prefix, MountKind::Archive, Arc::new(backend));
        Ok(())
    }

    /// Mount a remote base URL fetched through `transport`.
    ///
    /// The first URL mount starts the table's download pool and creates
    /// the cache directory.
    pub fn add_url(
        &self,
        prefix: Option<&str>,
        base_url: &str,
        transport: Arc<dyn Transport>,
    ) -> VfsResult<()> {
        let shared = self.remote_shared()?;
        let backend = RemoteBackend::new(base_url, shared.pool, shared.cache, transport)?;
        self.register(prefix, MountKind::Url, Arc::new(backend));
        Ok(())
    }

    /// Mount a remote base URL over HTTP(S).
    #[cfg(feature = "http")]
    pub fn add_http(&self, prefix: Option<&str>, base_url: &str) -> VfsResult<()> {
        let transport = crate::transport::HttpTransport::new()
            .map_err(|e| super::VfsError::Io(std::io::Error::other(e)))?;
        self.add_url(prefix, base_url, Arc::new(transport))
    }

    /// Mount a caller-supplied backend.
    pub fn add_user(&self, prefix: Option<&str>, backend: impl VfsOps + 'static) {
        self.register(prefix, MountKind::User, Arc::new(backend));
    }

    /// Remove every mount.
    ///
    /// Files already open keep their backend alive until closed.
    pub fn clear(&self) {
        self.refresh_verbosity();
        let removed = std::mem::take(&mut *self.mounts.write());
        route_event!(self, count = removed.len(), "cleared mounts");
        drop(removed);
    }

    pub fn fallthrough(&self) -> bool {
        self.fallthrough.load(Ordering::Relaxed)
    }

    pub fn set_fallthrough(&self, enabled: bool) {
        self.refresh_verbosity();
        self.fallthrough.store(enabled, Ordering::Relaxed);
    }

    /// Current mounts, highest priority first.
    pub fn list_mounts(&self) -> Vec<MountInfo> {
        self.mounts.read().iter().map(Mount::info).collect()
    }

    /// errno-style code of the most recent failed [`open`](Self::open), 0
    /// if none has failed.
    pub fn last_errno(&self) -> i32 {
        self.last_errno.load(Ordering::Relaxed)
    }

    /// Routing verbosity, as last read from `ASSETFS_VERBOSE`.
    pub fn verbosity(&self) -> i32 {
        self.verbose.load(Ordering::Relaxed)
    }

    fn refresh_verbosity(&self) {
        if let Some(level) = verbosity_from_env() {
            self.verbose.store(level, Ordering::Relaxed);
        }
    }

    /// Open an asset.
    pub fn open(&self, path: &str) -> VfsResult<AssetFile> {
        self.refresh_verbosity();
        let result = self.route(path);
        if let Err(e) = &result {
            self.last_errno.store(e.errno(), Ordering::Relaxed);
        }
        result
    }

    fn route(&self, path: &str) -> VfsResult<AssetFile> {
        // Snapshot the candidates so slow backends (downloads) don't hold
        // the table lock.
        let candidates: Vec<(Option<String>, MountKind, Arc<dyn VfsOps>, String)> = self
            .mounts
            .read()
            .iter()
            .filter_map(|m| {
                m.strip(path).map(|name| {
                    (m.prefix.clone(), m.kind, Arc::clone(&m.backend), name.to_owned())
                })
            })
            .collect();

        for (prefix, kind, backend, name) in candidates {
            let prefix = prefix.as_deref().unwrap_or("");
            match backend.open(&name) {
                Ok(ops) => {
                    route_event!(self, path, prefix, %kind, "opened through mount");
                    return Ok(AssetFile::from_mount(ops, kind, backend));
                }
                Err(e) if self.fallthrough() => {
                    route_event!(self, path, prefix, %kind, error = %e, "mount failed, falling through");
                }
                Err(e) => {
                    route_event!(self, path, prefix, %kind, error = %e, "mount failed");
                    return Err(e);
                }
            }
        }

        let file = LocalFile::open(Path::new(path))?;
        route_event!(self, path, "opened from host filesystem");
        Ok(AssetFile::from_host(Box::new(file)))
    }

    fn remote_shared(&self) -> VfsResult<RemoteShared> {
        let mut slot = self.remote.lock();
        if let Some(shared) = slot.as_ref() {
            return Ok(shared.clone());
        }

        let cache = CacheDir::in_temp_dir(&self.remote_config.cache_dir)?;
        let pool = WorkerPool::new(self.remote_config.max_threads)?;
        debug!(
            threads = pool.num_threads(),
            cache = %cache.root().display(),
            "started download pool"
        );
        let shared = RemoteShared {
            pool: Arc::new(pool),
            cache: Arc::new(cache),
        };
        *slot = Some(shared.clone());
        Ok(shared)
    }
}
