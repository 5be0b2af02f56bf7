//! Asset virtual filesystem.
//!
//! Programs open assets by logical path through a [`MountTable`]. Each mount
//! binds an optional path prefix to a source: a host directory, a tar
//! archive, a remote base URL (downloaded in the background into an
//! on-disk cache), or any caller-supplied [`VfsOps`] implementation.
//! Whatever serves the path, the caller gets the same [`AssetFile`] handle.
//!
//! ```no_run
//! use assetfs_vfs::MountTable;
//!
//! let table = MountTable::new();
//! table.add_archive(Some("data"), "data.tar")?;
//! table.add_path(Some("shaders"), "/usr/share/game/shaders");
//!
//! let mut file = table.open("data/img/foo.jpg")?;
//! let mut bytes = Vec::new();
//! file.read_to_end(&mut bytes)?;
//! # Ok::<(), assetfs_vfs::VfsError>(())
//! ```

pub mod config;
pub mod tar;
pub mod transport;
pub mod vfs;

pub use config::{RemoteConfig, VfsConfig};
pub use transport::{Transport, TransportError};
#[cfg(feature = "http")]
pub use transport::HttpTransport;
pub use vfs::{AssetFile, FileOps, MountInfo, MountKind, MountTable, VfsError, VfsOps, VfsResult};
