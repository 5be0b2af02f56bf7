//! Content-addressed cache directory for downloaded assets.
//!
//! Remote assets are cached on disk under a name derived from the URL they
//! were fetched from, so every open of the same URL lands on the same file:
//!
//! ```text
//! $TMPDIR/assetfs_cache/
//! ├── 3f1c0e8a9b2d4c6e8f0a1b2c3d4e5f60   ← CacheKey::for_url("http://host/a.png")
//! └── 9a8b7c6d5e4f30211203948576abcdef   ← CacheKey::for_url("http://host/b.glsl")
//! ```
//!
//! The layout is flat and there is no index file: the existence of a
//! correctly named file is the only persisted fact. Nothing here evicts or
//! expires entries.

mod dir;
mod error;
mod key;

pub use dir::CacheDir;
pub use error::{CasError, CasResult};
pub use key::CacheKey;
