//! Cache keys: 128-bit digests of the source URL.

use std::fmt;
use std::str::FromStr;

use crate::error::{CasError, CasResult};

/// Identifies a cached download.
///
/// A BLAKE3 digest of the fully resolved URL, truncated to 128 bits. Its
/// lowercase hex form (32 characters) is the cache file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey([u8; CacheKey::LEN]);

impl CacheKey {
    /// Digest length in bytes.
    pub const LEN: usize = 16;

    /// Key for a resolved URL.
    pub fn for_url(url: &str) -> Self {
        let digest = blake3::hash(url.as_bytes());
        let mut bytes = [0u8; Self::LEN];
        bytes.copy_from_slice(&digest.as_bytes()[..Self::LEN]);
        Self(bytes)
    }

    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; Self::LEN] {
        &self.0
    }

    /// File name used for this key inside a [`CacheDir`](crate::CacheDir).
    pub fn file_name(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name())
    }
}

impl FromStr for CacheKey {
    type Err = CasError;

    fn from_str(s: &str) -> CasResult<Self> {
        let mut bytes = [0u8; Self::LEN];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| CasError::InvalidKey(s.to_string()))?;
        Ok(Self(bytes))
    }
}
