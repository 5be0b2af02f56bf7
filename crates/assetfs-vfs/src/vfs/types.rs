//! VFS types shared by the mount table and backends.

use std::fmt;
use std::io::SeekFrom;

use super::error::{VfsError, VfsResult};

/// What kind of backend a mount routes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MountKind {
    /// A host directory.
    Path,
    /// An indexed tar archive.
    Archive,
    /// A remote base URL with a download cache.
    Url,
    /// A caller-supplied backend.
    User,
}

impl MountKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MountKind::Path => "path",
            MountKind::Archive => "archive",
            MountKind::Url => "url",
            MountKind::User => "user",
        }
    }
}

impl fmt::Display for MountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Information about a mount point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountInfo {
    /// The path prefix, `None` for a mount that matches everything.
    pub prefix: Option<String>,
    /// The backend kind.
    pub kind: MountKind,
}

/// C-style seek origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Set,
    Cur,
    End,
}

impl Whence {
    /// Map `0`/`1`/`2` (`SEEK_SET`/`SEEK_CUR`/`SEEK_END`).
    pub fn from_raw(whence: i32) -> VfsResult<Self> {
        match whence {
            0 => Ok(Whence::Set),
            1 => Ok(Whence::Cur),
            2 => Ok(Whence::End),
            other => Err(VfsError::invalid_argument(format!(
                "unknown seek origin {other}"
            ))),
        }
    }

    /// Combine with an offset into a [`SeekFrom`].
    pub fn seek_from(self, offset: i64) -> VfsResult<SeekFrom> {
        match self {
            Whence::Set => u64::try_from(offset)
                .map(SeekFrom::Start)
                .map_err(|_| VfsError::invalid_argument(format!("negative position {offset}"))),
            Whence::Cur => Ok(SeekFrom::Current(offset)),
            Whence::End => Ok(SeekFrom::End(offset)),
        }
    }
}

/// Resolve `pos` against a cursor at `current` in a stream of `size` bytes.
///
/// Negative results are rejected; positions past `size` are allowed.
pub(crate) fn resolve_seek(pos: SeekFrom, current: u64, size: u64) -> VfsResult<u64> {
    let (base, delta) = match pos {
        SeekFrom::Start(offset) => return Ok(offset),
        SeekFrom::Current(delta) => (current, delta),
        SeekFrom::End(delta) => (size, delta),
    };
    let target = i128::from(base) + i128::from(delta);
    u64::try_from(target)
        .map_err(|_| VfsError::invalid_argument(format!("seek to invalid position {target}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whence_from_raw() {
        assert_eq!(Whence::from_raw(0).unwrap(), Whence::Set);
        assert_eq!(Whence::from_raw(1).unwrap(), Whence::Cur);
        assert_eq!(Whence::from_raw(2).unwrap(), Whence::End);
        assert!(matches!(
            Whence::from_raw(3),
            Err(VfsError::InvalidArgument(_))
        ));
        assert!(Whence::from_raw(-1).is_err());
    }

    #[test]
    fn test_whence_set_rejects_negative() {
        assert!(Whence::Set.seek_from(-1).is_err());
        assert_eq!(Whence::Set.seek_from(7).unwrap(), SeekFrom::Start(7));
        assert_eq!(Whence::End.seek_from(-2).unwrap(), SeekFrom::End(-2));
    }

    #[test]
    fn test_resolve_seek() {
        assert_eq!(resolve_seek(SeekFrom::Start(3), 10, 20).unwrap(), 3);
        assert_eq!(resolve_seek(SeekFrom::Current(-4), 10, 20).unwrap(), 6);
        assert_eq!(resolve_seek(SeekFrom::End(0), 10, 20).unwrap(), 20);
        assert_eq!(resolve_seek(SeekFrom::End(5), 10, 20).unwrap(), 25);
        assert!(resolve_seek(SeekFrom::Current(-11), 10, 20).is_err());
        assert!(resolve_seek(SeekFrom::End(-21), 10, 20).is_err());
    }

    #[test]
    fn test_mount_kind_display() {
        assert_eq!(MountKind::Archive.to_string(), "archive");
        assert_eq!(MountKind::User.as_str(), "user");
    }
}
