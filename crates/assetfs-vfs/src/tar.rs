//! Tar archive index.
//!
//! Archives are scanned once when mounted. The index records the path, data
//! offset and size of every member; reads then seek straight to the member's
//! data in the shared archive file.
//!
//! The scan is a heuristic over 512-byte blocks: any block whose size field
//! parses as a positive octal number is treated as a member header. GNU
//! long-name and pax extended headers are not interpreted and show up as
//! ordinary entries.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::ops::Range;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::vfs::{VfsError, VfsResult};

/// Tar block size.
pub const BLOCK_SIZE: u64 = 512;

const NAME: Range<usize> = 0..100;
const SIZE: Range<usize> = 124..136;
const MAGIC: Range<usize> = 257..263;
const PREFIX: Range<usize> = 345..500;

/// One indexed archive member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TarEntry {
    /// Full member path.
    pub path: String,
    /// Byte offset of the member's data in the archive.
    pub offset: u64,
    /// Data length in bytes.
    pub size: u64,
}

/// An indexed tar archive.
///
/// Owns the archive file; member cursors share it through a mutex and
/// reposition it on every read.
#[derive(Debug)]
pub struct TarIndex {
    path: PathBuf,
    file: Mutex<File>,
    entries: Vec<TarEntry>,
}

impl TarIndex {
    /// Open and index the archive at `path`.
    pub fn load(path: impl AsRef<Path>) -> VfsResult<Self> {
        let path = path.as_ref();
        let shown = path.display().to_string();
        let mut file = File::open(path).map_err(|e| VfsError::from_io(shown.clone(), e))?;

        let entries = scan(&mut file)?;
        if entries.is_empty() {
            return Err(VfsError::invalid_archive(shown, "no entries found"));
        }
        debug!(archive = %shown, entries = entries.len(), "indexed tar archive");

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
            entries,
        })
    }

    /// Path the archive was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All entries, in archive order.
    pub fn entries(&self) -> &[TarEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a member by exact path.
    pub fn find(&self, path: &str) -> Option<&TarEntry> {
        self.entries.iter().find(|e| e.path == path)
    }

    /// Single read of archive bytes at `offset`.
    pub(crate) fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        loop {
            match file.read(buf) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                other => return other,
            }
        }
    }
}

/// Scan `reader` from its start, returning every member found.
///
/// A member whose data runs past the end of the input stops the scan; the
/// members indexed before it are kept.
pub fn scan<R: Read + Seek>(reader: &mut R) -> VfsResult<Vec<TarEntry>> {
    let mut entries = Vec::new();
    let mut header = [0u8; BLOCK_SIZE as usize];
    let mut offset = 0u64;

    reader.seek(SeekFrom::Start(0))?;
    loop {
        match reader.read_exact(&mut header) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => {
                warn!(offset, error = %e, "tar scan stopped on read error");
                break;
            }
        }
        offset += BLOCK_SIZE;

        let Some(size) = parse_octal(&header[SIZE]).filter(|&size| size > 0) else {
            continue;
        };
        let path = entry_path(&header);

        if !data_present(reader, offset, size) {
            warn!(path = %path, offset, size, "tar archive truncated");
            break;
        }

        let padded = size.div_ceil(BLOCK_SIZE) * BLOCK_SIZE;
        entries
            .try_reserve(1)
            .map_err(|_| VfsError::out_of_memory("tar entry table"))?;
        entries.push(TarEntry { path, offset, size });

        offset += padded;
        if reader.seek(SeekFrom::Start(offset)).is_err() {
            break;
        }
    }

    Ok(entries)
}

/// Whether the last data byte of a member is readable.
fn data_present<R: Read + Seek>(reader: &mut R, offset: u64, size: u64) -> bool {
    let mut probe = [0u8; 1];
    reader.seek(SeekFrom::Start(offset + size - 1)).is_ok() && reader.read_exact(&mut probe).is_ok()
}

/// Parse an octal header field.
///
/// Leading whitespace and a `+` sign are skipped; digits are consumed up to
/// the first non-octal byte. Returns `None` if there are no digits, the
/// value is negative, or it overflows.
pub fn parse_octal(field: &[u8]) -> Option<u64> {
    let mut bytes = field
        .iter()
        .copied()
        .skip_while(|b| b.is_ascii_whitespace())
        .peekable();

    match bytes.peek() {
        Some(b'-') => return None,
        Some(b'+') => {
            bytes.next();
        }
        _ => {}
    }

    let mut value: Option<u64> = None;
    for b in bytes.take_while(|b| (b'0'..=b'7').contains(b)) {
        let digit = u64::from(b - b'0');
        value = Some(value.unwrap_or(0).checked_mul(8)?.checked_add(digit)?);
    }
    value
}

/// Member path from a header: for ustar headers, the prefix field followed
/// directly by the name field. No separator is inserted, so archives must
/// store the trailing `/` in the prefix.
fn entry_path(header: &[u8]) -> String {
    let name = nul_terminated(&header[NAME]);
    if !header[MAGIC].starts_with(b"ustar") {
        return String::from_utf8_lossy(name).into_owned();
    }

    let prefix = nul_terminated(&header[PREFIX]);
    let mut path = Vec::with_capacity(prefix.len() + name.len());
    path.extend_from_slice(prefix);
    path.extend_from_slice(name);
    String::from_utf8_lossy(&path).into_owned()
}

fn nul_terminated(field: &[u8]) -> &[u8] {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    &field[..end]
}
