//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

/// Builds ustar archives in memory.
#[derive(Default)]
pub struct TarBuilder {
    bytes: Vec<u8>,
}

impl TarBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a regular file. Paths longer than 100 bytes are split into the
    /// ustar prefix and name fields, with the `/` kept at the end of the
    /// prefix.
    pub fn file(mut self, path: &str, data: &[u8]) -> Self {
        let (prefix, name) = split_path(path);
        self.header(prefix, name, data.len() as u64, b'0');
        self.bytes.extend_from_slice(data);
        self.pad();
        self
    }

    /// Add a directory entry (size 0).
    pub fn dir(mut self, path: &str) -> Self {
        let (prefix, name) = split_path(path);
        self.header(prefix, name, 0, b'5');
        self
    }

    /// Append the two zero blocks that end an archive and return the bytes.
    pub fn finish(mut self) -> Vec<u8> {
        self.bytes.resize(self.bytes.len() + 1024, 0);
        self.bytes
    }

    /// Finish and write to `dir/name`.
    pub fn write(self, dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, self.finish()).unwrap();
        path
    }

    fn header(&mut self, prefix: &str, name: &str, size: u64, typeflag: u8) {
        let mut h = [0u8; 512];
        h[..name.len()].copy_from_slice(name.as_bytes());
        h[100..108].copy_from_slice(b"0000644\0");
        h[108..116].copy_from_slice(b"0000000\0");
        h[116..124].copy_from_slice(b"0000000\0");
        h[124..136].copy_from_slice(format!("{size:011o}\0").as_bytes());
        h[136..148].copy_from_slice(b"00000000000\0");
        h[156] = typeflag;
        h[257..263].copy_from_slice(b"ustar\0");
        h[263..265].copy_from_slice(b"00");
        h[345..345 + prefix.len()].copy_from_slice(prefix.as_bytes());

        // Checksum is computed with its own field set to spaces.
        h[148..156].fill(b' ');
        let sum: u32 = h.iter().map(|&b| u32::from(b)).sum();
        h[148..156].copy_from_slice(format!("{sum:06o}\0 ").as_bytes());

        self.bytes.extend_from_slice(&h);
    }

    fn pad(&mut self) {
        let len = self.bytes.len().div_ceil(512) * 512;
        self.bytes.resize(len, 0);
    }
}

fn split_path(path: &str) -> (&str, &str) {
    if path.len() <= 100 {
        return ("", path);
    }
    let split = path[..path.len() - 1]
        .rfind('/')
        .expect("long tar path needs a directory component");
    path.split_at(split + 1)
}

/// Read an asset to the end.
pub fn read_all(file: &mut assetfs_vfs::AssetFile) -> Vec<u8> {
    let mut buf = Vec::new();
    file.read_to_end(&mut buf).unwrap();
    buf
}
