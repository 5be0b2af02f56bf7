//! URL mounts against a scripted in-process transport.

mod common;

use std::collections::HashMap;
use std::io::{self, SeekFrom};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, bounded};
use parking_lot::Mutex;
use url::Url;

use assetfs_cas::CacheKey;
use assetfs_vfs::config::RemoteConfig;
use assetfs_vfs::{
    AssetFile, MountKind, MountTable, Transport, TransportError, VfsConfig, VfsError,
};
use common::read_all;

/// Serves fixed bodies by URL; everything else is a 404.
#[derive(Default)]
struct FakeServer {
    bodies: Mutex<HashMap<String, Vec<u8>>>,
    requests: Mutex<Vec<String>>,
    /// Held after the first chunk until a message arrives.
    gate: Option<Receiver<()>>,
    fail_after_first_chunk: bool,
}

impl FakeServer {
    fn with(bodies: &[(&str, &[u8])]) -> Self {
        let server = Self::default();
        for (url, body) in bodies {
            server.bodies.lock().insert(url.to_string(), body.to_vec());
        }
        server
    }

    fn gated(mut self) -> (Self, Sender<()>) {
        let (tx, rx) = bounded(1);
        self.gate = Some(rx);
        (self, tx)
    }
}

impl Transport for FakeServer {
    fn fetch(
        &self,
        url: &Url,
        sink: &mut dyn FnMut(&[u8]) -> io::Result<()>,
    ) -> Result<(), TransportError> {
        self.requests.lock().push(url.to_string());
        let Some(body) = self.bodies.lock().get(url.as_str()).cloned() else {
            return Err(TransportError::Status(404));
        };

        let (head, tail) = body.split_at(body.len().min(4));
        sink(head).map_err(TransportError::Sink)?;

        if let Some(gate) = &self.gate {
            let _ = gate.recv_timeout(Duration::from_secs(10));
        }
        if self.fail_after_first_chunk {
            return Err(TransportError::Request("connection reset".into()));
        }
        for chunk in tail.chunks(5) {
            sink(chunk).map_err(TransportError::Sink)?;
        }
        Ok(())
    }
}

fn table(cache: &Path) -> MountTable {
    MountTable::with_config(VfsConfig {
        fallthrough: true,
        remote: RemoteConfig {
            max_threads: 2,
            cache_dir: cache.to_path_buf(),
        },
    })
}

fn cache_file(cache: &Path, url: &str) -> std::path::PathBuf {
    cache.join(CacheKey::for_url(url).file_name())
}

#[test]
fn test_download_through_prefixed_mount() {
    let tmp = tempfile::tempdir().unwrap();
    let server = Arc::new(FakeServer::with(&[(
        "http://www.gnu.org/licenses/lgpl.txt",
        &b"GNU LESSER GENERAL PUBLIC LICENSE"[..],
    )]));
    let table = table(tmp.path());
    table
        .add_url(Some("gnu"), "http://www.gnu.org/licenses", server.clone())
        .unwrap();

    let mut file = table.open("gnu/lgpl.txt").unwrap();
    assert_eq!(file.kind(), Some(MountKind::Url));
    assert_eq!(read_all(&mut file), b"GNU LESSER GENERAL PUBLIC LICENSE");
    file.close().unwrap();

    assert_eq!(
        *server.requests.lock(),
        vec!["http://www.gnu.org/licenses/lgpl.txt".to_string()]
    );
    let cached = cache_file(tmp.path(), "http://www.gnu.org/licenses/lgpl.txt");
    assert_eq!(
        std::fs::read(cached).unwrap(),
        b"GNU LESSER GENERAL PUBLIC LICENSE"
    );
}

#[test]
fn test_read_waits_for_transfer_to_finish() {
    let tmp = tempfile::tempdir().unwrap();
    let body: Vec<u8> = (0..100u8).collect();
    let (server, release) =
        FakeServer::with(&[("http://assets.test/big.bin", &body[..])]).gated();
    let table = table(tmp.path());
    table
        .add_url(None, "http://assets.test/", Arc::new(server))
        .unwrap();

    // open returns once the first chunk is in.
    let mut file = table.open("big.bin").unwrap();

    let released = Arc::new(AtomicBool::new(false));
    let releaser = {
        let released = Arc::clone(&released);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(200));
            released.store(true, Ordering::SeqCst);
            release.send(()).unwrap();
        })
    };

    let mut first = [0u8; 1];
    assert_eq!(file.read(&mut first).unwrap(), 1);
    assert!(
        released.load(Ordering::SeqCst),
        "read returned before the download completed"
    );
    assert_eq!(first[0], 0);
    assert_eq!(read_all(&mut file), &body[1..]);
    releaser.join().unwrap();
}

/// Opens `big.bin` on a gated server and returns the handle along with a
/// thread that releases the gate after a delay, and the flag it sets first.
fn open_gated(
    cache: &Path,
    body: &[u8],
) -> (AssetFile, MountTable, Arc<AtomicBool>, thread::JoinHandle<()>) {
    let (server, release) =
        FakeServer::with(&[("http://assets.test/big.bin", body)]).gated();
    let table = table(cache);
    table
        .add_url(None, "http://assets.test/", Arc::new(server))
        .unwrap();
    let file = table.open("big.bin").unwrap();

    let released = Arc::new(AtomicBool::new(false));
    let releaser = {
        let released = Arc::clone(&released);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(200));
            released.store(true, Ordering::SeqCst);
            release.send(()).unwrap();
        })
    };
    (file, table, released, releaser)
}

#[test]
fn test_seek_waits_for_transfer_to_finish() {
    let tmp = tempfile::tempdir().unwrap();
    let body: Vec<u8> = (0..100u8).collect();
    let (mut file, _table, released, releaser) = open_gated(tmp.path(), &body);

    assert_eq!(file.seek(SeekFrom::End(-10)).unwrap(), 90);
    assert!(
        released.load(Ordering::SeqCst),
        "seek returned before the download completed"
    );
    assert_eq!(read_all(&mut file), &body[90..]);
    releaser.join().unwrap();
}

#[test]
fn test_close_waits_for_transfer_instead_of_aborting() {
    let tmp = tempfile::tempdir().unwrap();
    let body: Vec<u8> = (0..100u8).collect();
    let (file, _table, released, releaser) = open_gated(tmp.path(), &body);

    file.close().unwrap();
    assert!(
        released.load(Ordering::SeqCst),
        "close returned before the download completed"
    );
    // The transfer ran to completion and the cache entry stays.
    let cached = cache_file(tmp.path(), "http://assets.test/big.bin");
    assert_eq!(std::fs::read(cached).unwrap(), body);
    releaser.join().unwrap();
}

#[test]
fn test_failed_download_leaves_no_cache_file() {
    let tmp = tempfile::tempdir().unwrap();
    let table = table(tmp.path());
    table
        .add_url(None, "http://assets.test/", Arc::new(FakeServer::default()))
        .unwrap();

    let err = table.open("missing.png").unwrap_err();
    assert!(matches!(err, VfsError::NotFound(_)));
    assert_eq!(table.last_errno(), libc::ENOENT);
    assert!(!cache_file(tmp.path(), "http://assets.test/missing.png").exists());
}

#[test]
fn test_failure_after_first_chunk_cleans_up_on_close() {
    let tmp = tempfile::tempdir().unwrap();
    let mut server = FakeServer::with(&[("http://assets.test/flaky.bin", &b"0123456789"[..])]);
    server.fail_after_first_chunk = true;
    let table = table(tmp.path());
    table
        .add_url(None, "http://assets.test/", Arc::new(server))
        .unwrap();

    let mut file = table.open("flaky.bin").unwrap();
    let mut buf = [0u8; 16];
    assert!(matches!(file.read(&mut buf), Err(VfsError::NotFound(_))));
    file.close().unwrap();
    assert!(!cache_file(tmp.path(), "http://assets.test/flaky.bin").exists());
}

#[test]
fn test_failed_url_falls_through_to_directory() {
    let tmp = tempfile::tempdir().unwrap();
    let local = tmp.path().join("local");
    std::fs::create_dir(&local).unwrap();
    std::fs::write(local.join("logo.png"), b"local logo").unwrap();

    let table = table(&tmp.path().join("cache"));
    table.add_path(None, local.to_str().unwrap());
    table
        .add_url(None, "http://assets.test/", Arc::new(FakeServer::default()))
        .unwrap();

    let mut file = table.open("logo.png").unwrap();
    assert_eq!(file.kind(), Some(MountKind::Path));
    assert_eq!(read_all(&mut file), b"local logo");

    table.set_fallthrough(false);
    assert!(matches!(
        table.open("logo.png"),
        Err(VfsError::NotFound(_))
    ));
}

#[test]
fn test_many_concurrent_downloads() {
    let tmp = tempfile::tempdir().unwrap();
    let urls: Vec<(String, Vec<u8>)> = (0..16)
        .map(|i| {
            (
                format!("http://assets.test/file{i}.txt"),
                format!("contents of file {i}").into_bytes(),
            )
        })
        .collect();
    let server = FakeServer::default();
    for (url, body) in &urls {
        server.bodies.lock().insert(url.clone(), body.clone());
    }

    let table = Arc::new(table(tmp.path()));
    table
        .add_url(None, "http://assets.test/", Arc::new(server))
        .unwrap();

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let table = Arc::clone(&table);
            thread::spawn(move || {
                let mut file = table.open(&format!("file{i}.txt")).unwrap();
                read_all(&mut file)
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.join().unwrap(), urls[i].1);
    }
}

#[test]
fn test_bad_base_url_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let table = table(tmp.path());
    assert!(matches!(
        table.add_url(None, "not a url", Arc::new(FakeServer::default())),
        Err(VfsError::InvalidArgument(_))
    ));
    assert!(table.list_mounts().is_empty());
}
