//! Integration tests for remora over TCP
//!
//! Each test starts a server on an ephemeral port and drives it with the
//! client library.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use remora_client::RemoteFiles;
use remora_kernel::{FileService, ServiceConfig};
use remora_server::{FileServer, ServerConfig};
use remora_types::{Errno, OpenMode, Whence};

/// Start a server on an ephemeral port and return its address and service.
async fn start_server(service: ServiceConfig) -> (SocketAddr, Arc<FileService>) {
    start_with(ServerConfig {
        service,
        ..ServerConfig::ephemeral()
    })
    .await
}

async fn start_with(config: ServerConfig) -> (SocketAddr, Arc<FileService>) {
    let server = FileServer::bind(config).await.unwrap();
    let addr = server.local_addr().unwrap();
    let service = Arc::clone(server.service());

    tokio::spawn(async move {
        if let Err(e) = server.run().await {
            tracing::error!("Server error: {}", e);
        }
    });

    (addr, service)
}

async fn connect(addr: SocketAddr) -> RemoteFiles {
    RemoteFiles::connect(addr).await.expect("connect failed")
}

fn path_in(dir: &TempDir, name: &str) -> String {
    dir.path().join(name).to_string_lossy().into_owned()
}

/// Poll until `check` passes; session teardown runs after the socket closes.
async fn eventually(mut check: impl FnMut() -> bool) {
    for _ in 0..100 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

#[tokio::test]
async fn test_round_trip() {
    let dir = TempDir::new().unwrap();
    let (addr, _) = start_server(ServiceConfig::default()).await;
    let mut client = connect(addr).await;
    let path = path_in(&dir, "round.txt");

    let fd = client.open(Some(&path), OpenMode::Create).await.unwrap();
    assert!(fd > 1000);
    assert_eq!(client.write(fd, b"over the wire").await.unwrap(), 13);
    assert_eq!(client.lseek(fd, 0, Whence::FromStart).await.unwrap(), 0);

    let (n, data) = client.read(fd, 13).await.unwrap();
    assert_eq!(n, 13);
    assert_eq!(data, b"over the wire");

    let (n, data) = client.read(fd, 13).await.unwrap();
    assert_eq!((n, data.len()), (0, 0));

    assert_eq!(client.close(fd).await.unwrap(), 0);
    assert_eq!(client.close(fd).await.unwrap(), Errno::EBADF.as_neg());
}

#[tokio::test]
async fn test_error_codes_over_the_wire() {
    let dir = TempDir::new().unwrap();
    let (addr, service) = start_server(ServiceConfig::default()).await;
    let mut client = connect(addr).await;
    let missing = path_in(&dir, "missing");
    let dir_path = dir.path().to_string_lossy().into_owned();

    assert_eq!(client.open(None, OpenMode::Read).await.unwrap(), -22);
    assert_eq!(client.open(Some(&missing), OpenMode::Read).await.unwrap(), -2);
    assert_eq!(client.open(Some(&missing), OpenMode::Write).await.unwrap(), -2);
    assert_eq!(client.open(Some(&dir_path), OpenMode::Write).await.unwrap(), -21);
    assert_eq!(client.open_raw(Some(&missing), 77).await.unwrap(), -22);
    assert_eq!(client.unlink(Some(&missing)).await.unwrap(), -2);
    assert_eq!(client.unlink(Some(&dir_path)).await.unwrap(), -21);
    assert_eq!(client.unlink(None).await.unwrap(), -2);
    assert!(service.table().is_empty());
    assert!(dir.path().is_dir());

    let dir_fd = client.open(Some(&dir_path), OpenMode::Read).await.unwrap();
    assert_eq!(client.read(dir_fd, 8).await.unwrap().0, -21);
    assert_eq!(client.write(dir_fd, b"x").await.unwrap(), -21);
    assert_eq!(client.lseek(dir_fd, 0, Whence::FromEnd).await.unwrap(), -21);
    assert_eq!(client.close(dir_fd).await.unwrap(), 0);
}

#[tokio::test]
async fn test_exclusive_create_preserves_content() {
    let dir = TempDir::new().unwrap();
    let (addr, _) = start_server(ServiceConfig::default()).await;
    let mut client = connect(addr).await;
    let path = path_in(&dir, "exclusive.txt");

    let fd = client.open(Some(&path), OpenMode::CreateNew).await.unwrap();
    client.write(fd, b"first").await.unwrap();
    client.close(fd).await.unwrap();

    assert_eq!(client.open(Some(&path), OpenMode::CreateNew).await.unwrap(), -17);
    assert_eq!(std::fs::read(&path).unwrap(), b"first");
}

#[tokio::test]
async fn test_read_only_and_bad_buffer() {
    let dir = TempDir::new().unwrap();
    let (addr, _) = start_server(ServiceConfig::default()).await;
    let mut client = connect(addr).await;
    let path = path_in(&dir, "ro.txt");
    std::fs::write(&path, "0123456789").unwrap();

    let fd = client.open(Some(&path), OpenMode::Read).await.unwrap();
    assert_eq!(client.write(fd, b"no").await.unwrap(), -9);
    assert_eq!(client.read_into(fd, None).await.unwrap().0, -14);
    assert_eq!(client.lseek(fd, 0, Whence::FromEnd).await.unwrap(), 10);
    assert_eq!(client.read(fd, 4).await.unwrap().0, 0);
    assert_eq!(client.lseek_raw(fd, 0, 9).await.unwrap(), -22);
}

#[tokio::test]
async fn test_stat() {
    let dir = TempDir::new().unwrap();
    let (addr, _) = start_server(ServiceConfig::default()).await;
    let mut client = connect(addr).await;
    let path = path_in(&dir, "attr.txt");
    std::fs::write(&path, "abc").unwrap();

    let (code, attr) = client.stat(Some(&path)).await.unwrap();
    assert_eq!(code, 0);
    let attr = attr.unwrap();
    assert_eq!(attr.size, 3);
    assert!(!attr.is_dir());

    assert_eq!(client.stat(Some(&path_in(&dir, "nope"))).await.unwrap(), (-2, None));
}

#[tokio::test]
async fn test_descriptor_survives_disconnect_by_default() {
    let dir = TempDir::new().unwrap();
    let (addr, service) = start_server(ServiceConfig::default()).await;
    let path = path_in(&dir, "shared.txt");

    let fd = {
        let mut first = connect(addr).await;
        let fd = first.open(Some(&path), OpenMode::Create).await.unwrap();
        first.write(fd, b"persisted").await.unwrap();
        fd
    };

    let mut second = connect(addr).await;
    assert_eq!(second.lseek(fd, 0, Whence::FromStart).await.unwrap(), 0);
    assert_eq!(second.read(fd, 64).await.unwrap().1, b"persisted");
    assert_eq!(second.close(fd).await.unwrap(), 0);
    assert!(service.table().is_empty());
}

#[tokio::test]
async fn test_disconnect_closes_descriptors_when_configured() {
    let dir = TempDir::new().unwrap();
    let (addr, service) = start_server(ServiceConfig {
        close_on_session_end: true,
        ..ServiceConfig::default()
    })
    .await;

    {
        let mut client = connect(addr).await;
        for name in ["a", "b", "c"] {
            let fd = client.open(Some(&path_in(&dir, name)), OpenMode::Create).await.unwrap();
            assert!(fd > 1000);
        }
        assert_eq!(service.table().len(), 3);
    }

    eventually(|| service.table().is_empty()).await;
}

#[tokio::test]
async fn test_rooted_server_confines_paths() {
    let dir = TempDir::new().unwrap();
    let (addr, _) = start_server(ServiceConfig::rooted(dir.path())).await;
    let mut client = connect(addr).await;

    let fd = client.open(Some("/inside.txt"), OpenMode::Create).await.unwrap();
    assert!(fd > 1000);
    assert!(Path::new(&path_in(&dir, "inside.txt")).exists());
    assert_eq!(
        client.open(Some("../escape.txt"), OpenMode::Create).await.unwrap(),
        Errno::EACCES.as_neg()
    );
}

#[tokio::test]
async fn test_rooted_server_refuses_symlink_escape() {
    let dir = TempDir::new().unwrap();
    let outside = TempDir::new().unwrap();
    let secret = outside.path().join("secret.txt");
    std::fs::write(&secret, "outside-root").unwrap();
    std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();

    let (addr, _) = start_server(ServiceConfig::rooted(dir.path())).await;
    let mut client = connect(addr).await;

    let denied = Errno::EACCES.as_neg();
    assert_eq!(client.open(Some("/link/secret.txt"), OpenMode::Read).await.unwrap(), denied);
    assert_eq!(client.unlink(Some("/link/secret.txt")).await.unwrap(), denied);
    assert_eq!(client.get_dir_tree(Some("/link")).await.unwrap(), (denied, None));
    assert!(secret.exists());
}

#[tokio::test]
async fn test_directory_listing_over_the_wire() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("docs/drafts")).unwrap();
    std::fs::write(dir.path().join("notes.txt"), "n").unwrap();
    let (addr, _) = start_server(ServiceConfig::default()).await;
    let mut client = connect(addr).await;
    let root = dir.path().to_string_lossy().into_owned();

    let fd = client.open(Some(&root), OpenMode::Read).await.unwrap();
    let mut names = Vec::new();
    let mut base = 0;
    loop {
        let (bytes, next, entries) = client.get_dir_entries(fd, 32, base).await.unwrap();
        assert!(bytes >= 0);
        if bytes == 0 {
            break;
        }
        names.extend(entries.into_iter().map(|e| e.name));
        base = next;
    }
    assert_eq!(names, [".", "..", "docs", "notes.txt"]);

    let file_fd = client.open(Some(&path_in(&dir, "notes.txt")), OpenMode::Read).await.unwrap();
    assert_eq!(
        client.get_dir_entries(file_fd, 4096, 0).await.unwrap(),
        (i64::from(Errno::ENOTDIR.as_neg()), 0, Vec::new())
    );

    let (code, tree) = client.get_dir_tree(Some(&root)).await.unwrap();
    assert_eq!(code, 0);
    let tree = tree.unwrap();
    assert_eq!(tree.name, root);
    assert_eq!(tree.dir_count(), 3);
    assert!(tree.child("docs").and_then(|d| d.child("drafts")).is_some());
    assert_eq!(client.get_dir_tree(Some(&path_in(&dir, "nope"))).await.unwrap(), (-2, None));
}

#[tokio::test]
async fn test_oversized_reply_becomes_io_error() {
    let dir = TempDir::new().unwrap();
    for i in 0..64 {
        let name = format!("a-rather-long-directory-name-{i:03}");
        std::fs::create_dir(dir.path().join(name)).unwrap();
    }
    let (addr, _) = start_with(ServerConfig {
        max_frame_length: 1024,
        service: ServiceConfig {
            max_transfer: 512,
            ..ServiceConfig::default()
        },
        ..ServerConfig::ephemeral()
    })
    .await;
    let mut client = connect(addr).await;
    let root = dir.path().to_string_lossy().into_owned();

    assert_eq!(client.get_dir_tree(Some(&root)).await.unwrap(), (-5, None));

    // The connection survives and keeps serving.
    let (code, attr) = client.stat(Some(&root)).await.unwrap();
    assert_eq!(code, 0);
    assert!(attr.unwrap().is_dir());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_clients_are_isolated() {
    const CLIENTS: usize = 16;

    let dir = Arc::new(TempDir::new().unwrap());
    let (addr, service) = start_server(ServiceConfig::default()).await;

    let mut tasks = Vec::new();
    for i in 0..CLIENTS {
        let dir = Arc::clone(&dir);
        tasks.push(tokio::spawn(async move {
            let mut client = connect(addr).await;
            let path = path_in(&dir, &format!("client-{i}.txt"));
            let payload = format!("client {i} says hello ").repeat(64).into_bytes();

            let fd = client.open(Some(&path), OpenMode::CreateNew).await.unwrap();
            assert!(fd > 1000);
            for chunk in payload.chunks(100) {
                assert_eq!(client.write(fd, chunk).await.unwrap(), chunk.len() as i64);
            }
            assert_eq!(client.lseek(fd, 0, Whence::FromStart).await.unwrap(), 0);
            let (n, data) = client.read(fd, payload.len() as u64).await.unwrap();
            assert_eq!(n as usize, payload.len());
            assert_eq!(data, payload);
            assert_eq!(client.close(fd).await.unwrap(), 0);
            fd
        }));
    }

    let mut fds = Vec::new();
    for task in tasks {
        fds.push(task.await.unwrap());
    }
    fds.sort_unstable();
    fds.dedup();
    assert_eq!(fds.len(), CLIENTS, "descriptors must be unique");
    assert!(service.table().is_empty());
}
