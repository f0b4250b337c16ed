//! End-to-end transfers between two real endpoints on loopback UDP.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use newt::config::Config;
use newt::endpoint::Endpoint;
use newt::net;
use newt::resource::ResourceRegistry;
use newt_drive::client::DriveClient;
use newt_drive::client_resource::ClientResource;
use newt_drive::resource::DriveResource;

struct Rig {
  server: Arc<Endpoint>,
  client: Arc<Endpoint>,
  drive: DriveClient,
  server_root: PathBuf,
  downloads: PathBuf,
  _dirs: (tempfile::TempDir, tempfile::TempDir),
}

impl Drop for Rig {
  fn drop(&mut self) {
    self.client.shutdown();
    self.server.shutdown();
  }
}

fn rig() -> Rig {
  // short poll timeouts keep shutdown quick
  let cfg = Config { recv_timeout: Duration::from_millis(100),
                     driver_period: Duration::from_millis(100),
                     ..Config::default() };

  let server_dir = tempfile::tempdir().unwrap();
  let client_dir = tempfile::tempdir().unwrap();
  let server_root = server_dir.path().to_path_buf();
  let downloads = client_dir.path().to_path_buf();

  let server_sock = net::bind("127.0.0.1:0", cfg.recv_timeout).unwrap();
  let server_addr = newt::net::Socket::local_addr(&server_sock).unwrap();

  let server = {
    let resource = Arc::new(DriveResource::new("share_drive", &server_root));
    let mut registry = ResourceRegistry::new();
    registry.add(resource.clone());
    registry.set_default(resource);
    Endpoint::new(cfg, Arc::new(server_sock), registry)
  };
  server.start();

  let client_sock = net::bind("127.0.0.1:0", cfg.recv_timeout).unwrap();
  let client = {
    let resource = Arc::new(ClientResource::new("downloads", &downloads));
    let mut registry = ResourceRegistry::new();
    registry.add(resource.clone());
    registry.set_default(resource);
    Endpoint::new(cfg, Arc::new(client_sock), registry)
  };
  client.start();

  let drive = DriveClient::new(client.clone(), server_addr);

  Rig { server,
        client,
        drive,
        server_root,
        downloads,
        _dirs: (server_dir, client_dir) }
}

fn eventually(what: &str, cond: impl Fn() -> bool) {
  let deadline = Instant::now() + Duration::from_secs(10);
  while Instant::now() < deadline {
    if cond() {
      return;
    }
    std::thread::sleep(Duration::from_millis(20));
  }
  panic!("timed out waiting for {}", what);
}

fn read_eventually(path: &Path, expected_len: usize) -> Vec<u8> {
  eventually("file contents", || {
    std::fs::metadata(path).map(|m| m.len() as usize == expected_len)
                           .unwrap_or(false)
  });
  std::fs::read(path).unwrap()
}

#[test]
fn catalog_sync_lists_the_drive() {
  let rig = rig();
  std::fs::write(rig.server_root.join("hello.txt"), b"hello\n").unwrap();
  std::fs::create_dir_all(rig.server_root.join("docs")).unwrap();

  rig.drive.refresh_catalog().unwrap();

  let content = rig.drive.content();
  assert!(content.contains(&"hello.txt".to_string()), "content: {:?}", content);
  assert!(rig.drive.folders().contains(&"docs".to_string()));
}

#[test]
fn single_block_download() {
  let rig = rig();
  std::fs::write(rig.server_root.join("hello.txt"), b"hello\n").unwrap();

  rig.drive.download("hello.txt", None).unwrap();

  assert_eq!(std::fs::read(rig.downloads.join("hello.txt")).unwrap(), b"hello\n");
}

#[test]
fn multi_block_download() {
  let rig = rig();
  let body: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();
  std::fs::write(rig.server_root.join("body.bin"), &body).unwrap();

  rig.drive.download("body.bin", None).unwrap();

  assert_eq!(std::fs::read(rig.downloads.join("body.bin")).unwrap(), body);
}

#[test]
fn two_block_upload() {
  let rig = rig();
  let local_dir = tempfile::tempdir().unwrap();
  let local = local_dir.path().join("body.bin");
  let body = vec![42u8; 1500];
  std::fs::write(&local, &body).unwrap();

  rig.drive.upload(local.to_str().unwrap(), "/").unwrap();

  let uploaded = read_eventually(&rig.server_root.join("body.bin"), body.len());
  assert_eq!(uploaded, body);
}

#[test]
fn upload_conflict_leaves_existing_file() {
  let rig = rig();
  std::fs::write(rig.server_root.join("body.bin"), b"already here").unwrap();

  let local_dir = tempfile::tempdir().unwrap();
  let local = local_dir.path().join("body.bin");
  std::fs::write(&local, vec![1u8; 64]).unwrap();

  rig.drive.upload(local.to_str().unwrap(), "/").unwrap();

  // give the exchange a moment to settle, then confirm nothing changed
  std::thread::sleep(Duration::from_millis(300));
  assert_eq!(std::fs::read(rig.server_root.join("body.bin")).unwrap(),
             b"already here");
}

#[test]
fn rename_move_delete_roundtrip() {
  let rig = rig();
  std::fs::write(rig.server_root.join("old.txt"), b"data").unwrap();
  std::fs::create_dir_all(rig.server_root.join("archive")).unwrap();

  rig.drive.rename("old.txt", "new.txt").unwrap();
  eventually("rename", || rig.server_root.join("new.txt").is_file());

  rig.drive.relocate("new.txt", "archive").unwrap();
  eventually("move", || rig.server_root.join("archive/new.txt").is_file());

  rig.drive.delete("archive/new.txt").unwrap();
  eventually("delete", || !rig.server_root.join("archive/new.txt").exists());
}

#[test]
fn folder_download_unzips() {
  let rig = rig();
  let folder = rig.server_root.join("bundle");
  std::fs::create_dir_all(folder.join("nested")).unwrap();
  std::fs::write(folder.join("a.txt"), b"alpha").unwrap();
  std::fs::write(folder.join("nested/b.txt"), b"beta").unwrap();

  rig.drive.download("bundle", None).unwrap();

  eventually("unzipped folder", || {
    rig.downloads.join("bundle/nested/b.txt").is_file()
  });
  assert_eq!(std::fs::read(rig.downloads.join("bundle/a.txt")).unwrap(), b"alpha");
  assert!(!rig.downloads.join("bundle.zip").exists());
}
