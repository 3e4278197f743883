#![allow(missing_docs)]

use libvfs::{File, Location};
use std::sync::Arc;
use vfs_be_fs::DiskFs;
use vfs_conformance::{Conformance, Flags};

fn suite(scratch: &tempfile::TempDir) -> Conformance {
    let fs: Arc<dyn libvfs::FileSystem> = Arc::new(DiskFs::new());
    let root = format!("{}/scratch/", scratch.path().display());
    Conformance::new(fs, "", root).with_flags(Flags::default())
}

#[tokio::test]
async fn conformance() {
    let scratch = tempfile::tempdir().unwrap();
    suite(&scratch).run_all().await;
}

#[tokio::test]
async fn move_between_roots() {
    let left = tempfile::tempdir().unwrap();
    let right = tempfile::tempdir().unwrap();
    suite(&left).move_between(&mut suite(&right)).await;
}

#[tokio::test]
async fn registry_round_trip() {
    vfs_be_fs::register();

    let scratch = tempfile::tempdir().unwrap();
    let uri = format!("file://{}/out/report.txt", scratch.path().display());
    let mut f = libvfs::registry::resolve_file(&uri).unwrap();
    f.write(b"totals").await.unwrap();
    f.close().await.unwrap();

    let dir = libvfs::registry::resolve_location(&format!("file://{}/out/", scratch.path().display())).unwrap();
    assert_eq!(dir.list().await.unwrap(), vec!["report.txt".to_string()]);
}
