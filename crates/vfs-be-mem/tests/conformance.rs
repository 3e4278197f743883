#![allow(missing_docs)]

use libvfs::{File, Location};
use std::sync::Arc;
use vfs_be_mem::MemFs;
use vfs_conformance::{Conformance, Flags};

fn suite(volume: &str) -> Conformance {
    let fs: Arc<dyn libvfs::FileSystem> = Arc::new(MemFs::new());
    Conformance::new(fs, volume, "/scratch/").with_flags(Flags {
        location_exists_requires_entry: true,
        ..Flags::default()
    })
}

#[tokio::test]
async fn conformance() {
    suite("conformance-vol").run_all().await;
}

#[tokio::test]
async fn cross_volume_move_falls_back_to_stream_copy() {
    let mut east = suite("vol-east");
    let mut west = suite("vol-west");
    east.move_between(&mut west).await;
}

#[tokio::test]
async fn registry_round_trip() {
    vfs_be_mem::register();

    let mut f = libvfs::registry::resolve_file("mem://registry-vol/notes/today.txt").unwrap();
    f.write(b"remember the milk").await.unwrap();
    f.close().await.unwrap();

    let loc = libvfs::registry::resolve_location("mem://registry-vol/notes/").unwrap();
    assert_eq!(loc.list().await.unwrap(), vec!["today.txt".to_string()]);

    assert!(libvfs::registry::resolve_file("gopher://x/y").is_err());
}
