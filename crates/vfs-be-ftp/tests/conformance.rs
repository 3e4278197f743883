#![allow(missing_docs)]

mod support;

use libvfs::{FileSystem, Location};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use support::MockBuilder;
use vfs_be_ftp::FtpFs;
use vfs_conformance::{Conformance, Flags};

fn suite(authority: &str) -> Conformance {
    let fs: Arc<dyn FileSystem> = Arc::new(FtpFs::with_client_builder(libvfs::FsOptions::new(), Arc::new(MockBuilder::new())));
    Conformance::new(fs, authority, "/srv/").with_flags(Flags {
        // MDTM reports second resolution.
        coarse_timestamps: true,
        ..Flags::default()
    })
}

#[tokio::test]
async fn conformance() {
    suite("uploader@ftp-mock:21").run_all().await;
}

#[tokio::test]
async fn anonymous_authority_is_accepted() {
    suite("ftp-mock").file_io_sequences().await;
}

#[tokio::test]
async fn cross_authority_move_falls_back_to_stream_copy() {
    let mut east = suite("uploader@ftp-east:21");
    let mut west = suite("uploader@ftp-west:21");
    east.move_between(&mut west).await;
}

#[tokio::test(start_paused = true)]
async fn idle_timer_sends_quit() {
    let builder = Arc::new(MockBuilder::new());
    let options = libvfs::FsOptions::new().with_auto_disconnect(1);
    let fs = Arc::new(FtpFs::with_client_builder(options, builder.clone()));

    let loc = fs.clone().location("u@ftp-mock:21", "/").unwrap();
    loc.list().await.unwrap();
    loc.list().await.unwrap();
    assert_eq!(builder.connects.load(Ordering::SeqCst), 1);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(builder.quits.load(Ordering::SeqCst), 1, "idle teardown must send QUIT");

    loc.list().await.unwrap();
    assert_eq!(builder.connects.load(Ordering::SeqCst), 2);
}
