#![allow(missing_docs)]

//! Session lifecycle scenarios: idle reclaim, failure storms and the
//! connect budget, run against the in-memory client.

mod support;

use libvfs::{File, FileSystem, Location};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use support::MockBuilder;
use vfs_be_sftp::SftpFs;

const AUTHORITY: &str = "tester@mock-host:22";

fn fs_with(builder: MockBuilder, auto_disconnect: u64) -> (Arc<SftpFs>, Arc<MockBuilder>) {
    let builder = Arc::new(builder);
    let options = libvfs::FsOptions::new().with_auto_disconnect(auto_disconnect).with_connect_timeout(2);
    let fs = Arc::new(SftpFs::with_client_builder(options, builder.clone()));
    (fs, builder)
}

#[tokio::test(start_paused = true)]
async fn idle_timer_reclaims_the_session() {
    let (fs, builder) = fs_with(MockBuilder::new(), 1);
    let loc = fs.clone().location(AUTHORITY, "/").unwrap();
    loc.list().await.unwrap();
    loc.list().await.unwrap();
    assert_eq!(builder.connects.load(Ordering::SeqCst), 1, "back-to-back operations share one session");

    // Sleep past the idle window; the timer must reclaim the session.
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(builder.disconnects.load(Ordering::SeqCst), 1);

    loc.list().await.unwrap();
    assert_eq!(builder.connects.load(Ordering::SeqCst), 2, "third operation reconnects");
}

#[tokio::test(start_paused = true)]
async fn concurrent_failure_storm_is_safe() {
    let (fs, builder) = fs_with(MockBuilder::new(), 10);
    builder.fail.store(true, Ordering::SeqCst);

    let mut tasks = Vec::new();
    for i in 0..10 {
        let fs = fs.clone();
        tasks.push(tokio::spawn(async move {
            let file = fs.file(AUTHORITY, &format!("/storm/{i}.txt")).unwrap();
            file.exists().await
        }));
    }
    for task in tasks {
        assert!(task.await.unwrap().is_err(), "every caller must surface an error");
    }
    assert_eq!(builder.connects.load(Ordering::SeqCst), 0);

    // The operations above re-armed the timer on the failed state; when
    // it fires there is no session, so nothing is closed.
    tokio::time::sleep(Duration::from_secs(11)).await;
    assert_eq!(builder.disconnects.load(Ordering::SeqCst), 0);

    // Once the host is reachable the same file system recovers.
    builder.fail.store(false, Ordering::SeqCst);
    let file = fs.clone().file(AUTHORITY, "/storm/after.txt").unwrap();
    assert!(!file.exists().await.unwrap());
    assert_eq!(builder.connects.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn connect_budget_bounds_unreachable_hosts() {
    let (fs, _builder) = fs_with(MockBuilder::new().with_delay(Duration::from_secs(60)), 10);
    let file = fs.clone().file("tester@192.0.2.1:22", "/x.txt").unwrap();

    let started = tokio::time::Instant::now();
    let err = file.exists().await.unwrap_err();
    assert_eq!(err.kind(), libvfs::ErrorKind::Connection);
    assert!(started.elapsed() <= Duration::from_secs(5), "failure must land within the budget plus skew");
}

#[tokio::test(start_paused = true)]
async fn close_does_not_tear_down_the_session() {
    let (fs, builder) = fs_with(MockBuilder::new(), 5);

    let mut file = fs.clone().file(AUTHORITY, "/keep/session.txt").unwrap();
    file.write(b"alive").await.unwrap();
    file.close().await.unwrap();

    // Another handle reuses the session as long as the idle window has
    // not elapsed.
    let other = fs.clone().file(AUTHORITY, "/keep/session.txt").unwrap();
    assert!(other.exists().await.unwrap());
    assert_eq!(builder.connects.load(Ordering::SeqCst), 1);
    assert_eq!(builder.disconnects.load(Ordering::SeqCst), 0);
}
