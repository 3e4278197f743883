#![allow(missing_docs)]

mod support;

use libvfs::{File, FileSystem};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use support::MockDbx;
use vfs_be_dropbox::DbxFs;
use vfs_conformance::{Conformance, Flags};

fn fs_with(mock: Arc<MockDbx>) -> Arc<DbxFs> {
    Arc::new(DbxFs::with_client(libvfs::FsOptions::new(), mock))
}

#[tokio::test]
async fn conformance() {
    let fs: Arc<dyn FileSystem> = fs_with(Arc::new(MockDbx::default()));
    Conformance::new(fs, "", "/scratch/").with_flags(Flags::default()).run_all().await;
}

#[tokio::test]
async fn move_between_namespaces_falls_back_to_stream_copy() {
    // Two accounts: same scheme, distinct clients. The authority is empty
    // for both, so the fixtures get distinct roots.
    let east: Arc<dyn FileSystem> = fs_with(Arc::new(MockDbx::default()));
    let mut east = Conformance::new(east, "", "/east/");
    let west: Arc<dyn FileSystem> = fs_with(Arc::new(MockDbx::default()));
    let mut west = Conformance::new(west, "", "/west/");
    east.move_between(&mut west).await;
}

#[tokio::test]
async fn large_content_goes_through_an_upload_session() {
    let mock = Arc::new(MockDbx::default());
    let options = libvfs::FsOptions::new().with_chunk_size(32);
    let fs = Arc::new(DbxFs::with_client(options, mock.clone()).with_session_threshold(64));

    let mut file = fs.clone().file("", "/big/archive.bin").unwrap();
    let payload: Vec<u8> = (0..200u8).collect();
    file.write(&payload).await.unwrap();
    file.close().await.unwrap();

    assert_eq!(mock.session_starts.load(Ordering::SeqCst), 1);
    // 200 bytes in 32-byte chunks: one start, five full appends plus the
    // 8-byte tail, one empty finishing commit.
    assert_eq!(mock.session_appends.load(Ordering::SeqCst), 6);
    assert_eq!(mock.session_finishes.load(Ordering::SeqCst), 1);
    assert_eq!(mock.single_uploads.load(Ordering::SeqCst), 0);

    let mut back = fs.clone().file("", "/big/archive.bin").unwrap();
    let mut out = vec![0u8; 256];
    let mut seen = 0;
    loop {
        let n = back.read(&mut out[seen..]).await.unwrap();
        if n == 0 {
            break;
        }
        seen += n;
    }
    assert_eq!(&out[..seen], payload.as_slice());
}

#[tokio::test]
async fn small_content_uploads_single_shot() {
    let mock = Arc::new(MockDbx::default());
    let fs = fs_with(mock.clone());

    let mut file = fs.clone().file("", "/small/note.txt").unwrap();
    file.write(b"tiny").await.unwrap();
    file.close().await.unwrap();

    assert_eq!(mock.single_uploads.load(Ordering::SeqCst), 1);
    assert_eq!(mock.session_starts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn authority_must_be_empty() {
    let fs = fs_with(Arc::new(MockDbx::default()));
    assert!(fs.clone().file("user@host", "/x.txt").is_err());
    assert!(fs.file("", "/x.txt").is_ok());
}
