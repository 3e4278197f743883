#![allow(missing_docs)]

//! Copy and move across schemes: the generic stream engine carries bytes
//! between backends that share nothing but the trait contract.

use libvfs::{File, FileSystem};
use std::sync::Arc;
use vfs_be_fs::DiskFs;
use vfs_be_mem::MemFs;

async fn read_all(file: &mut dyn libvfs::File) -> Vec<u8> {
    let mut out = Vec::new();
    let mut buf = vec![0u8; 32 * 1024];
    loop {
        let n = file.read(&mut buf).await.unwrap();
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[..n]);
    }
    file.close().await.unwrap();
    out
}

#[tokio::test]
async fn copy_and_move_between_mem_and_disk() {
    let mem: Arc<dyn FileSystem> = Arc::new(MemFs::new());
    let disk: Arc<dyn FileSystem> = Arc::new(DiskFs::new());
    let scratch = tempfile::tempdir().unwrap();

    let payload: Vec<u8> = (0..256 * 1024u32).map(|i| (i % 251) as u8).collect();
    let mut src = mem.clone().file("cross-vol", "/outbox/report.bin").unwrap();
    src.write(&payload).await.unwrap();
    src.close().await.unwrap();

    // mem -> disk: schemes differ, so this is the buffered fallback.
    let disk_path = format!("{}/inbox/report.bin", scratch.path().display());
    let mut dst = disk.clone().file("", &disk_path).unwrap();
    src.copy_to_file(dst.as_mut()).await.unwrap();
    assert_eq!(read_all(dst.as_mut()).await, payload);
    assert!(src.exists().await.unwrap(), "copy must leave the source in place");

    // disk -> mem: move deletes the source after the stream lands.
    let mut back = mem.clone().file("cross-vol", "/inbox/report.bin").unwrap();
    dst.move_to_file(back.as_mut()).await.unwrap();
    assert!(!dst.exists().await.unwrap(), "move must remove the source");
    assert_eq!(read_all(back.as_mut()).await, payload);
}

#[tokio::test]
async fn cross_scheme_copy_refuses_a_moved_cursor() {
    let mem: Arc<dyn FileSystem> = Arc::new(MemFs::new());
    let disk: Arc<dyn FileSystem> = Arc::new(DiskFs::new());
    let scratch = tempfile::tempdir().unwrap();

    let mut src = mem.clone().file("cross-vol", "/outbox/partial.bin").unwrap();
    src.write(b"abcdef").await.unwrap();
    src.close().await.unwrap();

    let mut skip = [0u8; 2];
    src.read(&mut skip).await.unwrap();

    let mut dst = disk.clone().file("", &format!("{}/partial.bin", scratch.path().display())).unwrap();
    let err = src.copy_to_file(dst.as_mut()).await.unwrap_err();
    assert!(err.is_copy_refused());
    assert!(!dst.exists().await.unwrap());
}
