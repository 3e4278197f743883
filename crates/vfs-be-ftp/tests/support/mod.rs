#![allow(dead_code)]

//! An in-memory FTP client for exercising the backend without a server.
//!
//! Mirrors observable FTP behavior: directories are explicit, `STOR`
//! into a missing directory fails, and `MDTM` reports second-resolution
//! timestamps.

use async_trait::async_trait;
use libvfs::{Authority, Error, ErrorKind, FsOptions, Operation, Result};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use vfs_be_ftp::{ClientBuilder, DirEntry, FtpClient};

#[derive(Debug, Clone)]
enum Node {
    Dir,
    File { data: Vec<u8>, mtime: SystemTime },
}

type Tree = Arc<Mutex<BTreeMap<String, Node>>>;

fn new_tree() -> Tree {
    let mut tree = BTreeMap::new();
    tree.insert("/".to_string(), Node::Dir);
    Arc::new(Mutex::new(tree))
}

fn parent_of(path: &str) -> String {
    match path.trim_end_matches('/').rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(i) => path[..i].to_string(),
    }
}

fn not_found(op: Operation, path: &str) -> Error {
    Error::new(op, ErrorKind::NotFound, format!("550 {path}: No such file or directory"))
}

fn mdtm_now() -> SystemTime {
    let secs = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
    UNIX_EPOCH + Duration::from_secs(secs)
}

/// Counting, failable session constructor around one shared tree.
#[derive(Debug)]
pub struct MockBuilder {
    tree: Tree,
    pub connects: Arc<AtomicUsize>,
    pub quits: Arc<AtomicUsize>,
    pub fail: Arc<AtomicBool>,
}

impl MockBuilder {
    pub fn new() -> MockBuilder {
        MockBuilder {
            tree: new_tree(),
            connects: Arc::new(AtomicUsize::new(0)),
            quits: Arc::new(AtomicUsize::new(0)),
            fail: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl Default for MockBuilder {
    fn default() -> Self {
        MockBuilder::new()
    }
}

#[async_trait]
impl ClientBuilder for MockBuilder {
    async fn build(&self, authority: &Authority, _options: &FsOptions) -> Result<Box<dyn FtpClient>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::new(
                Operation::Connect,
                ErrorKind::Connection,
                format!("{} unreachable", authority.host()),
            ));
        }
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockClient {
            tree: self.tree.clone(),
            quits: self.quits.clone(),
        }))
    }
}

#[derive(Debug)]
struct MockClient {
    tree: Tree,
    quits: Arc<AtomicUsize>,
}

#[async_trait]
impl FtpClient for MockClient {
    async fn list(&self, path: &str) -> Result<Vec<DirEntry>> {
        let dir = if path == "/" { "/" } else { path.trim_end_matches('/') };
        let tree = self.tree.lock().unwrap();
        if !matches!(tree.get(dir), Some(Node::Dir)) {
            return Err(not_found(Operation::List, dir));
        }
        let mut entries = Vec::new();
        for (entry_path, node) in tree.iter() {
            if entry_path == dir || parent_of(entry_path) != dir {
                continue;
            }
            let name = entry_path.rsplit('/').next().unwrap_or_default().to_string();
            entries.push(match node {
                Node::Dir => DirEntry { name, size: 0, is_dir: true },
                Node::File { data, .. } => DirEntry {
                    name,
                    size: data.len() as u64,
                    is_dir: false,
                },
            });
        }
        Ok(entries)
    }

    async fn retr_from(&self, path: &str, offset: u64) -> Result<Vec<u8>> {
        let tree = self.tree.lock().unwrap();
        match tree.get(path) {
            Some(Node::File { data, .. }) => {
                let start = (offset as usize).min(data.len());
                Ok(data[start..].to_vec())
            }
            _ => Err(not_found(Operation::Read, path)),
        }
    }

    async fn stor_from(&self, path: &str, data: Vec<u8>, offset: u64) -> Result<u64> {
        if offset != 0 {
            return Err(Error::bare(Operation::Write, ErrorKind::Unsupported));
        }
        let mut tree = self.tree.lock().unwrap();
        if !matches!(tree.get(&parent_of(path)), Some(Node::Dir)) {
            return Err(not_found(Operation::Write, path));
        }
        let len = data.len() as u64;
        tree.insert(path.to_string(), Node::File { data, mtime: mdtm_now() });
        Ok(len)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let mut tree = self.tree.lock().unwrap();
        match tree.get(path) {
            Some(Node::File { .. }) => {
                tree.remove(path);
                Ok(())
            }
            _ => Err(not_found(Operation::Delete, path)),
        }
    }

    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        let mut tree = self.tree.lock().unwrap();
        match tree.remove(from) {
            Some(node) => {
                tree.insert(to.to_string(), node);
                Ok(())
            }
            None => Err(not_found(Operation::MoveToFile, from)),
        }
    }

    async fn make_dir(&self, path: &str) -> Result<()> {
        let mut tree = self.tree.lock().unwrap();
        tree.entry(path.to_string()).or_insert(Node::Dir);
        Ok(())
    }

    async fn size(&self, path: &str) -> Result<Option<u64>> {
        let tree = self.tree.lock().unwrap();
        match tree.get(path) {
            Some(Node::File { data, .. }) => Ok(Some(data.len() as u64)),
            _ => Err(not_found(Operation::Size, path)),
        }
    }

    async fn mdtm(&self, path: &str) -> Result<Option<SystemTime>> {
        let tree = self.tree.lock().unwrap();
        match tree.get(path) {
            Some(Node::File { mtime, .. }) => Ok(Some(*mtime)),
            _ => Err(not_found(Operation::LastModified, path)),
        }
    }

    async fn quit(&self) {
        self.quits.fetch_add(1, Ordering::SeqCst);
    }
}
