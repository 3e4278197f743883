#![allow(dead_code)]

//! An in-memory SFTP client for exercising the backend without a server.
//!
//! Directories are explicit entries, like a real SFTP server's tree, and
//! opening a file with `create` fails when the parent directory is
//! missing, so parent vivification is actually exercised.

use async_trait::async_trait;
use libvfs::{Authority, Error, ErrorKind, FsOptions, Operation, Result};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use vfs_be_sftp::{ClientBuilder, EntryInfo, OpenMode, SftpClient, SftpHandle};

#[derive(Debug, Clone)]
enum Node {
    Dir,
    File { data: Vec<u8>, mtime: SystemTime },
}

/// Path (no trailing slash, `/` for the root) to node.
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
    Error::new(op, ErrorKind::NotFound, path.to_string())
}

/// Counting, failable session constructor around one shared tree.
#[derive(Debug)]
pub struct MockBuilder {
    tree: Tree,
    pub connects: Arc<AtomicUsize>,
    pub disconnects: Arc<AtomicUsize>,
    pub fail: Arc<AtomicBool>,
    pub connect_delay: Duration,
    /// Every `open` call in order: `(path, mode)`. Lets tests witness the
    /// write-mode selection and mode-upgrade sequences on the wire.
    pub opens: Arc<Mutex<Vec<(String, OpenMode)>>>,
}

impl MockBuilder {
    pub fn new() -> MockBuilder {
        MockBuilder {
            tree: new_tree(),
            connects: Arc::new(AtomicUsize::new(0)),
            disconnects: Arc::new(AtomicUsize::new(0)),
            fail: Arc::new(AtomicBool::new(false)),
            connect_delay: Duration::ZERO,
            opens: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> MockBuilder {
        self.connect_delay = delay;
        self
    }
}

impl Default for MockBuilder {
    fn default() -> Self {
        MockBuilder::new()
    }
}

#[async_trait]
impl ClientBuilder for MockBuilder {
    async fn build(&self, authority: &Authority, _options: &FsOptions) -> Result<Box<dyn SftpClient>> {
        if !self.connect_delay.is_zero() {
            tokio::time::sleep(self.connect_delay).await;
        }
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
            disconnects: self.disconnects.clone(),
            opens: self.opens.clone(),
        }))
    }
}

#[derive(Debug)]
struct MockClient {
    tree: Tree,
    disconnects: Arc<AtomicUsize>,
    opens: Arc<Mutex<Vec<(String, OpenMode)>>>,
}

#[async_trait]
impl SftpClient for MockClient {
    async fn stat(&self, path: &str) -> Result<EntryInfo> {
        let tree = self.tree.lock().unwrap();
        match tree.get(path) {
            Some(Node::Dir) => Ok(EntryInfo {
                size: 0,
                modified: Some(UNIX_EPOCH),
                is_dir: true,
            }),
            Some(Node::File { data, mtime }) => Ok(EntryInfo {
                size: data.len() as u64,
                modified: Some(*mtime),
                is_dir: false,
            }),
            None => Err(not_found(Operation::Exists, path)),
        }
    }

    async fn read_dir(&self, path: &str) -> Result<Vec<(String, EntryInfo)>> {
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
            let info = match node {
                Node::Dir => EntryInfo {
                    size: 0,
                    modified: Some(UNIX_EPOCH),
                    is_dir: true,
                },
                Node::File { data, mtime } => EntryInfo {
                    size: data.len() as u64,
                    modified: Some(*mtime),
                    is_dir: false,
                },
            };
            entries.push((name, info));
        }
        Ok(entries)
    }

    async fn open(&self, path: &str, mode: OpenMode) -> Result<Box<dyn SftpHandle>> {
        self.opens.lock().unwrap().push((path.to_string(), mode));
        let mut tree = self.tree.lock().unwrap();
        let exists = matches!(tree.get(path), Some(Node::File { .. }));
        if !exists {
            if !mode.create {
                return Err(not_found(Operation::Open, path));
            }
            // A real server refuses to create a file in a missing
            // directory; vivification must have happened first.
            if !matches!(tree.get(&parent_of(path)), Some(Node::Dir)) {
                return Err(not_found(Operation::Open, path));
            }
            tree.insert(
                path.to_string(),
                Node::File {
                    data: Vec::new(),
                    mtime: SystemTime::now(),
                },
            );
        } else if mode.truncate {
            tree.insert(
                path.to_string(),
                Node::File {
                    data: Vec::new(),
                    mtime: SystemTime::now(),
                },
            );
        }
        Ok(Box::new(MockHandle {
            tree: self.tree.clone(),
            path: path.to_string(),
            pos: 0,
        }))
    }

    async fn mkdir_all(&self, path: &str) -> Result<()> {
        let mut tree = self.tree.lock().unwrap();
        let mut prefix = String::new();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            prefix.push('/');
            prefix.push_str(segment);
            tree.entry(prefix.clone()).or_insert(Node::Dir);
        }
        Ok(())
    }

    async fn remove(&self, path: &str) -> Result<()> {
        let mut tree = self.tree.lock().unwrap();
        match tree.remove(path) {
            Some(Node::File { .. }) => Ok(()),
            Some(dir) => {
                tree.insert(path.to_string(), dir);
                Err(Error::new(Operation::Delete, ErrorKind::Io, format!("{path} is a directory")))
            }
            None => Err(not_found(Operation::Delete, path)),
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

    async fn chmod(&self, _path: &str, _mode: u32) -> Result<()> {
        Ok(())
    }

    async fn chtimes(&self, path: &str, _atime: u64, mtime: u64) -> Result<()> {
        let mut tree = self.tree.lock().unwrap();
        match tree.get_mut(path) {
            Some(Node::File { mtime: stored, .. }) => {
                *stored = UNIX_EPOCH + Duration::from_secs(mtime);
                Ok(())
            }
            _ => Err(not_found(Operation::Touch, path)),
        }
    }

    async fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug)]
struct MockHandle {
    tree: Tree,
    path: String,
    pos: u64,
}

#[async_trait]
impl SftpHandle for MockHandle {
    async fn read(&mut self, max: usize) -> Result<Vec<u8>> {
        let tree = self.tree.lock().unwrap();
        match tree.get(&self.path) {
            Some(Node::File { data, .. }) => {
                let start = (self.pos as usize).min(data.len());
                let end = (start + max).min(data.len());
                let chunk = data[start..end].to_vec();
                drop(tree);
                self.pos += chunk.len() as u64;
                Ok(chunk)
            }
            _ => Err(not_found(Operation::Read, &self.path)),
        }
    }

    async fn write_all(&mut self, incoming: Vec<u8>) -> Result<()> {
        let mut tree = self.tree.lock().unwrap();
        match tree.get_mut(&self.path) {
            Some(Node::File { data, mtime }) => {
                let start = self.pos as usize;
                if data.len() < start {
                    data.resize(start, 0);
                }
                let overlap = (data.len() - start).min(incoming.len());
                data[start..start + overlap].copy_from_slice(&incoming[..overlap]);
                data.extend_from_slice(&incoming[overlap..]);
                *mtime = SystemTime::now();
                drop(tree);
                self.pos += incoming.len() as u64;
                Ok(())
            }
            _ => Err(not_found(Operation::Write, &self.path)),
        }
    }

    async fn seek(&mut self, pos: u64) -> Result<()> {
        self.pos = pos;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
