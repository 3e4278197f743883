#![allow(dead_code)]

//! An in-memory Dropbox API double.
//!
//! Mirrors the service's observable behavior: folders are real entries,
//! uploads create missing parent folders, server-side copy and move work
//! without data transfer, and upload sessions accumulate chunks.

use async_trait::async_trait;
use libvfs::{Error, ErrorKind, Operation, Result};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;
use vfs_be_dropbox::{DbxClient, ObjectInfo};

#[derive(Debug, Clone)]
enum Node {
    Folder,
    File { data: Vec<u8>, mtime: SystemTime },
}

#[derive(Debug, Default)]
struct State {
    tree: BTreeMap<String, Node>,
    sessions: BTreeMap<String, Vec<u8>>,
    next_session: u64,
}

/// Counting in-memory API client.
#[derive(Debug, Default)]
pub struct MockDbx {
    state: Mutex<State>,
    pub session_starts: AtomicUsize,
    pub session_appends: AtomicUsize,
    pub session_finishes: AtomicUsize,
    pub single_uploads: AtomicUsize,
}

fn parent_of(path: &str) -> String {
    match path.trim_end_matches('/').rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(i) => path[..i].to_string(),
    }
}

fn not_found(op: Operation, path: &str) -> Error {
    Error::new(op, ErrorKind::NotFound, format!("409: path/not_found: {path}"))
}

fn vivify_parents(tree: &mut BTreeMap<String, Node>, path: &str) {
    let mut prefix = String::new();
    let parent = parent_of(path);
    for segment in parent.split('/').filter(|s| !s.is_empty()) {
        prefix.push('/');
        prefix.push_str(segment);
        tree.entry(prefix.clone()).or_insert(Node::Folder);
    }
}

fn norm(path: &str) -> String {
    if path == "/" {
        "/".to_string()
    } else {
        path.trim_end_matches('/').to_string()
    }
}

impl MockDbx {
    fn info(path: &str, node: &Node) -> ObjectInfo {
        let name = path.rsplit('/').next().unwrap_or_default().to_string();
        match node {
            Node::Folder => ObjectInfo {
                name,
                size: 0,
                modified: None,
                is_dir: true,
            },
            Node::File { data, mtime } => ObjectInfo {
                name,
                size: data.len() as u64,
                modified: Some(*mtime),
                is_dir: false,
            },
        }
    }
}

#[async_trait]
impl DbxClient for MockDbx {
    async fn metadata(&self, path: &str) -> Result<ObjectInfo> {
        let path = norm(path);
        let state = self.state.lock().unwrap();
        match state.tree.get(&path) {
            Some(node) => Ok(MockDbx::info(&path, node)),
            None => Err(not_found(Operation::Exists, &path)),
        }
    }

    async fn list_folder(&self, path: &str) -> Result<Vec<ObjectInfo>> {
        let dir = norm(path);
        let state = self.state.lock().unwrap();
        if dir != "/" && !matches!(state.tree.get(&dir), Some(Node::Folder)) {
            return Err(not_found(Operation::List, &dir));
        }
        Ok(state
            .tree
            .iter()
            .filter(|(entry, _)| *entry != &dir && parent_of(entry) == dir)
            .map(|(entry, node)| MockDbx::info(entry, node))
            .collect())
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>> {
        let path = norm(path);
        let state = self.state.lock().unwrap();
        match state.tree.get(&path) {
            Some(Node::File { data, .. }) => Ok(data.clone()),
            _ => Err(not_found(Operation::Read, &path)),
        }
    }

    async fn upload(&self, path: &str, data: Vec<u8>) -> Result<()> {
        self.single_uploads.fetch_add(1, Ordering::SeqCst);
        let path = norm(path);
        let mut state = self.state.lock().unwrap();
        vivify_parents(&mut state.tree, &path);
        state.tree.insert(
            path,
            Node::File {
                data,
                mtime: SystemTime::now(),
            },
        );
        Ok(())
    }

    async fn upload_start(&self, chunk: Vec<u8>) -> Result<String> {
        self.session_starts.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        state.next_session += 1;
        let id = format!("session-{}", state.next_session);
        state.sessions.insert(id.clone(), chunk);
        Ok(id)
    }

    async fn upload_append(&self, session: &str, offset: u64, chunk: Vec<u8>) -> Result<()> {
        self.session_appends.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        let buffer = state
            .sessions
            .get_mut(session)
            .ok_or_else(|| Error::new(Operation::Write, ErrorKind::Protocol, "unknown upload session"))?;
        if buffer.len() as u64 != offset {
            return Err(Error::new(Operation::Write, ErrorKind::Protocol, "upload session offset mismatch"));
        }
        buffer.extend_from_slice(&chunk);
        Ok(())
    }

    async fn upload_finish(&self, session: &str, offset: u64, path: &str, chunk: Vec<u8>) -> Result<()> {
        self.session_finishes.fetch_add(1, Ordering::SeqCst);
        let path = norm(path);
        let mut state = self.state.lock().unwrap();
        let mut data = state
            .sessions
            .remove(session)
            .ok_or_else(|| Error::new(Operation::Close, ErrorKind::Protocol, "unknown upload session"))?;
        if data.len() as u64 != offset {
            return Err(Error::new(Operation::Close, ErrorKind::Protocol, "upload session offset mismatch"));
        }
        data.extend_from_slice(&chunk);
        vivify_parents(&mut state.tree, &path);
        state.tree.insert(
            path,
            Node::File {
                data,
                mtime: SystemTime::now(),
            },
        );
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let path = norm(path);
        let mut state = self.state.lock().unwrap();
        match state.tree.remove(&path) {
            Some(_) => Ok(()),
            None => Err(not_found(Operation::Delete, &path)),
        }
    }

    async fn copy_entry(&self, from: &str, to: &str) -> Result<()> {
        let from = norm(from);
        let to = norm(to);
        let mut state = self.state.lock().unwrap();
        let node = state.tree.get(&from).cloned().ok_or_else(|| not_found(Operation::CopyToFile, &from))?;
        vivify_parents(&mut state.tree, &to);
        state.tree.insert(to, node);
        Ok(())
    }

    async fn move_entry(&self, from: &str, to: &str) -> Result<()> {
        let from = norm(from);
        let to = norm(to);
        let mut state = self.state.lock().unwrap();
        let node = state.tree.remove(&from).ok_or_else(|| not_found(Operation::MoveToFile, &from))?;
        vivify_parents(&mut state.tree, &to);
        state.tree.insert(to, node);
        Ok(())
    }

    async fn create_folder(&self, path: &str) -> Result<()> {
        let path = norm(path);
        let mut state = self.state.lock().unwrap();
        vivify_parents(&mut state.tree, &path);
        state.tree.insert(path, Node::Folder);
        Ok(())
    }
}
