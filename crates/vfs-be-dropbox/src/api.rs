//! The narrow client interface between the VFS semantics and the Dropbox
//! HTTP API, plus the wire DTOs.

use async_trait::async_trait;
use libvfs::Result;
use serde::Deserialize;
use std::fmt;
use std::time::SystemTime;

/// Metadata of one remote entry.
#[derive(Debug, Clone)]
pub struct ObjectInfo {
    /// Basename of the entry.
    pub name: String,
    /// Size in bytes; zero for folders.
    pub size: u64,
    /// Server-side modification time, for files.
    pub modified: Option<SystemTime>,
    /// True for folders.
    pub is_dir: bool,
}

/// The authenticated API client shared by all handles of one file
/// system. Stateless on the wire: every call is one HTTP exchange, so
/// there is no session to keep alive and no idle timer here.
#[async_trait]
pub trait DbxClient: Send + Sync + fmt::Debug {
    /// Metadata for a path.
    async fn metadata(&self, path: &str) -> Result<ObjectInfo>;

    /// Entries directly under a folder.
    async fn list_folder(&self, path: &str) -> Result<Vec<ObjectInfo>>;

    /// Downloads a file in full.
    async fn download(&self, path: &str) -> Result<Vec<u8>>;

    /// Uploads a file in one shot, replacing existing content. Parent
    /// folders are created by the service.
    async fn upload(&self, path: &str, data: Vec<u8>) -> Result<()>;

    /// Starts a chunked upload session with the first chunk; returns the
    /// session id.
    async fn upload_start(&self, chunk: Vec<u8>) -> Result<String>;

    /// Appends a chunk at `offset` to an upload session.
    async fn upload_append(&self, session: &str, offset: u64, chunk: Vec<u8>) -> Result<()>;

    /// Commits an upload session to `path` with the final chunk.
    async fn upload_finish(&self, session: &str, offset: u64, path: &str, chunk: Vec<u8>) -> Result<()>;

    /// Deletes a file or folder.
    async fn delete(&self, path: &str) -> Result<()>;

    /// Server-side copy. The destination must not exist.
    async fn copy_entry(&self, from: &str, to: &str) -> Result<()>;

    /// Server-side move. The destination must not exist.
    async fn move_entry(&self, from: &str, to: &str) -> Result<()>;

    /// Creates a folder.
    async fn create_folder(&self, path: &str) -> Result<()>;
}

/// One entry as the API reports it.
#[derive(Debug, Deserialize)]
pub(crate) struct EntryDto {
    #[serde(rename = ".tag")]
    pub tag: String,
    pub name: String,
    pub size: Option<u64>,
    pub server_modified: Option<String>,
}

impl EntryDto {
    pub(crate) fn into_info(self) -> ObjectInfo {
        let modified = self
            .server_modified
            .as_deref()
            .and_then(|stamp| chrono::DateTime::parse_from_rfc3339(stamp).ok())
            .map(SystemTime::from);
        ObjectInfo {
            name: self.name,
            size: self.size.unwrap_or(0),
            modified,
            is_dir: self.tag == "folder",
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListFolderDto {
    pub entries: Vec<EntryDto>,
    pub cursor: String,
    pub has_more: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SessionDto {
    pub session_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn entry_dto_maps_to_info() {
        let dto: EntryDto = serde_json::from_str(
            r#"{".tag": "file", "name": "a.txt", "path_display": "/a.txt", "size": 11, "server_modified": "2026-03-01T12:30:00Z"}"#,
        )
        .unwrap();
        let info = dto.into_info();
        assert_eq!(info.name, "a.txt");
        assert_eq!(info.size, 11);
        assert!(!info.is_dir);
        assert!(info.modified.is_some());

        let dto: EntryDto = serde_json::from_str(r#"{".tag": "folder", "name": "docs"}"#).unwrap();
        let info = dto.into_info();
        assert!(info.is_dir);
        assert_eq!(info.size, 0);
    }
}
