//! The narrow client interface between the VFS semantics and the FTP
//! protocol library.

use async_trait::async_trait;
use libvfs::{Authority, FsOptions, Result};
use std::fmt;
use std::time::SystemTime;

/// One parsed directory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Basename of the entry.
    pub name: String,
    /// Size in bytes, when the listing reports one.
    pub size: u64,
    /// True for directories.
    pub is_dir: bool,
}

/// The live, authenticated FTP session shared by all handles of one file
/// system. One control connection; implementations serialize wire access
/// internally.
#[async_trait]
pub trait FtpClient: Send + Sync + fmt::Debug {
    /// Parsed entries directly under a directory.
    async fn list(&self, path: &str) -> Result<Vec<DirEntry>>;

    /// Downloads a file starting at `offset`.
    async fn retr_from(&self, path: &str, offset: u64) -> Result<Vec<u8>>;

    /// Uploads `data` to a file starting at `offset`. Offset zero
    /// replaces the file; implementations whose wire protocol cannot
    /// restart an upload may reject non-zero offsets, in which case the
    /// file handle stages locally and always stores from zero.
    async fn stor_from(&self, path: &str, data: Vec<u8>, offset: u64) -> Result<u64>;

    /// Deletes a file.
    async fn delete(&self, path: &str) -> Result<()>;

    /// Renames a file. The destination must not exist.
    async fn rename(&self, from: &str, to: &str) -> Result<()>;

    /// Creates one directory level, tolerating an existing directory.
    async fn make_dir(&self, path: &str) -> Result<()>;

    /// The size reported by `SIZE`, when the server supports it.
    async fn size(&self, path: &str) -> Result<Option<u64>>;

    /// The timestamp reported by `MDTM`, when the server supports it.
    async fn mdtm(&self, path: &str) -> Result<Option<SystemTime>>;

    /// Sends `QUIT` and closes the control connection.
    async fn quit(&self);
}

/// Builds authenticated sessions; the one place the FTP library is
/// touched. Swapped for an in-memory implementation in tests.
#[async_trait]
pub trait ClientBuilder: Send + Sync + fmt::Debug + 'static {
    /// Dials the control connection and logs in.
    async fn build(&self, authority: &Authority, options: &FsOptions) -> Result<Box<dyn FtpClient>>;
}
