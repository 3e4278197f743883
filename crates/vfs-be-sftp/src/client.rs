//! The narrow client interface between the VFS semantics and the SSH
//! protocol library.
//!
//! [`SftpClient`] exposes exactly the wire operations the file and
//! location implementations need. The session constructor
//! ([`ClientBuilder`]) is the only place that touches the protocol
//! library, which keeps the backend testable against an in-memory client.

use async_trait::async_trait;
use libvfs::{Authority, FsOptions, Result};
use std::fmt;
use std::time::SystemTime;

/// Flags for opening a remote file, mirroring SFTP open modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenMode {
    /// Open for reading.
    pub read: bool,
    /// Open for writing.
    pub write: bool,
    /// Create the file when absent.
    pub create: bool,
    /// Truncate existing content on open.
    pub truncate: bool,
}

impl OpenMode {
    /// Read-only.
    pub const READ: OpenMode = OpenMode {
        read: true,
        write: false,
        create: false,
        truncate: false,
    };

    /// Write, creating when absent, replacing existing content.
    pub const WRITE_TRUNCATE: OpenMode = OpenMode {
        read: false,
        write: true,
        create: true,
        truncate: true,
    };

    /// Write, creating when absent, editing in place.
    pub const WRITE: OpenMode = OpenMode {
        read: false,
        write: true,
        create: true,
        truncate: false,
    };

    /// The mode-upgrade target: read-write, keeping the create flag of
    /// the mode being upgraded, never truncating.
    pub fn upgraded(self) -> OpenMode {
        OpenMode {
            read: true,
            write: true,
            create: self.create,
            truncate: false,
        }
    }
}

/// Metadata of one remote entry.
#[derive(Debug, Clone)]
pub struct EntryInfo {
    /// Size in bytes; zero for directories on servers that do not report one.
    pub size: u64,
    /// Modification time when the server reports one.
    pub modified: Option<SystemTime>,
    /// True for directories.
    pub is_dir: bool,
}

/// An open remote file handle with its own server-side cursor.
#[async_trait]
pub trait SftpHandle: Send + Sync + fmt::Debug {
    /// Reads up to `max` bytes at the handle cursor. An empty result
    /// means end of stream.
    async fn read(&mut self, max: usize) -> Result<Vec<u8>>;

    /// Writes all of `data` at the handle cursor.
    async fn write_all(&mut self, data: Vec<u8>) -> Result<()>;

    /// Repositions the handle cursor.
    async fn seek(&mut self, pos: u64) -> Result<()>;

    /// Closes the handle on the server.
    async fn close(&mut self) -> Result<()>;
}

/// The live, authenticated session shared by all handles of one file
/// system. Implementations serialize wire access internally; callers
/// treat the session as single-threaded.
#[async_trait]
pub trait SftpClient: Send + Sync + fmt::Debug {
    /// Metadata for a path.
    async fn stat(&self, path: &str) -> Result<EntryInfo>;

    /// Entries directly under a directory: `(basename, metadata)` pairs.
    async fn read_dir(&self, path: &str) -> Result<Vec<(String, EntryInfo)>>;

    /// Opens a remote file in a fixed mode.
    async fn open(&self, path: &str, mode: OpenMode) -> Result<Box<dyn SftpHandle>>;

    /// Creates a directory chain, tolerating segments that already exist.
    async fn mkdir_all(&self, path: &str) -> Result<()>;

    /// Removes a file.
    async fn remove(&self, path: &str) -> Result<()>;

    /// Renames a file, replacing any file at the destination.
    async fn rename(&self, from: &str, to: &str) -> Result<()>;

    /// Applies a permission mode to a path.
    async fn chmod(&self, path: &str, mode: u32) -> Result<()>;

    /// Sets access and modification times, in seconds since the epoch.
    async fn chtimes(&self, path: &str, atime: u64, mtime: u64) -> Result<()>;

    /// Closes the session and its transport.
    async fn disconnect(&self);
}

/// Builds authenticated sessions; the one place the SSH library is
/// touched. Swapped for an in-memory implementation in tests.
#[async_trait]
pub trait ClientBuilder: Send + Sync + fmt::Debug + 'static {
    /// Performs dial, handshake, host-key validation and authentication.
    async fn build(&self, authority: &Authority, options: &FsOptions) -> Result<Box<dyn SftpClient>>;
}
