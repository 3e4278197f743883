//! The interface contract every backend must honor identically.
//!
//! [`FileSystem`] is the root factory for a scheme, [`Location`] a
//! directory-like handle and [`File`] a stateful byte-stream handle with
//! a single cursor. Code written against these traits is portable across
//! backends; the conformance crate (`vfs-conformance`) is the executable
//! form of this contract.

use crate::authority::Authority;
use crate::errors::Result;
use crate::options::FsOptions;
use async_trait::async_trait;
use regex::Regex;
use std::fmt;
use std::io::SeekFrom;
use std::sync::Arc;
use std::time::SystemTime;

/// Root factory for one scheme and one configuration.
///
/// A `FileSystem` owns the backend session state (for connection-oriented
/// backends) and is safe for concurrent use. The [`File`] handles it
/// produces are not: each has a single cursor driven by one caller.
pub trait FileSystem: fmt::Debug + Send + Sync {
    /// The URI scheme this instance serves, e.g. `"sftp"`.
    fn scheme(&self) -> &'static str;

    /// Human-readable backend name for diagnostics.
    fn name(&self) -> &'static str;

    /// The configuration this instance was built with.
    fn options(&self) -> &FsOptions;

    /// Creates a [`File`] handle for an absolute file path under the
    /// given authority. No I/O happens until the handle is used.
    fn file(self: Arc<Self>, authority: &str, path: &str) -> Result<Box<dyn File>>;

    /// Creates a [`Location`] handle for an absolute directory path under
    /// the given authority. No I/O happens until the handle is used.
    fn location(self: Arc<Self>, authority: &str, path: &str) -> Result<Box<dyn Location>>;
}

/// A directory-like handle: an immutable (path, authority, file system)
/// triple.
///
/// The path always starts and ends with `/` and contains no `.` or `..`
/// segments.
#[async_trait]
pub trait Location: fmt::Debug + Send + Sync {
    /// The file system this location belongs to.
    fn filesystem(&self) -> Arc<dyn FileSystem>;

    /// The authority this location lives under.
    fn authority(&self) -> &Authority;

    /// The absolute directory path, with leading and trailing slash.
    fn path(&self) -> &str;

    /// The full URI of this location, ending in `/`.
    fn uri(&self) -> String;

    /// Derives a location from a relative path. Fails on absolute input.
    fn location(&self, rel: &str) -> Result<Box<dyn Location>>;

    /// Derives a file from a relative path. Fails on empty or absolute
    /// input.
    fn file(&self, rel: &str) -> Result<Box<dyn File>>;

    /// True iff the path denotes an existing directory. Backends without
    /// empty-directory entities report `false` until a file exists under
    /// the path.
    async fn exists(&self) -> Result<bool>;

    /// Basenames of the files directly under this path, excluding
    /// subdirectories, in unspecified order. A non-existent path yields
    /// an empty list, not an error.
    async fn list(&self) -> Result<Vec<String>>;

    /// Like [`Location::list`], keeping entries whose basename starts
    /// with `prefix`. A prefix containing `/` addresses a relative
    /// subdirectory with the final segment as the basename prefix.
    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let (sub, base_prefix) = match prefix.rsplit_once('/') {
            Some((dir, p)) => (Some(dir), p),
            None => (None, prefix),
        };
        let names = match sub {
            Some(dir) => self.location(&format!("{dir}/"))?.list().await?,
            None => self.list().await?,
        };
        Ok(names.into_iter().filter(|n| n.starts_with(base_prefix)).collect())
    }

    /// Like [`Location::list`], keeping entries whose basename fully
    /// matches `pattern`.
    async fn list_by_regex(&self, pattern: &Regex) -> Result<Vec<String>> {
        let anchored = Regex::new(&format!(r"\A(?:{})\z", pattern.as_str()))
            .map_err(|e| crate::errors::Error::new(crate::errors::Operation::List, crate::errors::ErrorKind::Validation, e))?;
        let names = self.list().await?;
        Ok(names.into_iter().filter(|n| anchored.is_match(n)).collect())
    }

    /// Deletes the named file directly under this location.
    async fn delete_file(&self, name: &str) -> Result<()> {
        self.file(name)?.delete().await
    }
}

/// A stateful byte-stream handle with a single read/write/seek cursor.
///
/// The underlying stream is opened lazily on the first operation that
/// needs it and transparently reopened when the access pattern demands a
/// different mode. See the crate-level documentation for the full state
/// machine. Handles are terminal after [`File::close`]; a closed handle
/// may be reused and behaves like a freshly created one.
#[async_trait]
pub trait File: fmt::Debug + Send {
    /// The file system this file belongs to.
    fn filesystem(&self) -> Arc<dyn FileSystem>;

    /// The authority this file lives under.
    fn authority(&self) -> &Authority;

    /// The scheme of the owning file system.
    fn scheme(&self) -> &'static str;

    /// The absolute file path.
    fn path(&self) -> &str;

    /// The basename of the file.
    fn name(&self) -> String {
        crate::paths::basename(self.path()).to_string()
    }

    /// The location holding this file.
    fn location(&self) -> Box<dyn Location>;

    /// The full URI of this file.
    fn uri(&self) -> String;

    /// The current cursor position.
    fn cursor(&self) -> u64;

    /// True iff the remote object exists.
    async fn exists(&self) -> Result<bool>;

    /// Size of the remote object in bytes.
    async fn size(&self) -> Result<u64>;

    /// Modification timestamp of the remote object.
    async fn last_modified(&self) -> Result<SystemTime>;

    /// Creates the file empty when absent; otherwise bumps its
    /// modification time.
    async fn touch(&mut self) -> Result<()>;

    /// Reads at the cursor. Returns `Ok(0)` at end of stream and keeps
    /// returning it until a seek repositions strictly inside the file.
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Writes at the cursor. Before any read or seek the first write
    /// replaces the remote content; afterwards writes edit in place.
    async fn write(&mut self, buf: &[u8]) -> Result<usize>;

    /// Repositions the cursor.
    async fn seek(&mut self, pos: SeekFrom) -> Result<u64>;

    /// Releases the stream, uploads any staged content, removes local
    /// staging and resets cursor and flags. Idempotent.
    async fn close(&mut self) -> Result<()>;

    /// Removes the remote object.
    async fn delete(&mut self) -> Result<()>;

    /// Streams this file into `target` through a buffer sized by the
    /// `file_buffer_size` option. Refused with the copy-refused sentinel
    /// when the cursor is not at zero. Both handles are closed.
    async fn copy_to_file(&mut self, target: &mut dyn File) -> Result<()> {
        let buffer = self.filesystem().options().file_buffer_size;
        crate::copy::stream_to(self, target, buffer).await
    }

    /// Moves this file onto `target`: backend-native rename when scheme
    /// and authority match, copy-then-delete otherwise.
    async fn move_to_file(&mut self, target: &mut dyn File) -> Result<()> {
        self.copy_to_file(target).await?;
        self.delete().await
    }

    /// Copies this file into `target` under its own basename.
    async fn copy_to_location(&mut self, target: &dyn Location) -> Result<Box<dyn File>> {
        let mut file = target.file(&self.name())?;
        self.copy_to_file(file.as_mut()).await?;
        Ok(file)
    }

    /// Moves this file into `target` under its own basename.
    async fn move_to_location(&mut self, target: &dyn Location) -> Result<Box<dyn File>> {
        let mut file = target.file(&self.name())?;
        self.move_to_file(file.as_mut()).await?;
        Ok(file)
    }
}
