#![deny(clippy::all)]
#![deny(missing_docs)]
#![forbid(unsafe_code)]

//! A libvfs backend storing files in Dropbox.
//!
//! The account is a single namespace, so the authority is empty
//! (`dropbox:///reports/summary.csv`). Authentication is a bearer token
//! from the `access_token` option, falling back to the
//! `VFS_DROPBOX_ACCESS_TOKEN` environment variable.
//!
//! The HTTP API is stateless, so there is no session or idle timer here;
//! what this backend adds instead is classified retries on transient API
//! failures and chunked upload sessions. The remote stream cannot seek:
//! file handles stage content in a local temp file — the first read or
//! seek downloads it, writes collect into it, `close` uploads it back,
//! using an upload session in `chunk_size` parts when the content
//! exceeds the single-shot threshold.

mod api;
mod file;
mod http;
mod location;

pub use api::{DbxClient, ObjectInfo};
pub use file::DbxFile;
pub use http::HyperDbxClient;
pub use location::DbxLocation;

use libvfs::{Authority, Error, File, FileSystem, FsOptions, Location, Operation, Result, Secret};
use std::sync::Arc;

/// The URI scheme served by this backend.
pub const SCHEME: &str = "dropbox";

/// Bearer token fallback.
pub const ACCESS_TOKEN_ENV: &str = "VFS_DROPBOX_ACCESS_TOKEN";

/// Content larger than this goes through an upload session instead of a
/// single-shot upload.
pub const UPLOAD_SESSION_THRESHOLD: u64 = 150 * 1024 * 1024;

/// A Dropbox file system.
#[derive(Debug)]
pub struct DbxFs {
    options: FsOptions,
    client: Arc<dyn DbxClient>,
    session_threshold: u64,
}

impl DbxFs {
    /// Creates an instance authenticating from the environment.
    pub fn new() -> Result<DbxFs> {
        DbxFs::with_options(FsOptions::new())
    }

    /// Creates an instance with the given options. The recognized keys
    /// here are `access_token`, `chunk_size`, `temp_dir`, `retry_count`
    /// and `file_buffer_size`.
    pub fn with_options(options: FsOptions) -> Result<DbxFs> {
        let token = match &options.access_token {
            Some(token) => token.clone(),
            None => std::env::var(ACCESS_TOKEN_ENV)
                .map(Secret::new)
                .map_err(|_| Error::validation(Operation::Connect, format!("no access token in options or ${ACCESS_TOKEN_ENV}")))?,
        };
        let client = HyperDbxClient::new(token, options.retry_count)?;
        Ok(DbxFs::with_client(options, Arc::new(client)))
    }

    /// Creates an instance around a custom API client. This is the seam
    /// the conformance tests mock the HTTP API through.
    pub fn with_client(options: FsOptions, client: Arc<dyn DbxClient>) -> DbxFs {
        DbxFs {
            options,
            client,
            session_threshold: UPLOAD_SESSION_THRESHOLD,
        }
    }

    /// Lowers the upload-session threshold. Tuning for tests and
    /// constrained environments.
    pub fn with_session_threshold(mut self, bytes: u64) -> DbxFs {
        self.session_threshold = bytes;
        self
    }

    pub(crate) fn client(&self) -> Arc<dyn DbxClient> {
        self.client.clone()
    }

    pub(crate) fn session_threshold(&self) -> u64 {
        self.session_threshold
    }

    fn check_authority(authority: &str) -> Result<Authority> {
        let parsed = Authority::parse(authority)?;
        if !parsed.is_empty() {
            return Err(Error::validation(
                Operation::Parse,
                format!("dropbox is a single namespace, got authority {authority:?}"),
            ));
        }
        Ok(parsed)
    }
}

impl FileSystem for DbxFs {
    fn scheme(&self) -> &'static str {
        SCHEME
    }

    fn name(&self) -> &'static str {
        "dropbox"
    }

    fn options(&self) -> &FsOptions {
        &self.options
    }

    fn file(self: Arc<Self>, authority: &str, path: &str) -> Result<Box<dyn File>> {
        let authority = DbxFs::check_authority(authority)?;
        let path = libvfs::paths::normalize_file(path)?;
        Ok(Box::new(DbxFile::new(self, authority, path)))
    }

    fn location(self: Arc<Self>, authority: &str, path: &str) -> Result<Box<dyn Location>> {
        let authority = DbxFs::check_authority(authority)?;
        let path = libvfs::paths::normalize_location(path)?;
        Ok(Box::new(DbxLocation::new(self, authority, path)))
    }
}

/// Registers this backend under the `dropbox` scheme.
pub fn register() {
    libvfs::registry::register(SCHEME, || DbxFs::new().map(|fs| Arc::new(fs) as Arc<dyn FileSystem>));
}
