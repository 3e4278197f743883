#![deny(clippy::all)]
#![deny(missing_docs)]
#![forbid(unsafe_code)]

//! A libvfs backend for FTP servers.
//!
//! One [`FtpFs`] instance holds one logged-in control connection, shared
//! by every handle created from it, established lazily and torn down by
//! the idle timer after `auto_disconnect` seconds of quiet (the teardown
//! sends `QUIT`). The next operation reconnects transparently.
//!
//! FTP data connections stream a file in one direction from a fixed
//! offset; there is no random I/O. The file handle therefore stages the
//! remote content in a local temp file: the first read or seek downloads
//! it, writes collect into it, and `close` uploads it back in one `STOR`.
//! This is the sanctioned strategy for protocols without byte-range
//! operations.

mod client;
mod file;
mod ftp;
mod location;
mod parser;

pub use client::{ClientBuilder, DirEntry, FtpClient};
pub use file::FtpFile;
pub use ftp::AsyncFtpBuilder;
pub use location::FtpLocation;

use async_trait::async_trait;
use libvfs::session::{Connect, SessionManager};
use libvfs::{Authority, Error, File, FileSystem, FsOptions, Location, Operation, Result};
use std::sync::Arc;

/// The URI scheme served by this backend.
pub const SCHEME: &str = "ftp";

/// The port dialed when the authority does not name one.
pub const DEFAULT_PORT: u16 = 21;

#[derive(Debug)]
struct Connector {
    options: FsOptions,
    builder: Arc<dyn ClientBuilder>,
}

#[async_trait]
impl Connect for Connector {
    type Session = Box<dyn FtpClient>;

    async fn connect(&self, authority: &Authority) -> Result<Box<dyn FtpClient>> {
        self.builder.build(authority, &self.options).await
    }

    async fn disconnect(&self, session: Arc<Box<dyn FtpClient>>) {
        session.quit().await;
    }
}

/// An FTP file system: one shared control connection per instance.
#[derive(Debug)]
pub struct FtpFs {
    options: FsOptions,
    manager: SessionManager<Connector>,
}

impl FtpFs {
    /// Creates an instance with default options (anonymous login).
    pub fn new() -> FtpFs {
        FtpFs::with_options(FsOptions::new())
    }

    /// Creates an instance with the given options.
    pub fn with_options(options: FsOptions) -> FtpFs {
        FtpFs::with_client_builder(options, Arc::new(AsyncFtpBuilder))
    }

    /// Creates an instance with a custom session constructor. This is the
    /// seam the conformance tests mock the wire protocol through.
    pub fn with_client_builder(options: FsOptions, builder: Arc<dyn ClientBuilder>) -> FtpFs {
        let manager = SessionManager::new(
            Connector {
                options: options.clone(),
                builder,
            },
            &options,
        );
        FtpFs { options, manager }
    }

    pub(crate) async fn client(&self, authority: &Authority) -> Result<Arc<Box<dyn FtpClient>>> {
        self.manager.client(authority).await
    }

    pub(crate) fn done(&self) {
        self.manager.timer_start();
    }

    fn check_authority(authority: &str) -> Result<Authority> {
        let parsed = Authority::parse(authority)?;
        if parsed.host().is_empty() {
            return Err(Error::validation(Operation::Parse, "ftp requires a host"));
        }
        Ok(parsed)
    }
}

impl Default for FtpFs {
    fn default() -> Self {
        FtpFs::new()
    }
}

impl FileSystem for FtpFs {
    fn scheme(&self) -> &'static str {
        SCHEME
    }

    fn name(&self) -> &'static str {
        "ftp"
    }

    fn options(&self) -> &FsOptions {
        &self.options
    }

    fn file(self: Arc<Self>, authority: &str, path: &str) -> Result<Box<dyn File>> {
        let authority = FtpFs::check_authority(authority)?;
        let path = libvfs::paths::normalize_file(path)?;
        Ok(Box::new(FtpFile::new(self, authority, path)))
    }

    fn location(self: Arc<Self>, authority: &str, path: &str) -> Result<Box<dyn Location>> {
        let authority = FtpFs::check_authority(authority)?;
        let path = libvfs::paths::normalize_location(path)?;
        Ok(Box::new(FtpLocation::new(self, authority, path)))
    }
}

/// Registers this backend under the `ftp` scheme.
pub fn register() {
    libvfs::registry::register(SCHEME, || Ok(Arc::new(FtpFs::new()) as Arc<dyn FileSystem>));
}
