#![deny(clippy::all)]
#![deny(missing_docs)]
#![forbid(unsafe_code)]

//! A libvfs backend for SFTP servers.
//!
//! One [`SftpFs`] instance holds one authenticated SSH session, shared by
//! every file and location handle created from it. The session comes up
//! lazily on the first operation, stays up while operations keep
//! arriving, and is torn down by the idle timer after `auto_disconnect`
//! seconds of quiet. The next operation reconnects transparently, so
//! applications holding long-lived handles must tolerate a
//! reconnect-on-next-use.
//!
//! Authentication is public-key (`key_file_path`, `key_passphrase`) or
//! password, with environment fallbacks (`VFS_SFTP_PASSWORD`,
//! `VFS_SFTP_KEYFILE`, `VFS_SFTP_KEYFILE_PASSPHRASE`). Host identities
//! are validated against `known_hosts_file` / `known_hosts_string` / a
//! caller predicate, with `VFS_SFTP_KNOWN_HOSTS_FILE` and
//! `VFS_SFTP_INSECURE_KNOWN_HOSTS` as environment fallbacks. Explicit
//! option values always win over the environment.

mod client;
pub mod env;
mod file;
mod location;
mod ssh;

pub use client::{ClientBuilder, EntryInfo, OpenMode, SftpClient, SftpHandle};
pub use file::SftpFile;
pub use location::SftpLocation;
pub use ssh::Ssh2Builder;

use async_trait::async_trait;
use libvfs::session::{Connect, SessionManager};
use libvfs::{Authority, Error, File, FileSystem, FsOptions, Location, Operation, Result};
use std::sync::Arc;

/// The URI scheme served by this backend.
pub const SCHEME: &str = "sftp";

/// The port dialed when the authority does not name one.
pub const DEFAULT_PORT: u16 = 22;

#[derive(Debug)]
struct Connector {
    options: FsOptions,
    builder: Arc<dyn ClientBuilder>,
}

#[async_trait]
impl Connect for Connector {
    type Session = Box<dyn SftpClient>;

    async fn connect(&self, authority: &Authority) -> Result<Box<dyn SftpClient>> {
        self.builder.build(authority, &self.options).await
    }

    async fn disconnect(&self, session: Arc<Box<dyn SftpClient>>) {
        session.disconnect().await;
    }
}

/// An SFTP file system: one shared session per instance.
#[derive(Debug)]
pub struct SftpFs {
    options: FsOptions,
    manager: SessionManager<Connector>,
}

impl SftpFs {
    /// Creates an instance with default options, authenticating from the
    /// environment.
    pub fn new() -> SftpFs {
        SftpFs::with_options(FsOptions::new())
    }

    /// Creates an instance with the given options. Unset credential and
    /// known-hosts keys fall back to their `VFS_SFTP_*` environment
    /// variables.
    pub fn with_options(options: FsOptions) -> SftpFs {
        SftpFs::with_client_builder(options, Arc::new(Ssh2Builder))
    }

    /// Creates an instance with a custom session constructor. This is the
    /// seam the conformance tests mock the wire protocol through.
    pub fn with_client_builder(options: FsOptions, builder: Arc<dyn ClientBuilder>) -> SftpFs {
        let options = env::apply(options);
        let manager = SessionManager::new(
            Connector {
                options: options.clone(),
                builder,
            },
            &options,
        );
        SftpFs { options, manager }
    }

    /// Borrows the shared session, connecting on demand. Stops the idle
    /// timer; the caller re-arms it with [`SftpFs::done`] when the
    /// operation finishes.
    pub(crate) async fn client(&self, authority: &Authority) -> Result<Arc<Box<dyn SftpClient>>> {
        self.manager.client(authority).await
    }

    /// Re-arms the idle timer after an operation.
    pub(crate) fn done(&self) {
        self.manager.timer_start();
    }

    fn check_authority(authority: &str) -> Result<Authority> {
        let parsed = Authority::parse(authority)?;
        if parsed.host().is_empty() {
            return Err(Error::validation(Operation::Parse, "sftp requires a host"));
        }
        if parsed.username().is_empty() {
            return Err(Error::validation(Operation::Parse, "sftp requires a username"));
        }
        Ok(parsed)
    }
}

impl Default for SftpFs {
    fn default() -> Self {
        SftpFs::new()
    }
}

impl FileSystem for SftpFs {
    fn scheme(&self) -> &'static str {
        SCHEME
    }

    fn name(&self) -> &'static str {
        "sftp"
    }

    fn options(&self) -> &FsOptions {
        &self.options
    }

    fn file(self: Arc<Self>, authority: &str, path: &str) -> Result<Box<dyn File>> {
        let authority = SftpFs::check_authority(authority)?;
        let path = libvfs::paths::normalize_file(path)?;
        Ok(Box::new(SftpFile::new(self, authority, path)))
    }

    fn location(self: Arc<Self>, authority: &str, path: &str) -> Result<Box<dyn Location>> {
        let authority = SftpFs::check_authority(authority)?;
        let path = libvfs::paths::normalize_location(path)?;
        Ok(Box::new(SftpLocation::new(self, authority, path)))
    }
}

/// Registers this backend under the `sftp` scheme.
pub fn register() {
    libvfs::registry::register(SCHEME, || Ok(Arc::new(SftpFs::new()) as Arc<dyn FileSystem>));
}
