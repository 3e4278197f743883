#![deny(clippy::all)]
#![deny(missing_docs)]
#![forbid(unsafe_code)]

//! A libvfs backend for the local file system.
//!
//! Paths map one-to-one onto the host's file system; the authority is
//! always empty (`file:///var/data/report.csv`). There is no session to
//! manage, so the idle-disconnect machinery of the remote backends does
//! not apply here, but the file handle implements the same lazy-open and
//! mode-upgrade state machine so callers observe identical semantics.

mod file;
mod location;

pub use file::DiskFile;
pub use location::DiskLocation;

use libvfs::{Authority, Error, File, FileSystem, FsOptions, Location, Operation, Result};
use std::sync::Arc;

/// The URI scheme served by this backend.
pub const SCHEME: &str = "file";

/// The local-disk file system.
#[derive(Debug)]
pub struct DiskFs {
    options: FsOptions,
}

impl DiskFs {
    /// Creates an instance with default options.
    pub fn new() -> DiskFs {
        DiskFs::with_options(FsOptions::new())
    }

    /// Creates an instance with the given options. The recognized keys
    /// here are `file_permissions`, `file_buffer_size` and `temp_dir`.
    pub fn with_options(options: FsOptions) -> DiskFs {
        DiskFs { options }
    }

    fn check_authority(authority: &str) -> Result<Authority> {
        let parsed = Authority::parse(authority)?;
        if !parsed.is_empty() {
            return Err(Error::validation(
                Operation::Parse,
                format!("the local file system has no authority, got {authority:?}"),
            ));
        }
        Ok(parsed)
    }
}

impl Default for DiskFs {
    fn default() -> Self {
        DiskFs::new()
    }
}

impl FileSystem for DiskFs {
    fn scheme(&self) -> &'static str {
        SCHEME
    }

    fn name(&self) -> &'static str {
        "local file system"
    }

    fn options(&self) -> &FsOptions {
        &self.options
    }

    fn file(self: Arc<Self>, authority: &str, path: &str) -> Result<Box<dyn File>> {
        let authority = DiskFs::check_authority(authority)?;
        let path = libvfs::paths::normalize_file(path)?;
        Ok(Box::new(DiskFile::new(self, authority, path)))
    }

    fn location(self: Arc<Self>, authority: &str, path: &str) -> Result<Box<dyn Location>> {
        let authority = DiskFs::check_authority(authority)?;
        let path = libvfs::paths::normalize_location(path)?;
        Ok(Box::new(DiskLocation::new(self, authority, path)))
    }
}

/// Registers this backend under the `file` scheme.
pub fn register() {
    libvfs::registry::register(SCHEME, || Ok(Arc::new(DiskFs::new()) as Arc<dyn FileSystem>));
}
