#![deny(clippy::all)]
#![deny(missing_docs)]
#![forbid(unsafe_code)]

//! A libvfs backend that keeps files in process memory.
//!
//! The namespace is a flat object store: keys are absolute file paths and
//! directories are implied by key prefixes, the way cloud object stores
//! behave. There are no empty-directory entities, so a [`Location`] only
//! exists once a file exists under it. The authority names a volume;
//! volumes are process-global, so two `MemFs` instances addressing the
//! same volume see the same files.
//!
//! Useful as scratch storage in tests and as the reference subject for
//! the conformance suite.

mod file;
mod location;
mod store;

pub use file::MemFile;
pub use location::MemLocation;

use libvfs::{Authority, Error, File, FileSystem, FsOptions, Location, Operation, Result};
use std::sync::Arc;

/// The URI scheme served by this backend.
pub const SCHEME: &str = "mem";

/// An in-memory file system addressing one or more volumes.
#[derive(Debug)]
pub struct MemFs {
    options: FsOptions,
}

impl MemFs {
    /// Creates an instance with default options.
    pub fn new() -> MemFs {
        MemFs::with_options(FsOptions::new())
    }

    /// Creates an instance with the given options.
    pub fn with_options(options: FsOptions) -> MemFs {
        MemFs { options }
    }

    fn volume(authority: &Authority) -> Result<String> {
        if authority.host().is_empty() {
            return Err(Error::validation(Operation::Parse, "mem authority must name a volume"));
        }
        Ok(authority.host().to_string())
    }
}

impl Default for MemFs {
    fn default() -> Self {
        MemFs::new()
    }
}

impl FileSystem for MemFs {
    fn scheme(&self) -> &'static str {
        SCHEME
    }

    fn name(&self) -> &'static str {
        "in-memory object store"
    }

    fn options(&self) -> &FsOptions {
        &self.options
    }

    fn file(self: Arc<Self>, authority: &str, path: &str) -> Result<Box<dyn File>> {
        let authority = Authority::parse(authority)?;
        let volume = MemFs::volume(&authority)?;
        let path = libvfs::paths::normalize_file(path)?;
        Ok(Box::new(MemFile::new(self, authority, volume, path)))
    }

    fn location(self: Arc<Self>, authority: &str, path: &str) -> Result<Box<dyn Location>> {
        let authority = Authority::parse(authority)?;
        let volume = MemFs::volume(&authority)?;
        let path = libvfs::paths::normalize_location(path)?;
        Ok(Box::new(MemLocation::new(self, authority, volume, path)))
    }
}

/// Registers this backend under the `mem` scheme.
pub fn register() {
    libvfs::registry::register(SCHEME, || Ok(Arc::new(MemFs::new()) as Arc<dyn FileSystem>));
}
