//! Directory handles over the flat key namespace.

use crate::{MemFs, store};
use async_trait::async_trait;
use libvfs::{Authority, File, FileSystem, Location, Result};
use std::sync::Arc;

/// A directory-like handle in an in-memory volume.
#[derive(Debug, Clone)]
pub struct MemLocation {
    fs: Arc<MemFs>,
    authority: Authority,
    volume: String,
    path: String,
}

impl MemLocation {
    pub(crate) fn new(fs: Arc<MemFs>, authority: Authority, volume: String, path: String) -> MemLocation {
        MemLocation { fs, authority, volume, path }
    }
}

#[async_trait]
impl Location for MemLocation {
    fn filesystem(&self) -> Arc<dyn FileSystem> {
        self.fs.clone()
    }

    fn authority(&self) -> &Authority {
        &self.authority
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn uri(&self) -> String {
        libvfs::uri::format(crate::SCHEME, &self.authority, &self.path)
    }

    fn location(&self, rel: &str) -> Result<Box<dyn Location>> {
        let path = libvfs::paths::join_location(&self.path, rel)?;
        Ok(Box::new(MemLocation::new(self.fs.clone(), self.authority.clone(), self.volume.clone(), path)))
    }

    fn file(&self, rel: &str) -> Result<Box<dyn File>> {
        let path = libvfs::paths::join_file(&self.path, rel)?;
        Ok(Box::new(crate::MemFile::new(self.fs.clone(), self.authority.clone(), self.volume.clone(), path)))
    }

    async fn exists(&self) -> Result<bool> {
        Ok(store::any_under(&self.volume, &self.path))
    }

    async fn list(&self) -> Result<Vec<String>> {
        Ok(store::list(&self.volume, &self.path))
    }
}
