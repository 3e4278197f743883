//! Folder handles over the Dropbox API.

use crate::DbxFs;
use async_trait::async_trait;
use libvfs::{Authority, File, FileSystem, Location, Operation, Result};
use std::sync::Arc;

/// A folder in the Dropbox namespace.
#[derive(Debug, Clone)]
pub struct DbxLocation {
    fs: Arc<DbxFs>,
    authority: Authority,
    path: String,
}

impl DbxLocation {
    pub(crate) fn new(fs: Arc<DbxFs>, authority: Authority, path: String) -> DbxLocation {
        DbxLocation { fs, authority, path }
    }
}

#[async_trait]
impl Location for DbxLocation {
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
        Ok(Box::new(DbxLocation::new(self.fs.clone(), self.authority.clone(), path)))
    }

    fn file(&self, rel: &str) -> Result<Box<dyn File>> {
        let path = libvfs::paths::join_file(&self.path, rel)?;
        Ok(Box::new(crate::DbxFile::new(self.fs.clone(), self.authority.clone(), path)))
    }

    async fn exists(&self) -> Result<bool> {
        if self.path == "/" {
            return Ok(true);
        }
        match self.fs.client().metadata(&self.path).await {
            Ok(info) => Ok(info.is_dir),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e.with_op(Operation::Exists)),
        }
    }

    #[tracing_attributes::instrument(level = "debug", skip(self), fields(path = %self.path))]
    async fn list(&self) -> Result<Vec<String>> {
        match self.fs.client().list_folder(&self.path).await {
            Ok(entries) => Ok(entries.into_iter().filter(|e| !e.is_dir).map(|e| e.name).collect()),
            Err(e) if e.is_not_found() => Ok(Vec::new()),
            Err(e) => Err(e.with_op(Operation::List)),
        }
    }
}
