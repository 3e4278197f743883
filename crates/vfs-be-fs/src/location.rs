//! Directory handles over the local file system.

use crate::DiskFs;
use async_trait::async_trait;
use libvfs::{Authority, Error, File, FileSystem, Location, Operation, Result};
use std::sync::Arc;

/// A directory on local disk.
#[derive(Debug, Clone)]
pub struct DiskLocation {
    fs: Arc<DiskFs>,
    authority: Authority,
    path: String,
}

impl DiskLocation {
    pub(crate) fn new(fs: Arc<DiskFs>, authority: Authority, path: String) -> DiskLocation {
        DiskLocation { fs, authority, path }
    }
}

#[async_trait]
impl Location for DiskLocation {
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
        Ok(Box::new(DiskLocation::new(self.fs.clone(), self.authority.clone(), path)))
    }

    fn file(&self, rel: &str) -> Result<Box<dyn File>> {
        let path = libvfs::paths::join_file(&self.path, rel)?;
        Ok(Box::new(crate::DiskFile::new(self.fs.clone(), self.authority.clone(), path)))
    }

    async fn exists(&self) -> Result<bool> {
        match tokio::fs::metadata(&self.path).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::io(Operation::Exists, e)),
        }
    }

    #[tracing_attributes::instrument(level = "debug", skip(self), fields(path = %self.path))]
    async fn list(&self) -> Result<Vec<String>> {
        let mut dir = match tokio::fs::read_dir(&self.path).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::io(Operation::List, e)),
        };
        let mut names = Vec::new();
        while let Some(entry) = dir.next_entry().await.map_err(|e| Error::io(Operation::List, e))? {
            let file_type = entry.file_type().await.map_err(|e| Error::io(Operation::List, e))?;
            if file_type.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        Ok(names)
    }
}
