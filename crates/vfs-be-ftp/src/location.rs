//! Directory handles over an FTP session.

use crate::FtpFs;
use async_trait::async_trait;
use libvfs::{Authority, File, FileSystem, Location, Operation, Result};
use std::sync::Arc;

/// A remote directory under one FTP authority.
#[derive(Debug, Clone)]
pub struct FtpLocation {
    fs: Arc<FtpFs>,
    authority: Authority,
    path: String,
}

impl FtpLocation {
    pub(crate) fn new(fs: Arc<FtpFs>, authority: Authority, path: String) -> FtpLocation {
        FtpLocation { fs, authority, path }
    }

    async fn list_inner(&self) -> Result<Vec<String>> {
        let client = self.fs.client(&self.authority).await?;
        match client.list(&self.path).await {
            Ok(entries) => Ok(entries.into_iter().filter(|e| !e.is_dir).map(|e| e.name).collect()),
            Err(e) if e.is_not_found() => Ok(Vec::new()),
            Err(e) => Err(e.with_op(Operation::List)),
        }
    }

    async fn exists_inner(&self) -> Result<bool> {
        if self.path == "/" {
            return Ok(true);
        }
        // FTP has no stat; ask the parent listing about our own name.
        let name = libvfs::paths::basename(&self.path);
        let parent = libvfs::paths::dirname(self.path.trim_end_matches('/'));
        let client = self.fs.client(&self.authority).await?;
        match client.list(&parent).await {
            Ok(entries) => Ok(entries.iter().any(|e| e.is_dir && e.name == name)),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e.with_op(Operation::Exists)),
        }
    }
}

#[async_trait]
impl Location for FtpLocation {
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
        Ok(Box::new(FtpLocation::new(self.fs.clone(), self.authority.clone(), path)))
    }

    fn file(&self, rel: &str) -> Result<Box<dyn File>> {
        let path = libvfs::paths::join_file(&self.path, rel)?;
        Ok(Box::new(crate::FtpFile::new(self.fs.clone(), self.authority.clone(), path)))
    }

    async fn exists(&self) -> Result<bool> {
        let result = self.exists_inner().await;
        self.fs.done();
        result
    }

    #[tracing_attributes::instrument(level = "debug", skip(self), fields(path = %self.path))]
    async fn list(&self) -> Result<Vec<String>> {
        let result = self.list_inner().await;
        self.fs.done();
        result
    }
}
