//! Directory handles over an SFTP session.

use crate::SftpFs;
use async_trait::async_trait;
use libvfs::{Authority, File, FileSystem, Location, Operation, Result};
use std::sync::Arc;

/// A remote directory under one SFTP authority.
#[derive(Debug, Clone)]
pub struct SftpLocation {
    fs: Arc<SftpFs>,
    authority: Authority,
    path: String,
}

impl SftpLocation {
    pub(crate) fn new(fs: Arc<SftpFs>, authority: Authority, path: String) -> SftpLocation {
        SftpLocation { fs, authority, path }
    }

    async fn list_inner(&self) -> Result<Vec<String>> {
        let client = self.fs.client(&self.authority).await?;
        match client.read_dir(&self.path).await {
            Ok(entries) => Ok(entries.into_iter().filter(|(_, info)| !info.is_dir).map(|(name, _)| name).collect()),
            Err(e) if e.is_not_found() => Ok(Vec::new()),
            Err(e) => Err(e.with_op(Operation::List)),
        }
    }

    async fn exists_inner(&self) -> Result<bool> {
        let probe = if self.path == "/" { "/" } else { self.path.trim_end_matches('/') };
        let client = self.fs.client(&self.authority).await?;
        match client.stat(probe).await {
            Ok(info) => Ok(info.is_dir),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e.with_op(Operation::Exists)),
        }
    }
}

#[async_trait]
impl Location for SftpLocation {
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
        Ok(Box::new(SftpLocation::new(self.fs.clone(), self.authority.clone(), path)))
    }

    fn file(&self, rel: &str) -> Result<Box<dyn File>> {
        let path = libvfs::paths::join_file(&self.path, rel)?;
        Ok(Box::new(crate::SftpFile::new(self.fs.clone(), self.authority.clone(), path)))
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
