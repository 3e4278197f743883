//! The stateful file handle over an SFTP session.
//!
//! SFTP opens a remote file in a fixed mode, while the libvfs contract
//! promises one cursor that reads, writes and seeks. The handle keeps the
//! open mode it currently holds; when the caller's access pattern demands
//! the other mode it captures the cursor, closes the server-side handle,
//! reopens read-write and seeks back. The reopen never truncates.

use crate::client::{OpenMode, SftpClient, SftpHandle};
use crate::SftpFs;
use async_trait::async_trait;
use libvfs::{Authority, Error, File, FileSystem, Location, Operation, Result};
use std::io::SeekFrom;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

type Client = Arc<Box<dyn SftpClient>>;

/// A single-cursor handle on one remote file.
#[derive(Debug)]
pub struct SftpFile {
    fs: Arc<SftpFs>,
    authority: Authority,
    path: String,
    cursor: u64,
    handle: Option<Box<dyn SftpHandle>>,
    mode: Option<OpenMode>,
    read_called: bool,
    seek_called: bool,
    write_called: bool,
    eof_seen: bool,
}

impl SftpFile {
    pub(crate) fn new(fs: Arc<SftpFs>, authority: Authority, path: String) -> SftpFile {
        SftpFile {
            fs,
            authority,
            path,
            cursor: 0,
            handle: None,
            mode: None,
            read_called: false,
            seek_called: false,
            write_called: false,
            eof_seen: false,
        }
    }

    /// Closes the current server-side handle and reopens read-write at
    /// the captured cursor, keeping the create flag of the mode being
    /// upgraded.
    async fn upgrade(&mut self, client: &Client, op: Operation, mode: OpenMode) -> Result<()> {
        self.mode = None;
        if let Some(mut handle) = self.handle.take() {
            handle.close().await.map_err(|e| e.with_op(op))?;
        }
        let upgraded = mode.upgraded();
        let mut handle = client.open(&self.path, upgraded).await.map_err(|e| e.with_op(op))?;
        if self.cursor > 0 {
            handle.seek(self.cursor).await.map_err(|e| e.with_op(op))?;
        }
        self.handle = Some(handle);
        self.mode = Some(upgraded);
        Ok(())
    }

    async fn ensure_readable(&mut self, client: &Client, op: Operation) -> Result<()> {
        if let Some(mode) = self.mode {
            if mode.read {
                return Ok(());
            }
            return self.upgrade(client, op, mode).await;
        }
        let mut handle = client.open(&self.path, OpenMode::READ).await.map_err(|e| e.with_op(op))?;
        if self.cursor > 0 {
            handle.seek(self.cursor).await.map_err(|e| e.with_op(op))?;
        }
        self.handle = Some(handle);
        self.mode = Some(OpenMode::READ);
        Ok(())
    }

    async fn ensure_writable(&mut self, client: &Client, op: Operation) -> Result<()> {
        if let Some(mode) = self.mode {
            if mode.write {
                return Ok(());
            }
            return self.upgrade(client, op, mode).await;
        }
        // Before any read or seek the write replaces the file; afterwards
        // it edits in place at the cursor.
        let mode = if !self.read_called && !self.seek_called {
            OpenMode::WRITE_TRUNCATE
        } else {
            OpenMode::WRITE
        };
        client
            .mkdir_all(&libvfs::paths::dirname(&self.path))
            .await
            .map_err(|e| e.with_op(op))?;
        let mut handle = client.open(&self.path, mode).await.map_err(|e| e.with_op(op))?;
        if !mode.truncate && self.cursor > 0 {
            handle.seek(self.cursor).await.map_err(|e| e.with_op(op))?;
        }
        self.handle = Some(handle);
        self.mode = Some(mode);
        if let Some(permissions) = self.fs.options().file_permissions_mode()? {
            client.chmod(&self.path, permissions).await?;
        }
        Ok(())
    }

    async fn remote_len(&self, client: &Client) -> Result<u64> {
        match client.stat(&self.path).await {
            Ok(info) => Ok(info.size),
            Err(e) if e.is_not_found() => Ok(0),
            Err(e) => Err(e.with_op(Operation::Seek)),
        }
    }

    async fn read_inner(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.eof_seen {
            return Ok(0);
        }
        let client = self.fs.client(&self.authority).await?;
        self.ensure_readable(&client, Operation::Read).await?;
        self.read_called = true;
        let handle = self.handle.as_mut().expect("opened above");
        let chunk = handle.read(buf.len()).await?;
        if chunk.is_empty() {
            self.eof_seen = true;
            return Ok(0);
        }
        buf[..chunk.len()].copy_from_slice(&chunk);
        self.cursor += chunk.len() as u64;
        Ok(chunk.len())
    }

    async fn write_inner(&mut self, buf: &[u8]) -> Result<usize> {
        let client = self.fs.client(&self.authority).await?;
        self.ensure_writable(&client, Operation::Write).await?;
        self.write_called = true;
        let handle = self.handle.as_mut().expect("opened above");
        handle.write_all(buf.to_vec()).await?;
        self.cursor += buf.len() as u64;
        Ok(buf.len())
    }

    async fn seek_inner(&mut self, pos: SeekFrom) -> Result<u64> {
        let client = self.fs.client(&self.authority).await?;
        let len = self.remote_len(&client).await?;
        let target = match pos {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::Current(delta) => self.cursor as i64 + delta,
            SeekFrom::End(delta) => len as i64 + delta,
        };
        if target < 0 {
            return Err(Error::validation(Operation::Seek, format!("seek before start of {}", self.path)));
        }
        self.seek_called = true;
        self.cursor = target as u64;
        match self.mode {
            // A seek arriving on a write-only stream upgrades it, like a
            // read would; the reopen seeks to the new cursor.
            Some(mode) if !mode.read => self.upgrade(&client, Operation::Seek, mode).await?,
            Some(_) => {
                let handle = self.handle.as_mut().expect("open mode implies a handle");
                handle.seek(self.cursor).await.map_err(|e| e.with_op(Operation::Seek))?;
            }
            None => {}
        }
        if self.cursor < len {
            self.eof_seen = false;
        }
        Ok(self.cursor)
    }

    async fn close_inner(&mut self) -> Result<()> {
        if let Some(mut handle) = self.handle.take() {
            handle.close().await?;
        }
        self.mode = None;
        self.cursor = 0;
        self.read_called = false;
        self.seek_called = false;
        self.write_called = false;
        self.eof_seen = false;
        Ok(())
    }

    async fn touch_inner(&mut self) -> Result<()> {
        let client = self.fs.client(&self.authority).await?;
        match client.stat(&self.path).await {
            Ok(_) => {
                let now = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map_err(|e| Error::new(Operation::Touch, libvfs::ErrorKind::Io, e))?
                    .as_secs();
                client.chtimes(&self.path, now, now).await
            }
            Err(e) if e.is_not_found() => {
                client
                    .mkdir_all(&libvfs::paths::dirname(&self.path))
                    .await
                    .map_err(|e| e.with_op(Operation::Touch))?;
                let mut handle = client.open(&self.path, OpenMode::WRITE).await.map_err(|e| e.with_op(Operation::Touch))?;
                handle.close().await.map_err(|e| e.with_op(Operation::Touch))?;
                if let Some(permissions) = self.fs.options().file_permissions_mode()? {
                    client.chmod(&self.path, permissions).await?;
                }
                Ok(())
            }
            Err(e) => Err(e.with_op(Operation::Touch)),
        }
    }

    async fn move_native(&mut self, target_path: &str) -> Result<()> {
        self.close_inner().await?;
        let client = self.fs.client(&self.authority).await?;
        client
            .mkdir_all(&libvfs::paths::dirname(target_path))
            .await
            .map_err(|e| e.with_op(Operation::MoveToFile))?;
        match client.remove(target_path).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.with_op(Operation::MoveToFile)),
        }
        client.rename(&self.path, target_path).await.map_err(|e| e.with_op(Operation::MoveToFile))
    }
}

#[async_trait]
impl File for SftpFile {
    fn filesystem(&self) -> Arc<dyn FileSystem> {
        self.fs.clone()
    }

    fn authority(&self) -> &Authority {
        &self.authority
    }

    fn scheme(&self) -> &'static str {
        crate::SCHEME
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn location(&self) -> Box<dyn Location> {
        Box::new(crate::SftpLocation::new(
            self.fs.clone(),
            self.authority.clone(),
            libvfs::paths::dirname(&self.path),
        ))
    }

    fn uri(&self) -> String {
        libvfs::uri::format(crate::SCHEME, &self.authority, &self.path)
    }

    fn cursor(&self) -> u64 {
        self.cursor
    }

    async fn exists(&self) -> Result<bool> {
        let result = async {
            let client = self.fs.client(&self.authority).await?;
            match client.stat(&self.path).await {
                Ok(info) => Ok(!info.is_dir),
                Err(e) if e.is_not_found() => Ok(false),
                Err(e) => Err(e.with_op(Operation::Exists)),
            }
        }
        .await;
        self.fs.done();
        result
    }

    async fn size(&self) -> Result<u64> {
        let result = async {
            let client = self.fs.client(&self.authority).await?;
            client.stat(&self.path).await.map(|info| info.size).map_err(|e| e.with_op(Operation::Size))
        }
        .await;
        self.fs.done();
        result
    }

    async fn last_modified(&self) -> Result<SystemTime> {
        let result = async {
            let client = self.fs.client(&self.authority).await?;
            let info = client.stat(&self.path).await.map_err(|e| e.with_op(Operation::LastModified))?;
            info.modified
                .ok_or_else(|| Error::bare(Operation::LastModified, libvfs::ErrorKind::Protocol))
        }
        .await;
        self.fs.done();
        result
    }

    async fn touch(&mut self) -> Result<()> {
        let result = self.touch_inner().await;
        self.fs.done();
        result
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let result = self.read_inner(buf).await;
        self.fs.done();
        result
    }

    async fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let result = self.write_inner(buf).await;
        self.fs.done();
        result
    }

    async fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let result = self.seek_inner(pos).await;
        self.fs.done();
        result
    }

    #[tracing_attributes::instrument(level = "debug", skip(self), fields(path = %self.path))]
    async fn close(&mut self) -> Result<()> {
        let result = self.close_inner().await;
        self.fs.done();
        result
    }

    async fn delete(&mut self) -> Result<()> {
        let result = async {
            self.handle = None;
            self.mode = None;
            let client = self.fs.client(&self.authority).await?;
            client.remove(&self.path).await
        }
        .await;
        self.fs.done();
        result
    }

    async fn move_to_file(&mut self, target: &mut dyn File) -> Result<()> {
        if libvfs::copy::same_target(&*self, &*target) {
            let target_path = target.path().to_string();
            let result = self.move_native(&target_path).await;
            self.fs.done();
            return result;
        }
        self.copy_to_file(target).await?;
        self.delete().await
    }
}
