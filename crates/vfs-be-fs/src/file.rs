//! The stateful file handle over local disk.
//!
//! Local files support random I/O natively, so the handle maps the
//! read/write/seek contract straight onto one `tokio::fs::File`,
//! reopening it when the access pattern demands a mode the current
//! descriptor was not opened with.

use crate::DiskFs;
use async_trait::async_trait;
use cfg_if::cfg_if;
use libvfs::{Authority, Error, ErrorKind, File, FileSystem, Location, Operation, Result};
use std::io::SeekFrom;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

/// A single-cursor handle on one local file.
#[derive(Debug)]
pub struct DiskFile {
    fs: Arc<DiskFs>,
    authority: Authority,
    path: String,
    cursor: u64,
    handle: Option<tokio::fs::File>,
    readable: bool,
    writable: bool,
    read_called: bool,
    seek_called: bool,
    write_called: bool,
    eof_seen: bool,
}

impl DiskFile {
    pub(crate) fn new(fs: Arc<DiskFs>, authority: Authority, path: String) -> DiskFile {
        DiskFile {
            fs,
            authority,
            path,
            cursor: 0,
            handle: None,
            readable: false,
            writable: false,
            read_called: false,
            seek_called: false,
            write_called: false,
            eof_seen: false,
        }
    }

    async fn vivify_parent(&self, op: Operation) -> Result<()> {
        tokio::fs::create_dir_all(libvfs::paths::dirname(&self.path))
            .await
            .map_err(|e| Error::io(op, e))
    }

    async fn apply_permissions(&self) -> Result<()> {
        if let Some(mode) = self.fs.options().file_permissions_mode()? {
            cfg_if! {
                if #[cfg(unix)] {
                    use std::os::unix::fs::PermissionsExt;
                    tokio::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(mode))
                        .await
                        .map_err(|e| Error::io(Operation::Chmod, e))?;
                } else {
                    let _ = mode;
                }
            }
        }
        Ok(())
    }

    /// Closes the current descriptor and reopens read-write at the
    /// captured cursor. The reopen never truncates: the content produced
    /// so far is what the caller is switching modes over.
    async fn reopen_read_write(&mut self, op: Operation) -> Result<()> {
        if let Some(mut handle) = self.handle.take() {
            if self.writable {
                handle.flush().await.map_err(|e| Error::io(op, e))?;
            }
        }
        let mut handle = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&self.path)
            .await
            .map_err(|e| Error::io(op, e))?;
        if self.cursor > 0 {
            handle.seek(SeekFrom::Start(self.cursor)).await.map_err(|e| Error::io(op, e))?;
        }
        self.handle = Some(handle);
        self.readable = true;
        self.writable = true;
        Ok(())
    }

    async fn ensure_readable(&mut self, op: Operation) -> Result<()> {
        if self.handle.is_some() {
            if self.readable {
                return Ok(());
            }
            return self.reopen_read_write(op).await;
        }
        let mut handle = OpenOptions::new().read(true).open(&self.path).await.map_err(|e| Error::io(op, e))?;
        if self.cursor > 0 {
            handle.seek(SeekFrom::Start(self.cursor)).await.map_err(|e| Error::io(op, e))?;
        }
        self.handle = Some(handle);
        self.readable = true;
        self.writable = false;
        Ok(())
    }

    async fn ensure_writable(&mut self, op: Operation) -> Result<()> {
        if self.handle.is_some() {
            if self.writable {
                return Ok(());
            }
            return self.reopen_read_write(op).await;
        }
        self.vivify_parent(op).await?;
        // Before any read or seek the write replaces the file; afterwards
        // it edits in place at the cursor.
        let truncate = !self.read_called && !self.seek_called;
        let mut handle = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(truncate)
            .open(&self.path)
            .await
            .map_err(|e| Error::io(op, e))?;
        if !truncate && self.cursor > 0 {
            handle.seek(SeekFrom::Start(self.cursor)).await.map_err(|e| Error::io(op, e))?;
        }
        self.handle = Some(handle);
        self.readable = false;
        self.writable = true;
        self.apply_permissions().await
    }

    async fn current_len(&mut self) -> Result<u64> {
        match &self.handle {
            Some(handle) => Ok(handle.metadata().await.map_err(|e| Error::io(Operation::Seek, e))?.len()),
            None => match tokio::fs::metadata(&self.path).await {
                Ok(meta) => Ok(meta.len()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
                Err(e) => Err(Error::io(Operation::Seek, e)),
            },
        }
    }
}

#[async_trait]
impl File for DiskFile {
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
        Box::new(crate::DiskLocation::new(
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
        match tokio::fs::metadata(&self.path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::io(Operation::Exists, e)),
        }
    }

    async fn size(&self) -> Result<u64> {
        tokio::fs::metadata(&self.path)
            .await
            .map(|meta| meta.len())
            .map_err(|e| Error::io(Operation::Size, e))
    }

    async fn last_modified(&self) -> Result<SystemTime> {
        let meta = tokio::fs::metadata(&self.path).await.map_err(|e| Error::io(Operation::LastModified, e))?;
        meta.modified().map_err(|e| Error::io(Operation::LastModified, e))
    }

    async fn touch(&mut self) -> Result<()> {
        match tokio::fs::metadata(&self.path).await {
            Ok(_) => {
                let path = self.path.clone();
                tokio::task::spawn_blocking(move || -> std::io::Result<()> {
                    let file = std::fs::OpenOptions::new().write(true).open(&path)?;
                    file.set_modified(SystemTime::now())
                })
                .await
                .map_err(|e| Error::new(Operation::Touch, ErrorKind::Io, e))?
                .map_err(|e| Error::io(Operation::Touch, e))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.vivify_parent(Operation::Touch).await?;
                OpenOptions::new()
                    .write(true)
                    .create(true)
                    .open(&self.path)
                    .await
                    .map_err(|e| Error::io(Operation::Touch, e))?;
                self.apply_permissions().await
            }
            Err(e) => Err(Error::io(Operation::Touch, e)),
        }
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.eof_seen {
            return Ok(0);
        }
        self.ensure_readable(Operation::Read).await?;
        self.read_called = true;
        let handle = self.handle.as_mut().expect("opened above");
        let n = handle.read(buf).await.map_err(|e| Error::io(Operation::Read, e))?;
        if n == 0 {
            self.eof_seen = true;
        } else {
            self.cursor += n as u64;
        }
        Ok(n)
    }

    async fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.ensure_writable(Operation::Write).await?;
        self.write_called = true;
        let handle = self.handle.as_mut().expect("opened above");
        handle.write_all(buf).await.map_err(|e| Error::io(Operation::Write, e))?;
        self.cursor += buf.len() as u64;
        Ok(buf.len())
    }

    async fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.seek_called = true;
        let new_pos = match self.handle.as_mut() {
            Some(handle) => handle.seek(pos).await.map_err(|e| Error::io(Operation::Seek, e))?,
            None => {
                // Still lazy: position the cursor without opening.
                let target = match pos {
                    SeekFrom::Start(offset) => offset as i64,
                    SeekFrom::Current(delta) => self.cursor as i64 + delta,
                    SeekFrom::End(delta) => self.current_len().await? as i64 + delta,
                };
                if target < 0 {
                    return Err(Error::validation(Operation::Seek, format!("seek before start of {}", self.path)));
                }
                target as u64
            }
        };
        self.cursor = new_pos;
        if self.cursor < self.current_len().await? {
            self.eof_seen = false;
        }
        Ok(new_pos)
    }

    #[tracing_attributes::instrument(level = "debug", skip(self), fields(path = %self.path))]
    async fn close(&mut self) -> Result<()> {
        if let Some(mut handle) = self.handle.take() {
            if self.writable {
                handle.flush().await.map_err(|e| Error::io(Operation::Close, e))?;
            }
        }
        self.cursor = 0;
        self.readable = false;
        self.writable = false;
        self.read_called = false;
        self.seek_called = false;
        self.write_called = false;
        self.eof_seen = false;
        Ok(())
    }

    async fn delete(&mut self) -> Result<()> {
        self.handle = None;
        tokio::fs::remove_file(&self.path).await.map_err(|e| Error::io(Operation::Delete, e))
    }

    async fn move_to_file(&mut self, target: &mut dyn File) -> Result<()> {
        if libvfs::copy::same_target(&*self, &*target) {
            self.close().await?;
            tokio::fs::create_dir_all(libvfs::paths::dirname(target.path()))
                .await
                .map_err(|e| Error::io(Operation::MoveToFile, e))?;
            match tokio::fs::remove_file(target.path()).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(Error::io(Operation::MoveToFile, e)),
            }
            return tokio::fs::rename(&self.path, target.path())
                .await
                .map_err(|e| Error::io(Operation::MoveToFile, e));
        }
        self.copy_to_file(target).await?;
        self.delete().await
    }
}
