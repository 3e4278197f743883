//! The stateful file handle over an FTP session.
//!
//! The wire protocol streams whole files in one direction, so the handle
//! stages content locally: the first read or seek downloads the remote
//! file into a temp-file buffer, writes collect into the same buffer, and
//! `close` uploads it back in one store. The staging file is removed on
//! close regardless of the upload outcome.

use crate::FtpFs;
use crate::client::FtpClient;
use async_trait::async_trait;
use libvfs::staging::Staging;
use libvfs::{Authority, Error, ErrorKind, File, FileSystem, Location, Operation, Result};
use std::io::SeekFrom;
use std::sync::Arc;
use std::time::SystemTime;

type Client = Arc<Box<dyn FtpClient>>;

/// A single-cursor handle on one remote file, backed by local staging.
#[derive(Debug)]
pub struct FtpFile {
    fs: Arc<FtpFs>,
    authority: Authority,
    path: String,
    cursor: u64,
    staging: Option<Staging>,
    read_called: bool,
    seek_called: bool,
    write_called: bool,
    eof_seen: bool,
}

impl FtpFile {
    pub(crate) fn new(fs: Arc<FtpFs>, authority: Authority, path: String) -> FtpFile {
        FtpFile {
            fs,
            authority,
            path,
            cursor: 0,
            staging: None,
            read_called: false,
            seek_called: false,
            write_called: false,
            eof_seen: false,
        }
    }

    async fn new_staging(&self, op: Operation) -> Result<Staging> {
        Staging::create(self.fs.options().temp_dir.as_deref())
            .await
            .map_err(|e| Error::io(op, e))
    }

    /// Creates one directory level at a time up to `dir`.
    async fn make_dirs(client: &Client, dir: &str) -> Result<()> {
        let mut prefix = String::new();
        for segment in dir.split('/').filter(|s| !s.is_empty()) {
            prefix.push('/');
            prefix.push_str(segment);
            client.make_dir(&prefix).await?;
        }
        Ok(())
    }

    /// Downloads the remote content into a fresh staging buffer.
    async fn stage_remote(&mut self, op: Operation) -> Result<()> {
        let client = self.fs.client(&self.authority).await?;
        let result = client.retr_from(&self.path, 0).await.map_err(|e| e.with_op(op));
        self.fs.done();
        let data = result?;
        let mut staging = self.new_staging(op).await?;
        staging.fill(&data).await.map_err(|e| Error::io(op, e))?;
        self.staging = Some(staging);
        Ok(())
    }

    async fn read_inner(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.eof_seen {
            return Ok(0);
        }
        if self.staging.is_none() {
            self.stage_remote(Operation::Read).await?;
        }
        self.read_called = true;
        let cursor = self.cursor;
        let staging = self.staging.as_mut().expect("staged above");
        staging.seek(SeekFrom::Start(cursor)).await.map_err(|e| Error::io(Operation::Read, e))?;
        let n = staging.read(buf).await.map_err(|e| Error::io(Operation::Read, e))?;
        if n == 0 {
            self.eof_seen = true;
        } else {
            self.cursor += n as u64;
        }
        Ok(n)
    }

    async fn write_inner(&mut self, buf: &[u8]) -> Result<usize> {
        if self.staging.is_none() {
            if self.read_called || self.seek_called {
                // The write edits in place: the remote content becomes
                // the write buffer, cursor preserved.
                match self.stage_remote(Operation::Write).await {
                    Ok(()) => {}
                    Err(e) if e.is_not_found() => {
                        self.staging = Some(self.new_staging(Operation::Write).await?);
                    }
                    Err(e) => return Err(e),
                }
            } else {
                // Fresh write: replaces the remote content, no download.
                self.staging = Some(self.new_staging(Operation::Write).await?);
            }
        }
        self.write_called = true;
        let cursor = self.cursor;
        let staging = self.staging.as_mut().expect("staged above");
        staging.seek(SeekFrom::Start(cursor)).await.map_err(|e| Error::io(Operation::Write, e))?;
        staging.write_all(buf).await.map_err(|e| Error::io(Operation::Write, e))?;
        self.cursor += buf.len() as u64;
        Ok(buf.len())
    }

    async fn seek_inner(&mut self, pos: SeekFrom) -> Result<u64> {
        let len = match self.staging.as_mut() {
            Some(staging) => staging.size().await.map_err(|e| Error::io(Operation::Seek, e))?,
            None => {
                let client = self.fs.client(&self.authority).await?;
                let result = client.size(&self.path).await;
                self.fs.done();
                match result {
                    Ok(size) => size.unwrap_or(0),
                    Err(e) if e.is_not_found() => 0,
                    Err(e) => return Err(e.with_op(Operation::Seek)),
                }
            }
        };
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
        if self.cursor < len {
            self.eof_seen = false;
        }
        Ok(self.cursor)
    }

    async fn upload_staged(&mut self) -> Result<()> {
        // Taking the buffer guarantees the staging file is removed no
        // matter how the upload goes.
        let mut staging = self.staging.take().expect("write was staged");
        let data = staging.contents().await.map_err(|e| Error::io(Operation::Close, e))?;
        drop(staging);

        let client = self.fs.client(&self.authority).await?;
        let result = async {
            FtpFile::make_dirs(&client, &libvfs::paths::dirname(&self.path))
                .await
                .map_err(|e| e.with_op(Operation::Close))?;
            client
                .stor_from(&self.path, data, 0)
                .await
                .map(|_| ())
                .map_err(|e| e.with_op(Operation::Close))
        }
        .await;
        self.fs.done();
        result
    }

    async fn close_inner(&mut self) -> Result<()> {
        let result = if self.write_called { self.upload_staged().await } else { Ok(()) };
        self.staging = None;
        self.cursor = 0;
        self.read_called = false;
        self.seek_called = false;
        self.write_called = false;
        self.eof_seen = false;
        result
    }

    async fn touch_inner(&mut self) -> Result<()> {
        let client = self.fs.client(&self.authority).await?;
        let result = async {
            match client.size(&self.path).await {
                Ok(_) => {
                    // No MFMT on the wire: re-upload the same bytes to
                    // advance the server-side timestamp.
                    let data = client.retr_from(&self.path, 0).await.map_err(|e| e.with_op(Operation::Touch))?;
                    client.stor_from(&self.path, data, 0).await.map(|_| ()).map_err(|e| e.with_op(Operation::Touch))
                }
                Err(e) if e.is_not_found() => {
                    FtpFile::make_dirs(&client, &libvfs::paths::dirname(&self.path))
                        .await
                        .map_err(|e| e.with_op(Operation::Touch))?;
                    client
                        .stor_from(&self.path, Vec::new(), 0)
                        .await
                        .map(|_| ())
                        .map_err(|e| e.with_op(Operation::Touch))
                }
                Err(e) => Err(e.with_op(Operation::Touch)),
            }
        }
        .await;
        self.fs.done();
        result
    }

    async fn move_native(&mut self, target_path: &str) -> Result<()> {
        self.close_inner().await?;
        let client = self.fs.client(&self.authority).await?;
        let result = async {
            FtpFile::make_dirs(&client, &libvfs::paths::dirname(target_path))
                .await
                .map_err(|e| e.with_op(Operation::MoveToFile))?;
            match client.delete(target_path).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e.with_op(Operation::MoveToFile)),
            }
            client.rename(&self.path, target_path).await.map_err(|e| e.with_op(Operation::MoveToFile))
        }
        .await;
        self.fs.done();
        result
    }
}

#[async_trait]
impl File for FtpFile {
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
        Box::new(crate::FtpLocation::new(
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
        let client = self.fs.client(&self.authority).await?;
        let result = client.size(&self.path).await;
        self.fs.done();
        match result {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e.with_op(Operation::Exists)),
        }
    }

    async fn size(&self) -> Result<u64> {
        let client = self.fs.client(&self.authority).await?;
        let result = client.size(&self.path).await;
        self.fs.done();
        match result {
            Ok(Some(size)) => Ok(size),
            Ok(None) => Err(Error::bare(Operation::Size, ErrorKind::Unsupported)),
            Err(e) => Err(e.with_op(Operation::Size)),
        }
    }

    async fn last_modified(&self) -> Result<SystemTime> {
        let client = self.fs.client(&self.authority).await?;
        let result = client.mdtm(&self.path).await;
        self.fs.done();
        match result {
            Ok(Some(stamp)) => Ok(stamp),
            Ok(None) => Err(Error::bare(Operation::LastModified, ErrorKind::Unsupported)),
            Err(e) => Err(e.with_op(Operation::LastModified)),
        }
    }

    async fn touch(&mut self) -> Result<()> {
        self.touch_inner().await
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.read_inner(buf).await
    }

    async fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.write_inner(buf).await
    }

    async fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.seek_inner(pos).await
    }

    #[tracing_attributes::instrument(level = "debug", skip(self), fields(path = %self.path))]
    async fn close(&mut self) -> Result<()> {
        self.close_inner().await
    }

    async fn delete(&mut self) -> Result<()> {
        self.staging = None;
        let client = self.fs.client(&self.authority).await?;
        let result = client.delete(&self.path).await;
        self.fs.done();
        result
    }

    async fn move_to_file(&mut self, target: &mut dyn File) -> Result<()> {
        if libvfs::copy::same_target(&*self, &*target) {
            let target_path = target.path().to_string();
            return self.move_native(&target_path).await;
        }
        self.copy_to_file(target).await?;
        self.delete().await
    }
}
