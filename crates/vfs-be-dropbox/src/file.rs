//! The stateful file handle over the Dropbox API.
//!
//! Remote content cannot be seeked, so the handle stages it locally (see
//! the crate docs). Close uploads single-shot below the session
//! threshold and through an upload session of `chunk_size` parts above
//! it. Copy and move between Dropbox paths take the server-side
//! endpoints without moving a byte through this process.

use crate::DbxFs;
use async_trait::async_trait;
use libvfs::staging::Staging;
use libvfs::{Authority, Error, File, FileSystem, Location, Operation, Result};
use std::io::SeekFrom;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::debug;

/// A single-cursor handle on one remote file, backed by local staging.
#[derive(Debug)]
pub struct DbxFile {
    fs: Arc<DbxFs>,
    authority: Authority,
    path: String,
    cursor: u64,
    staging: Option<Staging>,
    read_called: bool,
    seek_called: bool,
    write_called: bool,
    eof_seen: bool,
}

impl DbxFile {
    pub(crate) fn new(fs: Arc<DbxFs>, authority: Authority, path: String) -> DbxFile {
        DbxFile {
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

    async fn stage_remote(&mut self, op: Operation) -> Result<()> {
        let data = self.fs.client().download(&self.path).await.map_err(|e| e.with_op(op))?;
        let mut staging = self.new_staging(op).await?;
        staging.fill(&data).await.map_err(|e| Error::io(op, e))?;
        self.staging = Some(staging);
        Ok(())
    }

    async fn upload_staged(&mut self) -> Result<()> {
        let mut staging = self.staging.take().expect("write was staged");
        let data = staging.contents().await.map_err(|e| Error::io(Operation::Close, e))?;
        drop(staging);

        let client = self.fs.client();
        if (data.len() as u64) <= self.fs.session_threshold() {
            return client.upload(&self.path, data).await.map_err(|e| e.with_op(Operation::Close));
        }

        // Multi-part: first chunk starts the session, the rest append,
        // an empty final chunk commits.
        let chunk_size = self.fs.options().chunk_size.max(1);
        let total = data.len() as u64;
        debug!(total, chunk_size, "content exceeds the single-shot threshold, using an upload session");
        let mut chunks = data.chunks(chunk_size);
        let first = chunks.next().unwrap_or_default();
        let session = client.upload_start(first.to_vec()).await.map_err(|e| e.with_op(Operation::Close))?;
        let mut offset = first.len() as u64;
        for chunk in chunks {
            client
                .upload_append(&session, offset, chunk.to_vec())
                .await
                .map_err(|e| e.with_op(Operation::Close))?;
            offset += chunk.len() as u64;
        }
        client
            .upload_finish(&session, offset, &self.path, Vec::new())
            .await
            .map_err(|e| e.with_op(Operation::Close))
    }

    fn reset(&mut self) {
        self.staging = None;
        self.cursor = 0;
        self.read_called = false;
        self.seek_called = false;
        self.write_called = false;
        self.eof_seen = false;
    }
}

#[async_trait]
impl File for DbxFile {
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
        Box::new(crate::DbxLocation::new(
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
        match self.fs.client().metadata(&self.path).await {
            Ok(info) => Ok(!info.is_dir),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e.with_op(Operation::Exists)),
        }
    }

    async fn size(&self) -> Result<u64> {
        self.fs
            .client()
            .metadata(&self.path)
            .await
            .map(|info| info.size)
            .map_err(|e| e.with_op(Operation::Size))
    }

    async fn last_modified(&self) -> Result<SystemTime> {
        let info = self.fs.client().metadata(&self.path).await.map_err(|e| e.with_op(Operation::LastModified))?;
        info.modified
            .ok_or_else(|| Error::bare(Operation::LastModified, libvfs::ErrorKind::Protocol))
    }

    async fn touch(&mut self) -> Result<()> {
        let client = self.fs.client();
        match client.metadata(&self.path).await {
            // Overwriting with the same bytes advances the server-side
            // timestamp; the API has no bare touch.
            Ok(_) => {
                let data = client.download(&self.path).await.map_err(|e| e.with_op(Operation::Touch))?;
                client.upload(&self.path, data).await.map_err(|e| e.with_op(Operation::Touch))
            }
            Err(e) if e.is_not_found() => client.upload(&self.path, Vec::new()).await.map_err(|e| e.with_op(Operation::Touch)),
            Err(e) => Err(e.with_op(Operation::Touch)),
        }
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
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

    async fn write(&mut self, buf: &[u8]) -> Result<usize> {
        if self.staging.is_none() {
            if self.read_called || self.seek_called {
                match self.stage_remote(Operation::Write).await {
                    Ok(()) => {}
                    Err(e) if e.is_not_found() => {
                        self.staging = Some(self.new_staging(Operation::Write).await?);
                    }
                    Err(e) => return Err(e),
                }
            } else {
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

    async fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let len = match self.staging.as_mut() {
            Some(staging) => staging.size().await.map_err(|e| Error::io(Operation::Seek, e))?,
            None => match self.fs.client().metadata(&self.path).await {
                Ok(info) => info.size,
                Err(e) if e.is_not_found() => 0,
                Err(e) => return Err(e.with_op(Operation::Seek)),
            },
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

    #[tracing_attributes::instrument(level = "debug", skip(self), fields(path = %self.path))]
    async fn close(&mut self) -> Result<()> {
        let result = if self.write_called { self.upload_staged().await } else { Ok(()) };
        self.reset();
        result
    }

    async fn delete(&mut self) -> Result<()> {
        self.staging = None;
        self.fs.client().delete(&self.path).await
    }

    async fn copy_to_file(&mut self, target: &mut dyn File) -> Result<()> {
        // The service copies server-side; take that path whenever both
        // ends are this namespace and no local state is pending. The
        // authority is empty for every account, so the namespace check is
        // file-system identity.
        if libvfs::copy::same_filesystem(&*self, &*target) && self.cursor == 0 && self.staging.is_none() {
            let client = self.fs.client();
            match client.delete(target.path()).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e.with_op(Operation::CopyToFile)),
            }
            return client.copy_entry(&self.path, target.path()).await.map_err(|e| e.with_op(Operation::CopyToFile));
        }
        let buffer = self.fs.options().file_buffer_size;
        libvfs::copy::stream_to(self, target, buffer).await
    }

    async fn move_to_file(&mut self, target: &mut dyn File) -> Result<()> {
        if libvfs::copy::same_filesystem(&*self, &*target) {
            self.close().await?;
            let client = self.fs.client();
            match client.delete(target.path()).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e.with_op(Operation::MoveToFile)),
            }
            return client.move_entry(&self.path, target.path()).await.map_err(|e| e.with_op(Operation::MoveToFile));
        }
        self.copy_to_file(target).await?;
        self.delete().await
    }
}
