//! The stateful file handle over an in-memory volume.

use crate::{MemFs, MemLocation, store};
use async_trait::async_trait;
use libvfs::{Authority, Error, ErrorKind, File, FileSystem, Location, Operation, Result};
use std::io::SeekFrom;
use std::sync::Arc;
use std::time::SystemTime;

/// A single-cursor handle on one in-memory object.
///
/// Reads and writes go through a working copy of the object; `close`
/// publishes the working copy back to the volume when anything was
/// written.
#[derive(Debug)]
pub struct MemFile {
    fs: Arc<MemFs>,
    authority: Authority,
    volume: String,
    path: String,
    cursor: u64,
    buffer: Option<Vec<u8>>,
    read_called: bool,
    seek_called: bool,
    write_called: bool,
    eof_seen: bool,
}

impl MemFile {
    pub(crate) fn new(fs: Arc<MemFs>, authority: Authority, volume: String, path: String) -> MemFile {
        MemFile {
            fs,
            authority,
            volume,
            path,
            cursor: 0,
            buffer: None,
            read_called: false,
            seek_called: false,
            write_called: false,
            eof_seen: false,
        }
    }

    fn remote(&self) -> Option<store::Entry> {
        store::get(&self.volume, &self.path)
    }

    /// Length the cursor is measured against: the working copy when one
    /// is loaded, the remote object otherwise.
    fn content_len(&self) -> u64 {
        match &self.buffer {
            Some(buffer) => buffer.len() as u64,
            None => self.remote().map(|e| e.data.len() as u64).unwrap_or(0),
        }
    }
}

#[async_trait]
impl File for MemFile {
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
        Box::new(MemLocation::new(
            self.fs.clone(),
            self.authority.clone(),
            self.volume.clone(),
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
        Ok(self.remote().is_some())
    }

    async fn size(&self) -> Result<u64> {
        match self.remote() {
            Some(entry) => Ok(entry.data.len() as u64),
            None => Err(Error::new(Operation::Size, ErrorKind::NotFound, self.path.clone())),
        }
    }

    async fn last_modified(&self) -> Result<SystemTime> {
        match self.remote() {
            Some(entry) => Ok(entry.modified),
            None => Err(Error::new(Operation::LastModified, ErrorKind::NotFound, self.path.clone())),
        }
    }

    async fn touch(&mut self) -> Result<()> {
        if !store::touch(&self.volume, &self.path) {
            store::put(&self.volume, &self.path, Vec::new());
        }
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.eof_seen {
            return Ok(0);
        }
        if self.buffer.is_none() {
            let entry = self
                .remote()
                .ok_or_else(|| Error::new(Operation::Read, ErrorKind::NotFound, self.path.clone()))?;
            self.buffer = Some((*entry.data).clone());
        }
        self.read_called = true;
        let content = self.buffer.as_ref().expect("loaded above");
        let start = (self.cursor as usize).min(content.len());
        let n = (content.len() - start).min(buf.len());
        if n == 0 {
            self.eof_seen = true;
            return Ok(0);
        }
        buf[..n].copy_from_slice(&content[start..start + n]);
        self.cursor += n as u64;
        Ok(n)
    }

    async fn write(&mut self, buf: &[u8]) -> Result<usize> {
        if self.buffer.is_none() {
            // Before any read or seek the write replaces the object;
            // afterwards it edits a working copy of the remote content.
            self.buffer = Some(if self.read_called || self.seek_called {
                self.remote().map(|e| (*e.data).clone()).unwrap_or_default()
            } else {
                Vec::new()
            });
        }
        self.write_called = true;
        let content = self.buffer.as_mut().expect("ensured above");
        let start = self.cursor as usize;
        if content.len() < start {
            content.resize(start, 0);
        }
        let overlap = (content.len() - start).min(buf.len());
        content[start..start + overlap].copy_from_slice(&buf[..overlap]);
        content.extend_from_slice(&buf[overlap..]);
        self.cursor += buf.len() as u64;
        Ok(buf.len())
    }

    async fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let len = self.content_len();
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
        if self.write_called {
            let content = self.buffer.take().unwrap_or_default();
            store::put(&self.volume, &self.path, content);
        }
        self.buffer = None;
        self.cursor = 0;
        self.read_called = false;
        self.seek_called = false;
        self.write_called = false;
        self.eof_seen = false;
        Ok(())
    }

    async fn delete(&mut self) -> Result<()> {
        if store::remove(&self.volume, &self.path) {
            Ok(())
        } else {
            Err(Error::new(Operation::Delete, ErrorKind::NotFound, self.path.clone()))
        }
    }

    async fn move_to_file(&mut self, target: &mut dyn File) -> Result<()> {
        if libvfs::copy::same_target(&*self, &*target) {
            // Same volume: native rename, replacing any object at the
            // destination.
            self.close().await?;
            if !store::rename(&self.volume, &self.path, target.path()) {
                return Err(Error::new(Operation::MoveToFile, ErrorKind::NotFound, self.path.clone()));
            }
            return Ok(());
        }
        self.copy_to_file(target).await?;
        self.delete().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn fixture(volume: &str) -> (Arc<MemFs>, Authority) {
        (Arc::new(MemFs::new()), Authority::parse(volume).unwrap())
    }

    fn file(fs: &Arc<MemFs>, authority: &Authority, path: &str) -> MemFile {
        MemFile::new(fs.clone(), authority.clone(), authority.host().to_string(), path.to_string())
    }

    #[tokio::test]
    async fn write_publishes_on_close_only() {
        let (fs, authority) = fixture("pub-on-close");
        let mut f = file(&fs, &authority, "/a.txt");
        f.write(b"hello").await.unwrap();
        assert!(!f.exists().await.unwrap(), "working copy must stay invisible until close");
        f.close().await.unwrap();
        assert!(f.exists().await.unwrap());
        assert_eq!(f.size().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn fresh_write_truncates_but_seeked_write_edits() {
        let (fs, authority) = fixture("write-modes");
        let mut f = file(&fs, &authority, "/m.txt");
        f.write(b"ABCDEFGH").await.unwrap();
        f.close().await.unwrap();

        // Fresh handle, immediate write: truncate semantics.
        let mut f = file(&fs, &authority, "/m.txt");
        f.write(b"xy").await.unwrap();
        f.close().await.unwrap();
        assert_eq!(f.size().await.unwrap(), 2);

        // Seek first: edit in place.
        let mut f = file(&fs, &authority, "/m.txt");
        f.write(b"ABCDEFGH").await.unwrap();
        f.close().await.unwrap();
        let mut f = file(&fs, &authority, "/m.txt");
        f.seek(SeekFrom::Start(2)).await.unwrap();
        f.write(b"..").await.unwrap();
        f.close().await.unwrap();
        let mut out = vec![0u8; 16];
        let mut f = file(&fs, &authority, "/m.txt");
        let n = f.read(&mut out).await.unwrap();
        assert_eq!(&out[..n], b"AB..EFGH");
    }

    #[tokio::test]
    async fn write_past_end_zero_fills() {
        let (fs, authority) = fixture("gap");
        let mut f = file(&fs, &authority, "/g.bin");
        f.seek(SeekFrom::Start(4)).await.unwrap();
        f.write(b"zz").await.unwrap();
        f.close().await.unwrap();
        let mut f = file(&fs, &authority, "/g.bin");
        let mut out = vec![0u8; 16];
        let n = f.read(&mut out).await.unwrap();
        assert_eq!(&out[..n], b"\0\0\0\0zz");
    }

    #[tokio::test]
    async fn closed_handle_behaves_fresh() {
        let (fs, authority) = fixture("reuse");
        let mut f = file(&fs, &authority, "/r.txt");
        f.write(b"one").await.unwrap();
        f.close().await.unwrap();
        assert_eq!(f.cursor(), 0);

        // Reused after close: a write truncates again.
        f.write(b"2").await.unwrap();
        f.close().await.unwrap();
        assert_eq!(f.size().await.unwrap(), 1);

        // Idempotent close.
        f.close().await.unwrap();
        f.close().await.unwrap();
    }
}
