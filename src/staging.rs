//! Local temp-file staging for backends without random I/O.
//!
//! A cloud drive or plain FTP data connection cannot seek. The file
//! handles of those backends download the remote content into a
//! [`Staging`] buffer once, serve reads and seeks from it, collect writes
//! into it, and upload it on close. The backing file lives in the
//! configured temp directory and is unlinked when the buffer is dropped,
//! regardless of upload outcome.

use std::io::SeekFrom;
use std::path::Path;
use tempfile::{Builder, NamedTempFile};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

/// A seekable local buffer backing one remote file handle.
#[derive(Debug)]
pub struct Staging {
    // Holds the path alive and unlinks it on drop.
    tmp: NamedTempFile,
    file: File,
}

impl Staging {
    /// Creates an empty staging buffer in `temp_dir`, or in the system
    /// temp directory when `None`.
    pub async fn create(temp_dir: Option<&Path>) -> std::io::Result<Staging> {
        let mut builder = Builder::new();
        builder.prefix(".vfs-staging-");
        let tmp = match temp_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        let file = File::from_std(tmp.reopen()?);
        Ok(Staging { tmp, file })
    }

    /// Replaces the buffer content with `data` and rewinds to zero.
    pub async fn fill(&mut self, data: &[u8]) -> std::io::Result<()> {
        self.file.set_len(0).await?;
        self.file.seek(SeekFrom::Start(0)).await?;
        self.file.write_all(data).await?;
        self.file.flush().await?;
        self.file.seek(SeekFrom::Start(0)).await?;
        Ok(())
    }

    /// Reads at the buffer cursor.
    pub async fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.file.read(buf).await
    }

    /// Writes at the buffer cursor.
    pub async fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        self.file.write_all(buf).await
    }

    /// Repositions the buffer cursor.
    pub async fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.file.seek(pos).await
    }

    /// Truncates or extends the buffer.
    pub async fn set_len(&mut self, len: u64) -> std::io::Result<()> {
        self.file.set_len(len).await
    }

    /// Current length of the buffer in bytes.
    pub async fn size(&mut self) -> std::io::Result<u64> {
        Ok(self.file.metadata().await?.len())
    }

    /// Flushes writes, rewinds and returns the full buffer content.
    pub async fn contents(&mut self) -> std::io::Result<Vec<u8>> {
        self.file.flush().await?;
        self.file.seek(SeekFrom::Start(0)).await?;
        let mut out = Vec::new();
        self.file.read_to_end(&mut out).await?;
        Ok(out)
    }

    /// The path of the backing file.
    pub fn path(&self) -> &Path {
        self.tmp.path()
    }
}
