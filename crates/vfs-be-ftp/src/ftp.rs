//! The async_ftp-backed session constructor and client.
//!
//! One control connection per session, guarded by a mutex: the FTP
//! protocol is strictly sequential, so concurrent handles sharing the
//! session serialize here.

use crate::client::{ClientBuilder, DirEntry, FtpClient};
use crate::{DEFAULT_PORT, parser};
use async_ftp::FtpStream;
use async_ftp::types::{FileType, FtpError};
use async_trait::async_trait;
use libvfs::{Authority, Error, ErrorKind, FsOptions, Operation, Result};
use std::fmt;
use std::io::Cursor;
use std::time::SystemTime;
use tokio::sync::Mutex;
use tracing::debug;

/// Builds live sessions over the `async_ftp` crate.
#[derive(Debug)]
pub struct AsyncFtpBuilder;

fn map_ftp(op: Operation, e: FtpError) -> Error {
    // The protocol reports failures as reply codes inside the message;
    // 550 covers missing files and directories, 553 bad names, 530 auth.
    let text = e.to_string();
    let kind = if text.contains("550") {
        ErrorKind::NotFound
    } else if text.contains("530") || text.contains("532") {
        ErrorKind::Permission
    } else if text.contains("421") || text.contains("425") || text.contains("426") {
        ErrorKind::Connection
    } else if text.contains("553") {
        ErrorKind::Validation
    } else {
        ErrorKind::Io
    };
    Error::new(op, kind, e)
}

#[async_trait]
impl ClientBuilder for AsyncFtpBuilder {
    async fn build(&self, authority: &Authority, options: &FsOptions) -> Result<Box<dyn FtpClient>> {
        let hostport = authority.host_port(DEFAULT_PORT);
        let mut stream = FtpStream::connect(hostport.clone())
            .await
            .map_err(|e| map_ftp(Operation::Connect, e))?;

        let user = if authority.username().is_empty() { "anonymous" } else { authority.username() };
        let password = options
            .password
            .as_ref()
            .or_else(|| authority.password())
            .map(|secret| secret.reveal().to_string())
            .unwrap_or_else(|| "anonymous".to_string());
        stream.login(user, &password).await.map_err(|e| map_ftp(Operation::Connect, e))?;
        stream
            .transfer_type(FileType::Binary)
            .await
            .map_err(|e| map_ftp(Operation::Connect, e))?;
        debug!(%hostport, user, "ftp session established");

        Ok(Box::new(AsyncFtpClient {
            stream: Mutex::new(stream),
        }))
    }
}

/// The live session: one logged-in control connection.
pub(crate) struct AsyncFtpClient {
    stream: Mutex<FtpStream>,
}

impl fmt::Debug for AsyncFtpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AsyncFtpClient")
    }
}

#[async_trait]
impl FtpClient for AsyncFtpClient {
    async fn list(&self, path: &str) -> Result<Vec<DirEntry>> {
        let mut stream = self.stream.lock().await;
        let lines = stream.list(Some(path)).await.map_err(|e| map_ftp(Operation::List, e))?;
        Ok(lines.iter().filter_map(|line| parser::parse_line(line)).collect())
    }

    async fn retr_from(&self, path: &str, offset: u64) -> Result<Vec<u8>> {
        let mut stream = self.stream.lock().await;
        let cursor = stream.simple_retr(path).await.map_err(|e| map_ftp(Operation::Read, e))?;
        let mut data = cursor.into_inner();
        // The client crate exposes no REST; the offset is applied here.
        if offset > 0 {
            let offset = (offset as usize).min(data.len());
            data.drain(..offset);
        }
        Ok(data)
    }

    async fn stor_from(&self, path: &str, data: Vec<u8>, offset: u64) -> Result<u64> {
        if offset != 0 {
            return Err(Error::bare(Operation::Write, ErrorKind::Unsupported));
        }
        let len = data.len() as u64;
        let mut reader = Cursor::new(data);
        let mut stream = self.stream.lock().await;
        stream.put(path, &mut reader).await.map_err(|e| map_ftp(Operation::Write, e))?;
        Ok(len)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let mut stream = self.stream.lock().await;
        stream.rm(path).await.map_err(|e| map_ftp(Operation::Delete, e))
    }

    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        let mut stream = self.stream.lock().await;
        stream.rename(from, to).await.map_err(|e| map_ftp(Operation::MoveToFile, e))
    }

    async fn make_dir(&self, path: &str) -> Result<()> {
        let mut stream = self.stream.lock().await;
        match stream.mkdir(path).await {
            Ok(()) => Ok(()),
            // Racing another creator or an already existing directory is
            // indistinguishable on the wire; both are fine.
            Err(e) if e.to_string().contains("550") => Ok(()),
            Err(e) => Err(map_ftp(Operation::Mkdir, e)),
        }
    }

    async fn size(&self, path: &str) -> Result<Option<u64>> {
        let mut stream = self.stream.lock().await;
        let size = stream.size(path).await.map_err(|e| map_ftp(Operation::Size, e))?;
        Ok(size.map(|n| n as u64))
    }

    async fn mdtm(&self, path: &str) -> Result<Option<SystemTime>> {
        let mut stream = self.stream.lock().await;
        let stamp = stream.mdtm(path).await.map_err(|e| map_ftp(Operation::LastModified, e))?;
        Ok(stamp.map(SystemTime::from))
    }

    async fn quit(&self) {
        let mut stream = self.stream.lock().await;
        if let Err(e) = stream.quit().await {
            debug!(error = %e, "ftp quit reported an error");
        }
    }
}
