//! The ssh2-backed session constructor and client.
//!
//! This module is the only place the SSH protocol library is touched.
//! libssh2 is a blocking library, so every wire call runs on the blocking
//! thread pool; the `ssh2` types are internally locked and shared through
//! an `Arc`.

use crate::client::{ClientBuilder, EntryInfo, OpenMode, SftpClient, SftpHandle};
use crate::{DEFAULT_PORT, env};
use async_trait::async_trait;
use libvfs::{Authority, Error, ErrorKind, FsOptions, Operation, Result};
use ssh2::{CheckResult, ErrorCode, KnownHostFileKind, MethodType, OpenFlags, OpenType, RenameFlags};
use std::fmt;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, UNIX_EPOCH};
use tracing::{debug, warn};

/// Builds live sessions over libssh2.
#[derive(Debug)]
pub struct Ssh2Builder;

#[async_trait]
impl ClientBuilder for Ssh2Builder {
    async fn build(&self, authority: &Authority, options: &FsOptions) -> Result<Box<dyn SftpClient>> {
        let authority = authority.clone();
        let options = options.clone();
        let joined = tokio::task::spawn_blocking(move || connect_blocking(&authority, &options))
            .await
            .map_err(|e| Error::new(Operation::Connect, ErrorKind::Connection, e))?;
        joined.map(|client| Box::new(client) as Box<dyn SftpClient>)
    }
}

/// Runs one blocking closure on the blocking pool, surfacing its result.
async fn run<T, F>(op: Operation, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::new(op, ErrorKind::Io, e))?
}

fn map_ssh2(op: Operation, e: ssh2::Error) -> Error {
    // LIBSSH2_FX_NO_SUCH_FILE = 2, FX_PERMISSION_DENIED = 3,
    // FX_NO_SUCH_PATH = 10.
    let kind = match e.code() {
        ErrorCode::SFTP(2) | ErrorCode::SFTP(10) => ErrorKind::NotFound,
        ErrorCode::SFTP(3) => ErrorKind::Permission,
        ErrorCode::Session(_) => ErrorKind::Connection,
        _ => ErrorKind::Io,
    };
    Error::new(op, kind, e)
}

fn remaining(deadline: Instant) -> Result<Duration> {
    let left = deadline.saturating_duration_since(Instant::now());
    if left.is_zero() {
        return Err(Error::bare(Operation::Connect, ErrorKind::Connection));
    }
    Ok(left)
}

/// Dial, handshake, host-key validation and authentication, all under
/// one deadline derived from `connect_timeout`.
fn connect_blocking(authority: &Authority, options: &FsOptions) -> Result<Ssh2Client> {
    let deadline = Instant::now() + options.connect_budget();
    let hostport = authority.host_port(DEFAULT_PORT);

    let addr = hostport
        .to_socket_addrs()
        .map_err(|e| Error::io(Operation::Connect, e))?
        .next()
        .ok_or_else(|| Error::new(Operation::Connect, ErrorKind::Connection, format!("{hostport} resolves to no address")))?;
    let stream = TcpStream::connect_timeout(&addr, remaining(deadline)?).map_err(|e| Error::io(Operation::Connect, e))?;
    debug!(%hostport, "tcp connected, starting ssh handshake");

    let mut session = ssh2::Session::new().map_err(|e| map_ssh2(Operation::Connect, e))?;
    if let Some(csv) = &options.key_exchanges {
        session.method_pref(MethodType::Kex, csv).map_err(|e| map_ssh2(Operation::Connect, e))?;
    }
    if let Some(csv) = &options.host_key_algorithms {
        session.method_pref(MethodType::HostKey, csv).map_err(|e| map_ssh2(Operation::Connect, e))?;
    }
    if let Some(csv) = &options.ciphers {
        session.method_pref(MethodType::CryptCs, csv).map_err(|e| map_ssh2(Operation::Connect, e))?;
        session.method_pref(MethodType::CryptSc, csv).map_err(|e| map_ssh2(Operation::Connect, e))?;
    }
    if let Some(csv) = &options.macs {
        session.method_pref(MethodType::MacCs, csv).map_err(|e| map_ssh2(Operation::Connect, e))?;
        session.method_pref(MethodType::MacSc, csv).map_err(|e| map_ssh2(Operation::Connect, e))?;
    }

    // Bounds every subsequent libssh2 call, so the handshake and the
    // authentication exchange stay inside the budget.
    session.set_timeout(remaining(deadline)?.as_millis() as u32);
    session.set_tcp_stream(stream);
    session.handshake().map_err(|e| map_ssh2(Operation::Connect, e))?;

    verify_host_key(&session, authority, options)?;
    authenticate(&session, authority, options)?;

    let sftp = session.sftp().map_err(|e| map_ssh2(Operation::Connect, e))?;
    Ok(Ssh2Client {
        inner: Arc::new(Ssh2Inner { session, sftp }),
    })
}

fn verify_host_key(session: &ssh2::Session, authority: &Authority, options: &FsOptions) -> Result<()> {
    let (key, _key_type) = session
        .host_key()
        .ok_or_else(|| Error::new(Operation::Connect, ErrorKind::Connection, "server presented no host key"))?;

    if let Some(check) = &options.known_hosts_callback {
        if check(authority.host(), key) {
            return Ok(());
        }
        return Err(Error::new(
            Operation::Connect,
            ErrorKind::Connection,
            format!("host key for {} rejected by callback", authority.host()),
        ));
    }

    let mut known = session.known_hosts().map_err(|e| map_ssh2(Operation::Connect, e))?;
    if let Some(lines) = &options.known_hosts_string {
        for line in lines.lines().filter(|l| !l.trim().is_empty()) {
            known.read_str(line, KnownHostFileKind::OpenSSH).map_err(|e| map_ssh2(Operation::Connect, e))?;
        }
    } else if let Some(file) = &options.known_hosts_file {
        known.read_file(file, KnownHostFileKind::OpenSSH).map_err(|e| map_ssh2(Operation::Connect, e))?;
    } else if env::insecure_known_hosts() {
        warn!(host = authority.host(), "host identity validation disabled by environment");
        return Ok(());
    } else if let Some(default_file) = default_known_hosts() {
        known
            .read_file(&default_file, KnownHostFileKind::OpenSSH)
            .map_err(|e| map_ssh2(Operation::Connect, e))?;
    } else {
        warn!(host = authority.host(), "no known-hosts source available, accepting host key");
        return Ok(());
    }

    let port = authority.port().unwrap_or(DEFAULT_PORT);
    match known.check_port(authority.host(), port, key) {
        CheckResult::Match => Ok(()),
        CheckResult::NotFound => Err(Error::new(
            Operation::Connect,
            ErrorKind::Connection,
            format!("host key for {} not present in known hosts", authority.host()),
        )),
        CheckResult::Mismatch => Err(Error::new(
            Operation::Connect,
            ErrorKind::Connection,
            format!("host key mismatch for {}", authority.host()),
        )),
        CheckResult::Failure => Err(Error::new(Operation::Connect, ErrorKind::Connection, "known hosts check failed")),
    }
}

fn default_known_hosts() -> Option<PathBuf> {
    let home = std::env::var_os("HOME")?;
    let path = PathBuf::from(home).join(".ssh").join("known_hosts");
    path.exists().then_some(path)
}

fn authenticate(session: &ssh2::Session, authority: &Authority, options: &FsOptions) -> Result<()> {
    let user = authority.username();
    if let Some(key_file) = &options.key_file_path {
        let passphrase = options.key_passphrase.as_ref().map(|p| p.reveal());
        session
            .userauth_pubkey_file(user, None, key_file, passphrase)
            .map_err(|e| map_ssh2(Operation::Connect, e))?;
    } else {
        let password = options
            .password
            .as_ref()
            .or_else(|| authority.password())
            .ok_or_else(|| Error::validation(Operation::Connect, format!("no credentials for {user}@{}", authority.host())))?;
        session
            .userauth_password(user, password.reveal())
            .map_err(|e| map_ssh2(Operation::Connect, e))?;
    }
    if !session.authenticated() {
        return Err(Error::new(
            Operation::Connect,
            ErrorKind::Connection,
            format!("authentication for {user}@{} did not complete", authority.host()),
        ));
    }
    Ok(())
}

struct Ssh2Inner {
    session: ssh2::Session,
    sftp: ssh2::Sftp,
}

/// The live session: one libssh2 session plus its SFTP channel.
pub(crate) struct Ssh2Client {
    inner: Arc<Ssh2Inner>,
}

impl fmt::Debug for Ssh2Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Ssh2Client")
    }
}

fn info_from(stat: &ssh2::FileStat) -> EntryInfo {
    EntryInfo {
        size: stat.size.unwrap_or(0),
        modified: stat.mtime.map(|secs| UNIX_EPOCH + Duration::from_secs(secs)),
        is_dir: stat.is_dir(),
    }
}

#[async_trait]
impl SftpClient for Ssh2Client {
    async fn stat(&self, path: &str) -> Result<EntryInfo> {
        let inner = self.inner.clone();
        let path = PathBuf::from(path);
        run(Operation::Exists, move || {
            inner
                .sftp
                .stat(&path)
                .map(|stat| info_from(&stat))
                .map_err(|e| map_ssh2(Operation::Exists, e))
        })
        .await
    }

    async fn read_dir(&self, path: &str) -> Result<Vec<(String, EntryInfo)>> {
        let inner = self.inner.clone();
        let path = PathBuf::from(path);
        run(Operation::List, move || {
            let entries = inner.sftp.readdir(&path).map_err(|e| map_ssh2(Operation::List, e))?;
            Ok(entries
                .into_iter()
                .filter_map(|(entry_path, stat)| {
                    entry_path
                        .file_name()
                        .map(|name| (name.to_string_lossy().into_owned(), info_from(&stat)))
                })
                .collect())
        })
        .await
    }

    async fn open(&self, path: &str, mode: OpenMode) -> Result<Box<dyn SftpHandle>> {
        let inner = self.inner.clone();
        let path = PathBuf::from(path);
        run(Operation::Open, move || {
            let mut flags = OpenFlags::empty();
            if mode.read {
                flags |= OpenFlags::READ;
            }
            if mode.write {
                flags |= OpenFlags::WRITE;
            }
            if mode.create {
                flags |= OpenFlags::CREATE;
            }
            if mode.truncate {
                flags |= OpenFlags::TRUNCATE;
            }
            let file = inner
                .sftp
                .open_mode(&path, flags, 0o644, OpenType::File)
                .map_err(|e| map_ssh2(Operation::Open, e))?;
            Ok(Box::new(Ssh2Handle {
                file: Arc::new(Mutex::new(file)),
            }) as Box<dyn SftpHandle>)
        })
        .await
    }

    async fn mkdir_all(&self, path: &str) -> Result<()> {
        let inner = self.inner.clone();
        let path = path.to_string();
        run(Operation::Mkdir, move || {
            let mut prefix = String::new();
            for segment in path.split('/').filter(|s| !s.is_empty()) {
                prefix.push('/');
                prefix.push_str(segment);
                let dir = Path::new(&prefix);
                if inner.sftp.stat(dir).is_ok() {
                    continue;
                }
                if let Err(e) = inner.sftp.mkdir(dir, 0o755) {
                    // Lost a race with another creator is fine.
                    if inner.sftp.stat(dir).is_err() {
                        return Err(map_ssh2(Operation::Mkdir, e));
                    }
                }
            }
            Ok(())
        })
        .await
    }

    async fn remove(&self, path: &str) -> Result<()> {
        let inner = self.inner.clone();
        let path = PathBuf::from(path);
        run(Operation::Delete, move || inner.sftp.unlink(&path).map_err(|e| map_ssh2(Operation::Delete, e))).await
    }

    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        let inner = self.inner.clone();
        let from = PathBuf::from(from);
        let to = PathBuf::from(to);
        run(Operation::MoveToFile, move || {
            inner
                .sftp
                .rename(&from, &to, Some(RenameFlags::OVERWRITE | RenameFlags::ATOMIC | RenameFlags::NATIVE))
                .map_err(|e| map_ssh2(Operation::MoveToFile, e))
        })
        .await
    }

    async fn chmod(&self, path: &str, mode: u32) -> Result<()> {
        let inner = self.inner.clone();
        let path = PathBuf::from(path);
        run(Operation::Chmod, move || {
            let stat = ssh2::FileStat {
                size: None,
                uid: None,
                gid: None,
                perm: Some(mode),
                atime: None,
                mtime: None,
            };
            inner.sftp.setstat(&path, stat).map_err(|e| map_ssh2(Operation::Chmod, e))
        })
        .await
    }

    async fn chtimes(&self, path: &str, atime: u64, mtime: u64) -> Result<()> {
        let inner = self.inner.clone();
        let path = PathBuf::from(path);
        run(Operation::Touch, move || {
            let stat = ssh2::FileStat {
                size: None,
                uid: None,
                gid: None,
                perm: None,
                atime: Some(atime),
                mtime: Some(mtime),
            };
            inner.sftp.setstat(&path, stat).map_err(|e| map_ssh2(Operation::Touch, e))
        })
        .await
    }

    async fn disconnect(&self) {
        let inner = self.inner.clone();
        let result = tokio::task::spawn_blocking(move || inner.session.disconnect(Some(ssh2::DisconnectCode::ByApplication), "idle disconnect", None)).await;
        match result {
            Ok(Ok(())) => debug!("ssh session disconnected"),
            Ok(Err(e)) => debug!(error = %e, "ssh disconnect reported an error"),
            Err(e) => debug!(error = %e, "ssh disconnect task failed"),
        }
    }
}

/// One open server-side file handle.
pub(crate) struct Ssh2Handle {
    file: Arc<Mutex<ssh2::File>>,
}

impl fmt::Debug for Ssh2Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Ssh2Handle")
    }
}

#[async_trait]
impl SftpHandle for Ssh2Handle {
    async fn read(&mut self, max: usize) -> Result<Vec<u8>> {
        let file = self.file.clone();
        run(Operation::Read, move || {
            let mut guard = file.lock().unwrap();
            let mut buf = vec![0u8; max.min(256 * 1024)];
            let n = std::io::Read::read(&mut *guard, &mut buf).map_err(|e| Error::io(Operation::Read, e))?;
            buf.truncate(n);
            Ok(buf)
        })
        .await
    }

    async fn write_all(&mut self, data: Vec<u8>) -> Result<()> {
        let file = self.file.clone();
        run(Operation::Write, move || {
            let mut guard = file.lock().unwrap();
            std::io::Write::write_all(&mut *guard, &data).map_err(|e| Error::io(Operation::Write, e))
        })
        .await
    }

    async fn seek(&mut self, pos: u64) -> Result<()> {
        let file = self.file.clone();
        run(Operation::Seek, move || {
            let mut guard = file.lock().unwrap();
            std::io::Seek::seek(&mut *guard, std::io::SeekFrom::Start(pos)).map_err(|e| Error::io(Operation::Seek, e))?;
            Ok(())
        })
        .await
    }

    async fn close(&mut self) -> Result<()> {
        let file = self.file.clone();
        run(Operation::Close, move || {
            let mut guard = file.lock().unwrap();
            guard.close().map_err(|e| map_ssh2(Operation::Close, e))
        })
        .await
    }
}
