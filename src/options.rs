//! Per-backend configuration.
//!
//! One [`FsOptions`] record travels with every `FileSystem` instance.
//! Backends read the keys they recognize and ignore the rest, so a single
//! deserialized configuration block can feed any scheme. Changing options
//! means constructing a new `FileSystem`; a live instance never observes
//! option changes.

use crate::errors::{Error, Operation, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Idle seconds before a shared backend session is torn down.
pub const DEFAULT_AUTO_DISCONNECT_SECS: u64 = 10;
/// Upper bound in seconds on TCP dial plus handshake plus authentication.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
/// Buffer size for generic stream copies.
pub const DEFAULT_FILE_BUFFER_SIZE: usize = 1024 * 1024;
/// Chunk size for cloud-drive multi-part uploads.
pub const DEFAULT_CHUNK_SIZE: usize = 4 * 1024 * 1024;
/// Retries applied to transient cloud failures.
pub const DEFAULT_RETRY_COUNT: u32 = 3;

/// A string that refuses to print itself.
///
/// Holds passwords, passphrases and tokens. `Debug` output is redacted;
/// there is deliberately no `Display` implementation. Serialization is
/// transparent so configuration files round-trip.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Wraps a secret value.
    pub fn new(value: impl Into<String>) -> Secret {
        Secret(value.into())
    }

    /// The actual value, for handing to an authentication call.
    pub fn reveal(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(******)")
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Secret {
        Secret::new(value)
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Secret {
        Secret::new(value)
    }
}

/// Host identity predicate: `(host, raw server key) -> accept`.
pub type HostKeyCheck = Arc<dyn Fn(&str, &[u8]) -> bool + Send + Sync>;

/// The per-backend configuration record.
///
/// Unknown keys in a deserialized configuration are ignored; absent keys
/// take the documented defaults.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FsOptions {
    /// Authentication secret; backends may let an environment variable
    /// override it.
    pub password: Option<Secret>,
    /// Private key for public-key authentication.
    pub key_file_path: Option<PathBuf>,
    /// Passphrase protecting [`FsOptions::key_file_path`].
    pub key_passphrase: Option<Secret>,
    /// Host identity validation from a known-hosts file.
    pub known_hosts_file: Option<PathBuf>,
    /// Host identity validation from inline known-hosts lines.
    pub known_hosts_string: Option<String>,
    /// Host identity validation by caller-provided predicate. Takes
    /// precedence over the file and string forms.
    #[serde(skip)]
    pub known_hosts_callback: Option<HostKeyCheck>,
    /// Comma-separated key exchange algorithm preferences.
    pub key_exchanges: Option<String>,
    /// Comma-separated cipher preferences, applied in both directions.
    pub ciphers: Option<String>,
    /// Comma-separated MAC preferences, applied in both directions.
    pub macs: Option<String>,
    /// Comma-separated host key algorithm preferences.
    pub host_key_algorithms: Option<String>,
    /// Idle seconds before the shared session is torn down.
    pub auto_disconnect: u64,
    /// Upper bound in seconds on dial plus handshake plus authentication.
    pub connect_timeout: u64,
    /// Buffer size in bytes for generic stream copies.
    pub file_buffer_size: usize,
    /// Octal mode string applied to newly written files, e.g. `"0664"`.
    pub file_permissions: Option<String>,
    /// Bearer token for cloud-drive backends.
    pub access_token: Option<Secret>,
    /// Chunk size in bytes for multi-part cloud uploads.
    pub chunk_size: usize,
    /// Directory for local staging files; the system default when absent.
    pub temp_dir: Option<PathBuf>,
    /// Retries applied to transient cloud failures.
    pub retry_count: u32,
}

impl Default for FsOptions {
    fn default() -> FsOptions {
        FsOptions {
            password: None,
            key_file_path: None,
            key_passphrase: None,
            known_hosts_file: None,
            known_hosts_string: None,
            known_hosts_callback: None,
            key_exchanges: None,
            ciphers: None,
            macs: None,
            host_key_algorithms: None,
            auto_disconnect: DEFAULT_AUTO_DISCONNECT_SECS,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT_SECS,
            file_buffer_size: DEFAULT_FILE_BUFFER_SIZE,
            file_permissions: None,
            access_token: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            temp_dir: None,
            retry_count: DEFAULT_RETRY_COUNT,
        }
    }
}

impl FsOptions {
    /// Options with every key at its default.
    pub fn new() -> FsOptions {
        FsOptions::default()
    }

    /// Sets the authentication password.
    pub fn with_password(mut self, password: impl Into<Secret>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Sets the private key file for public-key authentication.
    pub fn with_key_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.key_file_path = Some(path.into());
        self
    }

    /// Sets the passphrase protecting the private key file.
    pub fn with_key_passphrase(mut self, passphrase: impl Into<Secret>) -> Self {
        self.key_passphrase = Some(passphrase.into());
        self
    }

    /// Validates host identities against a known-hosts file.
    pub fn with_known_hosts_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts_file = Some(path.into());
        self
    }

    /// Validates host identities against inline known-hosts lines.
    pub fn with_known_hosts_string(mut self, lines: impl Into<String>) -> Self {
        self.known_hosts_string = Some(lines.into());
        self
    }

    /// Validates host identities with a caller-provided predicate.
    pub fn with_known_hosts_callback(mut self, check: HostKeyCheck) -> Self {
        self.known_hosts_callback = Some(check);
        self
    }

    /// Sets key exchange algorithm preferences.
    pub fn with_key_exchanges(mut self, csv: impl Into<String>) -> Self {
        self.key_exchanges = Some(csv.into());
        self
    }

    /// Sets cipher preferences.
    pub fn with_ciphers(mut self, csv: impl Into<String>) -> Self {
        self.ciphers = Some(csv.into());
        self
    }

    /// Sets MAC preferences.
    pub fn with_macs(mut self, csv: impl Into<String>) -> Self {
        self.macs = Some(csv.into());
        self
    }

    /// Sets host key algorithm preferences.
    pub fn with_host_key_algorithms(mut self, csv: impl Into<String>) -> Self {
        self.host_key_algorithms = Some(csv.into());
        self
    }

    /// Sets the idle-disconnect window in seconds.
    pub fn with_auto_disconnect(mut self, seconds: u64) -> Self {
        self.auto_disconnect = seconds;
        self
    }

    /// Sets the session establishment budget in seconds.
    pub fn with_connect_timeout(mut self, seconds: u64) -> Self {
        self.connect_timeout = seconds;
        self
    }

    /// Sets the stream-copy buffer size in bytes.
    pub fn with_file_buffer_size(mut self, bytes: usize) -> Self {
        self.file_buffer_size = bytes;
        self
    }

    /// Sets the octal mode string applied to newly written files.
    pub fn with_file_permissions(mut self, octal: impl Into<String>) -> Self {
        self.file_permissions = Some(octal.into());
        self
    }

    /// Sets the cloud-drive bearer token.
    pub fn with_access_token(mut self, token: impl Into<Secret>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Sets the multi-part upload chunk size in bytes.
    pub fn with_chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size = bytes;
        self
    }

    /// Sets the directory used for local staging files.
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    /// Sets the transient-failure retry count.
    pub fn with_retry_count(mut self, count: u32) -> Self {
        self.retry_count = count;
        self
    }

    /// The idle-disconnect window as a [`Duration`].
    pub fn auto_disconnect_window(&self) -> Duration {
        Duration::from_secs(self.auto_disconnect)
    }

    /// The session establishment budget as a [`Duration`].
    pub fn connect_budget(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    /// Parses [`FsOptions::file_permissions`] as an octal mode.
    pub fn file_permissions_mode(&self) -> Result<Option<u32>> {
        match &self.file_permissions {
            None => Ok(None),
            Some(s) => u32::from_str_radix(s, 8)
                .map(Some)
                .map_err(|_| Error::validation(Operation::Chmod, format!("file_permissions {s:?} is not an octal mode"))),
        }
    }
}

impl fmt::Debug for FsOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FsOptions")
            .field("password", &self.password)
            .field("key_file_path", &self.key_file_path)
            .field("known_hosts_file", &self.known_hosts_file)
            .field("known_hosts_string", &self.known_hosts_string.as_deref().map(|_| "…"))
            .field("known_hosts_callback", &self.known_hosts_callback.as_ref().map(|_| "fn"))
            .field("key_exchanges", &self.key_exchanges)
            .field("ciphers", &self.ciphers)
            .field("macs", &self.macs)
            .field("host_key_algorithms", &self.host_key_algorithms)
            .field("auto_disconnect", &self.auto_disconnect)
            .field("connect_timeout", &self.connect_timeout)
            .field("file_buffer_size", &self.file_buffer_size)
            .field("file_permissions", &self.file_permissions)
            .field("access_token", &self.access_token)
            .field("chunk_size", &self.chunk_size)
            .field("temp_dir", &self.temp_dir)
            .field("retry_count", &self.retry_count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults() {
        let opts = FsOptions::new();
        assert_eq!(opts.auto_disconnect_window(), Duration::from_secs(10));
        assert_eq!(opts.connect_budget(), Duration::from_secs(30));
        assert_eq!(opts.file_buffer_size, 1024 * 1024);
        assert_eq!(opts.chunk_size, 4 * 1024 * 1024);
        assert_eq!(opts.retry_count, 3);
        assert_eq!(opts.file_permissions_mode().unwrap(), None);
    }

    #[test]
    fn octal_permissions() {
        let opts = FsOptions::new().with_file_permissions("0664");
        assert_eq!(opts.file_permissions_mode().unwrap(), Some(0o664));

        let bad = FsOptions::new().with_file_permissions("rw-r--r--");
        assert!(bad.file_permissions_mode().is_err());
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let opts: FsOptions = serde_json::from_str(r#"{"auto_disconnect": 3, "frobnicate": true}"#).unwrap();
        assert_eq!(opts.auto_disconnect, 3);
        assert_eq!(opts.connect_timeout, DEFAULT_CONNECT_TIMEOUT_SECS);
    }

    #[test]
    fn secrets_do_not_leak_via_debug() {
        let opts = FsOptions::new().with_password("hunter2").with_access_token("tok");
        let dump = format!("{opts:?}");
        assert!(!dump.contains("hunter2"));
        assert!(!dump.contains("tok\""));
        assert!(dump.contains("Secret(******)"));
    }
}
