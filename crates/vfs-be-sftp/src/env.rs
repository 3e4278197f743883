//! Environment fallbacks for credentials and host validation.
//!
//! Precedence: an explicit option value wins over the environment, the
//! environment wins over compiled defaults.

use libvfs::FsOptions;
use std::path::PathBuf;

/// Password fallback.
pub const PASSWORD: &str = "VFS_SFTP_PASSWORD";
/// Private key file fallback.
pub const KEYFILE: &str = "VFS_SFTP_KEYFILE";
/// Key passphrase fallback.
pub const KEYFILE_PASSPHRASE: &str = "VFS_SFTP_KEYFILE_PASSPHRASE";
/// Known-hosts file fallback.
pub const KNOWN_HOSTS_FILE: &str = "VFS_SFTP_KNOWN_HOSTS_FILE";
/// When `true`, skip host identity validation entirely.
pub const INSECURE_KNOWN_HOSTS: &str = "VFS_SFTP_INSECURE_KNOWN_HOSTS";

/// Fills unset credential and known-hosts keys from the environment.
pub(crate) fn apply(mut options: FsOptions) -> FsOptions {
    if options.password.is_none()
        && let Ok(value) = std::env::var(PASSWORD)
    {
        options.password = Some(value.into());
    }
    if options.key_file_path.is_none()
        && let Ok(value) = std::env::var(KEYFILE)
    {
        options.key_file_path = Some(PathBuf::from(value));
    }
    if options.key_passphrase.is_none()
        && let Ok(value) = std::env::var(KEYFILE_PASSPHRASE)
    {
        options.key_passphrase = Some(value.into());
    }
    if options.known_hosts_file.is_none()
        && let Ok(value) = std::env::var(KNOWN_HOSTS_FILE)
    {
        options.known_hosts_file = Some(PathBuf::from(value));
    }
    options
}

/// True when the environment opts out of host identity validation.
pub(crate) fn insecure_known_hosts() -> bool {
    std::env::var(INSECURE_KNOWN_HOSTS).map(|v| v == "true" || v == "1").unwrap_or(false)
}
