#![deny(clippy::all)]
#![deny(missing_docs)]
#![forbid(unsafe_code)]

//! libvfs is a pluggable virtual file system: one set of file and
//! directory operations over heterogeneous storage backends, selected by
//! URI scheme.
//!
//! Programs write against [`FileSystem`], [`Location`] and [`File`] and
//! stay portable across local disk (`vfs-be-fs`), in-memory object
//! storage (`vfs-be-mem`), SFTP (`vfs-be-sftp`), FTP (`vfs-be-ftp`) and
//! cloud drives (`vfs-be-dropbox`). Backends register a constructor under
//! their scheme; [`registry::resolve_file`] and
//! [`registry::resolve_location`] turn URIs into handles.
//!
//! ```no_run
//! use libvfs::registry;
//!
//! #[tokio::main]
//! async fn main() -> libvfs::Result<()> {
//!     let reports = registry::resolve_location("sftp://deploy@files.example.com/reports/")?;
//!     for name in reports.list().await? {
//!         println!("{name}");
//!     }
//!
//!     let mut summary = registry::resolve_file("sftp://deploy@files.example.com/reports/summary.csv")?;
//!     let mut head = vec![0u8; 256];
//!     let n = summary.read(&mut head).await?;
//!     summary.close().await?;
//!     println!("{}", String::from_utf8_lossy(&head[..n]));
//!     Ok(())
//! }
//! ```
//!
//! # The file handle state machine
//!
//! A [`File`] presents a single read/write/seek cursor over protocols
//! whose native operations open a file in a fixed mode. The handle opens
//! lazily and reopens transparently when the access pattern demands a
//! different mode:
//!
//! ```text
//!         FRESH ──open(R)──▶ OPEN_R ──read──▶ OPEN_R
//!           │                  │
//!           │                  └─write──▶ REOPEN → OPEN_RW
//!           ├─open(W,C)─────▶ OPEN_W ──write──▶ OPEN_W
//!           │                  │
//!           │                  └─read──▶ REOPEN → OPEN_RW
//!           │                  └─seek──▶ REOPEN → OPEN_RW
//!           ├─open(W,C,T)─▶ OPEN_W_TRUNC  (first write replaces file)
//!           └────────────── close ─────▶ FRESH (cursor=0, flags cleared)
//! ```
//!
//! A write before any read or seek replaces the remote content; a write
//! after a read or seek edits in place. Reopening captures the cursor,
//! switches the stream to read-write and seeks back. Backends whose wire
//! protocol has no random I/O satisfy the same contract by staging the
//! remote content in a local temp file ([`staging::Staging`]).
//!
//! # Sessions
//!
//! Connection-oriented backends share one authenticated session per
//! [`FileSystem`] instance, established lazily and torn down by an idle
//! timer ([`session::SessionManager`]). Every operation stops the timer,
//! borrows the session and re-arms the timer, so the session lives
//! exactly as long as it is useful plus the `auto_disconnect` window.

pub mod authority;
pub mod copy;
pub mod errors;
mod interfaces;
pub mod options;
pub mod paths;
pub mod registry;
pub mod session;
pub mod staging;
pub mod uri;

pub use authority::Authority;
pub use errors::{Error, ErrorKind, Operation, Result};
pub use interfaces::{File, FileSystem, Location};
pub use options::{FsOptions, Secret};
