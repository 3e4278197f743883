//! The error type shared by all file system backends.
//!
//! Every failure is wrapped with exactly one layer of context: the
//! [`Operation`] that was being performed when it happened. Callers that
//! need to branch on the failure class inspect the [`ErrorKind`]; callers
//! that need the underlying protocol error can walk the `source` chain.

use derive_more::Display;
use thiserror::Error;

/// Boxed source error, as produced by the protocol libraries underneath.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used throughout the crate and by all backends.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The error returned by every fallible operation in this crate.
#[derive(Debug, Error)]
#[error("{op} error: {kind}")]
pub struct Error {
    op: Operation,
    kind: ErrorKind,
    #[source]
    source: Option<BoxError>,
}

impl Error {
    /// Creates an error for `op` wrapping an underlying `source`.
    pub fn new<E>(op: Operation, kind: ErrorKind, source: E) -> Error
    where
        E: Into<BoxError>,
    {
        Error {
            op,
            kind,
            source: Some(source.into()),
        }
    }

    /// Creates an error for `op` with no underlying source.
    pub fn bare(op: Operation, kind: ErrorKind) -> Error {
        Error { op, kind, source: None }
    }

    /// Creates a validation error: a bad path, an empty required argument
    /// or a malformed option value, caught at the API boundary.
    pub fn validation(op: Operation, message: impl Into<String>) -> Error {
        Error::new(op, ErrorKind::Validation, message.into())
    }

    /// Wraps an `std::io::Error`, classifying not-found and permission
    /// failures into their own kinds.
    pub fn io(op: Operation, err: std::io::Error) -> Error {
        let kind = match err.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound,
            std::io::ErrorKind::PermissionDenied => ErrorKind::Permission,
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::ConnectionRefused | std::io::ErrorKind::ConnectionReset | std::io::ErrorKind::ConnectionAborted => {
                ErrorKind::Connection
            }
            _ => ErrorKind::Io,
        };
        Error::new(op, kind, err)
    }

    /// The well-known sentinel returned when a copy is started on a file
    /// whose cursor is not at zero. Propagated unchanged so callers can
    /// match it with [`Error::is_copy_refused`].
    pub fn copy_refused() -> Error {
        Error::bare(Operation::CopyToFile, ErrorKind::CopyRefused)
    }

    /// Retags the error with the API-surface operation it surfaced from.
    /// Client adapters tag errors with the wire operation; the file and
    /// location layers retag without adding another wrapping layer.
    pub fn with_op(mut self, op: Operation) -> Error {
        self.op = op;
        self
    }

    /// The operation that produced this error.
    pub fn op(&self) -> Operation {
        self.op
    }

    /// The failure class of this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// True when the remote path did not exist.
    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }

    /// True for the copy-refused sentinel produced by [`Error::copy_refused`].
    pub fn is_copy_refused(&self) -> bool {
        self.kind == ErrorKind::CopyRefused
    }

    /// True when a retry may succeed: rate limits, throttling and 5xx
    /// class failures reported by cloud backends.
    pub fn is_transient(&self) -> bool {
        self.kind == ErrorKind::Transient
    }

    /// Attempts to get a reference to the inner `std::io::Error` if there is one.
    pub fn get_io_error(&self) -> Option<&std::io::Error> {
        self.source.as_ref()?.downcast_ref::<std::io::Error>()
    }
}

/// The failure classes an [`Error`] can carry.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Display)]
pub enum ErrorKind {
    /// Bad path, empty required argument or malformed option value,
    /// surfaced synchronously at the API boundary.
    #[display("invalid argument")]
    Validation,
    /// The remote path does not exist. `exists` style operations translate
    /// this to `Ok(false)` instead of surfacing it.
    #[display("not found")]
    NotFound,
    /// Network, handshake, authentication or host-key failure.
    #[display("connection failed")]
    Connection,
    /// The backend returned malformed or unexpected data.
    #[display("protocol violation")]
    Protocol,
    /// The credentials lacked a scope or the remote denied access.
    #[display("permission denied")]
    Permission,
    /// Rate limit, throttling or service unavailability; retryable.
    #[display("transient failure")]
    Transient,
    /// A mid-stream read or write failure.
    #[display("i/o failure")]
    Io,
    /// Copy was requested on a file whose cursor had already moved.
    #[display("copy conditions not met")]
    CopyRefused,
    /// The backend cannot express the requested operation.
    #[display("not supported")]
    Unsupported,
}

/// The operation tag attached to every [`Error`], one per API surface verb.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Display)]
pub enum Operation {
    /// Opening the underlying stream.
    #[display("open")]
    Open,
    /// Reading from a file.
    #[display("read")]
    Read,
    /// Writing to a file.
    #[display("write")]
    Write,
    /// Repositioning a file cursor.
    #[display("seek")]
    Seek,
    /// Closing a file, including any deferred upload.
    #[display("close")]
    Close,
    /// Creating an empty file or bumping its modification time.
    #[display("touch")]
    Touch,
    /// Streaming one file into another.
    #[display("copy to file")]
    CopyToFile,
    /// Renaming or copy-then-delete across files.
    #[display("move to file")]
    MoveToFile,
    /// Removing a remote object.
    #[display("delete")]
    Delete,
    /// Querying a file size.
    #[display("size")]
    Size,
    /// Querying a modification timestamp.
    #[display("last modified")]
    LastModified,
    /// Probing a file or directory for existence.
    #[display("exists")]
    Exists,
    /// Listing directory entries.
    #[display("list")]
    List,
    /// Creating a directory chain.
    #[display("mkdir")]
    Mkdir,
    /// Applying a permission mode.
    #[display("chmod")]
    Chmod,
    /// Parsing an authority or URI string.
    #[display("parse")]
    Parse,
    /// Establishing a backend session.
    #[display("connect")]
    Connect,
    /// Looking up a scheme in the backend registry.
    #[display("resolve")]
    Resolve,
}
