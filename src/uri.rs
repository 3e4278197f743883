//! Parsing and rendering of `scheme://[authority]/path[/]` strings.
//!
//! A trailing slash denotes a location, its absence a file. The authority
//! may be empty for single-namespace backends such as local disk.

use crate::authority::Authority;
use crate::errors::{Error, Operation, Result};

/// The dissected form of a VFS URI.
#[derive(Debug, Clone)]
pub struct ParsedUri {
    /// The scheme selecting the backend.
    pub scheme: String,
    /// The parsed authority.
    pub authority: Authority,
    /// The authority exactly as written, including any password, for
    /// handing to a backend constructor.
    pub authority_raw: String,
    /// The absolute path component.
    pub path: String,
    /// True when the URI ends with `/`.
    pub is_location: bool,
}

/// Splits a URI into scheme, authority and path.
pub fn parse(uri: &str) -> Result<ParsedUri> {
    let (scheme, rest) = uri
        .split_once("://")
        .ok_or_else(|| Error::validation(Operation::Parse, format!("uri {uri:?} has no scheme")))?;
    if scheme.is_empty() || !scheme.chars().all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.') {
        return Err(Error::validation(Operation::Parse, format!("uri {uri:?} has a malformed scheme")));
    }

    let (authority_raw, path) = match rest.find('/') {
        Some(i) => (&rest[..i], &rest[i..]),
        None => (rest, "/"),
    };

    Ok(ParsedUri {
        scheme: scheme.to_string(),
        authority: Authority::parse(authority_raw)?,
        authority_raw: authority_raw.to_string(),
        path: path.to_string(),
        is_location: path.ends_with('/'),
    })
}

/// Renders the URI of a file or location. `path` carries the trailing
/// slash when it denotes a location.
pub fn format(scheme: &str, authority: &Authority, path: &str) -> String {
    format!("{scheme}://{authority}{path}")
}
