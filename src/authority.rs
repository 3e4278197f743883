//! The authority portion of a VFS URI: `user[:pass]@host[:port]`.

use crate::errors::{Error, ErrorKind, Operation, Result};
use crate::options::Secret;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use std::fmt;

/// Characters of the userinfo component that stay unencoded when an
/// authority is assembled from parts.
const USERINFO: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_').remove(b'~');

/// Identifies a remote namespace: the userinfo, host and port of a URI.
///
/// The username is kept percent-encoded for display and percent-decoded
/// for comparison. The password is opaque: it never appears in the
/// [`fmt::Display`] form nor in [`fmt::Debug`] output, and it does not
/// take part in equality.
#[derive(Debug, Clone, Default)]
pub struct Authority {
    user: String,
    user_decoded: String,
    password: Option<Secret>,
    host: String,
    port: Option<u16>,
}

impl Authority {
    /// Parses `[user[:pass]@]host[:port]`.
    ///
    /// A literal backslash in the userinfo is rejected; its encoded form
    /// (`%5C`) is accepted. Host and port may both be absent: backends
    /// choose their own defaults.
    pub fn parse(s: &str) -> Result<Authority> {
        let (userinfo, hostport) = match s.rfind('@') {
            Some(i) => (&s[..i], &s[i + 1..]),
            None => ("", s),
        };

        if userinfo.contains('\\') {
            return Err(Error::validation(Operation::Parse, format!("authority {s:?}: backslash in userinfo")));
        }

        let (user, password) = match userinfo.split_once(':') {
            Some((u, p)) => (u, Some(Secret::new(decode(p)?))),
            None => (userinfo, None),
        };

        let (host, port) = split_hostport(hostport)?;

        Ok(Authority {
            user: user.to_string(),
            user_decoded: decode(user)?,
            password,
            host: host.to_string(),
            port,
        })
    }

    /// Assembles an authority from already-decoded parts, percent-encoding
    /// the username where needed.
    pub fn from_parts(user: &str, password: Option<Secret>, host: &str, port: Option<u16>) -> Authority {
        Authority {
            user: utf8_percent_encode(user, USERINFO).to_string(),
            user_decoded: user.to_string(),
            password,
            host: host.to_string(),
            port,
        }
    }

    /// The percent-decoded username; empty when no userinfo was given.
    pub fn username(&self) -> &str {
        &self.user_decoded
    }

    /// The password carried in the authority, if any.
    pub fn password(&self) -> Option<&Secret> {
        self.password.as_ref()
    }

    /// The host name or address; may be empty for single-namespace backends.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The port, when one was given.
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Host joined with either the explicit port or `default_port`,
    /// suitable for a dial call.
    pub fn host_port(&self, default_port: u16) -> String {
        format!("{}:{}", self.host, self.port.unwrap_or(default_port))
    }

    /// True when no userinfo, host or port is present.
    pub fn is_empty(&self) -> bool {
        self.user.is_empty() && self.host.is_empty() && self.port.is_none()
    }
}

/// Two authorities are equal when username (decoded), host and port are
/// equal. Passwords are ignored.
impl PartialEq for Authority {
    fn eq(&self, other: &Self) -> bool {
        self.user_decoded == other.user_decoded && self.host == other.host && self.port == other.port
    }
}

impl Eq for Authority {}

/// The canonical encoded form: userinfo keeps its percent-encoding, the
/// password is stripped.
impl fmt::Display for Authority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.user.is_empty() {
            write!(f, "{}@", self.user)?;
        }
        f.write_str(&self.host)?;
        if let Some(port) = self.port {
            write!(f, ":{port}")?;
        }
        Ok(())
    }
}

fn decode(s: &str) -> Result<String> {
    percent_decode_str(s)
        .decode_utf8()
        .map(|c| c.into_owned())
        .map_err(|e| Error::new(Operation::Parse, ErrorKind::Validation, e))
}

fn split_hostport(s: &str) -> Result<(&str, Option<u16>)> {
    if s.is_empty() {
        return Ok(("", None));
    }
    // Bracketed IPv6 literal.
    if let Some(rest) = s.strip_prefix('[') {
        let end = rest
            .find(']')
            .ok_or_else(|| Error::validation(Operation::Parse, format!("authority host {s:?}: unterminated bracket")))?;
        let host = &rest[..end];
        return match &rest[end + 1..] {
            "" => Ok((host, None)),
            p => Ok((host, Some(parse_port(p.strip_prefix(':').unwrap_or(p))?))),
        };
    }
    match s.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') => Ok((host, Some(parse_port(port)?))),
        Some(_) => Err(Error::validation(Operation::Parse, format!("authority host {s:?}: unbracketed colon"))),
        None => Ok((s, None)),
    }
}

fn parse_port(s: &str) -> Result<u16> {
    s.parse::<u16>()
        .map_err(|_| Error::validation(Operation::Parse, format!("invalid port {s:?}")))
}
