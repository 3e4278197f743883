//! The scheme registry: backends register a constructor at process start,
//! callers resolve URIs to handles.

use crate::errors::{Error, ErrorKind, Operation, Result};
use crate::interfaces::{File, FileSystem, Location};
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// A file system constructor registered under a scheme.
pub type Constructor = Box<dyn Fn() -> Result<Arc<dyn FileSystem>> + Send + Sync>;

lazy_static! {
    static ref SCHEMES: RwLock<HashMap<String, Constructor>> = RwLock::new(HashMap::new());
}

/// Registers `constructor` under `scheme`, replacing any previous entry.
pub fn register<F>(scheme: &str, constructor: F)
where
    F: Fn() -> Result<Arc<dyn FileSystem>> + Send + Sync + 'static,
{
    SCHEMES.write().unwrap().insert(scheme.to_string(), Box::new(constructor));
}

/// The schemes currently registered, in unspecified order.
pub fn registered_schemes() -> Vec<String> {
    SCHEMES.read().unwrap().keys().cloned().collect()
}

/// Constructs the file system registered under `scheme`.
pub fn filesystem(scheme: &str) -> Result<Arc<dyn FileSystem>> {
    let registry = SCHEMES.read().unwrap();
    match registry.get(scheme) {
        Some(constructor) => constructor(),
        None => Err(Error::new(
            Operation::Resolve,
            ErrorKind::Unsupported,
            format!("no backend registered for scheme {scheme:?}"),
        )),
    }
}

/// Resolves a file URI (no trailing slash) to a [`File`] handle.
pub fn resolve_file(uri: &str) -> Result<Box<dyn File>> {
    let parsed = crate::uri::parse(uri)?;
    if parsed.is_location {
        return Err(Error::validation(Operation::Resolve, format!("uri {uri:?} denotes a location, not a file")));
    }
    filesystem(&parsed.scheme)?.file(&parsed.authority_raw, &parsed.path)
}

/// Resolves a location URI (trailing slash) to a [`Location`] handle.
pub fn resolve_location(uri: &str) -> Result<Box<dyn Location>> {
    let parsed = crate::uri::parse(uri)?;
    if !parsed.is_location {
        return Err(Error::validation(Operation::Resolve, format!("uri {uri:?} denotes a file, not a location")));
    }
    filesystem(&parsed.scheme)?.location(&parsed.authority_raw, &parsed.path)
}
