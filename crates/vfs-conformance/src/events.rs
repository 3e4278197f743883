//! Test-support mutation records.
//!
//! The suite journals one [`Event`] per mutation it performs. Backend
//! tests can dump the journal when a run fails to see how far it got and
//! what state the scratch namespace should be in.

use std::collections::HashMap;
use std::time::SystemTime;

/// The class of a journaled mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// A file came into existence.
    Created,
    /// An existing file's content was replaced or edited.
    Modified,
    /// A file was removed.
    Deleted,
    /// A file changed names or namespaces.
    Renamed,
    /// Anything the suite could not classify.
    Unknown,
}

/// One journaled mutation: which URI, what happened, when, plus
/// free-form detail.
#[derive(Debug, Clone)]
pub struct Event {
    /// The URI the mutation applied to.
    pub uri: String,
    /// The mutation class.
    pub kind: EventKind,
    /// Wall-clock time the suite performed the mutation.
    pub at: SystemTime,
    /// Free-form detail, e.g. payload sizes.
    pub metadata: HashMap<String, String>,
}

impl Event {
    /// Records a mutation happening now.
    pub fn new(uri: String, kind: EventKind, metadata: HashMap<String, String>) -> Event {
        Event {
            uri,
            kind,
            at: SystemTime::now(),
            metadata,
        }
    }
}
