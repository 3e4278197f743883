//! Process-global volume stores.

use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::SystemTime;

/// One stored object.
#[derive(Debug, Clone)]
pub(crate) struct Entry {
    pub data: Arc<Vec<u8>>,
    pub modified: SystemTime,
}

/// A volume: absolute file path to entry.
pub(crate) type Volume = Arc<RwLock<HashMap<String, Entry>>>;

lazy_static! {
    static ref VOLUMES: Mutex<HashMap<String, Volume>> = Mutex::new(HashMap::new());
}

/// The shared store for `volume`, created on first use.
pub(crate) fn volume(volume: &str) -> Volume {
    let mut volumes = VOLUMES.lock().unwrap();
    volumes.entry(volume.to_string()).or_default().clone()
}

pub(crate) fn get(vol: &str, path: &str) -> Option<Entry> {
    volume(vol).read().unwrap().get(path).cloned()
}

pub(crate) fn put(vol: &str, path: &str, data: Vec<u8>) {
    volume(vol).write().unwrap().insert(
        path.to_string(),
        Entry {
            data: Arc::new(data),
            modified: SystemTime::now(),
        },
    );
}

pub(crate) fn touch(vol: &str, path: &str) -> bool {
    match volume(vol).write().unwrap().get_mut(path) {
        Some(entry) => {
            entry.modified = SystemTime::now();
            true
        }
        None => false,
    }
}

pub(crate) fn remove(vol: &str, path: &str) -> bool {
    volume(vol).write().unwrap().remove(path).is_some()
}

/// Backend-native rename within one volume.
pub(crate) fn rename(vol: &str, from: &str, to: &str) -> bool {
    let store = volume(vol);
    let mut entries = store.write().unwrap();
    match entries.remove(from) {
        Some(entry) => {
            entries.insert(to.to_string(), entry);
            true
        }
        None => false,
    }
}

/// Basenames of files directly under `prefix` (no deeper).
pub(crate) fn list(vol: &str, prefix: &str) -> Vec<String> {
    let store = volume(vol);
    let entries = store.read().unwrap();
    entries
        .keys()
        .filter_map(|key| key.strip_prefix(prefix))
        .filter(|rest| !rest.is_empty() && !rest.contains('/'))
        .map(|rest| rest.to_string())
        .collect()
}

/// True when any file lives under `prefix`, at any depth.
pub(crate) fn any_under(vol: &str, prefix: &str) -> bool {
    let store = volume(vol);
    let entries = store.read().unwrap();
    entries.keys().any(|key| key.starts_with(prefix))
}
