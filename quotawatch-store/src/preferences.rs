//! File-backed key-value preferences.
//!
//! Small state that must outlive the process, such as browser access
//! cooldowns, lives in `preferences.json`. Every write re-reads the file
//! first so two processes sharing it do not drop each other's keys.

use quotawatch_fetch::{KeyValueStore, PrefsError};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::persistence::{default_preferences_path, load_json, save_json};

/// Preferences stored in a JSON object on disk.
#[derive(Debug)]
pub struct FilePreferences {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FilePreferences {
    /// Opens preferences at `path`; the file is created on first write.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Opens preferences at the default location.
    pub fn open_default() -> Self {
        Self::open(default_preferences_path())
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Map<String, Value> {
        match load_json::<Map<String, Value>>(&self.path) {
            Ok(map) => map,
            Err(e) if e.is_not_found() => Map::new(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring unreadable preferences");
                Map::new()
            }
        }
    }

    fn update(&self, apply: impl FnOnce(&mut Map<String, Value>)) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut map = self.read_all();
        apply(&mut map);
        save_json(&self.path, &map)
    }
}

impl KeyValueStore for FilePreferences {
    fn get(&self, key: &str) -> Option<Value> {
        self.read_all().remove(key)
    }

    fn set(&self, key: &str, value: Value) -> Result<(), PrefsError> {
        debug!(key, "Writing preference");
        self.update(|map| {
            map.insert(key.to_string(), value);
        })
        .map_err(PrefsError::from)
    }

    fn remove(&self, key: &str) -> Result<(), PrefsError> {
        debug!(key, "Removing preference");
        self.update(|map| {
            map.remove(key);
        })
        .map_err(PrefsError::from)
    }
}
