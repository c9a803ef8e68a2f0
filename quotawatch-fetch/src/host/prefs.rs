//! Lightweight key-value preferences.
//!
//! Small pieces of process state that must survive a restart (such as the
//! browser access cooldowns) go through [`KeyValueStore`]. The file-backed
//! implementation lives in the store crate; [`MemoryPrefs`] is the default
//! and the fake used in tests.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::error::PrefsError;

/// A minimal preferences store holding JSON values.
pub trait KeyValueStore: Send + Sync {
    /// Returns the value stored under `key`.
    fn get(&self, key: &str) -> Option<serde_json::Value>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to persist.
    fn set(&self, key: &str, value: serde_json::Value) -> Result<(), PrefsError>;

    /// Removes `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to persist.
    fn remove(&self, key: &str) -> Result<(), PrefsError>;
}

/// In-memory preferences.
///
/// Share one instance through an `Arc` to simulate state surviving a
/// restart of whatever reads it.
#[derive(Debug, Default)]
pub struct MemoryPrefs {
    values: Mutex<HashMap<String, serde_json::Value>>,
}

impl MemoryPrefs {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryPrefs {
    fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: serde_json::Value) -> Result<(), PrefsError> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), PrefsError> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}
