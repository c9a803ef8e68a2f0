//! Store error types.

use quotawatch_fetch::PrefsError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while persisting settings and preferences.
#[derive(Debug, Error)]
pub enum StoreError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A file exists but does not hold what it should.
    #[error("Corrupt file {path}: {reason}")]
    Corrupt {
        /// The offending file.
        path: PathBuf,
        /// What was wrong with it.
        reason: String,
    },

    /// A setting was given a value it cannot take.
    #[error("Invalid setting {key}: {reason}")]
    InvalidSetting {
        /// Setting name.
        key: String,
        /// Why the value was refused.
        reason: String,
    },
}

impl StoreError {
    /// Returns true if the error means the file simply is not there.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }

    /// Creates an invalid-setting error.
    pub fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        StoreError::InvalidSetting {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

impl From<StoreError> for PrefsError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Serialization(e) => PrefsError::Serialization(e),
            other => PrefsError::Backend(other.to_string()),
        }
    }
}
