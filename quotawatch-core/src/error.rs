//! Core error types for quotawatch.

use thiserror::Error;

/// Core error type for model validation.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Invalid data in a model value.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Error returned by usage parsers.
///
/// Parsers only see raw text, so every variant describes the text itself,
/// never how it was obtained.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The input was empty or whitespace only.
    #[error("empty input")]
    Empty,

    /// The input was readable but contained no usage figures.
    #[error("no usage data found: {0}")]
    NoUsageData(String),

    /// A field was present but its value could not be interpreted.
    #[error("invalid value for {field}: {value}")]
    InvalidValue {
        /// Field or label that failed to parse.
        field: String,
        /// The offending raw value.
        value: String,
    },

    /// JSON payload could not be decoded.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl ParseError {
    /// Shorthand for [`ParseError::InvalidValue`].
    pub fn invalid(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
        }
    }
}
