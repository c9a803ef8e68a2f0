//! Output formatting for CLI.

mod json;
mod text;

pub use json::{BrowserOutput, JsonFormatter};
pub use text::TextFormatter;

use quotawatch_core::ProviderKind;
use quotawatch_fetch::{FetchAttempt, FetchOutcome, FetchResult};
use std::time::Duration;

/// What one provider's fetch produced, ready to print.
#[derive(Debug, Clone)]
pub struct UsageReport {
    pub provider: ProviderKind,
    pub result: Result<FetchResult, String>,
    pub attempts: Vec<FetchAttempt>,
    pub skipped: Vec<String>,
    pub duration: Duration,
}

impl UsageReport {
    /// Flattens a pipeline outcome.
    pub fn from_outcome(provider: ProviderKind, outcome: FetchOutcome) -> Self {
        Self {
            provider,
            result: outcome.result.map_err(|e| e.to_string()),
            attempts: outcome.attempts,
            skipped: outcome.skipped,
            duration: outcome.duration,
        }
    }

    /// A report for a provider that never reached its pipeline.
    pub fn failed(provider: ProviderKind, error: impl Into<String>) -> Self {
        Self {
            provider,
            result: Err(error.into()),
            attempts: Vec::new(),
            skipped: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

#[cfg(test)]
mod tests;
