//! Fetch provenance.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How usage data was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FetchSource {
    /// Not yet attributed to a concrete source.
    #[default]
    Auto,
    /// Interactive CLI scraped through a pseudo-terminal.
    Cli,
    /// Web dashboard with browser cookies.
    Web,
    /// OAuth token API.
    #[serde(rename = "oauth")]
    OAuth,
    /// Static API token.
    Api,
    /// Local files or application state.
    LocalProbe,
}

impl FetchSource {
    /// Returns a short label for display.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Cli => "cli",
            Self::Web => "web",
            Self::OAuth => "oauth",
            Self::Api => "api",
            Self::LocalProbe => "local",
        }
    }
}

impl fmt::Display for FetchSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
