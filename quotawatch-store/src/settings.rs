//! User settings.
//!
//! One JSON document, `settings.json` in the config directory. Missing
//! fields take their defaults, so older files keep loading.

use quotawatch_core::ProviderKind;
use quotawatch_fetch::{Browser, FetchSettings, SourceMode};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::persistence::{default_settings_path, load_json, save_json};

/// Default PTY deadline, seconds.
pub const DEFAULT_CLI_TIMEOUT_SECS: u64 = 20;

/// Default network timeout, seconds.
pub const DEFAULT_WEB_TIMEOUT_SECS: u64 = 30;

/// Default browser access cooldown, hours.
pub const DEFAULT_ACCESS_COOLDOWN_HOURS: u32 = 6;

// ============================================================================
// Settings
// ============================================================================

/// User preferences.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Providers to query when none is named. Empty means each provider's
    /// own default.
    pub enabled_providers: Vec<ProviderKind>,

    /// Source mode per provider; absent means auto.
    pub source_modes: BTreeMap<ProviderKind, SourceMode>,

    /// API tokens keyed by provider ID.
    pub api_tokens: BTreeMap<String, String>,

    /// Hard deadline for CLI scrapes, seconds.
    pub cli_timeout_secs: u64,

    /// Network timeout, seconds.
    pub web_timeout_secs: u64,

    /// Browsers to read cookies from, in order. Empty means the platform
    /// default order.
    pub browser_order: Vec<Browser>,

    /// How long a denied browser is left alone, hours.
    pub access_cooldown_hours: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled_providers: Vec::new(),
            source_modes: BTreeMap::new(),
            api_tokens: BTreeMap::new(),
            cli_timeout_secs: DEFAULT_CLI_TIMEOUT_SECS,
            web_timeout_secs: DEFAULT_WEB_TIMEOUT_SECS,
            browser_order: Vec::new(),
            access_cooldown_hours: DEFAULT_ACCESS_COOLDOWN_HOURS,
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("enabled_providers", &self.enabled_providers)
            .field("source_modes", &self.source_modes)
            .field("api_tokens", &self.api_tokens.keys().collect::<Vec<_>>())
            .field("cli_timeout_secs", &self.cli_timeout_secs)
            .field("web_timeout_secs", &self.web_timeout_secs)
            .field("browser_order", &self.browser_order)
            .field("access_cooldown_hours", &self.access_cooldown_hours)
            .finish()
    }
}

impl Settings {
    // ------------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------------

    /// Loads settings from `path`; a missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Fails if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        match load_json(path) {
            Ok(settings) => {
                debug!(path = %path.display(), "Settings loaded");
                Ok(settings)
            }
            Err(e) if e.is_not_found() => {
                debug!(path = %path.display(), "No settings file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e),
        }
    }

    /// Loads settings from the default location.
    ///
    /// # Errors
    ///
    /// See [`Settings::load`].
    pub fn load_default() -> Result<Self, StoreError> {
        Self::load(&default_settings_path())
    }

    /// Saves settings to `path`.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        save_json(path, self)?;
        info!(path = %path.display(), "Settings saved");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    /// Source mode for a provider.
    pub fn source_mode(&self, provider: ProviderKind) -> SourceMode {
        self.source_modes.get(&provider).copied().unwrap_or_default()
    }

    /// Sets a provider's source mode; auto clears the entry.
    pub fn set_source_mode(&mut self, provider: ProviderKind, mode: SourceMode) {
        if mode == SourceMode::Auto {
            self.source_modes.remove(&provider);
        } else {
            self.source_modes.insert(provider, mode);
        }
    }

    /// API token stored for a provider.
    pub fn api_token(&self, provider: ProviderKind) -> Option<&str> {
        self.api_tokens.get(provider.id()).map(String::as_str)
    }

    /// Stores or clears a provider's API token.
    ///
    /// # Errors
    ///
    /// Refuses a token that is blank or spans several lines.
    pub fn set_api_token(
        &mut self,
        provider: ProviderKind,
        token: Option<&str>,
    ) -> Result<(), StoreError> {
        match token.map(str::trim) {
            None => {
                self.api_tokens.remove(provider.id());
            }
            Some("") => return Err(StoreError::invalid("api_token", "token is empty")),
            Some(t) if t.contains(['\n', '\r']) => {
                return Err(StoreError::invalid("api_token", "token spans several lines"));
            }
            Some(t) => {
                self.api_tokens.insert(provider.id().to_string(), t.to_string());
            }
        }
        Ok(())
    }

    /// Returns true if `provider` is listed as enabled.
    pub fn is_enabled(&self, provider: ProviderKind) -> bool {
        self.enabled_providers.contains(&provider)
    }

    /// PTY deadline.
    pub fn cli_timeout(&self) -> Duration {
        Duration::from_secs(self.cli_timeout_secs.max(1))
    }

    /// Network timeout.
    pub fn web_timeout(&self) -> Duration {
        Duration::from_secs(self.web_timeout_secs.max(1))
    }

    /// Browser order, defaulting to the platform order.
    pub fn browser_order(&self) -> Vec<Browser> {
        if self.browser_order.is_empty() {
            Browser::default_order().to_vec()
        } else {
            self.browser_order.clone()
        }
    }

    /// Fetch settings for one provider.
    pub fn fetch_settings(&self, provider: ProviderKind) -> FetchSettings {
        FetchSettings {
            source_mode: self.source_mode(provider),
            timeout: self.web_timeout(),
            pty_timeout: self.cli_timeout(),
            api_tokens: self
                .api_tokens
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect::<HashMap<_, _>>(),
            browser_order: self.browser_order(),
        }
    }
}
