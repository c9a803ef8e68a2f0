//! Fetch context providing access to host APIs.
//!
//! A [`FetchContext`] is built fresh for every provider fetch and handed to
//! each strategy by reference. It carries the requested source mode, the
//! timeouts, a snapshot of the environment, and the host APIs. The access
//! gate and presence cache inside it are process-wide `Arc`s.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::host::browser::{
    Browser, BrowserAccessGate, BrowserCookieImporter, BrowserPresenceCache,
};
use crate::host::credentials::{CredentialStore, SystemKeychain};
use crate::host::http::HttpClient;
use crate::host::prefs::MemoryPrefs;
use crate::host::process::ProcessRunner;
use crate::host::pty::PtyRunner;

/// Default timeout for network strategies.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default hard deadline for PTY scrapes.
const DEFAULT_PTY_TIMEOUT_SECS: u64 = 20;

// ============================================================================
// Runtime
// ============================================================================

/// Which front end is asking for data.
///
/// Providers may order their strategies differently per runtime: a
/// long-running app prefers quiet network strategies, while a one-shot
/// command can afford to drive the CLI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Runtime {
    /// One-shot command-line invocation.
    #[default]
    Cli,
    /// Long-running application.
    App,
}

// ============================================================================
// Source Mode
// ============================================================================

/// Which data source the user asked for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceMode {
    /// Try every source in the provider's order, with fallback.
    #[default]
    Auto,
    /// Only CLI strategies.
    Cli,
    /// Only web (cookie) strategies.
    Web,
    /// Only OAuth strategies.
    #[serde(rename = "oauth")]
    OAuth,
    /// Only API token strategies.
    ApiToken,
}

impl SourceMode {
    /// Returns true if this mode allows CLI strategies.
    pub fn allows_cli(&self) -> bool {
        matches!(self, Self::Auto | Self::Cli)
    }

    /// Returns true if this mode allows web strategies.
    pub fn allows_web(&self) -> bool {
        matches!(self, Self::Auto | Self::Web)
    }

    /// Returns true if this mode allows OAuth strategies.
    pub fn allows_oauth(&self) -> bool {
        matches!(self, Self::Auto | Self::OAuth)
    }

    /// Returns true if this mode allows API token strategies.
    pub fn allows_api_token(&self) -> bool {
        matches!(self, Self::Auto | Self::ApiToken)
    }

    /// Returns the canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Cli => "cli",
            Self::Web => "web",
            Self::OAuth => "oauth",
            Self::ApiToken => "api",
        }
    }
}

impl fmt::Display for SourceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "cli" => Ok(Self::Cli),
            "web" | "cookies" => Ok(Self::Web),
            "oauth" => Ok(Self::OAuth),
            "api" | "apitoken" | "api_token" | "apikey" => Ok(Self::ApiToken),
            other => Err(format!(
                "invalid source '{other}': expected auto, cli, web, oauth, or api"
            )),
        }
    }
}

// ============================================================================
// Fetch Settings
// ============================================================================

/// Settings for fetch operations.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// Which source the user asked for.
    pub source_mode: SourceMode,
    /// Timeout for network strategies.
    pub timeout: Duration,
    /// Hard deadline for PTY scrapes.
    pub pty_timeout: Duration,
    /// API tokens configured in settings, keyed by provider ID.
    pub api_tokens: HashMap<String, String>,
    /// Browsers to try for cookies, in order.
    pub browser_order: Vec<Browser>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            source_mode: SourceMode::Auto,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            pty_timeout: Duration::from_secs(DEFAULT_PTY_TIMEOUT_SECS),
            api_tokens: HashMap::new(),
            browser_order: Browser::default_order().to_vec(),
        }
    }
}

// ============================================================================
// Fetch Context
// ============================================================================

/// Context provided to fetch strategies, giving access to host APIs.
///
/// Strategies only read from the context; nothing in it changes while a
/// pipeline runs. Shared mutable state lives behind the gate's own lock.
pub struct FetchContext {
    /// Front end that requested the fetch.
    pub runtime: Runtime,
    /// Fetch settings.
    pub settings: FetchSettings,
    /// Environment captured when the context was built.
    pub env: HashMap<String, String>,
    /// OS credential store.
    pub credentials: Arc<dyn CredentialStore>,
    /// HTTP client with tracing.
    pub http: Arc<HttpClient>,
    /// Process runner for non-interactive commands.
    pub process: Arc<ProcessRunner>,
    /// PTY runner for interactive CLIs.
    pub pty: Arc<PtyRunner>,
    /// Browser cookie importer.
    pub browser: Arc<BrowserCookieImporter>,
    /// Cooldown gate for browser key prompts.
    pub access_gate: Arc<BrowserAccessGate>,
    /// Cached browser presence checks.
    pub presence: Arc<BrowserPresenceCache>,
}

impl FetchContext {
    /// Creates a builder for customizing the context.
    pub fn builder() -> FetchContextBuilder {
        FetchContextBuilder::new()
    }

    /// Returns the requested source mode.
    pub fn source_mode(&self) -> SourceMode {
        self.settings.source_mode
    }

    /// Returns a captured environment variable, ignoring blank values.
    pub fn env_var(&self, key: &str) -> Option<&str> {
        self.env
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Returns the API token for a provider.
    ///
    /// A token from settings wins over the environment; `env_keys` are
    /// checked in order.
    pub fn api_token(&self, provider_id: &str, env_keys: &[&str]) -> Option<String> {
        self.settings
            .api_tokens
            .get(provider_id)
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .or_else(|| env_keys.iter().find_map(|k| self.env_var(k)))
            .map(str::to_string)
    }

    /// Returns true if an API token is known for the provider.
    pub fn has_api_token(&self, provider_id: &str, env_keys: &[&str]) -> bool {
        self.api_token(provider_id, env_keys).is_some()
    }
}

impl fmt::Debug for FetchContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchContext")
            .field("runtime", &self.runtime)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Fetch Context Builder
// ============================================================================

/// Builder for constructing a `FetchContext`.
#[derive(Default)]
pub struct FetchContextBuilder {
    runtime: Runtime,
    settings: FetchSettings,
    env: Option<HashMap<String, String>>,
    credentials: Option<Arc<dyn CredentialStore>>,
    http: Option<Arc<HttpClient>>,
    process: Option<Arc<ProcessRunner>>,
    pty: Option<Arc<PtyRunner>>,
    browser: Option<Arc<BrowserCookieImporter>>,
    access_gate: Option<Arc<BrowserAccessGate>>,
    presence: Option<Arc<BrowserPresenceCache>>,
    gate_enforced: Option<bool>,
}

impl FetchContextBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the runtime.
    #[must_use]
    pub fn runtime(mut self, runtime: Runtime) -> Self {
        self.runtime = runtime;
        self
    }

    /// Sets the fetch settings.
    #[must_use]
    pub fn settings(mut self, settings: FetchSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Sets the source mode.
    #[must_use]
    pub fn source_mode(mut self, mode: SourceMode) -> Self {
        self.settings.source_mode = mode;
        self
    }

    /// Sets the network timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.settings.timeout = timeout;
        self
    }

    /// Sets the PTY deadline.
    #[must_use]
    pub fn pty_timeout(mut self, timeout: Duration) -> Self {
        self.settings.pty_timeout = timeout;
        self
    }

    /// Adds an API token for a provider.
    #[must_use]
    pub fn api_token(mut self, provider_id: impl Into<String>, token: impl Into<String>) -> Self {
        self.settings
            .api_tokens
            .insert(provider_id.into(), token.into());
        self
    }

    /// Sets the browser cookie order.
    #[must_use]
    pub fn browser_order(mut self, order: Vec<Browser>) -> Self {
        self.settings.browser_order = order;
        self
    }

    /// Replaces the captured environment.
    #[must_use]
    pub fn env(mut self, env: HashMap<String, String>) -> Self {
        self.env = Some(env);
        self
    }

    /// Sets one environment variable on top of the captured environment.
    #[must_use]
    pub fn env_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Sets the credential store.
    #[must_use]
    pub fn credentials(mut self, credentials: Arc<dyn CredentialStore>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Sets the HTTP client.
    #[must_use]
    pub fn http(mut self, http: Arc<HttpClient>) -> Self {
        self.http = Some(http);
        self
    }

    /// Sets the process runner.
    #[must_use]
    pub fn process(mut self, process: Arc<ProcessRunner>) -> Self {
        self.process = Some(process);
        self
    }

    /// Sets the PTY runner.
    #[must_use]
    pub fn pty(mut self, pty: Arc<PtyRunner>) -> Self {
        self.pty = Some(pty);
        self
    }

    /// Sets the browser cookie importer.
    #[must_use]
    pub fn browser(mut self, browser: Arc<BrowserCookieImporter>) -> Self {
        self.browser = Some(browser);
        self
    }

    /// Shares a process-wide access gate.
    #[must_use]
    pub fn access_gate(mut self, gate: Arc<BrowserAccessGate>) -> Self {
        self.access_gate = Some(gate);
        self
    }

    /// Shares a process-wide presence cache.
    #[must_use]
    pub fn presence(mut self, presence: Arc<BrowserPresenceCache>) -> Self {
        self.presence = Some(presence);
        self
    }

    /// Overrides whether the default in-memory gate enforces cooldowns.
    ///
    /// Ignored when a gate is supplied with [`Self::access_gate`].
    #[must_use]
    pub fn gate_enforced(mut self, enforced: bool) -> Self {
        self.gate_enforced = Some(enforced);
        self
    }

    /// Builds the fetch context.
    ///
    /// Missing host APIs get their defaults: the system keychain, a gate
    /// backed by in-memory preferences, and the process environment.
    pub fn build(self) -> FetchContext {
        let credentials = self
            .credentials
            .unwrap_or_else(|| Arc::new(SystemKeychain::new()));
        let http = self
            .http
            .unwrap_or_else(|| Arc::new(HttpClient::with_timeout(self.settings.timeout)));
        let browser = self.browser.unwrap_or_else(|| {
            Arc::new(BrowserCookieImporter::new(Arc::clone(&credentials)))
        });
        let gate_enforced = self.gate_enforced;
        let access_gate = self.access_gate.unwrap_or_else(|| {
            let gate = BrowserAccessGate::new(Arc::new(MemoryPrefs::new()));
            Arc::new(match gate_enforced {
                Some(enforced) => gate.enforced(enforced),
                None => gate,
            })
        });

        FetchContext {
            runtime: self.runtime,
            settings: self.settings,
            env: self.env.unwrap_or_else(|| std::env::vars().collect()),
            credentials,
            http,
            process: self.process.unwrap_or_default(),
            pty: self.pty.unwrap_or_default(),
            browser,
            access_gate,
            presence: self.presence.unwrap_or_default(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_mode_allows() {
        assert!(SourceMode::Auto.allows_cli());
        assert!(SourceMode::Auto.allows_web());
        assert!(SourceMode::Auto.allows_oauth());
        assert!(SourceMode::Auto.allows_api_token());

        assert!(SourceMode::Cli.allows_cli());
        assert!(!SourceMode::Cli.allows_web());

        assert!(!SourceMode::Web.allows_cli());
        assert!(SourceMode::Web.allows_web());
    }

    #[test]
    fn test_source_mode_parse() {
        assert_eq!("auto".parse::<SourceMode>().unwrap(), SourceMode::Auto);
        assert_eq!("API".parse::<SourceMode>().unwrap(), SourceMode::ApiToken);
        assert_eq!("cookies".parse::<SourceMode>().unwrap(), SourceMode::Web);
        assert!("carrier-pigeon".parse::<SourceMode>().is_err());
        assert_eq!(SourceMode::ApiToken.to_string(), "api");
    }

    #[test]
    fn test_source_mode_serde() {
        assert_eq!(
            serde_json::to_string(&SourceMode::ApiToken).unwrap(),
            "\"apiToken\""
        );
        assert_eq!(serde_json::to_string(&SourceMode::OAuth).unwrap(), "\"oauth\"");
    }

    #[test]
    fn test_context_builder() {
        let ctx = FetchContext::builder()
            .source_mode(SourceMode::Cli)
            .timeout(Duration::from_secs(60))
            .runtime(Runtime::App)
            .env(HashMap::new())
            .build();

        assert_eq!(ctx.source_mode(), SourceMode::Cli);
        assert_eq!(ctx.settings.timeout, Duration::from_secs(60));
        assert_eq!(ctx.runtime, Runtime::App);
        assert!(ctx.env.is_empty());
    }

    #[test]
    fn test_api_token_prefers_settings() {
        let ctx = FetchContext::builder()
            .env(HashMap::new())
            .env_var("Z_AI_API_KEY", "from-env")
            .build();
        assert_eq!(
            ctx.api_token("zai", &["Z_AI_API_KEY"]).as_deref(),
            Some("from-env")
        );

        let ctx = FetchContext::builder()
            .env(HashMap::new())
            .env_var("Z_AI_API_KEY", "from-env")
            .api_token("zai", "from-settings")
            .build();
        assert_eq!(
            ctx.api_token("zai", &["Z_AI_API_KEY"]).as_deref(),
            Some("from-settings")
        );
    }

    #[test]
    fn test_blank_tokens_are_ignored() {
        let ctx = FetchContext::builder()
            .env(HashMap::new())
            .env_var("Z_AI_API_KEY", "   ")
            .api_token("zai", "")
            .build();
        assert!(!ctx.has_api_token("zai", &["Z_AI_API_KEY"]));
    }
}
