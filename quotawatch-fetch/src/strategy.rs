//! Fetch strategy trait and types.
//!
//! A strategy represents one way of acquiring usage data for a provider:
//! scraping an interactive CLI, calling a web dashboard with browser
//! cookies, calling an OAuth or API-token endpoint, or reading local state.

use async_trait::async_trait;
use quotawatch_core::{Credits, DashboardInfo, FetchSource, UsageSnapshot};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::context::{FetchContext, SourceMode};
use crate::error::FetchError;

// ============================================================================
// Fetch Kind
// ============================================================================

/// The kind of fetch mechanism a strategy uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FetchKind {
    /// Interactive CLI driven through a pseudo-terminal.
    Cli,
    /// Web dashboard authenticated with browser cookies.
    Web,
    /// OAuth token API.
    #[serde(rename = "oauth")]
    OAuth,
    /// Static API token.
    ApiToken,
    /// Local files or application state.
    LocalProbe,
}

impl FetchKind {
    /// Returns the display name for this kind.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Cli => "CLI",
            Self::Web => "Web",
            Self::OAuth => "OAuth",
            Self::ApiToken => "API Token",
            Self::LocalProbe => "Local Probe",
        }
    }

    /// Convert to FetchSource for recording in snapshots.
    pub fn to_fetch_source(&self) -> FetchSource {
        match self {
            Self::Cli => FetchSource::Cli,
            Self::Web => FetchSource::Web,
            Self::OAuth => FetchSource::OAuth,
            Self::ApiToken => FetchSource::Api,
            Self::LocalProbe => FetchSource::LocalProbe,
        }
    }
}

impl fmt::Display for FetchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

// ============================================================================
// Fetch Result
// ============================================================================

/// The result of a successful fetch operation.
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// The fetched usage snapshot.
    pub snapshot: UsageSnapshot,
    /// Credit balance, for providers that report one.
    pub credits: Option<Credits>,
    /// Dashboard metadata, for web strategies.
    pub dashboard: Option<DashboardInfo>,
    /// Overrides the kind name when displaying where data came from.
    pub source_label: Option<String>,
    /// The strategy that succeeded.
    pub strategy_id: String,
    /// The kind of fetch used.
    pub kind: FetchKind,
}

impl FetchResult {
    /// Creates a new fetch result.
    ///
    /// The snapshot's `fetch_source` is stamped from `kind`.
    pub fn new(
        mut snapshot: UsageSnapshot,
        strategy_id: impl Into<String>,
        kind: FetchKind,
    ) -> Self {
        snapshot.fetch_source = kind.to_fetch_source();
        Self {
            snapshot,
            credits: None,
            dashboard: None,
            source_label: None,
            strategy_id: strategy_id.into(),
            kind,
        }
    }

    /// Attaches a credit balance.
    #[must_use]
    pub fn with_credits(mut self, credits: Credits) -> Self {
        self.credits = Some(credits);
        self
    }

    /// Attaches dashboard metadata.
    #[must_use]
    pub fn with_dashboard(mut self, dashboard: DashboardInfo) -> Self {
        self.dashboard = Some(dashboard);
        self
    }

    /// Sets the display label override.
    #[must_use]
    pub fn with_source_label(mut self, label: impl Into<String>) -> Self {
        self.source_label = Some(label.into());
        self
    }

    /// Returns the label to show for where this data came from.
    pub fn display_source(&self) -> String {
        self.source_label
            .clone()
            .unwrap_or_else(|| self.kind.display_name().to_string())
    }
}

// ============================================================================
// Fetch Strategy Trait
// ============================================================================

/// A strategy for fetching usage data from a provider.
///
/// Strategies are tried in the order the provider resolved them. The
/// pipeline never reorders them.
///
/// ## Implementing a Strategy
///
/// ```ignore
/// struct CodexCliStrategy;
///
/// #[async_trait]
/// impl FetchStrategy for CodexCliStrategy {
///     fn id(&self) -> &str {
///         "codex.cli"
///     }
///
///     fn kind(&self) -> FetchKind {
///         FetchKind::Cli
///     }
///
///     async fn is_available(&self, _ctx: &FetchContext) -> bool {
///         PtyRunner::exists("codex")
///     }
///
///     async fn fetch(&self, ctx: &FetchContext) -> Result<FetchResult, FetchError> {
///         let output = ctx.pty.run("codex", "/status", PtyOptions::default()).await?;
///         // Parse output and return FetchResult
///     }
/// }
/// ```
#[async_trait]
pub trait FetchStrategy: Send + Sync {
    /// Unique identifier for this strategy (e.g., "claude.oauth", "codex.cli").
    fn id(&self) -> &str;

    /// The kind of fetch this strategy uses.
    fn kind(&self) -> FetchKind;

    /// Human-readable name for this strategy.
    fn display_name(&self) -> String {
        format!("{} ({})", self.id(), self.kind().display_name())
    }

    /// Check if this strategy can run right now.
    ///
    /// Must be cheap and side-effect free: no network, no process spawns,
    /// nothing that could raise an OS permission prompt.
    async fn is_available(&self, ctx: &FetchContext) -> bool;

    /// Fetch usage data using this strategy.
    async fn fetch(&self, ctx: &FetchContext) -> Result<FetchResult, FetchError>;

    /// Whether the pipeline should try the next strategy after `error`.
    fn should_fallback(&self, error: &FetchError, ctx: &FetchContext) -> bool {
        default_fallback_policy(self.kind(), error, ctx)
    }
}

/// The fallback policy shared by every strategy kind.
///
/// Only web strategies fall back, and only when the error means nothing
/// usable was there to authenticate with. An explicitly requested source
/// mode surfaces the real error instead.
pub fn default_fallback_policy(kind: FetchKind, error: &FetchError, ctx: &FetchContext) -> bool {
    match kind {
        FetchKind::Web => {
            ctx.source_mode() == SourceMode::Auto && error.is_credential_unavailable()
        }
        FetchKind::Cli | FetchKind::OAuth | FetchKind::ApiToken | FetchKind::LocalProbe => false,
    }
}

// ============================================================================
// Strategy Info
// ============================================================================

/// Information about a strategy (for reporting).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyInfo {
    /// Strategy ID.
    pub id: String,
    /// Strategy kind.
    pub kind: FetchKind,
    /// Whether the strategy is available.
    pub available: bool,
}

impl StrategyInfo {
    /// Creates strategy info from a strategy implementation.
    pub async fn from_strategy(strategy: &dyn FetchStrategy, ctx: &FetchContext) -> Self {
        Self {
            id: strategy.id().to_string(),
            kind: strategy.kind(),
            available: strategy.is_available(ctx).await,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
