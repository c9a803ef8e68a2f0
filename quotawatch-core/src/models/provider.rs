//! Provider-related types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Provider Kind
// ============================================================================

/// Supported providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Anthropic Claude (Claude Code CLI, claude.ai).
    Claude,
    /// OpenAI Codex CLI.
    Codex,
    /// Cursor IDE.
    Cursor,
    /// z.ai.
    Zai,
}

impl ProviderKind {
    /// Returns the display name for this provider.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Claude => "Claude",
            Self::Codex => "Codex",
            Self::Cursor => "Cursor",
            Self::Zai => "z.ai",
        }
    }

    /// Returns the identifier used on the command line and in settings.
    pub fn id(&self) -> &'static str {
        match self {
            Self::Claude => "claude",
            Self::Codex => "codex",
            Self::Cursor => "cursor",
            Self::Zai => "zai",
        }
    }

    /// Returns all providers in registry order.
    pub fn all() -> &'static [ProviderKind] {
        &[Self::Claude, Self::Codex, Self::Cursor, Self::Zai]
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Self::all()
            .iter()
            .copied()
            .find(|k| k.id() == needle || (needle == "z.ai" && *k == Self::Zai))
            .ok_or_else(|| format!("unknown provider: {s}"))
    }
}

// ============================================================================
// Provider Identity
// ============================================================================

/// Account identity information for a provider.
///
/// Siloed per provider: identity from one provider is never attached to
/// another provider's snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderIdentity {
    /// The provider this identity belongs to.
    pub provider_id: ProviderKind,
    /// Account email address.
    pub account_email: Option<String>,
    /// Organization name (if applicable).
    pub account_organization: Option<String>,
    /// Plan/subscription name.
    pub plan_name: Option<String>,
    /// How the user authenticated.
    pub login_method: Option<LoginMethod>,
}

impl ProviderIdentity {
    /// Creates a new identity for the given provider.
    pub fn new(provider_id: ProviderKind) -> Self {
        Self {
            provider_id,
            account_email: None,
            account_organization: None,
            plan_name: None,
            login_method: None,
        }
    }

    /// Sets the account email.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.account_email = Some(email.into());
        self
    }

    /// Sets the plan name.
    #[must_use]
    pub fn with_plan(mut self, plan: impl Into<String>) -> Self {
        self.plan_name = Some(plan.into());
        self
    }

    /// Sets the login method.
    #[must_use]
    pub fn with_login_method(mut self, method: LoginMethod) -> Self {
        self.login_method = Some(method);
        self
    }

    /// Returns true if no identifying field is set.
    pub fn is_empty(&self) -> bool {
        self.account_email.is_none()
            && self.account_organization.is_none()
            && self.plan_name.is_none()
    }

    /// Returns a display string for this identity.
    pub fn display_string(&self) -> String {
        match (&self.account_email, &self.account_organization) {
            (Some(email), Some(org)) => format!("{email} ({org})"),
            (Some(email), None) => email.clone(),
            (None, Some(org)) => org.clone(),
            (None, None) => self.provider_id.display_name().to_string(),
        }
    }
}

/// How the user authenticated with a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginMethod {
    /// OAuth token issued to a CLI or app.
    #[serde(rename = "oauth")]
    OAuth,
    /// Static API key.
    ApiKey,
    /// Session cookies imported from a browser.
    BrowserCookies,
    /// Interactive CLI session.
    Cli,
    /// Local application state.
    Local,
}

// ============================================================================
// Provider Metadata
// ============================================================================

/// Static display information for a provider.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderMetadata {
    /// The provider this metadata describes.
    pub id: ProviderKind,
    /// Display name.
    pub display_name: &'static str,
    /// Label for the primary window.
    pub session_label: &'static str,
    /// Label for the secondary window.
    pub weekly_label: &'static str,
    /// Label for the tertiary window, if the provider has one.
    pub tertiary_label: Option<&'static str>,
    /// Whether the provider is fetched when no provider is selected.
    pub default_enabled: bool,
    /// Usage dashboard URL.
    pub dashboard_url: Option<&'static str>,
}
