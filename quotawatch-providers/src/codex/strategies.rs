//! Codex fetch strategies.
//!
//! 1. **OAuth** - the ChatGPT token from `auth.json` against the usage endpoint
//! 2. **CLI** - `codex` in a PTY, typing `/status`

use async_trait::async_trait;
use quotawatch_core::{DashboardInfo, LoginMethod, ProviderIdentity, ProviderKind};
use quotawatch_fetch::{
    FetchContext, FetchError, FetchKind, FetchResult, FetchStrategy, PtyOptions, PtyRunner,
};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, instrument};

use super::api::{ACCOUNT_HEADER, DASHBOARD_URL, USAGE_URL, parse_usage_response};
use super::auth::{AuthFile, load_auth, read_auth_file};
use super::pty_probe::{
    CODEX_BINARY, STATUS_COMMAND, parse_status, parse_status_output, status_detector,
};
use crate::common::{AuthKind, parse_screen, read_body};

/// Capitalizes a plan type such as `plus`.
fn display_plan(plan: &str) -> String {
    let mut chars = plan.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ============================================================================
// OAuth Strategy
// ============================================================================

/// Codex usage through the ChatGPT login in `auth.json`.
#[derive(Debug, Clone, Default)]
pub struct CodexOAuthStrategy {
    home: Option<PathBuf>,
}

impl CodexOAuthStrategy {
    /// Creates a new OAuth strategy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks for `.codex/` under `home` instead of the user's home.
    #[must_use]
    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = Some(home.into());
        self
    }

    fn headers(auth: &AuthFile) -> Result<HeaderMap, FetchError> {
        let token = auth
            .access_token()
            .ok_or_else(|| FetchError::TokenMissing("no access token".into()))?;
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| FetchError::TokenMissing("token is not a valid header value".into()))?;
        headers.insert(AUTHORIZATION, bearer);
        if let Some(account) = auth.account_id() {
            if let Ok(value) = HeaderValue::from_str(account) {
                headers.insert(HeaderName::from_static(ACCOUNT_HEADER), value);
            }
        }
        Ok(headers)
    }
}

#[async_trait]
impl FetchStrategy for CodexOAuthStrategy {
    fn id(&self) -> &str {
        "codex.oauth"
    }

    fn kind(&self) -> FetchKind {
        FetchKind::OAuth
    }

    async fn is_available(&self, ctx: &FetchContext) -> bool {
        ctx.source_mode().allows_oauth()
            && read_auth_file(ctx, self.home.as_deref()).is_some_and(|a| a.access_token().is_some())
    }

    #[instrument(skip(self, ctx))]
    async fn fetch(&self, ctx: &FetchContext) -> Result<FetchResult, FetchError> {
        let auth = load_auth(ctx, self.home.as_deref()).await?;
        let response = ctx.http.get_with_headers(USAGE_URL, Self::headers(&auth)?).await?;
        let body = read_body(response, AuthKind::Token, "ChatGPT usage API").await?;
        let usage = parse_usage_response(&body)?;

        let claims = auth.claims().unwrap_or_default();
        let plan = usage
            .plan_type
            .as_deref()
            .or_else(|| claims.plan())
            .map(display_plan);
        debug!(plan = ?plan, "Codex usage fetched");

        let mut identity =
            ProviderIdentity::new(ProviderKind::Codex).with_login_method(LoginMethod::OAuth);
        identity.account_email.clone_from(&claims.email);
        identity.plan_name.clone_from(&plan);
        let snapshot = usage.to_snapshot()?.with_identity(identity);

        let dashboard = DashboardInfo {
            url: Some(DASHBOARD_URL.to_string()),
            signed_in_email: claims.email,
            plan,
            cookie_source: None,
        };
        let mut result =
            FetchResult::new(snapshot, self.id(), self.kind()).with_dashboard(dashboard);
        if let Some(credits) = usage.credits() {
            result = result.with_credits(credits);
        }
        Ok(result)
    }
}

// ============================================================================
// CLI Strategy
// ============================================================================

/// Codex usage scraped from the interactive `/status` screen.
#[derive(Debug, Clone, Copy, Default)]
pub struct CodexCliStrategy;

impl CodexCliStrategy {
    /// Creates a new CLI strategy.
    pub fn new() -> Self {
        Self
    }

    fn options(ctx: &FetchContext) -> PtyOptions {
        PtyOptions::with_timeout(ctx.settings.pty_timeout)
            .env("NO_COLOR", "1")
            .detector(status_detector())
            .settle(Duration::from_millis(300))
            .exit_command("/quit\r")
    }
}

#[async_trait]
impl FetchStrategy for CodexCliStrategy {
    fn id(&self) -> &str {
        "codex.cli"
    }

    fn kind(&self) -> FetchKind {
        FetchKind::Cli
    }

    async fn is_available(&self, ctx: &FetchContext) -> bool {
        ctx.source_mode().allows_cli() && PtyRunner::exists(CODEX_BINARY)
    }

    #[instrument(skip(self, ctx))]
    async fn fetch(&self, ctx: &FetchContext) -> Result<FetchResult, FetchError> {
        let input = format!("{STATUS_COMMAND}\r");
        let result = ctx.pty.run(CODEX_BINARY, &input, Self::options(ctx)).await?;

        if result.text.contains("Not logged in") || result.text.contains("codex login") {
            return Err(FetchError::LoginRequired("codex: run `codex login`".to_string()));
        }

        // Credits are only on the full screen; a partial one still yields windows.
        let credits = parse_status(&result.text)
            .ok()
            .and_then(|(_, extras)| extras.to_credits());
        let mut snapshot = parse_screen(result, &parse_status_output)?;
        let identity = snapshot
            .identity
            .take()
            .unwrap_or_else(|| ProviderIdentity::new(ProviderKind::Codex))
            .with_login_method(LoginMethod::Cli);
        snapshot.identity = Some(identity);

        let mut fetched = FetchResult::new(snapshot, self.id(), self.kind());
        if let Some(credits) = credits {
            fetched = fetched.with_credits(credits);
        }
        Ok(fetched)
    }
}
