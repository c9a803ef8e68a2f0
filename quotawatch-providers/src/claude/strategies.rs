//! Claude fetch strategies.
//!
//! 1. **OAuth** - Claude Code's token against the usage endpoint
//! 2. **Web** - claude.ai `sessionKey` cookie from a browser
//! 3. **CLI** - `claude` in a PTY, typing `/usage`

use async_trait::async_trait;
use chrono::Utc;
use quotawatch_core::{DashboardInfo, LoginMethod, ProviderIdentity, ProviderKind};
use quotawatch_fetch::{
    FetchContext, FetchError, FetchKind, FetchResult, FetchStrategy, PtyOptions, PtyRunner,
    Runtime,
};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, instrument};

use super::api::{OAUTH_BETA, OAUTH_USAGE_URL, parse_usage_response};
use super::oauth::{ClaudeOAuthCredentials, load_credentials};
use super::pty_probe::{CLAUDE_BINARY, USAGE_COMMAND, login_required, parse_usage_output, usage_detector};
use super::web::{
    ACCOUNT_URL, CLAUDE_DOMAIN, DASHBOARD_URL, ORGANIZATIONS_URL, SESSION_COOKIE,
    parse_account_email, select_organization, usage_url,
};
use crate::common::{AuthKind, parse_screen, read_body};

// ============================================================================
// OAuth Strategy
// ============================================================================

/// Claude usage through Claude Code's OAuth token.
///
/// Only available with a token that is unexpired and carries the usage
/// scope. The token found by the availability check is kept for the fetch,
/// so the keychain is read at most once per run.
#[derive(Debug, Default)]
pub struct ClaudeOAuthStrategy {
    home: Option<PathBuf>,
    loaded: Mutex<Option<ClaudeOAuthCredentials>>,
}

impl ClaudeOAuthStrategy {
    /// Creates a new OAuth strategy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks for `.claude/` under `home` instead of the user's home.
    #[must_use]
    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = Some(home.into());
        self
    }

    /// The keychain copy is only read by the app on macOS, where Claude
    /// Code keeps it; a one-shot command never raises that prompt.
    fn keychain_allowed(ctx: &FetchContext) -> bool {
        ctx.runtime == Runtime::App && cfg!(target_os = "macos")
    }

    async fn usable_credentials(
        &self,
        ctx: &FetchContext,
    ) -> Result<ClaudeOAuthCredentials, FetchError> {
        let credentials =
            load_credentials(ctx, self.home.as_deref(), Self::keychain_allowed(ctx)).await?;
        credentials.ensure_usable(Utc::now())?;
        Ok(credentials)
    }

    fn headers(token: &str) -> Result<HeaderMap, FetchError> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| FetchError::TokenMissing("token is not a valid header value".into()))?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(
            HeaderName::from_static("anthropic-beta"),
            HeaderValue::from_static(OAUTH_BETA),
        );
        Ok(headers)
    }
}

#[async_trait]
impl FetchStrategy for ClaudeOAuthStrategy {
    fn id(&self) -> &str {
        "claude.oauth"
    }

    fn kind(&self) -> FetchKind {
        FetchKind::OAuth
    }

    async fn is_available(&self, ctx: &FetchContext) -> bool {
        if !ctx.source_mode().allows_oauth() {
            return false;
        }
        match self.usable_credentials(ctx).await {
            Ok(credentials) => {
                *self.loaded.lock().unwrap_or_else(PoisonError::into_inner) = Some(credentials);
                true
            }
            Err(FetchError::TokenMissing(reason)) => {
                debug!(reason = %reason, "No usable Claude OAuth token");
                false
            }
            // A token store that exists but cannot be read is surfaced by fetch.
            Err(_) => true,
        }
    }

    #[instrument(skip(self, ctx))]
    async fn fetch(&self, ctx: &FetchContext) -> Result<FetchResult, FetchError> {
        let cached = self
            .loaded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let credentials = match cached {
            Some(credentials) => credentials,
            None => self.usable_credentials(ctx).await?,
        };
        debug!(source = ?credentials.source, "Using Claude OAuth token");

        let response = ctx
            .http
            .get_with_headers(OAUTH_USAGE_URL, Self::headers(&credentials.access_token)?)
            .await?;
        let body = read_body(response, AuthKind::Token, "Claude usage API").await?;
        let usage = parse_usage_response(&body)?;

        let mut identity =
            ProviderIdentity::new(ProviderKind::Claude).with_login_method(LoginMethod::OAuth);
        identity.plan_name = credentials.plan_name();
        let snapshot = usage.to_snapshot()?.with_identity(identity);

        let mut result = FetchResult::new(snapshot, self.id(), self.kind());
        if let Some(credits) = usage.credits() {
            result = result.with_credits(credits);
        }
        Ok(result)
    }
}

// ============================================================================
// Web Strategy
// ============================================================================

/// Claude usage through a claude.ai browser session.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClaudeWebStrategy;

impl ClaudeWebStrategy {
    /// Creates a new web strategy.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FetchStrategy for ClaudeWebStrategy {
    fn id(&self) -> &str {
        "claude.web"
    }

    fn kind(&self) -> FetchKind {
        FetchKind::Web
    }

    async fn is_available(&self, ctx: &FetchContext) -> bool {
        ctx.source_mode().allows_web()
    }

    #[instrument(skip(self, ctx))]
    async fn fetch(&self, ctx: &FetchContext) -> Result<FetchResult, FetchError> {
        let import = ctx
            .browser
            .import_gated(
                CLAUDE_DOMAIN,
                &ctx.settings.browser_order,
                &ctx.access_gate,
                &ctx.presence,
                Utc::now(),
            )
            .await?;
        if import.get(SESSION_COOKIE).is_none() {
            return Err(FetchError::NoCredential(format!(
                "no {SESSION_COOKIE} cookie in {}",
                import.candidate.label
            )));
        }
        let cookies = import.header();

        let response = ctx.http.get_with_cookies(ORGANIZATIONS_URL, &cookies).await?;
        let org = select_organization(&read_body(response, AuthKind::Session, "claude.ai").await?)?;
        debug!(org = %org.uuid, "Selected organization");

        let response = ctx.http.get_with_cookies(&usage_url(&org.uuid), &cookies).await?;
        let body = read_body(response, AuthKind::Session, "claude.ai usage").await?;
        let usage = parse_usage_response(&body)?;

        // The email is decoration; a failure here does not fail the fetch.
        let email = match ctx.http.get_with_cookies(ACCOUNT_URL, &cookies).await {
            Ok(response) if response.status().is_success() => {
                response.text().await.ok().as_deref().and_then(parse_account_email)
            }
            _ => None,
        };

        let plan = org.plan_name().map(str::to_string);
        let mut identity = ProviderIdentity::new(ProviderKind::Claude)
            .with_login_method(LoginMethod::BrowserCookies);
        identity.account_email.clone_from(&email);
        identity.account_organization.clone_from(&org.name);
        identity.plan_name.clone_from(&plan);

        let snapshot = usage.to_snapshot()?.with_identity(identity);
        let dashboard = DashboardInfo {
            url: Some(DASHBOARD_URL.to_string()),
            signed_in_email: email,
            plan,
            cookie_source: Some(import.candidate.label.clone()),
        };

        let mut result = FetchResult::new(snapshot, self.id(), self.kind())
            .with_dashboard(dashboard)
            .with_source_label(format!("web: {}", import.candidate.label));
        if let Some(credits) = usage.credits() {
            result = result.with_credits(credits);
        }
        Ok(result)
    }
}

// ============================================================================
// CLI Strategy
// ============================================================================

/// Claude usage scraped from the interactive `/usage` screen.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClaudeCliStrategy;

impl ClaudeCliStrategy {
    /// Creates a new CLI strategy.
    pub fn new() -> Self {
        Self
    }

    fn options(ctx: &FetchContext) -> PtyOptions {
        PtyOptions::with_timeout(ctx.settings.pty_timeout)
            .env("NO_COLOR", "1")
            .send_on("Do you trust the files in this folder", "\r")
            .detector(usage_detector())
            .settle(Duration::from_millis(400))
            .exit_command("/exit\r")
    }
}

#[async_trait]
impl FetchStrategy for ClaudeCliStrategy {
    fn id(&self) -> &str {
        "claude.cli"
    }

    fn kind(&self) -> FetchKind {
        FetchKind::Cli
    }

    async fn is_available(&self, ctx: &FetchContext) -> bool {
        ctx.source_mode().allows_cli() && PtyRunner::exists(CLAUDE_BINARY)
    }

    #[instrument(skip(self, ctx))]
    async fn fetch(&self, ctx: &FetchContext) -> Result<FetchResult, FetchError> {
        let input = format!("{USAGE_COMMAND}\r");
        let result = ctx.pty.run(CLAUDE_BINARY, &input, Self::options(ctx)).await?;

        if let Some(prompt) = login_required(&result.text) {
            return Err(FetchError::LoginRequired(format!("claude: {prompt}")));
        }

        let mut snapshot = parse_screen(result, &parse_usage_output)?;
        let identity = snapshot
            .identity
            .take()
            .unwrap_or_else(|| ProviderIdentity::new(ProviderKind::Claude))
            .with_login_method(LoginMethod::Cli);
        snapshot.identity = Some(identity);
        Ok(FetchResult::new(snapshot, self.id(), self.kind()))
    }
}
