//! Cursor fetch strategies.
//!
//! 1. **Web** - cursor.com session cookie against the dashboard API
//! 2. **Local** - the account the editor caches on disk (identity only)

use async_trait::async_trait;
use chrono::Utc;
use quotawatch_core::{DashboardInfo, LoginMethod, ProviderIdentity, ProviderKind, UsageSnapshot};
use quotawatch_fetch::{FetchContext, FetchError, FetchKind, FetchResult, FetchStrategy};
use std::path::PathBuf;
use tracing::{debug, instrument};

use super::local::read_local_account;
use super::web::{
    AUTH_ME_URL, CURSOR_DOMAIN, DASHBOARD_URL, SESSION_COOKIE, USAGE_SUMMARY_URL, parse_auth_me,
    parse_usage_summary,
};
use crate::common::{AuthKind, read_body};

// ============================================================================
// Web Strategy
// ============================================================================

/// Cursor usage through a cursor.com browser session.
#[derive(Debug, Clone, Copy, Default)]
pub struct CursorWebStrategy;

impl CursorWebStrategy {
    /// Creates a new web strategy.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FetchStrategy for CursorWebStrategy {
    fn id(&self) -> &str {
        "cursor.web"
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
                CURSOR_DOMAIN,
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

        let response = ctx.http.get_with_cookies(USAGE_SUMMARY_URL, &cookies).await?;
        let body = read_body(response, AuthKind::Session, "cursor.com").await?;
        let summary = parse_usage_summary(&body)?;

        let email = match ctx.http.get_with_cookies(AUTH_ME_URL, &cookies).await {
            Ok(response) if response.status().is_success() => {
                response.text().await.ok().as_deref().and_then(parse_auth_me)
            }
            _ => None,
        };
        debug!(has_email = email.is_some(), "Cursor usage fetched");

        let plan = summary.plan_name();
        let mut identity = ProviderIdentity::new(ProviderKind::Cursor)
            .with_login_method(LoginMethod::BrowserCookies);
        identity.account_email.clone_from(&email);
        identity.plan_name.clone_from(&plan);
        let snapshot = summary.to_snapshot()?.with_identity(identity);

        let dashboard = DashboardInfo {
            url: Some(DASHBOARD_URL.to_string()),
            signed_in_email: email,
            plan,
            cookie_source: Some(import.candidate.label.clone()),
        };
        let mut result = FetchResult::new(snapshot, self.id(), self.kind())
            .with_dashboard(dashboard)
            .with_source_label(format!("web: {}", import.candidate.label));
        if let Some(credits) = summary.on_demand_credits() {
            result = result.with_credits(credits);
        }
        Ok(result)
    }
}

// ============================================================================
// Local Strategy
// ============================================================================

/// The account Cursor caches locally; carries no usage windows.
#[derive(Debug, Clone, Default)]
pub struct CursorLocalStrategy {
    root: Option<PathBuf>,
}

impl CursorLocalStrategy {
    /// Creates a new local strategy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads Cursor's state under `root` instead of the platform config dir.
    #[must_use]
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    fn root(&self) -> Option<PathBuf> {
        self.root.clone().or_else(dirs::config_dir)
    }
}

#[async_trait]
impl FetchStrategy for CursorLocalStrategy {
    fn id(&self) -> &str {
        "cursor.local"
    }

    fn kind(&self) -> FetchKind {
        FetchKind::LocalProbe
    }

    fn display_name(&self) -> String {
        "Cursor local state".to_string()
    }

    async fn is_available(&self, _ctx: &FetchContext) -> bool {
        true
    }

    #[instrument(skip(self, _ctx))]
    async fn fetch(&self, _ctx: &FetchContext) -> Result<FetchResult, FetchError> {
        let root = self
            .root()
            .ok_or_else(|| FetchError::NoCredential("no config directory".to_string()))?;
        let account = read_local_account(&root)
            .ok_or_else(|| FetchError::NoCredential("Cursor has no cached account".to_string()))?;

        let snapshot = UsageSnapshot::new().with_identity(account.to_identity());
        Ok(FetchResult::new(snapshot, self.id(), self.kind()).with_source_label("local"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quotawatch_core::FetchSource;
    use quotawatch_fetch::SourceMode;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn ctx(mode: SourceMode) -> FetchContext {
        FetchContext::builder().source_mode(mode).env(HashMap::new()).build()
    }

    #[tokio::test]
    async fn test_local_identity_only() {
        let root = TempDir::new().unwrap();
        let dir = super::super::local::global_storage_dir(root.path());
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("storage.json"),
            r#"{"cursorAuth/cachedEmail": "dev@example.com"}"#,
        )
        .unwrap();

        let strategy = CursorLocalStrategy::new().with_root(root.path());
        let result = strategy.fetch(&ctx(SourceMode::Auto)).await.unwrap();
        assert!(result.snapshot.primary.is_none());
        assert_eq!(result.snapshot.fetch_source, FetchSource::LocalProbe);
        assert_eq!(
            result.snapshot.identity.unwrap().account_email.as_deref(),
            Some("dev@example.com")
        );
    }

    #[tokio::test]
    async fn test_local_without_account() {
        let root = TempDir::new().unwrap();
        let strategy = CursorLocalStrategy::new().with_root(root.path());
        let err = strategy.fetch(&ctx(SourceMode::Auto)).await.unwrap_err();
        assert!(matches!(err, FetchError::NoCredential(_)));
    }

    #[tokio::test]
    async fn test_web_availability_follows_mode() {
        let strategy = CursorWebStrategy::new();
        assert!(strategy.is_available(&ctx(SourceMode::Auto)).await);
        assert!(strategy.is_available(&ctx(SourceMode::Web)).await);
        assert!(!strategy.is_available(&ctx(SourceMode::Cli)).await);
    }
}
