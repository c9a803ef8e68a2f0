//! z.ai fetch strategy.

use async_trait::async_trait;
use quotawatch_core::{DashboardInfo, LoginMethod, ProviderIdentity, ProviderKind};
use quotawatch_fetch::{FetchContext, FetchError, FetchKind, FetchResult, FetchStrategy};
use tracing::{debug, instrument};

use super::api::{DASHBOARD_URL, QUOTA_URL, TOKEN_ENV_KEYS, parse_quota_response};
use crate::common::{AuthKind, read_body};

/// z.ai quota through an API key from settings or the environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZaiApiStrategy;

impl ZaiApiStrategy {
    /// Creates a new API strategy.
    pub fn new() -> Self {
        Self
    }

    /// Returns the configured API key.
    pub fn token(ctx: &FetchContext) -> Option<String> {
        ctx.api_token(ProviderKind::Zai.id(), TOKEN_ENV_KEYS)
    }
}

#[async_trait]
impl FetchStrategy for ZaiApiStrategy {
    fn id(&self) -> &str {
        "zai.api"
    }

    fn kind(&self) -> FetchKind {
        FetchKind::ApiToken
    }

    async fn is_available(&self, ctx: &FetchContext) -> bool {
        ctx.source_mode().allows_api_token() && Self::token(ctx).is_some()
    }

    #[instrument(skip(self, ctx))]
    async fn fetch(&self, ctx: &FetchContext) -> Result<FetchResult, FetchError> {
        let token = Self::token(ctx).ok_or_else(|| {
            FetchError::TokenMissing(format!("set {} or a z.ai token", TOKEN_ENV_KEYS[0]))
        })?;

        let response = ctx.http.get_with_auth(QUOTA_URL, &format!("Bearer {token}")).await?;
        let body = read_body(response, AuthKind::Token, "z.ai quota API").await?;
        let quota = parse_quota_response(&body)?;
        let snapshot = quota.to_snapshot()?;

        let plan = quota.plan_name().map(str::to_string);
        debug!(plan = ?plan, "z.ai quota fetched");
        let mut identity =
            ProviderIdentity::new(ProviderKind::Zai).with_login_method(LoginMethod::ApiKey);
        identity.plan_name.clone_from(&plan);

        let dashboard = DashboardInfo {
            url: Some(DASHBOARD_URL.to_string()),
            plan,
            ..DashboardInfo::default()
        };
        Ok(
            FetchResult::new(snapshot.with_identity(identity), self.id(), self.kind())
                .with_dashboard(dashboard),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quotawatch_fetch::SourceMode;
    use std::collections::HashMap;

    fn ctx(mode: SourceMode, env: &[(&str, &str)]) -> FetchContext {
        let env = env
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect::<HashMap<_, _>>();
        FetchContext::builder().source_mode(mode).env(env).build()
    }

    #[test]
    fn test_token_sources() {
        assert_eq!(ZaiApiStrategy::token(&ctx(SourceMode::Auto, &[])), None);
        assert_eq!(
            ZaiApiStrategy::token(&ctx(SourceMode::Auto, &[("ZAI_API_KEY", "k1")])).as_deref(),
            Some("k1")
        );
        let both = ctx(SourceMode::Auto, &[("ZAI_API_KEY", "k1"), ("Z_AI_API_KEY", "k0")]);
        assert_eq!(ZaiApiStrategy::token(&both).as_deref(), Some("k0"));
    }

    #[tokio::test]
    async fn test_availability() {
        let strategy = ZaiApiStrategy::new();
        assert!(!strategy.is_available(&ctx(SourceMode::Auto, &[])).await);
        assert!(
            strategy
                .is_available(&ctx(SourceMode::ApiToken, &[("Z_AI_API_KEY", "k")]))
                .await
        );
        assert!(
            !strategy
                .is_available(&ctx(SourceMode::Web, &[("Z_AI_API_KEY", "k")]))
                .await
        );
    }

    #[tokio::test]
    async fn test_fetch_without_token() {
        let err = ZaiApiStrategy::new()
            .fetch(&ctx(SourceMode::Auto, &[]))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::TokenMissing(_)));
    }
}
