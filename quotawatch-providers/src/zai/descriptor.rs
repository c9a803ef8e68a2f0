//! z.ai provider descriptor.

use quotawatch_core::{ProviderKind, ProviderMetadata};
use quotawatch_fetch::{FetchContext, FetchStrategy, SourceMode};

use super::api::DASHBOARD_URL;
use super::strategies::ZaiApiStrategy;
use crate::descriptor::{CliConfig, ProviderDescriptor};

/// Creates the z.ai provider descriptor.
pub fn zai_descriptor() -> ProviderDescriptor {
    ProviderDescriptor {
        id: ProviderKind::Zai,
        metadata: ProviderMetadata {
            id: ProviderKind::Zai,
            display_name: "z.ai",
            session_label: "Tokens",
            weekly_label: "MCP",
            tertiary_label: None,
            default_enabled: false,
            dashboard_url: Some(DASHBOARD_URL),
        },
        source_modes: &[SourceMode::Auto, SourceMode::ApiToken],
        resolve: resolve_zai,
        cli: CliConfig::named("zai", &["z.ai", "glm"]),
    }
}

/// Without a key there is nothing to try.
fn resolve_zai(ctx: &FetchContext) -> Vec<Box<dyn FetchStrategy>> {
    if ctx.source_mode().allows_api_token() && ZaiApiStrategy::token(ctx).is_some() {
        vec![Box::new(ZaiApiStrategy::new())]
    } else {
        Vec::new()
    }
}
