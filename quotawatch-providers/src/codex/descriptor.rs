//! Codex provider descriptor.

use quotawatch_core::{ProviderKind, ProviderMetadata};
use quotawatch_fetch::{FetchContext, FetchStrategy, SourceMode};

use super::api::DASHBOARD_URL;
use super::pty_probe::CODEX_BINARY;
use super::strategies::{CodexCliStrategy, CodexOAuthStrategy};
use crate::descriptor::{CliConfig, ProviderDescriptor};

/// Creates the Codex provider descriptor.
pub fn codex_descriptor() -> ProviderDescriptor {
    ProviderDescriptor {
        id: ProviderKind::Codex,
        metadata: ProviderMetadata {
            id: ProviderKind::Codex,
            display_name: "Codex",
            session_label: "Session",
            weekly_label: "Weekly",
            tertiary_label: None,
            default_enabled: true,
            dashboard_url: Some(DASHBOARD_URL),
        },
        source_modes: &[SourceMode::Auto, SourceMode::OAuth, SourceMode::Cli],
        resolve: resolve_codex,
        cli: CliConfig::with_binary("codex", &["openai"], CODEX_BINARY),
    }
}

fn resolve_codex(ctx: &FetchContext) -> Vec<Box<dyn FetchStrategy>> {
    let mode = ctx.source_mode();
    let mut strategies: Vec<Box<dyn FetchStrategy>> = Vec::new();
    if mode.allows_oauth() {
        strategies.push(Box::new(CodexOAuthStrategy::new()));
    }
    if mode.allows_cli() {
        strategies.push(Box::new(CodexCliStrategy::new()));
    }
    strategies
}
