//! Claude provider descriptor.

use quotawatch_core::{ProviderKind, ProviderMetadata};
use quotawatch_fetch::{FetchContext, FetchStrategy, Runtime, SourceMode};

use super::pty_probe::CLAUDE_BINARY;
use super::strategies::{ClaudeCliStrategy, ClaudeOAuthStrategy, ClaudeWebStrategy};
use super::web::DASHBOARD_URL;
use crate::descriptor::{CliConfig, ProviderDescriptor};

/// Creates the Claude provider descriptor.
pub fn claude_descriptor() -> ProviderDescriptor {
    ProviderDescriptor {
        id: ProviderKind::Claude,
        metadata: ProviderMetadata {
            id: ProviderKind::Claude,
            display_name: "Claude",
            session_label: "Session",
            weekly_label: "Weekly",
            tertiary_label: Some("Sonnet"),
            default_enabled: true,
            dashboard_url: Some(DASHBOARD_URL),
        },
        source_modes: &[SourceMode::Auto, SourceMode::OAuth, SourceMode::Web, SourceMode::Cli],
        resolve: resolve_claude,
        cli: CliConfig::with_binary("claude", &["anthropic", "claude-code"], CLAUDE_BINARY),
    }
}

/// OAuth first everywhere. The app prefers the quiet web session over
/// spawning the CLI; a one-shot command prefers the CLI over cookies.
fn resolve_claude(ctx: &FetchContext) -> Vec<Box<dyn FetchStrategy>> {
    let mode = ctx.source_mode();
    let mut strategies: Vec<Box<dyn FetchStrategy>> = Vec::new();

    if mode.allows_oauth() {
        strategies.push(Box::new(ClaudeOAuthStrategy::new()));
    }

    let web: Option<Box<dyn FetchStrategy>> =
        mode.allows_web().then(|| Box::new(ClaudeWebStrategy::new()) as Box<dyn FetchStrategy>);
    let cli: Option<Box<dyn FetchStrategy>> =
        mode.allows_cli().then(|| Box::new(ClaudeCliStrategy::new()) as Box<dyn FetchStrategy>);

    match ctx.runtime {
        Runtime::App => strategies.extend(web.into_iter().chain(cli)),
        Runtime::Cli => strategies.extend(cli.into_iter().chain(web)),
    }
    strategies
}
