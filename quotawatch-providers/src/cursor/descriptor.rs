//! Cursor provider descriptor.

use quotawatch_core::{ProviderKind, ProviderMetadata};
use quotawatch_fetch::{FetchContext, FetchStrategy, SourceMode};

use super::strategies::{CursorLocalStrategy, CursorWebStrategy};
use super::web::DASHBOARD_URL;
use crate::descriptor::{CliConfig, ProviderDescriptor};

/// Creates the Cursor provider descriptor.
pub fn cursor_descriptor() -> ProviderDescriptor {
    ProviderDescriptor {
        id: ProviderKind::Cursor,
        metadata: ProviderMetadata {
            id: ProviderKind::Cursor,
            display_name: "Cursor",
            session_label: "Plan",
            weekly_label: "On-demand",
            tertiary_label: None,
            default_enabled: false,
            dashboard_url: Some(DASHBOARD_URL),
        },
        source_modes: &[SourceMode::Auto, SourceMode::Web],
        resolve: resolve_cursor,
        cli: CliConfig::named("cursor", &[]),
    }
}

/// The local probe only runs in auto mode, behind the web session.
fn resolve_cursor(ctx: &FetchContext) -> Vec<Box<dyn FetchStrategy>> {
    let mode = ctx.source_mode();
    let mut strategies: Vec<Box<dyn FetchStrategy>> = Vec::new();
    if mode.allows_web() {
        strategies.push(Box::new(CursorWebStrategy::new()));
    }
    if mode == SourceMode::Auto {
        strategies.push(Box::new(CursorLocalStrategy::new()));
    }
    strategies
}
