//! Usage command - fetch and display provider usage.

use anyhow::Result;
use clap::Args;
use futures::future::join_all;
use quotawatch_core::ProviderKind;
use quotawatch_fetch::{FetchSettings, SourceMode};
use quotawatch_providers::ProviderRegistry;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{SharedHost, select_providers};
use crate::output::{JsonFormatter, TextFormatter, UsageReport};
use crate::{Cli, ExitCode, OutputFormat};

/// Arguments for the usage command.
#[derive(Args, Default)]
pub struct UsageArgs {
    /// Provider to query ("all" for every provider).
    /// Can be comma-separated: "codex,claude"
    #[arg(long, short)]
    pub provider: Option<String>,

    /// Source mode for every selected provider (auto, cli, web, oauth, api).
    #[arg(long)]
    pub source: Option<SourceMode>,

    /// Network timeout in seconds.
    #[arg(long)]
    pub web_timeout: Option<u64>,

    /// CLI scrape deadline in seconds.
    #[arg(long)]
    pub cli_timeout: Option<u64>,
}

impl UsageArgs {
    /// Layers command-line overrides on the settings for one provider.
    fn apply(&self, mut settings: FetchSettings) -> FetchSettings {
        if let Some(mode) = self.source {
            settings.source_mode = mode;
        }
        if let Some(secs) = self.web_timeout {
            settings.timeout = Duration::from_secs(secs.max(1));
        }
        if let Some(secs) = self.cli_timeout {
            settings.pty_timeout = Duration::from_secs(secs.max(1));
        }
        settings
    }
}

/// Runs the usage command.
pub async fn run(args: &UsageArgs, cli: &Cli) -> Result<ExitCode> {
    let host = SharedHost::load()?;
    let provider_arg = args.provider.as_deref().or(cli.provider.as_deref());
    let providers = select_providers(provider_arg, &host.settings)?;

    info!(providers = ?providers, "Fetching usage");

    let reports = fetch_all(&host, &providers, args).await;
    let any_success = reports.iter().any(UsageReport::is_success);

    output_reports(reports, cli)?;

    Ok(if any_success {
        ExitCode::Success
    } else {
        ExitCode::NoUsage
    })
}

/// Fetches every provider concurrently, one fresh context each.
async fn fetch_all(
    host: &SharedHost,
    providers: &[ProviderKind],
    args: &UsageArgs,
) -> Vec<UsageReport> {
    let fetches = providers
        .iter()
        .map(|provider| fetch_one(host, *provider, args));
    join_all(fetches).await
}

/// Fetches usage from a single provider.
async fn fetch_one(host: &SharedHost, provider: ProviderKind, args: &UsageArgs) -> UsageReport {
    let Some(desc) = ProviderRegistry::get(provider) else {
        return UsageReport::failed(provider, format!("Provider {provider} not registered"));
    };

    let settings = args.apply(host.settings.fetch_settings(provider));
    if !desc.supports(settings.source_mode) {
        return UsageReport::failed(
            provider,
            format!(
                "{} does not support source '{}'",
                desc.display_name(),
                settings.source_mode
            ),
        );
    }

    let ctx = host.context(settings);
    let pipeline = desc.build_pipeline(&ctx);
    debug!(provider = %provider, strategies = ?pipeline.strategy_ids(), "Built pipeline");

    let outcome = pipeline.execute(&ctx).await;
    match &outcome.result {
        Ok(result) => {
            debug!(provider = %provider, strategy = %result.strategy_id, "Fetch successful");
        }
        Err(e) => warn!(provider = %provider, error = %e, "Fetch failed"),
    }
    UsageReport::from_outcome(provider, outcome)
}

/// Outputs reports in the appropriate format.
fn output_reports(reports: Vec<UsageReport>, cli: &Cli) -> Result<()> {
    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);
            let blocks: Vec<String> = reports
                .iter()
                .map(|r| {
                    formatter.format_report(r, ProviderRegistry::get(r.provider), cli.verbose)
                })
                .collect();
            println!("{}", blocks.join("\n\n"));
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            let with_desc: Vec<_> = reports
                .into_iter()
                .map(|r| {
                    let desc = ProviderRegistry::get(r.provider);
                    (r, desc)
                })
                .collect();
            println!("{}", formatter.format_reports(&with_desc)?);
        }
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
