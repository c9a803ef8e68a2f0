//! Check command - provider CLIs and strategy availability.

use anyhow::Result;
use futures::future::join_all;
use quotawatch_fetch::{FetchContext, ProcessRunner, StrategyInfo};
use quotawatch_providers::{ProviderDescriptor, ProviderRegistry};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

use super::{SharedHost, select_providers};
use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, OutputFormat};

const VERSION_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProviderCheck {
    provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    binary: Option<BinaryCheck>,
    strategies: Vec<StrategyInfo>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BinaryCheck {
    name: String,
    found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<String>,
}

/// Runs the check command.
pub async fn run(cli: &Cli) -> Result<()> {
    let host = SharedHost::load()?;
    let selection = cli.provider.as_deref().unwrap_or("all");
    let providers = select_providers(Some(selection), &host.settings)?;
    info!(providers = ?providers, "Checking providers");

    let checks = providers
        .iter()
        .filter_map(|p| ProviderRegistry::get(*p))
        .map(|desc| {
            let ctx = host.context(host.settings.fetch_settings(desc.id));
            async move { check_provider(desc, &ctx).await }
        });
    let checks = join_all(checks).await;

    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);
            for check in &checks {
                let name = ProviderRegistry::get_by_cli_name(&check.provider)
                    .map_or(check.provider.as_str(), |d| d.display_name());
                println!("{}", formatter.bold(name));
                if let Some(binary) = &check.binary {
                    println!(
                        "{}",
                        formatter.format_binary_line(
                            &binary.name,
                            binary.version.as_deref(),
                            binary.found
                        )
                    );
                }
                if check.strategies.is_empty() {
                    println!("  no strategies apply in the current settings");
                }
                for info in &check.strategies {
                    println!(
                        "{}",
                        formatter.format_strategy_line(
                            &info.id,
                            info.kind.display_name(),
                            info.available
                        )
                    );
                }
            }
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&checks)?);
        }
    }

    Ok(())
}

async fn check_provider(desc: &ProviderDescriptor, ctx: &FetchContext) -> ProviderCheck {
    let binary = match desc.cli.binary {
        Some(name) => Some(check_binary(&ctx.process, name, desc.cli.version_args).await),
        None => None,
    };

    let mut strategies = Vec::new();
    for strategy in desc.strategies(ctx) {
        strategies.push(StrategyInfo::from_strategy(strategy.as_ref(), ctx).await);
    }

    ProviderCheck {
        provider: desc.cli_name().to_string(),
        binary,
        strategies,
    }
}

async fn check_binary(runner: &ProcessRunner, name: &str, version_args: &[&str]) -> BinaryCheck {
    if !runner.command_exists(name) {
        return BinaryCheck {
            name: name.to_string(),
            found: false,
            version: None,
        };
    }

    let version = match runner.run_with_timeout(name, version_args, VERSION_TIMEOUT).await {
        Ok(output) if output.success() => first_line(&output.stdout),
        Ok(output) => {
            debug!(binary = name, exit_code = output.exit_code, "Version query failed");
            None
        }
        Err(e) => {
            debug!(binary = name, error = %e, "Version query failed");
            None
        }
    };

    BinaryCheck {
        name: name.to_string(),
        found: true,
        version,
    }
}

fn first_line(output: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quotawatch_fetch::SourceMode;

    #[test]
    fn test_first_line() {
        assert_eq!(
            first_line("\n  1.0.3 (Claude Code)\nextra"),
            Some("1.0.3 (Claude Code)".to_string())
        );
        assert_eq!(first_line("  \n"), None);
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let runner = ProcessRunner::new();
        let check = check_binary(&runner, "quotawatch-no-such-binary", &["--version"]).await;
        assert!(!check.found);
        assert!(check.version.is_none());
    }

    #[tokio::test]
    async fn test_cursor_strategies_reported_in_order() {
        let desc = ProviderRegistry::get(quotawatch_core::ProviderKind::Cursor).unwrap();
        let ctx = FetchContext::builder().source_mode(SourceMode::Auto).build();
        let check = check_provider(desc, &ctx).await;
        assert!(check.binary.is_none());
        let ids: Vec<_> = check.strategies.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["cursor.web", "cursor.local"]);
        assert!(check.strategies.iter().all(|s| s.available));
    }
}
