//! Browsers command - cookie source presence and access cooldowns.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use quotawatch_fetch::{Browser, BrowserAccessGate, BrowserPresenceCache};
use tracing::info;

use super::SharedHost;
use crate::output::{BrowserOutput, JsonFormatter, TextFormatter};
use crate::{Cli, OutputFormat};

/// Arguments for the browsers command.
#[derive(Args)]
pub struct BrowsersArgs {
    /// Clear the access cooldown for one browser, or all when none is named.
    #[arg(long, value_name = "BROWSER", num_args = 0..=1, default_missing_value = "all")]
    pub reset: Option<String>,
}

/// Runs the browsers command.
pub fn run(args: &BrowsersArgs, cli: &Cli) -> Result<()> {
    let host = SharedHost::load()?;

    if let Some(target) = &args.reset {
        let browser = parse_reset_target(target)?;
        host.gate
            .reset(browser)
            .context("failed to clear browser cooldowns")?;
        info!(browser = ?browser, "Browser cooldown cleared");
        if !cli.quiet && cli.format == OutputFormat::Text {
            match browser {
                Some(b) => println!("Cleared cooldown for {b}"),
                None => println!("Cleared all browser cooldowns"),
            }
        }
    }

    let statuses = collect(&host.gate, &host.presence, &host.settings.browser_order());

    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);
            let now = Utc::now();
            if !host.gate.is_enforced() {
                println!("Cookie access cooldowns are not enforced on this platform");
            }
            for status in &statuses {
                println!(
                    "{}",
                    formatter.format_browser_line(
                        status.browser,
                        status.installed,
                        status.denied_until,
                        now
                    )
                );
            }
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&statuses)?);
        }
    }

    Ok(())
}

/// `all` clears every browser; anything else must name one.
fn parse_reset_target(target: &str) -> Result<Option<Browser>> {
    if target.trim().eq_ignore_ascii_case("all") {
        return Ok(None);
    }
    target
        .parse::<Browser>()
        .map(Some)
        .map_err(|e| anyhow::anyhow!(e))
}

/// Status per browser in the configured order; only active denials count.
fn collect(
    gate: &BrowserAccessGate,
    presence: &BrowserPresenceCache,
    order: &[Browser],
) -> Vec<BrowserOutput> {
    let now = Utc::now();
    order
        .iter()
        .map(|&browser| BrowserOutput {
            browser,
            installed: presence.is_installed(browser),
            requires_keychain: browser.requires_keychain(),
            denied_until: gate.denied_until(browser).filter(|until| *until > now),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use quotawatch_store::FilePreferences;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_parse_reset_target() {
        assert_eq!(parse_reset_target("all").unwrap(), None);
        assert_eq!(parse_reset_target("Chrome").unwrap(), Some(Browser::Chrome));
        assert!(parse_reset_target("netscape").is_err());
    }

    #[test]
    fn test_collect_reports_active_denials() {
        let dir = TempDir::new().unwrap();
        let home = TempDir::new().unwrap();
        let prefs = FilePreferences::open(dir.path().join("preferences.json"));
        let gate = BrowserAccessGate::new(Arc::new(prefs)).enforced(true);
        let presence = BrowserPresenceCache::new().with_root(home.path());

        gate.record_denied(Browser::Chrome, Utc::now());
        let statuses = collect(&gate, &presence, &[Browser::Firefox, Browser::Chrome]);

        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[0].browser, Browser::Firefox);
        assert!(statuses[0].denied_until.is_none());
        assert!(!statuses[0].installed);
        assert!(statuses[1].denied_until.is_some());
        assert!(statuses[1].requires_keychain);

        gate.reset(None).unwrap();
        let statuses = collect(&gate, &presence, &[Browser::Chrome]);
        assert!(statuses[0].denied_until.is_none());
    }
}
