//! Text output formatting with progress bars and colors.

use chrono::{DateTime, Duration, Local, Utc};
use quotawatch_core::{Credits, RateWindow};
use quotawatch_fetch::{Browser, SourceMode};
use quotawatch_providers::ProviderDescriptor;

use super::UsageReport;

// ============================================================================
// ANSI Colors
// ============================================================================

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";
const BLUE: &str = "\x1b[34m";
const CYAN: &str = "\x1b[36m";

// Progress bar characters
const BAR_FULL: char = '█';
const BAR_EMPTY: char = '░';

/// Text formatter with optional colors.
pub struct TextFormatter {
    use_colors: bool,
    bar_width: usize,
}

impl TextFormatter {
    /// Creates a new text formatter.
    pub fn new(use_colors: bool) -> Self {
        Self {
            use_colors,
            bar_width: 10,
        }
    }

    // ========================================================================
    // Usage
    // ========================================================================

    /// Formats one provider's report. `verbose` appends the attempt trail.
    pub fn format_report(
        &self,
        report: &UsageReport,
        desc: Option<&ProviderDescriptor>,
        verbose: bool,
    ) -> String {
        let name = desc.map_or_else(|| report.provider.display_name(), |d| d.display_name());

        let mut lines = match &report.result {
            Ok(result) => {
                let mut lines = vec![format!(
                    "{} ({})",
                    self.bold(name),
                    self.dim(&result.display_source())
                )];
                let snapshot = &result.snapshot;
                let labels = desc.map(|d| &d.metadata);

                if let Some(primary) = &snapshot.primary {
                    let label = labels.map_or("Session", |m| m.session_label);
                    lines.push(self.format_window(primary, label));
                }
                if let Some(secondary) = &snapshot.secondary {
                    let label = labels.map_or("Weekly", |m| m.weekly_label);
                    lines.push(self.format_window(secondary, label));
                }
                if let Some(tertiary) = &snapshot.tertiary {
                    let label = labels.and_then(|m| m.tertiary_label).unwrap_or("Extra");
                    lines.push(self.format_window(tertiary, label));
                }
                if !snapshot.has_data() {
                    lines.push(self.dim("No usage windows reported"));
                }

                if let Some(credits) = &result.credits {
                    lines.push(format!("Credits: {}", self.format_credits(credits)));
                }

                if let Some(identity) = &snapshot.identity {
                    if let Some(email) = &identity.account_email {
                        lines.push(format!("Account: {}", self.cyan(email)));
                    }
                    if let Some(org) = &identity.account_organization {
                        lines.push(format!("Org:     {org}"));
                    }
                    if let Some(plan) = &identity.plan_name {
                        lines.push(format!("Plan:    {}", self.blue(plan)));
                    }
                }
                lines
            }
            Err(e) => vec![self.format_error(name, e)],
        };

        if verbose {
            lines.extend(self.format_attempts(report));
        }
        lines.join("\n")
    }

    /// Formats a usage window with progress bar.
    fn format_window(&self, window: &RateWindow, label: &str) -> String {
        let remaining = window.remaining_percent();
        let bar = self.progress_bar(remaining);
        let pct_str = self.color_for_percent(remaining, &format!("{remaining:.0}% left"));

        let mut result = format!("{:<8} {} {}", format!("{label}:"), bar, pct_str);

        if let Some(resets_at) = window.resets_at {
            let reset_str = format_reset_time(resets_at, Utc::now());
            result.push_str(&format!("\n         Resets {}", self.dim(&reset_str)));
        } else if let Some(desc) = &window.reset_description {
            result.push_str(&format!("\n         Resets {}", self.dim(desc)));
        }

        result
    }

    /// Formats a progress bar.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn progress_bar(&self, percent_remaining: f64) -> String {
        let fraction = (percent_remaining / 100.0).clamp(0.0, 1.0);
        let filled = (fraction * self.bar_width as f64).round() as usize;
        let empty = self.bar_width.saturating_sub(filled);

        let bar = format!(
            "{}{}",
            BAR_FULL.to_string().repeat(filled),
            BAR_EMPTY.to_string().repeat(empty)
        );

        self.color_for_percent(percent_remaining, &bar)
    }

    /// Formats a credit balance.
    pub fn format_credits(&self, credits: &Credits) -> String {
        if credits.unlimited {
            return self.green("unlimited");
        }
        let amount = |value: f64| match credits.unit.as_deref() {
            Some("USD") => format!("${value:.2}"),
            Some(unit) => format!("{value:.2} {unit}"),
            None => format!("{value:.2}"),
        };
        match credits.total {
            Some(total) => format!("{} of {} left", amount(credits.remaining), amount(total)),
            None => format!("{} left", amount(credits.remaining)),
        }
    }

    /// The attempt trail: strategies that ran, then the ones skipped.
    fn format_attempts(&self, report: &UsageReport) -> Vec<String> {
        let mut lines = Vec::new();
        for attempt in &report.attempts {
            let mark = if attempt.success {
                self.green("✓")
            } else {
                self.red("✗")
            };
            let mut line = format!(
                "  {mark} {} ({}, {}ms)",
                attempt.strategy_id,
                attempt.kind,
                attempt.duration.as_millis()
            );
            if let Some(error) = &attempt.error {
                line.push_str(&format!(": {}", self.dim(error)));
            }
            lines.push(line);
        }
        for id in &report.skipped {
            lines.push(format!("  {} {id} {}", self.dim("−"), self.dim("(unavailable)")));
        }
        lines
    }

    /// Formats an error message.
    pub fn format_error(&self, provider: &str, error: &str) -> String {
        format!("{}: {} - {}", self.bold(provider), self.red("Error"), error)
    }

    // ========================================================================
    // Providers
    // ========================================================================

    /// Formats provider list header.
    pub fn format_providers_header(&self) -> String {
        format!(
            "{:<10} {:<8} {:<8} {}",
            self.bold("Provider"),
            self.bold("CLI"),
            self.bold("Default"),
            self.bold("Sources")
        )
    }

    /// Formats a single provider line.
    pub fn format_provider_line(&self, desc: &ProviderDescriptor) -> String {
        let default_str = if desc.metadata.default_enabled {
            self.green("✓")
        } else {
            self.dim("−")
        };
        let sources = desc
            .source_modes
            .iter()
            .map(SourceMode::as_str)
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "{:<10} {:<8} {:<8} {}",
            desc.display_name(),
            desc.cli_name(),
            default_str,
            sources
        )
    }

    /// Formats one strategy's availability under `check`.
    pub fn format_strategy_line(&self, id: &str, kind: &str, available: bool) -> String {
        let mark = if available {
            self.green("✓")
        } else {
            self.dim("−")
        };
        format!("  {mark} {id:<14} {}", self.dim(kind))
    }

    /// Formats a binary lookup under `check`.
    pub fn format_binary_line(&self, binary: &str, version: Option<&str>, found: bool) -> String {
        match (found, version) {
            (true, Some(v)) => format!("  {} {binary} {}", self.green("✓"), self.dim(v)),
            (true, None) => format!("  {} {binary}", self.green("✓")),
            (false, _) => format!("  {} {binary} {}", self.red("✗"), self.dim("not on PATH")),
        }
    }

    // ========================================================================
    // Browsers
    // ========================================================================

    /// Formats one browser's presence and cooldown.
    pub fn format_browser_line(
        &self,
        browser: Browser,
        installed: bool,
        denied_until: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> String {
        let presence = if installed {
            self.green("installed")
        } else {
            self.dim("not found")
        };
        let access = match denied_until {
            Some(until) if until > now => {
                self.yellow(&format!("denied, retry {}", format_reset_time(until, now)))
            }
            _ if browser.requires_keychain() => "keychain".to_string(),
            _ => self.dim("no prompt"),
        };
        format!("{:<10} {:<10} {}", browser.display_name(), presence, access)
    }

    // ========================================================================
    // Color/style helpers
    // ========================================================================

    fn color_for_percent(&self, percent: f64, text: &str) -> String {
        if !self.use_colors {
            return text.to_string();
        }

        if percent < 20.0 {
            self.red(text)
        } else if percent < 50.0 {
            self.yellow(text)
        } else {
            self.green(text)
        }
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.use_colors {
            format!("{code}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    pub fn bold(&self, text: &str) -> String {
        self.paint(BOLD, text)
    }

    fn dim(&self, text: &str) -> String {
        self.paint(DIM, text)
    }

    fn green(&self, text: &str) -> String {
        self.paint(GREEN, text)
    }

    fn yellow(&self, text: &str) -> String {
        self.paint(YELLOW, text)
    }

    fn red(&self, text: &str) -> String {
        self.paint(RED, text)
    }

    fn blue(&self, text: &str) -> String {
        self.paint(BLUE, text)
    }

    fn cyan(&self, text: &str) -> String {
        self.paint(CYAN, text)
    }
}

/// Formats a reset time as a countdown under a day, else as a local time.
pub(crate) fn format_reset_time(resets_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    if resets_at <= now {
        return "now".to_string();
    }

    let diff = resets_at - now;
    if diff < Duration::hours(1) {
        let mins = diff.num_minutes().max(1);
        format!("in {} minute{}", mins, if mins == 1 { "" } else { "s" })
    } else if diff < Duration::hours(24) {
        let hours = diff.num_hours();
        let mins = diff.num_minutes() % 60;
        if mins > 0 {
            format!("in {hours}h {mins}m")
        } else {
            format!("in {} hour{}", hours, if hours == 1 { "" } else { "s" })
        }
    } else {
        let local_reset = resets_at.with_timezone(&Local);
        // %e and %l pad with spaces.
        local_reset
            .format("%a %b %e at %l:%M %p")
            .to_string()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }
}
