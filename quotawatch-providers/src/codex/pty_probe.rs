//! Codex CLI `/status` screen.
//!
//! ```text
//! >_ OpenAI Codex (v0.46.0)
//!
//!  Account:        dev@example.com (Plus)
//!  5h limit:       [████░░░░░░] 28% used (resets 14:32)
//!  Weekly limit:   [██████░░░░] 59% used (resets 09:00 on 24 Oct)
//!  Credits:        112.45
//! ```

use quotawatch_core::{Credits, ParseError, ProviderIdentity, ProviderKind, RateWindow, UsageSnapshot};
use quotawatch_fetch::host::pty::EchoThenMarker;
use regex::Regex;
use std::sync::LazyLock;

use crate::text;

/// Codex binary.
pub const CODEX_BINARY: &str = "codex";

/// Command typed into the CLI.
pub const STATUS_COMMAND: &str = "/status";

static CREDITS_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)credits\s*:\s*\$?\s*([\d,]+(?:\.\d+)?)").ok());

/// Completion detector: the weekly line or the credits line ends the screen.
pub fn status_detector() -> EchoThenMarker {
    EchoThenMarker::new(STATUS_COMMAND)
        .markers(["Weekly limit", "Credits:"])
        .without_percent()
}

/// What a `/status` screen contains besides the windows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusExtras {
    /// Credit balance line.
    pub credits: Option<f64>,
}

fn parse_credits(line: &str) -> Option<f64> {
    let caps = CREDITS_RE.as_ref()?.captures(line)?;
    caps.get(1)?.as_str().replace(',', "").parse().ok()
}

fn window_on(line: &str, minutes: u32) -> Option<RateWindow> {
    let used = text::used_percent(line)?;
    let mut window = RateWindow::new(used).with_window_minutes(minutes);
    window.reset_description = text::reset_description(line);
    Some(window)
}

/// Parses the `/status` screen into a snapshot plus the credit balance.
///
/// # Errors
///
/// [`ParseError::Empty`] for blank text, [`ParseError::NoUsageData`] when
/// neither limit line carries a percentage.
pub fn parse_status(raw: &str) -> Result<(UsageSnapshot, StatusExtras), ParseError> {
    if raw.trim().is_empty() {
        return Err(ParseError::Empty);
    }

    let mut snapshot = UsageSnapshot::new();
    let mut extras = StatusExtras::default();
    let mut identity: Option<ProviderIdentity> = None;

    for line in raw.lines() {
        let lower = line.to_lowercase();
        if lower.contains("5h limit") {
            if snapshot.primary.is_none() {
                snapshot.primary = window_on(line, 300);
            }
        } else if lower.contains("weekly limit") {
            if snapshot.secondary.is_none() {
                snapshot.secondary = window_on(line, 10_080);
            }
        } else if lower.contains("account:") {
            if let Some(email) = text::email(line) {
                let mut id = ProviderIdentity::new(ProviderKind::Codex).with_email(email);
                id.plan_name = text::trailing_parenthesized(line);
                identity = Some(id);
            }
        } else if extras.credits.is_none() {
            extras.credits = parse_credits(line);
        }
    }

    if snapshot.primary.is_none() && snapshot.secondary.is_none() {
        return Err(ParseError::NoUsageData(
            "no limit lines in /status output".to_string(),
        ));
    }
    snapshot.identity = identity;
    Ok((snapshot, extras))
}

/// Parses only the windows and identity.
///
/// # Errors
///
/// See [`parse_status`].
pub fn parse_status_output(raw: &str) -> Result<UsageSnapshot, ParseError> {
    parse_status(raw).map(|(snapshot, _)| snapshot)
}

impl StatusExtras {
    /// Credit balance as [`Credits`].
    pub fn to_credits(&self) -> Option<Credits> {
        self.credits.map(Credits::new)
    }
}
