//! Claude CLI `/usage` screen.
//!
//! Running `claude` and typing `/usage` draws something like:
//!
//! ```text
//!  Current session
//!  ███████▌                                           15% used
//!  Resets 3pm (America/New_York)
//!
//!  Current week (all models)
//!  ██                                                  4% used
//!  Resets Oct 24, 9am (America/New_York)
//!
//!  Current week (Sonnet only)
//!                                                      0% used
//! ```

use quotawatch_core::{ParseError, ProviderIdentity, ProviderKind, RateWindow, UsageSnapshot};
use quotawatch_fetch::host::pty::EchoThenMarker;

use crate::text;

/// Claude Code binary.
pub const CLAUDE_BINARY: &str = "claude";

/// Command typed into the CLI.
pub const USAGE_COMMAND: &str = "/usage";

/// Text shown when the CLI has no valid login.
const LOGIN_MARKERS: &[&str] = &["Please run /login", "Invalid API key", "OAuth token has expired"];

/// Completion detector for the `/usage` screen: the weekly header comes
/// after the session figures.
pub fn usage_detector() -> EchoThenMarker {
    EchoThenMarker::new(USAGE_COMMAND)
        .marker("Current week")
        .without_percent()
}

/// Returns the login prompt the CLI showed instead of usage, if any.
pub fn login_required(raw: &str) -> Option<&'static str> {
    LOGIN_MARKERS.iter().copied().find(|m| raw.contains(m))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Session,
    Week,
    Model,
}

fn section_of(line: &str) -> Option<Section> {
    let lower = line.to_lowercase();
    if lower.contains("current session") {
        Some(Section::Session)
    } else if lower.contains("current week") {
        if lower.contains("opus") || lower.contains("sonnet") {
            Some(Section::Model)
        } else {
            Some(Section::Week)
        }
    } else {
        None
    }
}

/// Parses the `/usage` screen.
///
/// Figures are assigned to the most recent section header; the first
/// percentage and reset line under a header win.
///
/// # Errors
///
/// [`ParseError::Empty`] for blank text, [`ParseError::NoUsageData`] if
/// neither the session nor the weekly figure is present.
pub fn parse_usage_output(raw: &str) -> Result<UsageSnapshot, ParseError> {
    if raw.trim().is_empty() {
        return Err(ParseError::Empty);
    }

    let mut windows: [Option<RateWindow>; 3] = [None, None, None];
    let mut current = None;

    for line in raw.lines() {
        if let Some(section) = section_of(line) {
            current = Some(section);
        }
        let Some(section) = current else { continue };
        let slot = &mut windows[section as usize];

        if let Some(used) = text::used_percent(line) {
            if slot.is_none() {
                let minutes = if section == Section::Session { 300 } else { 10_080 };
                *slot = Some(RateWindow::new(used).with_window_minutes(minutes));
            }
            continue;
        }
        if let Some(window) = slot.as_mut() {
            if window.reset_description.is_none() {
                window.reset_description = text::reset_description(line);
            }
        }
    }

    let [primary, secondary, tertiary] = windows;
    if primary.is_none() && secondary.is_none() {
        return Err(ParseError::NoUsageData(
            "no session or weekly figure in /usage output".to_string(),
        ));
    }

    let mut snapshot = UsageSnapshot::new();
    snapshot.primary = primary;
    snapshot.secondary = secondary;
    snapshot.tertiary = tertiary;
    if let Some(email) = text::email(raw) {
        snapshot.identity = Some(ProviderIdentity::new(ProviderKind::Claude).with_email(email));
    }
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quotawatch_fetch::host::CompletionDetector;

    const SCREEN: &str = "\
> /usage
 Current session
 ███████▌                                           15% used
 Resets 3pm (America/New_York)

 Current week (all models)
 ██                                                  4% used
 Resets Oct 24, 9am (America/New_York)

 Current week (Sonnet only)
                                                     0% used
";

    #[test]
    fn test_parse_full_screen() {
        let snapshot = parse_usage_output(SCREEN).unwrap();

        let primary = snapshot.primary.unwrap();
        assert_eq!(primary.used_percent, 15.0);
        assert_eq!(primary.window_minutes, Some(300));
        assert_eq!(primary.reset_description.as_deref(), Some("3pm (America/New_York)"));

        let secondary = snapshot.secondary.unwrap();
        assert_eq!(secondary.used_percent, 4.0);
        assert_eq!(
            secondary.reset_description.as_deref(),
            Some("Oct 24, 9am (America/New_York)")
        );

        let tertiary = snapshot.tertiary.unwrap();
        assert_eq!(tertiary.used_percent, 0.0);
        assert!(tertiary.reset_description.is_none());
        assert!(snapshot.identity.is_none());
    }

    #[test]
    fn test_percent_left_format() {
        let text = "Current session\n72% left\nCurrent week (all models)\n45% left\n";
        let snapshot = parse_usage_output(text).unwrap();
        assert_eq!(snapshot.primary.unwrap().used_percent, 28.0);
        assert_eq!(snapshot.secondary.unwrap().used_percent, 55.0);
    }

    #[test]
    fn test_partial_screen_still_parses() {
        let text = "> /usage\n Current session\n ██ 9% used\n Resets 3pm\n Current we";
        let snapshot = parse_usage_output(text).unwrap();
        assert_eq!(snapshot.primary.unwrap().used_percent, 9.0);
        assert!(snapshot.secondary.is_none());
    }

    #[test]
    fn test_figures_before_any_header_are_ignored() {
        let text = "Context left: 80% left\nnothing else";
        assert!(matches!(parse_usage_output(text), Err(ParseError::NoUsageData(_))));
        assert!(matches!(parse_usage_output(" \n"), Err(ParseError::Empty)));
    }

    #[test]
    fn test_email_becomes_identity() {
        let text = format!("{SCREEN}\n Account: me@example.com\n");
        let identity = parse_usage_output(&text).unwrap().identity.unwrap();
        assert_eq!(identity.account_email.as_deref(), Some("me@example.com"));
    }

    #[test]
    fn test_login_required() {
        assert_eq!(
            login_required("Invalid API key · Please run /login"),
            Some("Please run /login")
        );
        assert_eq!(login_required(SCREEN), None);
    }

    #[test]
    fn test_detector_waits_for_weekly_header() {
        let detector = usage_detector();
        assert!(!detector.is_complete("> /usage\n Current session\n 15% used"));
        assert!(detector.is_complete("> /usage\n Current session\n 15% used\n Current week"));
        assert!(!detector.is_complete("Current week"));
    }
}
