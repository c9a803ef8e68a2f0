//! Helpers shared by provider strategies.

use chrono::{DateTime, TimeZone, Utc};
use quotawatch_core::{UsageParser, UsageSnapshot};
use quotawatch_fetch::host::http::is_auth_status;
use quotawatch_fetch::{FetchError, PtyResult};
use reqwest::{Response, StatusCode};
use std::path::{Path, PathBuf};
use tracing::debug;

/// How a strategy authenticated, which decides how a refusal is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AuthKind {
    /// OAuth or API token: a refusal is `TokenRejected`.
    Token,
    /// Browser session: a refusal is `LoginRequired`.
    Session,
}

/// Maps a non-success status to the most specific fetch error.
pub(crate) fn status_error(status: StatusCode, auth: AuthKind, service: &str) -> FetchError {
    if is_auth_status(status) {
        return match auth {
            AuthKind::Token => FetchError::TokenRejected(format!("{service} returned {status}")),
            AuthKind::Session => FetchError::LoginRequired(format!("{service} returned {status}")),
        };
    }
    FetchError::InvalidResponse(format!("{service} returned {status}"))
}

/// Reads a successful response body, mapping failure statuses first.
pub(crate) async fn read_body(
    response: Response,
    auth: AuthKind,
    service: &str,
) -> Result<String, FetchError> {
    let status = response.status();
    if !status.is_success() {
        debug!(status = %status, service, "Request refused");
        return Err(status_error(status, auth, service));
    }
    response
        .text()
        .await
        .map_err(|e| FetchError::InvalidResponse(format!("{service}: {e}")))
}

/// Parses a CLI screen, keeping partial output useful.
///
/// A run that hit its deadline still gets a parse attempt; only when that
/// fails does the caller see a `Timeout` carrying the captured text.
pub(crate) fn parse_screen(
    result: PtyResult,
    parser: &dyn UsageParser,
) -> Result<UsageSnapshot, FetchError> {
    match parser.parse(&result.text) {
        Ok(snapshot) => {
            if result.timed_out {
                debug!(duration = ?result.duration, "Parsed partial output after timeout");
            }
            Ok(snapshot)
        }
        Err(_) if result.timed_out => Err(FetchError::Timeout {
            elapsed: result.duration,
            partial: Some(result.text),
        }),
        Err(e) => Err(e.into()),
    }
}

/// Resolves a directory from an environment override, falling back to
/// `<home>/<default_dir>`.
pub(crate) fn config_dir(
    env_override: Option<&str>,
    home: Option<&Path>,
    default_dir: &str,
) -> Option<PathBuf> {
    if let Some(dir) = env_override {
        return Some(PathBuf::from(dir));
    }
    home.map(|h| h.join(default_dir))
        .or_else(|| dirs::home_dir().map(|h| h.join(default_dir)))
}

/// Parses a timestamp given as RFC 3339 text.
pub(crate) fn parse_rfc3339(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parses epoch seconds or milliseconds, telling them apart by magnitude.
pub(crate) fn parse_epoch(value: i64) -> Option<DateTime<Utc>> {
    if value <= 0 {
        return None;
    }
    if value > 10_000_000_000 {
        Utc.timestamp_millis_opt(value).single()
    } else {
        Utc.timestamp_opt(value, 0).single()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quotawatch_core::{ParseError, RateWindow};
    use quotawatch_fetch::host::PtyState;

    #[test]
    fn test_status_error_by_auth_kind() {
        let err = status_error(StatusCode::UNAUTHORIZED, AuthKind::Token, "api");
        assert!(matches!(err, FetchError::TokenRejected(_)));

        let err = status_error(StatusCode::FORBIDDEN, AuthKind::Session, "web");
        assert!(matches!(err, FetchError::LoginRequired(_)));

        let err = status_error(StatusCode::INTERNAL_SERVER_ERROR, AuthKind::Token, "api");
        assert!(matches!(err, FetchError::InvalidResponse(_)));
    }

    fn screen(text: &str, timed_out: bool) -> PtyResult {
        PtyResult {
            text: text.to_string(),
            exit_code: None,
            duration: std::time::Duration::from_secs(1),
            completed_early: false,
            timed_out,
            state: if timed_out { PtyState::TimedOut } else { PtyState::Completed },
        }
    }

    fn digits(raw: &str) -> Result<UsageSnapshot, ParseError> {
        let used: f64 = raw
            .trim()
            .trim_end_matches('%')
            .parse()
            .map_err(|_| ParseError::invalid("used", raw))?;
        Ok(UsageSnapshot::new().with_primary(RateWindow::new(used)))
    }

    #[test]
    fn test_parse_screen_outcomes() {
        assert!(parse_screen(screen("40%", true), &digits).is_ok());

        let err = parse_screen(screen("loading", true), &digits).unwrap_err();
        assert_eq!(err.partial_output(), Some("loading"));

        let err = parse_screen(screen("loading", false), &digits).unwrap_err();
        assert!(matches!(err, FetchError::ParseFailed(_)));
    }

    #[test]
    fn test_parse_epoch_units() {
        let secs = parse_epoch(1_735_000_000).unwrap();
        let millis = parse_epoch(1_735_000_000_000).unwrap();
        assert_eq!(secs, millis);
        assert!(parse_epoch(0).is_none());
    }

    #[test]
    fn test_parse_rfc3339() {
        let dt = parse_rfc3339("2025-01-05T12:00:00+01:00").unwrap();
        assert_eq!(dt.to_rfc3339(), "2025-01-05T11:00:00+00:00");
        assert!(parse_rfc3339("tomorrow").is_none());
    }

    #[test]
    fn test_config_dir_override() {
        assert_eq!(
            config_dir(Some("/tmp/codex"), None, ".codex"),
            Some(PathBuf::from("/tmp/codex"))
        );
        assert_eq!(
            config_dir(None, Some(Path::new("/home/a")), ".claude"),
            Some(PathBuf::from("/home/a/.claude"))
        );
    }
}
