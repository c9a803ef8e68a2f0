//! ChatGPT backend usage endpoint.
//!
//! `GET /backend-api/wham/usage` with the Codex access token returns:
//!
//! ```json
//! {
//!   "plan_type": "plus",
//!   "rate_limit": {
//!     "primary_window":   {"used_percent": 28, "limit_window_seconds": 18000, "reset_at": 1735000000},
//!     "secondary_window": {"used_percent": 59, "limit_window_seconds": 604800, "reset_at": 1735100000}
//!   },
//!   "credits": {"has_credits": true, "unlimited": false, "balance": "112.45"}
//! }
//! ```

use quotawatch_core::{Credits, ParseError, RateWindow, UsageSnapshot};
use serde::{Deserialize, Deserializer};

use crate::common::parse_epoch;

/// Usage endpoint.
pub const USAGE_URL: &str = "https://chatgpt.com/backend-api/wham/usage";

/// Header naming the ChatGPT account.
pub const ACCOUNT_HEADER: &str = "chatgpt-account-id";

/// Usage page shown to people.
pub const DASHBOARD_URL: &str = "https://chatgpt.com/codex/settings/usage";

/// Top-level response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UsageResponse {
    /// ChatGPT plan type.
    #[serde(default)]
    pub plan_type: Option<String>,
    /// Rolling rate limits.
    #[serde(default)]
    pub rate_limit: Option<RateLimit>,
    /// Credit balance.
    #[serde(default)]
    pub credits: Option<CreditBalance>,
}

/// The two rolling windows.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RateLimit {
    /// Short window, normally five hours.
    #[serde(default)]
    pub primary_window: Option<LimitWindow>,
    /// Long window, normally one week.
    #[serde(default)]
    pub secondary_window: Option<LimitWindow>,
}

/// One rolling window.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LimitWindow {
    /// Percentage consumed.
    #[serde(default)]
    pub used_percent: Option<f64>,
    /// Window length in seconds.
    #[serde(default)]
    pub limit_window_seconds: Option<u64>,
    /// Reset time, epoch seconds.
    #[serde(default)]
    pub reset_at: Option<i64>,
}

impl LimitWindow {
    fn to_window(&self, default_minutes: u32) -> RateWindow {
        let minutes = self
            .limit_window_seconds
            .and_then(|s| u32::try_from(s / 60).ok())
            .filter(|m| *m > 0)
            .unwrap_or(default_minutes);
        let mut window =
            RateWindow::new(self.used_percent.unwrap_or(0.0)).with_window_minutes(minutes);
        window.resets_at = self.reset_at.and_then(parse_epoch);
        window
    }
}

/// Credit balance. `balance` arrives as a string or a number.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreditBalance {
    /// Whether the account has a credit balance at all.
    #[serde(default)]
    pub has_credits: bool,
    /// Unlimited credits.
    #[serde(default)]
    pub unlimited: bool,
    /// Remaining balance.
    #[serde(default, deserialize_with = "lenient_number")]
    pub balance: Option<f64>,
}

fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }
    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Number(n)) => Some(n),
        Some(Raw::Text(s)) => s.trim().trim_start_matches('$').parse().ok(),
        None => None,
    })
}

impl UsageResponse {
    /// Converts the windows to a snapshot.
    ///
    /// # Errors
    ///
    /// [`ParseError::NoUsageData`] when neither window is present.
    pub fn to_snapshot(&self) -> Result<UsageSnapshot, ParseError> {
        let limits = self.rate_limit.as_ref();
        let primary = limits.and_then(|l| l.primary_window.as_ref());
        let secondary = limits.and_then(|l| l.secondary_window.as_ref());
        if primary.is_none() && secondary.is_none() {
            return Err(ParseError::NoUsageData(
                "response has no rate limit windows".to_string(),
            ));
        }

        let mut snapshot = UsageSnapshot::new();
        snapshot.primary = primary.map(|w| w.to_window(300));
        snapshot.secondary = secondary.map(|w| w.to_window(10_080));
        snapshot.sanitize();
        Ok(snapshot)
    }

    /// Returns the credit balance, if the account has one.
    pub fn credits(&self) -> Option<Credits> {
        let credits = self.credits.as_ref()?;
        if credits.unlimited {
            let mut c = Credits::new(0.0);
            c.unlimited = true;
            return Some(c);
        }
        if !credits.has_credits {
            return None;
        }
        credits.balance.map(Credits::new)
    }
}

/// Parses a usage response body.
///
/// # Errors
///
/// [`ParseError::Empty`] or [`ParseError::Json`].
pub fn parse_usage_response(raw: &str) -> Result<UsageResponse, ParseError> {
    if raw.trim().is_empty() {
        return Err(ParseError::Empty);
    }
    Ok(serde_json::from_str(raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"{
        "plan_type": "plus",
        "rate_limit": {
            "allowed": true,
            "primary_window": {"used_percent": 28, "limit_window_seconds": 18000, "reset_at": 1735000000},
            "secondary_window": {"used_percent": 59.5, "limit_window_seconds": 604800, "reset_at": 1735100000}
        },
        "credits": {"has_credits": true, "unlimited": false, "balance": "112.45"}
    }"#;

    #[test]
    fn test_windows() {
        let response = parse_usage_response(BODY).unwrap();
        assert_eq!(response.plan_type.as_deref(), Some("plus"));

        let snapshot = response.to_snapshot().unwrap();
        let primary = snapshot.primary.unwrap();
        assert_eq!(primary.used_percent, 28.0);
        assert_eq!(primary.window_minutes, Some(300));
        assert_eq!(primary.resets_at.unwrap().timestamp(), 1_735_000_000);

        let secondary = snapshot.secondary.unwrap();
        assert_eq!(secondary.used_percent, 59.5);
        assert_eq!(secondary.window_minutes, Some(10_080));
    }

    #[test]
    fn test_credit_balance_forms() {
        let credits = parse_usage_response(BODY).unwrap().credits().unwrap();
        assert!((credits.remaining - 112.45).abs() < 1e-9);

        let numeric = parse_usage_response(r#"{"credits":{"has_credits":true,"balance":7}}"#)
            .unwrap()
            .credits()
            .unwrap();
        assert_eq!(numeric.remaining, 7.0);

        let none = parse_usage_response(r#"{"credits":{"has_credits":false,"balance":"0"}}"#)
            .unwrap();
        assert!(none.credits().is_none());

        let unlimited = parse_usage_response(r#"{"credits":{"unlimited":true}}"#).unwrap();
        assert!(unlimited.credits().unwrap().unlimited);
    }

    #[test]
    fn test_missing_windows_use_defaults() {
        let raw = r#"{"rate_limit":{"primary_window":{"used_percent":150}}}"#;
        let snapshot = parse_usage_response(raw).unwrap().to_snapshot().unwrap();
        let primary = snapshot.primary.unwrap();
        assert_eq!(primary.used_percent, 100.0);
        assert_eq!(primary.window_minutes, Some(300));
        assert!(primary.resets_at.is_none());
        assert!(snapshot.secondary.is_none());
    }

    #[test]
    fn test_no_windows() {
        let response = parse_usage_response(r#"{"plan_type":"free"}"#).unwrap();
        assert!(matches!(response.to_snapshot(), Err(ParseError::NoUsageData(_))));
        assert!(matches!(parse_usage_response(" "), Err(ParseError::Empty)));
    }
}
