//! Claude usage payload.
//!
//! The OAuth usage endpoint and the claude.ai organization usage endpoint
//! return the same document:
//!
//! ```json
//! {
//!   "five_hour": { "utilization": 12.0, "resets_at": "2025-01-05T14:00:00Z" },
//!   "seven_day": { "utilization": 40.0, "resets_at": "2025-01-09T09:00:00Z" },
//!   "seven_day_sonnet": { "utilization": 3.0, "resets_at": null },
//!   "extra_usage": { "is_enabled": true, "monthly_limit": 5000, "used_credits": 1250 }
//! }
//! ```

use quotawatch_core::{Credits, ParseError, RateWindow, UsageSnapshot};
use serde::Deserialize;

use crate::common::parse_rfc3339;

/// OAuth usage endpoint.
pub const OAUTH_USAGE_URL: &str = "https://api.anthropic.com/api/oauth/usage";

/// Beta header value the OAuth usage endpoint requires.
pub const OAUTH_BETA: &str = "oauth-2025-04-20";

const FIVE_HOURS_MINUTES: u32 = 5 * 60;
const SEVEN_DAYS_MINUTES: u32 = 7 * 24 * 60;

// ============================================================================
// Response Types
// ============================================================================

/// Usage document returned by both Claude usage endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct UsageApiResponse {
    /// Rolling five-hour session window.
    #[serde(default, alias = "fiveHour")]
    pub five_hour: Option<UsageWindow>,
    /// Weekly window across all models.
    #[serde(default, alias = "sevenDay")]
    pub seven_day: Option<UsageWindow>,
    /// Weekly Sonnet-only window.
    #[serde(default, alias = "sevenDaySonnet")]
    pub seven_day_sonnet: Option<UsageWindow>,
    /// Weekly Opus-only window, on plans that still have one.
    #[serde(default, alias = "sevenDayOpus")]
    pub seven_day_opus: Option<UsageWindow>,
    /// Pay-as-you-go usage beyond the plan.
    #[serde(default, alias = "extraUsage")]
    pub extra_usage: Option<ExtraUsage>,
}

/// One usage window.
#[derive(Debug, Clone, Deserialize)]
pub struct UsageWindow {
    /// Percent used, 0-100.
    #[serde(default)]
    pub utilization: Option<f64>,
    /// Reset time as RFC 3339.
    #[serde(default, alias = "resetsAt")]
    pub resets_at: Option<String>,
}

/// Extra usage billing, amounts in cents.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtraUsage {
    /// Whether extra usage is turned on.
    #[serde(default, alias = "isEnabled")]
    pub is_enabled: Option<bool>,
    /// Monthly cap in cents.
    #[serde(default, alias = "monthlyLimit")]
    pub monthly_limit: Option<f64>,
    /// Spent this month in cents.
    #[serde(default, alias = "usedCredits")]
    pub used_credits: Option<f64>,
}

impl UsageWindow {
    fn to_rate_window(&self, minutes: u32) -> RateWindow {
        let mut window =
            RateWindow::new(self.utilization.unwrap_or(0.0)).with_window_minutes(minutes);
        if let Some(resets_at) = self.resets_at.as_deref().and_then(parse_rfc3339) {
            window = window.with_resets_at(resets_at);
        }
        window
    }
}

impl UsageApiResponse {
    /// Converts the document to a snapshot.
    ///
    /// # Errors
    ///
    /// [`ParseError::NoUsageData`] if neither the session nor the weekly
    /// window is present.
    pub fn to_snapshot(&self) -> Result<UsageSnapshot, ParseError> {
        if self.five_hour.is_none() && self.seven_day.is_none() {
            return Err(ParseError::NoUsageData(
                "response has no five_hour or seven_day window".to_string(),
            ));
        }

        let mut snapshot = UsageSnapshot::new();
        snapshot.primary = self
            .five_hour
            .as_ref()
            .map(|w| w.to_rate_window(FIVE_HOURS_MINUTES));
        snapshot.secondary = self
            .seven_day
            .as_ref()
            .map(|w| w.to_rate_window(SEVEN_DAYS_MINUTES));
        snapshot.tertiary = self
            .seven_day_sonnet
            .as_ref()
            .or(self.seven_day_opus.as_ref())
            .map(|w| w.to_rate_window(SEVEN_DAYS_MINUTES));
        snapshot.sanitize();
        Ok(snapshot)
    }

    /// Extra usage as a dollar balance, when enabled with a cap.
    pub fn credits(&self) -> Option<Credits> {
        let extra = self.extra_usage.as_ref()?;
        if extra.is_enabled != Some(true) {
            return None;
        }
        let limit = extra.monthly_limit.filter(|l| *l > 0.0)? / 100.0;
        let used = extra.used_credits.unwrap_or(0.0) / 100.0;
        let mut credits = Credits::new((limit - used).max(0.0)).with_total(limit);
        credits.unit = Some("USD".to_string());
        Some(credits)
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Decodes a usage document.
///
/// # Errors
///
/// [`ParseError::Empty`] for blank input, [`ParseError::Json`] otherwise.
pub fn parse_usage_response(raw: &str) -> Result<UsageApiResponse, ParseError> {
    if raw.trim().is_empty() {
        return Err(ParseError::Empty);
    }
    Ok(serde_json::from_str(raw)?)
}

/// Parses a usage document straight to a snapshot.
///
/// # Errors
///
/// See [`parse_usage_response`] and [`UsageApiResponse::to_snapshot`].
pub fn parse_usage_json(raw: &str) -> Result<UsageSnapshot, ParseError> {
    parse_usage_response(raw)?.to_snapshot()
}
