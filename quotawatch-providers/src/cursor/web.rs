//! cursor.com dashboard API.
//!
//! The `WorkosCursorSessionToken` cookie authenticates
//! `/api/usage-summary` and `/api/auth/me`. Usage amounts are in cents.

use chrono::{DateTime, Utc};
use quotawatch_core::{Credits, ParseError, RateWindow, UsageSnapshot};
use serde::Deserialize;

use crate::common::parse_rfc3339;

/// Cookie domain.
pub const CURSOR_DOMAIN: &str = "cursor.com";

/// Session cookie name.
pub const SESSION_COOKIE: &str = "WorkosCursorSessionToken";

/// Billing-cycle usage summary.
pub const USAGE_SUMMARY_URL: &str = "https://cursor.com/api/usage-summary";

/// Signed-in user.
pub const AUTH_ME_URL: &str = "https://cursor.com/api/auth/me";

/// Usage page shown to people.
pub const DASHBOARD_URL: &str = "https://cursor.com/dashboard";

// ============================================================================
// Usage Summary
// ============================================================================

/// `/api/usage-summary` response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSummary {
    /// Start of the billing cycle.
    #[serde(default)]
    pub billing_cycle_start: Option<String>,
    /// End of the billing cycle.
    #[serde(default)]
    pub billing_cycle_end: Option<String>,
    /// Membership, e.g. `pro` or `free`.
    #[serde(default)]
    pub membership_type: Option<String>,
    /// The user's own usage.
    #[serde(default)]
    pub individual_usage: Option<IndividualUsage>,
}

/// Included plan and on-demand spend.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndividualUsage {
    /// Included plan usage.
    #[serde(default)]
    pub plan: Option<UsageBucket>,
    /// Usage beyond the plan.
    #[serde(default)]
    pub on_demand: Option<UsageBucket>,
}

/// A spend bucket, amounts in cents.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageBucket {
    /// Whether the bucket applies.
    #[serde(default)]
    pub enabled: Option<bool>,
    /// Amount used.
    #[serde(default)]
    pub used: Option<f64>,
    /// Limit; absent or zero when uncapped.
    #[serde(default)]
    pub limit: Option<f64>,
    /// Amount left.
    #[serde(default)]
    pub remaining: Option<f64>,
    /// Percentage used, when the server computes it.
    #[serde(default)]
    pub total_percent_used: Option<f64>,
}

impl UsageBucket {
    fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    fn limit(&self) -> Option<f64> {
        self.limit.filter(|l| *l > 0.0)
    }

    /// Percentage used: the server's figure, else `used / limit`.
    pub fn used_percent(&self) -> Option<f64> {
        self.total_percent_used
            .or_else(|| Some(self.used? / self.limit()? * 100.0))
    }
}

impl UsageSummary {
    fn cycle_end(&self) -> Option<DateTime<Utc>> {
        self.billing_cycle_end.as_deref().and_then(parse_rfc3339)
    }

    fn cycle_minutes(&self) -> Option<u32> {
        let start = self.billing_cycle_start.as_deref().and_then(parse_rfc3339)?;
        let minutes = (self.cycle_end()? - start).num_minutes();
        u32::try_from(minutes).ok().filter(|m| *m > 0)
    }

    fn window(&self, bucket: &UsageBucket) -> Option<RateWindow> {
        let mut window = RateWindow::new(bucket.used_percent()?);
        window.window_minutes = self.cycle_minutes();
        window.resets_at = self.cycle_end();
        Some(window)
    }

    fn buckets(&self) -> (Option<&UsageBucket>, Option<&UsageBucket>) {
        let usage = self.individual_usage.as_ref();
        (
            usage.and_then(|u| u.plan.as_ref()).filter(|b| b.is_enabled()),
            usage.and_then(|u| u.on_demand.as_ref()).filter(|b| b.is_enabled()),
        )
    }

    /// Plan usage as primary, capped on-demand spend as secondary.
    ///
    /// # Errors
    ///
    /// [`ParseError::NoUsageData`] when the plan bucket has no figure.
    pub fn to_snapshot(&self) -> Result<UsageSnapshot, ParseError> {
        let (plan, on_demand) = self.buckets();
        let primary = plan.and_then(|b| self.window(b)).ok_or_else(|| {
            ParseError::NoUsageData("usage summary has no plan figure".to_string())
        })?;

        let mut snapshot = UsageSnapshot::new().with_primary(primary);
        snapshot.secondary = on_demand.and_then(|b| self.window(b));
        snapshot.sanitize();
        Ok(snapshot)
    }

    /// On-demand budget in dollars, when one is set.
    pub fn on_demand_credits(&self) -> Option<Credits> {
        let (_, on_demand) = self.buckets();
        let bucket = on_demand?;
        let limit = bucket.limit()?;
        let remaining = bucket
            .remaining
            .unwrap_or_else(|| limit - bucket.used.unwrap_or(0.0));
        let mut credits = Credits::new(remaining.max(0.0) / 100.0).with_total(limit / 100.0);
        credits.unit = Some("USD".to_string());
        Some(credits)
    }

    /// Membership type, capitalized for display.
    pub fn plan_name(&self) -> Option<String> {
        let raw = self.membership_type.as_deref()?.trim();
        let mut chars = raw.chars();
        let first = chars.next()?;
        Some(first.to_uppercase().chain(chars).collect())
    }
}

/// Parses a usage summary body.
///
/// # Errors
///
/// [`ParseError::Empty`] or [`ParseError::Json`].
pub fn parse_usage_summary(raw: &str) -> Result<UsageSummary, ParseError> {
    if raw.trim().is_empty() {
        return Err(ParseError::Empty);
    }
    Ok(serde_json::from_str(raw)?)
}

// ============================================================================
// Account
// ============================================================================

#[derive(Debug, Deserialize)]
struct AuthMe {
    #[serde(default)]
    email: Option<String>,
}

/// Extracts the signed-in email from an `/api/auth/me` body.
pub fn parse_auth_me(raw: &str) -> Option<String> {
    serde_json::from_str::<AuthMe>(raw)
        .ok()?
        .email
        .filter(|e| !e.trim().is_empty())
}
