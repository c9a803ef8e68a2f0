//! z.ai quota endpoint.
//!
//! `GET /api/monitor/usage/quota/limit` with the API key as a bearer token:
//!
//! ```json
//! {
//!   "code": 200, "msg": "Operation successful", "success": true,
//!   "data": {
//!     "limits": [
//!       {"type": "TOKENS_LIMIT", "unit": 3, "number": 5, "percentage": 12, "nextResetTime": 1735000000000},
//!       {"type": "TIME_LIMIT", "unit": 5, "number": 1, "usage": 1000, "currentValue": 40, "percentage": 4}
//!     ],
//!     "planName": "GLM Coding Pro"
//!   }
//! }
//! ```
//!
//! `TOKENS_LIMIT` is the rolling prompt quota, `TIME_LIMIT` the monthly
//! MCP tool-call allowance.

use quotawatch_core::{ParseError, RateWindow, UsageSnapshot};
use serde::Deserialize;

use crate::common::parse_epoch;

/// Quota endpoint.
pub const QUOTA_URL: &str = "https://api.z.ai/api/monitor/usage/quota/limit";

/// Usage page shown to people.
pub const DASHBOARD_URL: &str = "https://z.ai/manage-apikey/subscription";

/// Environment variables checked for the API key, in order.
pub const TOKEN_ENV_KEYS: &[&str] = &["Z_AI_API_KEY", "ZAI_API_TOKEN", "ZAI_API_KEY"];

/// Response envelope.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuotaResponse {
    /// Status code inside the body.
    #[serde(default)]
    pub code: Option<i64>,
    /// Status message.
    #[serde(default)]
    pub msg: Option<String>,
    /// Whether the call succeeded.
    #[serde(default)]
    pub success: Option<bool>,
    /// Payload.
    #[serde(default)]
    pub data: Option<QuotaData>,
}

/// Quota payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaData {
    /// One entry per limit.
    #[serde(default)]
    pub limits: Vec<QuotaLimit>,
    /// Subscription name.
    #[serde(default, alias = "level")]
    pub plan_name: Option<String>,
}

/// One limit entry.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaLimit {
    /// `TOKENS_LIMIT` or `TIME_LIMIT`.
    #[serde(default, rename = "type")]
    pub limit_type: String,
    /// Window unit code.
    #[serde(default)]
    pub unit: Option<u32>,
    /// Window length in `unit`s.
    #[serde(default)]
    pub number: Option<u32>,
    /// Percentage consumed.
    #[serde(default)]
    pub percentage: Option<f64>,
    /// Allowance for the window.
    #[serde(default)]
    pub usage: Option<f64>,
    /// Consumed amount.
    #[serde(default)]
    pub current_value: Option<f64>,
    /// Reset time, epoch milliseconds.
    #[serde(default)]
    pub next_reset_time: Option<i64>,
}

impl QuotaLimit {
    /// Window length in minutes, for the unit codes the service uses.
    pub fn window_minutes(&self) -> Option<u32> {
        let per_unit = match self.unit? {
            1 => 24 * 60,
            3 => 60,
            5 => 30 * 24 * 60,
            _ => return None,
        };
        self.number.filter(|n| *n > 0)?.checked_mul(per_unit)
    }

    fn used_percent(&self) -> Option<f64> {
        self.percentage.or_else(|| {
            let total = self.usage.filter(|u| *u > 0.0)?;
            Some(self.current_value? / total * 100.0)
        })
    }

    fn to_window(&self) -> Option<RateWindow> {
        let mut window = RateWindow::new(self.used_percent()?);
        window.window_minutes = self.window_minutes();
        window.resets_at = self.next_reset_time.and_then(parse_epoch);
        Some(window)
    }
}

impl QuotaResponse {
    fn limit(&self, limit_type: &str) -> Option<&QuotaLimit> {
        self.data
            .as_ref()?
            .limits
            .iter()
            .find(|l| l.limit_type.eq_ignore_ascii_case(limit_type))
    }

    /// Plan name, if the service reports one.
    pub fn plan_name(&self) -> Option<&str> {
        self.data.as_ref()?.plan_name.as_deref().filter(|p| !p.is_empty())
    }

    /// Token quota as primary, MCP allowance as secondary.
    ///
    /// # Errors
    ///
    /// [`ParseError::NoUsageData`] when the body reports failure or carries
    /// neither limit.
    pub fn to_snapshot(&self) -> Result<UsageSnapshot, ParseError> {
        if self.success == Some(false) {
            return Err(ParseError::NoUsageData(format!(
                "z.ai reported failure: {}",
                self.msg.as_deref().unwrap_or("no message")
            )));
        }

        let primary = self.limit("TOKENS_LIMIT").and_then(QuotaLimit::to_window);
        let secondary = self.limit("TIME_LIMIT").and_then(QuotaLimit::to_window);
        if primary.is_none() && secondary.is_none() {
            return Err(ParseError::NoUsageData("no quota limits in response".to_string()));
        }

        let mut snapshot = UsageSnapshot::new();
        snapshot.primary = primary;
        snapshot.secondary = secondary;
        snapshot.sanitize();
        Ok(snapshot)
    }
}

/// Parses a quota response body.
///
/// # Errors
///
/// [`ParseError::Empty`] or [`ParseError::Json`].
pub fn parse_quota_response(raw: &str) -> Result<QuotaResponse, ParseError> {
    if raw.trim().is_empty() {
        return Err(ParseError::Empty);
    }
    Ok(serde_json::from_str(raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"{
        "code": 200,
        "msg": "Operation successful",
        "success": true,
        "data": {
            "limits": [
                {"type": "TIME_LIMIT", "unit": 5, "number": 1, "usage": 1000, "currentValue": 40,
                 "remaining": 960, "percentage": 4},
                {"type": "TOKENS_LIMIT", "unit": 3, "number": 5, "percentage": 12,
                 "nextResetTime": 1735000000000}
            ],
            "planName": "GLM Coding Pro"
        }
    }"#;

    #[test]
    fn test_limits_map_to_windows() {
        let response = parse_quota_response(BODY).unwrap();
        assert_eq!(response.plan_name(), Some("GLM Coding Pro"));

        let snapshot = response.to_snapshot().unwrap();
        let primary = snapshot.primary.unwrap();
        assert_eq!(primary.used_percent, 12.0);
        assert_eq!(primary.window_minutes, Some(300));
        assert_eq!(primary.resets_at.unwrap().timestamp(), 1_735_000_000);

        let secondary = snapshot.secondary.unwrap();
        assert_eq!(secondary.used_percent, 4.0);
        assert_eq!(secondary.window_minutes, Some(43_200));
        assert!(secondary.resets_at.is_none());
    }

    #[test]
    fn test_percentage_from_amounts() {
        let raw = r#"{"success":true,"data":{"limits":[
            {"type":"TOKENS_LIMIT","unit":1,"number":1,"usage":200,"currentValue":50}]}}"#;
        let snapshot = parse_quota_response(raw).unwrap().to_snapshot().unwrap();
        let primary = snapshot.primary.unwrap();
        assert_eq!(primary.used_percent, 25.0);
        assert_eq!(primary.window_minutes, Some(1440));
        assert!(snapshot.secondary.is_none());
    }

    #[test]
    fn test_unknown_unit() {
        let limit = QuotaLimit {
            unit: Some(9),
            number: Some(1),
            ..QuotaLimit::default()
        };
        assert_eq!(limit.window_minutes(), None);
    }

    #[test]
    fn test_failure_body() {
        let raw = r#"{"code":1001,"msg":"Authorization failed","success":false}"#;
        let err = parse_quota_response(raw).unwrap().to_snapshot().unwrap_err();
        assert!(matches!(err, ParseError::NoUsageData(ref m) if m.contains("Authorization failed")));
    }

    #[test]
    fn test_no_limits() {
        let raw = r#"{"success":true,"data":{"limits":[]}}"#;
        assert!(matches!(
            parse_quota_response(raw).unwrap().to_snapshot(),
            Err(ParseError::NoUsageData(_))
        ));
    }
}
