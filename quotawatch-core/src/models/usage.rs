//! Usage-related types.
//!
//! - [`UsageSnapshot`] - Main container with multiple windows
//! - [`RateWindow`] - Individual rate-limit window
//! - [`Credits`] - Credit-based balances
//! - [`DashboardInfo`] - Metadata from a web dashboard

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ProviderIdentity;
use super::status::FetchSource;
use crate::error::CoreError;

// ============================================================================
// Usage Snapshot
// ============================================================================

/// A snapshot of usage data with primary, secondary, and tertiary windows.
///
/// - **Primary** = session window (e.g., 5 hours)
/// - **Secondary** = weekly/monthly window
/// - **Tertiary** = premium-model tier, when the provider reports one
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageSnapshot {
    /// Primary usage window (session-based).
    pub primary: Option<RateWindow>,
    /// Secondary usage window (weekly/monthly).
    pub secondary: Option<RateWindow>,
    /// Tertiary usage window.
    #[serde(default)]
    pub tertiary: Option<RateWindow>,
    /// When this snapshot was taken.
    pub updated_at: DateTime<Utc>,
    /// Account identity for this provider.
    #[serde(default)]
    pub identity: Option<ProviderIdentity>,
    /// How this data was fetched.
    #[serde(default)]
    pub fetch_source: FetchSource,
}

impl UsageSnapshot {
    /// Creates a new empty usage snapshot stamped with the current time.
    pub fn new() -> Self {
        Self {
            primary: None,
            secondary: None,
            tertiary: None,
            updated_at: Utc::now(),
            identity: None,
            fetch_source: FetchSource::default(),
        }
    }

    /// Sets the primary window.
    #[must_use]
    pub fn with_primary(mut self, window: RateWindow) -> Self {
        self.primary = Some(window);
        self
    }

    /// Sets the secondary window.
    #[must_use]
    pub fn with_secondary(mut self, window: RateWindow) -> Self {
        self.secondary = Some(window);
        self
    }

    /// Sets the tertiary window.
    #[must_use]
    pub fn with_tertiary(mut self, window: RateWindow) -> Self {
        self.tertiary = Some(window);
        self
    }

    /// Sets the account identity.
    #[must_use]
    pub fn with_identity(mut self, identity: ProviderIdentity) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Iterates over the windows that are present, in display order.
    pub fn windows(&self) -> impl Iterator<Item = &RateWindow> {
        [&self.primary, &self.secondary, &self.tertiary]
            .into_iter()
            .filter_map(Option::as_ref)
    }

    /// Returns the highest usage percentage across all windows.
    pub fn max_used_percent(&self) -> f64 {
        self.windows()
            .map(|w| w.used_percent)
            .fold(0.0_f64, f64::max)
    }

    /// Returns true if any window data is present.
    pub fn has_data(&self) -> bool {
        self.windows().next().is_some()
    }

    /// Validates all windows.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidData` if any window has a percentage
    /// outside `[0, 100]` or a non-finite value.
    pub fn validate(&self) -> Result<(), CoreError> {
        let named = [
            ("primary", &self.primary),
            ("secondary", &self.secondary),
            ("tertiary", &self.tertiary),
        ];
        for (name, window) in named {
            if let Some(window) = window {
                window
                    .validate()
                    .map_err(|e| CoreError::InvalidData(format!("{name} window: {e}")))?;
            }
        }
        Ok(())
    }

    /// Clamps every window into valid ranges.
    pub fn sanitize(&mut self) {
        for window in [&mut self.primary, &mut self.secondary, &mut self.tertiary]
            .into_iter()
            .flatten()
        {
            window.sanitize();
        }
    }
}

impl Default for UsageSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Rate Window
// ============================================================================

/// A single rate-limit window (session, weekly, or tier).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateWindow {
    /// Percentage of quota used (0-100).
    pub used_percent: f64,
    /// Window duration in minutes (300 = 5 hours, 10080 = 1 week).
    #[serde(default)]
    pub window_minutes: Option<u32>,
    /// When this window resets.
    #[serde(default)]
    pub resets_at: Option<DateTime<Utc>>,
    /// Human-readable reset description (e.g., "Resets 3pm").
    #[serde(default)]
    pub reset_description: Option<String>,
}

impl RateWindow {
    /// Creates a new window with the given used percentage.
    pub fn new(used_percent: f64) -> Self {
        Self {
            used_percent,
            window_minutes: None,
            resets_at: None,
            reset_description: None,
        }
    }

    /// Creates a window from a "percent left" figure.
    pub fn from_remaining(remaining_percent: f64) -> Self {
        Self::new((100.0 - remaining_percent).clamp(0.0, 100.0))
    }

    /// Sets the window length.
    #[must_use]
    pub fn with_window_minutes(mut self, minutes: u32) -> Self {
        self.window_minutes = Some(minutes);
        self
    }

    /// Sets the reset time.
    #[must_use]
    pub fn with_resets_at(mut self, resets_at: DateTime<Utc>) -> Self {
        self.resets_at = Some(resets_at);
        self
    }

    /// Sets the reset description.
    #[must_use]
    pub fn with_reset_description(mut self, description: impl Into<String>) -> Self {
        self.reset_description = Some(description.into());
        self
    }

    /// Returns the remaining percentage, `100 - used`, clamped to `[0, 100]`.
    ///
    /// A non-finite `used_percent` yields `0.0`.
    pub fn remaining_percent(&self) -> f64 {
        let remaining = 100.0 - self.used_percent;
        if remaining.is_nan() {
            return 0.0;
        }
        remaining.clamp(0.0, 100.0)
    }

    /// Validates the window.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidData` if `used_percent` is negative,
    /// greater than 100, or not finite.
    pub fn validate(&self) -> Result<(), CoreError> {
        if !self.used_percent.is_finite() {
            return Err(CoreError::InvalidData(
                "used_percent is not a finite number".to_string(),
            ));
        }
        if !(0.0..=100.0).contains(&self.used_percent) {
            return Err(CoreError::InvalidData(format!(
                "used_percent {} out of valid range [0, 100]",
                self.used_percent
            )));
        }
        Ok(())
    }

    /// Clamps `used_percent` to `[0, 100]`, replacing NaN with 0.
    pub fn sanitize(&mut self) {
        if self.used_percent.is_nan() {
            self.used_percent = 0.0;
        }
        self.used_percent = self.used_percent.clamp(0.0, 100.0);
    }
}

impl Default for RateWindow {
    fn default() -> Self {
        Self::new(0.0)
    }
}

// ============================================================================
// Credits
// ============================================================================

/// Credit balance for providers that sell credits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credits {
    /// Remaining credits.
    pub remaining: f64,
    /// Total credits, if known.
    pub total: Option<f64>,
    /// Whether the plan has no credit ceiling.
    #[serde(default)]
    pub unlimited: bool,
    /// Currency or unit label (e.g., "USD").
    #[serde(default)]
    pub unit: Option<String>,
}

impl Credits {
    /// Creates a balance with the given remaining amount.
    pub fn new(remaining: f64) -> Self {
        Self {
            remaining,
            total: None,
            unlimited: false,
            unit: None,
        }
    }

    /// Sets the total.
    #[must_use]
    pub fn with_total(mut self, total: f64) -> Self {
        self.total = Some(total);
        self
    }

    /// Returns the used percentage if a positive total is known.
    pub fn used_percent(&self) -> Option<f64> {
        self.total
            .filter(|t| *t > 0.0)
            .map(|t| ((t - self.remaining) / t * 100.0).clamp(0.0, 100.0))
    }
}

// ============================================================================
// Dashboard Info
// ============================================================================

/// Metadata gathered from a provider's web dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardInfo {
    /// Dashboard URL the data came from.
    pub url: Option<String>,
    /// Email of the account signed in to the dashboard.
    pub signed_in_email: Option<String>,
    /// Plan name shown on the dashboard.
    pub plan: Option<String>,
    /// Label of the cookie source used (e.g., "Chrome (Default)").
    pub cookie_source: Option<String>,
}

// ============================================================================
// Tests
// ============================================================================
