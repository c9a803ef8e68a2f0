//! JSON output formatting.

use anyhow::Result;
use chrono::{DateTime, Utc};
use quotawatch_core::{Credits, ProviderIdentity, RateWindow};
use quotawatch_fetch::{Browser, FetchAttempt};
use quotawatch_providers::ProviderDescriptor;
use serde::Serialize;

use super::UsageReport;

// ============================================================================
// Output Types
// ============================================================================

/// JSON output for a single provider.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderOutput {
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credits: Option<Credits>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub attempts: Vec<AttemptOutput>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<String>,
}

/// Usage windows.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary: Option<WindowOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary: Option<WindowOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tertiary: Option<WindowOutput>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<IdentityOutput>,
}

/// A single usage window.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowOutput {
    pub label: String,
    pub used_percent: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_minutes: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resets_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_description: Option<String>,
}

/// Identity info.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_organization: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login_method: Option<String>,
}

/// One strategy that ran.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptOutput {
    pub strategy: String,
    pub kind: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// Provider info output.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderInfoOutput {
    pub id: String,
    pub display_name: String,
    pub cli_name: String,
    pub aliases: Vec<String>,
    pub default_enabled: bool,
    pub source_modes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dashboard_url: Option<String>,
}

/// Browser status output.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserOutput {
    pub browser: Browser,
    pub installed: bool,
    pub requires_keychain: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub denied_until: Option<DateTime<Utc>>,
}

// ============================================================================
// JSON Formatter
// ============================================================================

/// JSON formatter.
pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    /// Creates a new JSON formatter.
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    /// Formats any serializable value.
    pub fn format<T: Serialize>(&self, data: &T) -> Result<String> {
        let json = if self.pretty {
            serde_json::to_string_pretty(data)?
        } else {
            serde_json::to_string(data)?
        };
        Ok(json)
    }

    /// Formats usage reports; a single report is an object, more an array.
    pub fn format_reports(
        &self,
        reports: &[(UsageReport, Option<&ProviderDescriptor>)],
    ) -> Result<String> {
        let outputs: Vec<ProviderOutput> = reports
            .iter()
            .map(|(report, desc)| report_to_output(report, *desc))
            .collect();

        match outputs.as_slice() {
            [single] => self.format(single),
            _ => self.format(&outputs),
        }
    }

    /// Formats provider list.
    pub fn format_providers(&self, providers: &[ProviderDescriptor]) -> Result<String> {
        let outputs: Vec<ProviderInfoOutput> = providers
            .iter()
            .map(|desc| ProviderInfoOutput {
                id: desc.id.id().to_string(),
                display_name: desc.display_name().to_string(),
                cli_name: desc.cli_name().to_string(),
                aliases: desc.cli.aliases.iter().map(ToString::to_string).collect(),
                default_enabled: desc.metadata.default_enabled,
                source_modes: desc.source_modes.iter().map(ToString::to_string).collect(),
                binary: desc.cli.binary.map(str::to_string),
                dashboard_url: desc.metadata.dashboard_url.map(str::to_string),
            })
            .collect();

        self.format(&outputs)
    }
}

/// Converts one report to output.
fn report_to_output(report: &UsageReport, desc: Option<&ProviderDescriptor>) -> ProviderOutput {
    let mut output = ProviderOutput {
        provider: report.provider.id().to_string(),
        source: None,
        strategy: None,
        usage: None,
        credits: None,
        error: None,
        attempts: report.attempts.iter().map(attempt_to_output).collect(),
        skipped: report.skipped.clone(),
    };

    match &report.result {
        Ok(result) => {
            let snapshot = &result.snapshot;
            let labels = desc.map(|d| &d.metadata);
            let window = |w: &RateWindow, label: &str| window_to_output(w, label);

            output.source = Some(result.display_source());
            output.strategy = Some(result.strategy_id.clone());
            output.credits.clone_from(&result.credits);
            output.usage = Some(UsageOutput {
                primary: snapshot
                    .primary
                    .as_ref()
                    .map(|w| window(w, labels.map_or("Session", |m| m.session_label))),
                secondary: snapshot
                    .secondary
                    .as_ref()
                    .map(|w| window(w, labels.map_or("Weekly", |m| m.weekly_label))),
                tertiary: snapshot.tertiary.as_ref().map(|w| {
                    window(w, labels.and_then(|m| m.tertiary_label).unwrap_or("Extra"))
                }),
                updated_at: snapshot.updated_at,
                identity: snapshot.identity.as_ref().map(identity_to_output),
            });
        }
        Err(e) => output.error = Some(e.clone()),
    }
    output
}

fn window_to_output(window: &RateWindow, label: &str) -> WindowOutput {
    WindowOutput {
        label: label.to_string(),
        used_percent: window.used_percent,
        window_minutes: window.window_minutes,
        resets_at: window.resets_at,
        reset_description: window.reset_description.clone(),
    }
}

fn identity_to_output(identity: &ProviderIdentity) -> IdentityOutput {
    IdentityOutput {
        account_email: identity.account_email.clone(),
        account_organization: identity.account_organization.clone(),
        plan_name: identity.plan_name.clone(),
        login_method: identity
            .login_method
            .and_then(|m| serde_json::to_value(m).ok())
            .and_then(|v| v.as_str().map(str::to_string)),
    }
}

fn attempt_to_output(attempt: &FetchAttempt) -> AttemptOutput {
    AttemptOutput {
        strategy: attempt.strategy_id.clone(),
        kind: attempt.kind.to_string(),
        success: attempt.success,
        error: attempt.error.clone(),
        duration_ms: u64::try_from(attempt.duration.as_millis()).unwrap_or(u64::MAX),
    }
}
