//! CLI output formatting tests.
//!
//! These tests verify that CLI output is correctly formatted for both
//! text and JSON output modes.

use super::UsageReport;
use quotawatch_core::{Credits, ProviderIdentity, ProviderKind, RateWindow, UsageSnapshot};
use quotawatch_fetch::{FetchAttempt, FetchKind, FetchResult};
use std::time::Duration;

fn report(snapshot: UsageSnapshot, kind: FetchKind) -> UsageReport {
    let result = FetchResult::new(snapshot, "claude.oauth", kind);
    UsageReport {
        provider: ProviderKind::Claude,
        result: Ok(result),
        attempts: vec![FetchAttempt::success(
            "claude.oauth",
            kind,
            Duration::from_millis(12),
        )],
        skipped: vec!["claude.web".to_string()],
        duration: Duration::from_millis(12),
    }
}

fn failed_report() -> UsageReport {
    UsageReport {
        provider: ProviderKind::Codex,
        result: Err("no credential: auth.json missing".to_string()),
        attempts: vec![FetchAttempt::failure(
            "codex.cli",
            FetchKind::Cli,
            "binary not found",
            Duration::from_millis(3),
        )],
        skipped: Vec::new(),
        duration: Duration::from_millis(3),
    }
}

mod text_formatter_tests {
    use super::super::text::{TextFormatter, format_reset_time};
    use super::*;
    use chrono::{TimeZone, Utc};
    use quotawatch_fetch::Browser;
    use quotawatch_providers::ProviderRegistry;

    #[test]
    fn test_progress_bar_boundary_values() {
        let formatter = TextFormatter::new(false);

        let test_cases = vec![
            (0.0, "░░░░░░░░░░"),
            (10.0, "█░░░░░░░░░"),
            (25.0, "███░░░░░░░"), // 2.5 rounds to 3 blocks
            (50.0, "█████░░░░░"),
            (75.0, "████████░░"), // 7.5 rounds to 8 blocks
            (100.0, "██████████"),
            (140.0, "██████████"),
            (-5.0, "░░░░░░░░░░"),
        ];

        for (percent, expected) in test_cases {
            let bar = formatter.progress_bar(percent);
            assert_eq!(bar, expected, "Failed for {percent}%");
        }
    }

    #[test]
    fn test_progress_bar_with_colors() {
        let formatter = TextFormatter::new(true);
        assert!(formatter.progress_bar(10.0).contains("\x1b[31m"), "red under 20%");
        assert!(formatter.progress_bar(40.0).contains("\x1b[33m"), "yellow under 50%");
        assert!(formatter.progress_bar(80.0).contains("\x1b[32m"), "green otherwise");
    }

    #[test]
    fn test_report_uses_descriptor_labels() {
        let formatter = TextFormatter::new(false);
        let snapshot = UsageSnapshot::new()
            .with_primary(RateWindow::new(25.0))
            .with_secondary(RateWindow::new(50.0));
        let desc = ProviderRegistry::get(ProviderKind::Claude);

        let output = formatter.format_report(&report(snapshot, FetchKind::OAuth), desc, false);

        assert!(output.starts_with("Claude (OAuth)"));
        assert!(output.contains(desc.unwrap().metadata.session_label));
        assert!(output.contains("75% left"));
        assert!(output.contains("50% left"));
        assert!(!output.contains("claude.oauth"), "attempts only in verbose mode");
    }

    #[test]
    fn test_report_identity_and_credits() {
        let formatter = TextFormatter::new(false);
        let mut identity = ProviderIdentity::new(ProviderKind::Claude).with_plan("Max");
        identity.account_email = Some("user@example.com".to_string());
        let snapshot = UsageSnapshot::new()
            .with_primary(RateWindow::new(10.0))
            .with_identity(identity);

        let mut report = report(snapshot, FetchKind::OAuth);
        let mut credits = Credits::new(12.5).with_total(50.0);
        credits.unit = Some("USD".to_string());
        if let Ok(result) = &mut report.result {
            result.credits = Some(credits);
        }

        let output = formatter.format_report(&report, None, false);
        assert!(output.contains("user@example.com"));
        assert!(output.contains("Max"));
        assert!(output.contains("Credits: $12.50 of $50.00 left"));
    }

    #[test]
    fn test_report_verbose_trail() {
        let formatter = TextFormatter::new(false);
        let snapshot = UsageSnapshot::new().with_primary(RateWindow::new(0.0));
        let output = formatter.format_report(&report(snapshot, FetchKind::OAuth), None, true);

        assert!(output.contains("✓ claude.oauth (OAuth, 12ms)"));
        assert!(output.contains("claude.web (unavailable)"));
    }

    #[test]
    fn test_failed_report() {
        let formatter = TextFormatter::new(false);
        let output = formatter.format_report(&failed_report(), None, true);

        assert!(output.starts_with("Codex: Error - no credential"));
        assert!(output.contains("✗ codex.cli (CLI, 3ms): binary not found"));
    }

    #[test]
    fn test_identity_only_snapshot() {
        let formatter = TextFormatter::new(false);
        let identity = ProviderIdentity::new(ProviderKind::Cursor).with_email("dev@example.com");
        let snapshot = UsageSnapshot::new().with_identity(identity);

        let output =
            formatter.format_report(&report(snapshot, FetchKind::LocalProbe), None, false);
        assert!(output.contains("No usage windows reported"));
        assert!(output.contains("dev@example.com"));
    }

    #[test]
    fn test_format_credits() {
        let formatter = TextFormatter::new(false);
        assert_eq!(formatter.format_credits(&Credits::new(3.0)), "3.00 left");

        let mut unlimited = Credits::new(0.0);
        unlimited.unlimited = true;
        assert_eq!(formatter.format_credits(&unlimited), "unlimited");
    }

    #[test]
    fn test_format_reset_time_countdown() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        assert_eq!(format_reset_time(now, now), "now");
        let after = |d: chrono::Duration| format_reset_time(now + d, now);
        assert_eq!(after(chrono::Duration::minutes(1)), "in 1 minute");
        assert_eq!(after(chrono::Duration::minutes(45)), "in 45 minutes");
        assert_eq!(after(chrono::Duration::hours(3)), "in 3 hours");
        assert_eq!(after(chrono::Duration::minutes(90)), "in 1h 30m");
    }

    #[test]
    fn test_browser_line() {
        let formatter = TextFormatter::new(false);
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();

        let denied = formatter.format_browser_line(
            Browser::Chrome,
            true,
            Some(now + chrono::Duration::hours(2)),
            now,
        );
        assert!(denied.contains("installed"));
        assert!(denied.contains("denied, retry in 2 hours"));

        let expired = formatter.format_browser_line(
            Browser::Chrome,
            true,
            Some(now - chrono::Duration::hours(1)),
            now,
        );
        assert!(expired.contains("keychain"));

        let firefox = formatter.format_browser_line(Browser::Firefox, false, None, now);
        assert!(firefox.contains("not found"));
        assert!(firefox.contains("no prompt"));
    }

    #[test]
    fn test_provider_lines() {
        let formatter = TextFormatter::new(false);
        let header = formatter.format_providers_header();
        assert!(header.contains("Provider"));
        assert!(header.contains("Sources"));

        let desc = ProviderRegistry::get(ProviderKind::Zai).unwrap();
        let line = formatter.format_provider_line(desc);
        assert!(line.contains("z.ai"));
        assert!(line.contains("auto, api"));
    }
}

mod json_formatter_tests {
    use super::super::json::JsonFormatter;
    use super::*;
    use quotawatch_providers::ProviderRegistry;

    #[test]
    fn test_format_pretty_and_compact() {
        let data = serde_json::json!({"key": "value"});
        let pretty = JsonFormatter::new(true).format(&data).unwrap();
        assert!(pretty.contains('\n'));
        let compact = JsonFormatter::new(false).format(&data).unwrap();
        assert_eq!(compact, r#"{"key":"value"}"#);
    }

    #[test]
    fn test_single_report_is_object() {
        let window = RateWindow::new(45.5).with_window_minutes(300);
        let snapshot = UsageSnapshot::new().with_primary(window);
        let desc = ProviderRegistry::get(ProviderKind::Claude);
        let output = JsonFormatter::new(false)
            .format_reports(&[(report(snapshot, FetchKind::OAuth), desc)])
            .unwrap();

        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["provider"], "claude");
        assert_eq!(parsed["source"], "OAuth");
        assert_eq!(parsed["strategy"], "claude.oauth");
        assert_eq!(parsed["usage"]["primary"]["usedPercent"], 45.5);
        assert_eq!(parsed["usage"]["primary"]["windowMinutes"], 300);
        assert_eq!(parsed["attempts"][0]["success"], true);
        assert_eq!(parsed["attempts"][0]["durationMs"], 12);
        assert_eq!(parsed["skipped"][0], "claude.web");
        assert!(parsed.get("error").is_none());
    }

    #[test]
    fn test_failed_report_and_array() {
        let snapshot = UsageSnapshot::new().with_primary(RateWindow::new(1.0));
        let output = JsonFormatter::new(false)
            .format_reports(&[
                (report(snapshot, FetchKind::OAuth), None),
                (failed_report(), None),
            ])
            .unwrap();

        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        let items = parsed.as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1]["provider"], "codex");
        assert!(items[1]["error"].as_str().unwrap().contains("auth.json"));
        assert!(items[1].get("usage").is_none());
        assert_eq!(items[1]["attempts"][0]["error"], "binary not found");
    }

    #[test]
    fn test_empty_reports_is_array() {
        let output = JsonFormatter::new(false).format_reports(&[]).unwrap();
        assert_eq!(output, "[]");
    }

    #[test]
    fn test_format_providers() {
        let output = JsonFormatter::new(false)
            .format_providers(ProviderRegistry::all())
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        let items = parsed.as_array().unwrap();
        assert_eq!(items.len(), 4);
        let codex = items.iter().find(|p| p["id"] == "codex").unwrap();
        assert_eq!(codex["binary"], "codex");
        assert_eq!(codex["sourceModes"][0], "auto");
    }
}
