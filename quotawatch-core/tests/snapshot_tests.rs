//! Integration tests for core snapshot types.

use quotawatch_core::{RateWindow, UsageParser, UsageSnapshot};

#[test]
fn test_remaining_percent_matches_used() {
    let mut used = 0.0;
    while used <= 100.0 {
        let window = RateWindow::new(used);
        assert!((window.remaining_percent() - (100.0 - used)).abs() < 1e-9);
        used += 0.5;
    }
}

#[test]
fn test_remaining_percent_outside_range() {
    assert_eq!(RateWindow::new(101.0).remaining_percent(), 0.0);
    assert_eq!(RateWindow::new(-0.5).remaining_percent(), 100.0);
}

#[test]
fn test_window_validation() {
    let mut window = RateWindow::new(50.0);
    assert!(window.validate().is_ok());

    window.used_percent = -10.0;
    assert!(window.validate().is_err());
}

#[test]
fn test_closure_parser() {
    let parser = |raw: &str| -> Result<UsageSnapshot, quotawatch_core::ParseError> {
        if raw.trim().is_empty() {
            return Err(quotawatch_core::ParseError::Empty);
        }
        Ok(UsageSnapshot::new().with_primary(RateWindow::new(1.0)))
    };
    assert!(parser.parse("   ").is_err());
    assert!(parser.parse("x").unwrap().has_data());
}
