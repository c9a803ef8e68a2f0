//! Scanning helpers for CLI screen text.
//!
//! CLI screens are drawn for people, not parsers: box drawing, progress
//! bars and padding surround the figures we want. These helpers pull out
//! one figure per line and ignore the rest.

use regex::Regex;
use std::sync::LazyLock;

static PERCENT_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d{1,3}(?:\.\d+)?)\s*%\s*(used|left|remaining)").ok()
});

static PAREN_RESET_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)\(\s*resets?:?\s+([^)]+)\)").ok());

static LINE_RESET_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)^[^\w]*resets?:?\s+(.+?)[\s│|]*$").ok());

static EMAIL_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"([A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,})").ok()
});

/// Returns the used percentage on a line, converting "left" figures.
pub(crate) fn used_percent(line: &str) -> Option<f64> {
    let caps = PERCENT_RE.as_ref()?.captures(line)?;
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;
    let used = if caps.get(2)?.as_str().eq_ignore_ascii_case("used") {
        value
    } else {
        100.0 - value
    };
    Some(used.clamp(0.0, 100.0))
}

/// Returns a reset description: `(resets 14:32)` anywhere, or a line that
/// starts with `Resets`.
pub(crate) fn reset_description(line: &str) -> Option<String> {
    let caps = PAREN_RESET_RE
        .as_ref()?
        .captures(line)
        .or_else(|| LINE_RESET_RE.as_ref()?.captures(line))?;
    let text = caps.get(1)?.as_str().trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Returns the first email address in `text`.
pub(crate) fn email(text: &str) -> Option<String> {
    EMAIL_RE
        .as_ref()?
        .captures(text)
        .and_then(|caps| Some(caps.get(1)?.as_str().to_string()))
}

/// Returns the text inside the last parenthesized group on a line.
pub(crate) fn trailing_parenthesized(line: &str) -> Option<String> {
    let end = line.rfind(')')?;
    let start = line[..end].rfind('(')?;
    let inner = line[start + 1..end].trim();
    (!inner.is_empty()).then(|| inner.to_string())
}
