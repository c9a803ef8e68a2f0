//! Trait definitions shared across crates.

use crate::error::ParseError;
use crate::models::UsageSnapshot;

/// Turns raw text (CLI output, page body, JSON) into a usage snapshot.
///
/// Implementations must be pure: they may not perform I/O and must not
/// assume anything about where the text came from.
pub trait UsageParser: Send + Sync {
    /// Parses `raw` into a snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] when the text has no recognizable usage data.
    fn parse(&self, raw: &str) -> Result<UsageSnapshot, ParseError>;
}

impl<F> UsageParser for F
where
    F: Fn(&str) -> Result<UsageSnapshot, ParseError> + Send + Sync,
{
    fn parse(&self, raw: &str) -> Result<UsageSnapshot, ParseError> {
        self(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RateWindow;

    fn percent_parser(raw: &str) -> Result<UsageSnapshot, ParseError> {
        let value: f64 = raw
            .trim()
            .trim_end_matches('%')
            .parse()
            .map_err(|_| ParseError::invalid("percent", raw))?;
        Ok(UsageSnapshot::new().with_primary(RateWindow::new(value)))
    }

    #[test]
    fn test_fn_is_parser() {
        let parser: &dyn UsageParser = &percent_parser;
        let snapshot = parser.parse("42%").unwrap();
        assert_eq!(snapshot.primary.unwrap().used_percent, 42.0);
        assert!(parser.parse("nope").is_err());
    }
}
