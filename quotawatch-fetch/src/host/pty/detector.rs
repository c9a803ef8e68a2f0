//! Early-exit heuristics for interactive CLI screens.
//!
//! Interactive tools never say "done". A detector looks at the output seen
//! so far and guesses whether the screen we asked for has been drawn. When
//! the guess is wrong the runner simply falls back to its deadline.

/// Decides when a PTY session has printed enough.
pub trait CompletionDetector: Send + Sync {
    /// Returns true once `output` (ANSI-stripped) holds a complete answer.
    fn is_complete(&self, output: &str) -> bool;
}

impl<F> CompletionDetector for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn is_complete(&self, output: &str) -> bool {
        self(output)
    }
}

/// Complete once the sent command has been echoed and something after it
/// looks like the answer: one of the marker substrings, or a percentage.
#[derive(Debug, Clone)]
pub struct EchoThenMarker {
    echo: String,
    markers: Vec<String>,
    match_percent: bool,
}

impl EchoThenMarker {
    /// Waits for `echo` (usually the command sent, without newline).
    pub fn new(echo: impl Into<String>) -> Self {
        Self {
            echo: echo.into(),
            markers: Vec::new(),
            match_percent: true,
        }
    }

    /// Adds a marker substring.
    #[must_use]
    pub fn marker(mut self, marker: impl Into<String>) -> Self {
        self.markers.push(marker.into());
        self
    }

    /// Adds several marker substrings.
    #[must_use]
    pub fn markers<I, S>(mut self, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.markers.extend(markers.into_iter().map(Into::into));
        self
    }

    /// Stops treating a bare percentage as completion.
    #[must_use]
    pub fn without_percent(mut self) -> Self {
        self.match_percent = false;
        self
    }
}

impl CompletionDetector for EchoThenMarker {
    fn is_complete(&self, output: &str) -> bool {
        let tail = if self.echo.is_empty() {
            output
        } else {
            match output.find(&self.echo) {
                Some(at) => &output[at + self.echo.len()..],
                None => return false,
            }
        };
        self.markers.iter().any(|m| tail.contains(m.as_str()))
            || (self.match_percent && contains_percentage(tail))
    }
}

/// Returns true if `text` contains a number directly followed by `%`.
pub fn contains_percentage(text: &str) -> bool {
    let bytes = text.as_bytes();
    bytes
        .iter()
        .enumerate()
        .any(|(i, b)| *b == b'%' && i > 0 && bytes[i - 1].is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_echo_first() {
        let d = EchoThenMarker::new("/status").marker("Weekly limits");
        assert!(!d.is_complete("Weekly limits 40% used"));
        assert!(!d.is_complete("> /status\n"));
        assert!(d.is_complete("> /status\nWeekly limits"));
        assert!(d.is_complete("> /status\n5h limit: 12% used"));
    }

    #[test]
    fn test_marker_before_echo_does_not_count() {
        let d = EchoThenMarker::new("/usage").without_percent().marker("Current session");
        assert!(!d.is_complete("Current session\n> /usage\n"));
        assert!(!d.is_complete("> /usage\n40% used"));
        assert!(d.is_complete("> /usage\nCurrent session\n"));
    }

    #[test]
    fn test_closure_detector() {
        let d = |s: &str| s.contains("ready");
        assert!(d.is_complete("all ready"));
        assert!(!CompletionDetector::is_complete(&d, "waiting"));
    }

    #[test]
    fn test_contains_percentage() {
        assert!(contains_percentage("used 7%"));
        assert!(contains_percentage("100% left"));
        assert!(!contains_percentage("% of nothing"));
        assert!(!contains_percentage("50 %"));
    }
}
