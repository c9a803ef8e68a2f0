//! Fetch pipeline for executing strategies in order.
//!
//! The pipeline takes the ordered strategy list a provider resolved and runs
//! it until one strategy succeeds or one refuses to fall back.

use chrono::Utc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use crate::context::FetchContext;
use crate::error::FetchError;
use crate::strategy::{FetchKind, FetchResult, FetchStrategy};

// ============================================================================
// Fetch Attempt
// ============================================================================

/// Record of a strategy whose `fetch` actually ran.
#[derive(Debug, Clone)]
pub struct FetchAttempt {
    /// The strategy ID that was attempted.
    pub strategy_id: String,
    /// The kind of fetch used.
    pub kind: FetchKind,
    /// Whether the attempt succeeded.
    pub success: bool,
    /// Error if the attempt failed.
    pub error: Option<String>,
    /// How long the attempt took.
    pub duration: Duration,
}

impl FetchAttempt {
    /// Creates a successful attempt record.
    pub fn success(strategy_id: impl Into<String>, kind: FetchKind, duration: Duration) -> Self {
        Self {
            strategy_id: strategy_id.into(),
            kind,
            success: true,
            error: None,
            duration,
        }
    }

    /// Creates a failed attempt record.
    pub fn failure(
        strategy_id: impl Into<String>,
        kind: FetchKind,
        error: impl Into<String>,
        duration: Duration,
    ) -> Self {
        Self {
            strategy_id: strategy_id.into(),
            kind,
            success: false,
            error: Some(error.into()),
            duration,
        }
    }
}

// ============================================================================
// Fetch Outcome
// ============================================================================

/// The outcome of a fetch pipeline execution.
#[derive(Debug)]
pub struct FetchOutcome {
    /// The result (success or final error).
    pub result: Result<FetchResult, FetchError>,
    /// Strategies whose fetch ran, in order.
    pub attempts: Vec<FetchAttempt>,
    /// Strategies skipped because they were unavailable.
    pub skipped: Vec<String>,
    /// Total duration of the run.
    pub duration: Duration,
}

impl FetchOutcome {
    /// Returns true if the fetch succeeded.
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// Returns the number of strategies that were tried.
    pub fn attempts_count(&self) -> usize {
        self.attempts.len()
    }

    /// Returns the successful strategy ID, if any.
    pub fn successful_strategy(&self) -> Option<&str> {
        self.result.as_ref().ok().map(|r| r.strategy_id.as_str())
    }
}

// ============================================================================
// Fetch Pipeline
// ============================================================================

/// An ordered list of fetch strategies tried with fallback.
///
/// At most one strategy succeeds per run. Strategies run sequentially: they
/// share the access gate, and the order must stay deterministic.
pub struct FetchPipeline {
    strategies: Vec<Box<dyn FetchStrategy>>,
}

impl FetchPipeline {
    /// Creates an empty pipeline.
    pub fn new() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    /// Creates a pipeline that tries `strategies` in the given order.
    pub fn with_strategies(strategies: Vec<Box<dyn FetchStrategy>>) -> Self {
        Self { strategies }
    }

    /// Returns the number of strategies in the pipeline.
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    /// Returns true if the pipeline is empty.
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Returns strategy IDs in execution order.
    pub fn strategy_ids(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.id()).collect()
    }

    /// Execute the pipeline and keep the full attempt trail.
    #[instrument(skip(self, ctx), fields(strategies = self.strategies.len()))]
    pub async fn execute(&self, ctx: &FetchContext) -> FetchOutcome {
        let start = Instant::now();
        let mut attempts = Vec::new();
        let mut skipped = Vec::new();
        let mut last_error: Option<FetchError> = None;

        info!(count = self.strategies.len(), "Executing fetch pipeline");

        for strategy in &self.strategies {
            let strategy_id = strategy.id();
            let kind = strategy.kind();

            if !strategy.is_available(ctx).await {
                debug!(strategy = %strategy_id, "Strategy not available, skipping");
                skipped.push(strategy_id.to_string());
                continue;
            }

            let attempt_start = Instant::now();
            debug!(strategy = %strategy_id, kind = %kind, "Executing strategy");

            match strategy.fetch(ctx).await {
                Ok(result) => {
                    let duration = attempt_start.elapsed();
                    info!(strategy = %strategy_id, duration = ?duration, "Strategy succeeded");
                    attempts.push(FetchAttempt::success(strategy_id, kind, duration));
                    return FetchOutcome {
                        result: Ok(result),
                        attempts,
                        skipped,
                        duration: start.elapsed(),
                    };
                }
                Err(error) => {
                    let duration = attempt_start.elapsed();
                    warn!(
                        strategy = %strategy_id,
                        error = %error,
                        duration = ?duration,
                        "Strategy failed"
                    );
                    attempts.push(FetchAttempt::failure(
                        strategy_id,
                        kind,
                        error.to_string(),
                        duration,
                    ));

                    if ctx.access_gate.record_if_needed(&error, Utc::now()) {
                        debug!(strategy = %strategy_id, "Recorded browser access denial");
                    }

                    if !strategy.should_fallback(&error, ctx) {
                        debug!(strategy = %strategy_id, "Strategy indicates no fallback");
                        return FetchOutcome {
                            result: Err(error),
                            attempts,
                            skipped,
                            duration: start.elapsed(),
                        };
                    }

                    last_error = Some(keep_more_specific(last_error, error));
                }
            }
        }

        let error = last_error.unwrap_or(FetchError::NoStrategyAvailable);
        warn!(error = %error, "No strategy produced usage data");
        FetchOutcome {
            result: Err(error),
            attempts,
            skipped,
            duration: start.elapsed(),
        }
    }

    /// Execute the pipeline and return only the result.
    pub async fn run(&self, ctx: &FetchContext) -> Result<FetchResult, FetchError> {
        self.execute(ctx).await.result
    }
}

impl Default for FetchPipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// An authoritative error is never replaced by a later "nothing to
/// authenticate with" error.
fn keep_more_specific(previous: Option<FetchError>, next: FetchError) -> FetchError {
    match previous {
        Some(prev)
            if prev.is_authoritative()
                && (next.is_credential_unavailable()
                    || matches!(next, FetchError::TokenMissing(_))) =>
        {
            prev
        }
        _ => next,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{FetchContextBuilder, SourceMode};
    use crate::host::browser::Browser;
    use async_trait::async_trait;
    use quotawatch_core::{ParseError, UsageSnapshot};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct MockSuccessStrategy {
        id: String,
        available: bool,
        fetched: Arc<AtomicBool>,
    }

    impl MockSuccessStrategy {
        fn new(id: &str, available: bool) -> Self {
            Self {
                id: id.to_string(),
                available,
                fetched: Arc::new(AtomicBool::new(false)),
            }
        }
    }

    #[async_trait]
    impl FetchStrategy for MockSuccessStrategy {
        fn id(&self) -> &str {
            &self.id
        }

        fn kind(&self) -> FetchKind {
            FetchKind::Cli
        }

        async fn is_available(&self, _ctx: &FetchContext) -> bool {
            self.available
        }

        async fn fetch(&self, _ctx: &FetchContext) -> Result<FetchResult, FetchError> {
            self.fetched.store(true, Ordering::SeqCst);
            Ok(FetchResult::new(
                UsageSnapshot::new(),
                self.id.clone(),
                FetchKind::Cli,
            ))
        }
    }

    struct MockFailStrategy {
        id: String,
        kind: FetchKind,
        error: fn() -> FetchError,
        calls: Arc<AtomicUsize>,
    }

    impl MockFailStrategy {
        fn new(id: &str, kind: FetchKind, error: fn() -> FetchError) -> Self {
            Self {
                id: id.to_string(),
                kind,
                error,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl FetchStrategy for MockFailStrategy {
        fn id(&self) -> &str {
            &self.id
        }

        fn kind(&self) -> FetchKind {
            self.kind
        }

        async fn is_available(&self, _ctx: &FetchContext) -> bool {
            true
        }

        async fn fetch(&self, _ctx: &FetchContext) -> Result<FetchResult, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err((self.error)())
        }
    }

    struct AlwaysFallback(MockFailStrategy);

    #[async_trait]
    impl FetchStrategy for AlwaysFallback {
        fn id(&self) -> &str {
            self.0.id()
        }

        fn kind(&self) -> FetchKind {
            self.0.kind()
        }

        async fn is_available(&self, ctx: &FetchContext) -> bool {
            self.0.is_available(ctx).await
        }

        async fn fetch(&self, ctx: &FetchContext) -> Result<FetchResult, FetchError> {
            self.0.fetch(ctx).await
        }

        fn should_fallback(&self, _error: &FetchError, _ctx: &FetchContext) -> bool {
            true
        }
    }

    fn no_cookie() -> FetchError {
        FetchError::NoCredential("no session cookie".into())
    }

    #[tokio::test]
    async fn test_empty_pipeline() {
        let pipeline = FetchPipeline::new();
        let ctx = FetchContextBuilder::new().build();
        let outcome = pipeline.execute(&ctx).await;

        assert!(!outcome.is_success());
        assert!(matches!(outcome.result, Err(FetchError::NoStrategyAvailable)));
    }

    #[tokio::test]
    async fn test_all_unavailable_is_no_strategy() {
        let pipeline = FetchPipeline::with_strategies(vec![
            Box::new(MockSuccessStrategy::new("a", false)),
            Box::new(MockSuccessStrategy::new("b", false)),
        ]);
        let ctx = FetchContextBuilder::new().build();
        let outcome = pipeline.execute(&ctx).await;

        assert!(matches!(outcome.result, Err(FetchError::NoStrategyAvailable)));
        assert!(outcome.attempts.is_empty());
        assert_eq!(outcome.skipped, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_skip_fallback_then_success() {
        let pipeline = FetchPipeline::with_strategies(vec![
            Box::new(MockSuccessStrategy::new("a.unavailable", false)),
            Box::new(MockFailStrategy::new("b.web", FetchKind::Web, no_cookie)),
            Box::new(MockSuccessStrategy::new("c.cli", true)),
        ]);

        let ctx = FetchContextBuilder::new().build();
        let outcome = pipeline.execute(&ctx).await;

        assert_eq!(outcome.successful_strategy(), Some("c.cli"));
        assert_eq!(outcome.attempts_count(), 2);
        assert!(outcome.attempts.iter().all(|a| a.strategy_id != "a.unavailable"));
        assert_eq!(outcome.skipped, vec!["a.unavailable"]);
    }

    #[tokio::test]
    async fn test_no_fallback_stops_pipeline() {
        let second = MockSuccessStrategy::new("b.cli", true);
        let fetched = Arc::clone(&second.fetched);
        let pipeline = FetchPipeline::with_strategies(vec![
            Box::new(MockFailStrategy::new("a.oauth", FetchKind::OAuth, || {
                FetchError::TokenRejected("401".into())
            })),
            Box::new(second),
        ]);

        let ctx = FetchContextBuilder::new().build();
        let outcome = pipeline.execute(&ctx).await;

        assert!(matches!(outcome.result, Err(FetchError::TokenRejected(_))));
        assert_eq!(outcome.attempts_count(), 1);
        assert!(!fetched.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_explicit_web_mode_surfaces_error() {
        let pipeline = FetchPipeline::with_strategies(vec![
            Box::new(MockFailStrategy::new("a.web", FetchKind::Web, no_cookie)),
            Box::new(MockSuccessStrategy::new("b.cli", true)),
        ]);

        let ctx = FetchContextBuilder::new()
            .source_mode(SourceMode::Web)
            .build();
        let result = pipeline.run(&ctx).await;
        assert!(matches!(result, Err(FetchError::NoCredential(_))));
    }

    #[tokio::test]
    async fn test_exhausted_returns_last_error() {
        let pipeline = FetchPipeline::with_strategies(vec![
            Box::new(MockFailStrategy::new("a.web", FetchKind::Web, no_cookie)),
            Box::new(MockFailStrategy::new("b.web", FetchKind::Web, || {
                FetchError::LoginRequired("login wall".into())
            })),
        ]);

        let ctx = FetchContextBuilder::new().build();
        let outcome = pipeline.execute(&ctx).await;
        assert!(matches!(outcome.result, Err(FetchError::LoginRequired(_))));
        assert_eq!(outcome.attempts_count(), 2);
    }

    #[tokio::test]
    async fn test_authoritative_error_is_sticky() {
        let pipeline = FetchPipeline::with_strategies(vec![
            Box::new(AlwaysFallback(MockFailStrategy::new(
                "a.web",
                FetchKind::Web,
                || FetchError::ParseFailed(ParseError::NoUsageData("empty page".into())),
            ))),
            Box::new(MockFailStrategy::new("b.web", FetchKind::Web, no_cookie)),
        ]);

        let ctx = FetchContextBuilder::new().build();
        let outcome = pipeline.execute(&ctx).await;
        assert!(matches!(outcome.result, Err(FetchError::ParseFailed(_))));
    }

    #[tokio::test]
    async fn test_access_denied_is_recorded_in_gate() {
        let pipeline = FetchPipeline::with_strategies(vec![Box::new(MockFailStrategy::new(
            "a.web",
            FetchKind::Web,
            || FetchError::AccessDenied {
                browser: Browser::Chrome,
            },
        ))]);

        let ctx = FetchContextBuilder::new().gate_enforced(true).build();
        let _ = pipeline.execute(&ctx).await;

        assert!(!ctx.access_gate.should_attempt(Browser::Chrome, Utc::now()));
        assert!(ctx.access_gate.should_attempt(Browser::Firefox, Utc::now()));
    }

    #[test]
    fn test_order_is_preserved() {
        let pipeline = FetchPipeline::with_strategies(vec![
            Box::new(MockSuccessStrategy::new("z", true)),
            Box::new(MockSuccessStrategy::new("a", true)),
            Box::new(MockSuccessStrategy::new("m", true)),
        ]);
        assert_eq!(pipeline.strategy_ids(), vec!["z", "a", "m"]);
    }
}
