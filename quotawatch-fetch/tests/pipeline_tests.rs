//! End-to-end pipeline runs against real host pieces: a cookie importer over
//! a temporary home, the access gate, and the PTY runner.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use quotawatch_core::{ParseError, RateWindow, UsageSnapshot};
use quotawatch_fetch::host::pty::EchoThenMarker;
use quotawatch_fetch::{
    Browser, BrowserAccessGate, BrowserCookieImporter, BrowserPresenceCache, FetchContext,
    FetchError, FetchKind, FetchPipeline, FetchResult, FetchStrategy, MemoryCredentialStore,
    MemoryPrefs, PtyOptions, SourceMode,
};
use rusqlite::Connection;
use tempfile::TempDir;

// ============================================================================
// Strategies
// ============================================================================

struct CookieStrategy;

#[async_trait]
impl FetchStrategy for CookieStrategy {
    fn id(&self) -> &str {
        "test.web"
    }

    fn kind(&self) -> FetchKind {
        FetchKind::Web
    }

    async fn is_available(&self, ctx: &FetchContext) -> bool {
        ctx.source_mode().allows_web()
    }

    async fn fetch(&self, ctx: &FetchContext) -> Result<FetchResult, FetchError> {
        let import = ctx
            .browser
            .import_gated(
                "claude.ai",
                &ctx.settings.browser_order,
                &ctx.access_gate,
                &ctx.presence,
                Utc::now(),
            )
            .await?;
        let _session = import
            .get("sessionKey")
            .ok_or_else(|| FetchError::NoCredential("no sessionKey".into()))?;
        Ok(FetchResult::new(
            UsageSnapshot::new().with_primary(RateWindow::new(5.0)),
            self.id(),
            self.kind(),
        ))
    }
}

/// Runs a shell that prints a status screen, parsed from the PTY text.
struct ShellStatusStrategy;

fn parse_status(text: &str) -> Result<UsageSnapshot, ParseError> {
    let line = text
        .lines()
        .find(|l| l.contains("% used"))
        .ok_or_else(|| ParseError::NoUsageData("no usage line".into()))?;
    let number: String = line
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect();
    let used: f64 = number
        .parse()
        .map_err(|_| ParseError::invalid("used", line))?;
    Ok(UsageSnapshot::new().with_primary(RateWindow::new(used)))
}

#[async_trait]
impl FetchStrategy for ShellStatusStrategy {
    fn id(&self) -> &str {
        "test.cli"
    }

    fn kind(&self) -> FetchKind {
        FetchKind::Cli
    }

    async fn is_available(&self, ctx: &FetchContext) -> bool {
        ctx.source_mode().allows_cli()
    }

    async fn fetch(&self, ctx: &FetchContext) -> Result<FetchResult, FetchError> {
        let options = PtyOptions::with_timeout(ctx.settings.pty_timeout)
            .args([
                "-c",
                "echo '> /status'; echo 'Session: 37% used'; sleep 30",
            ])
            .detector(EchoThenMarker::new("/status").marker("% used"));
        let result = ctx.pty.run("sh", "", options).await?;
        let snapshot = parse_status(&result.text)?;
        Ok(FetchResult::new(snapshot, self.id(), self.kind()))
    }
}

// ============================================================================
// Fixtures
// ============================================================================

fn chromium_db(path: &Path) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    let conn = Connection::open(path).unwrap();
    conn.execute_batch(
        "CREATE TABLE meta (key TEXT, value TEXT);
         INSERT INTO meta VALUES ('version', '21');
         CREATE TABLE cookies (host_key TEXT, name TEXT, value TEXT, encrypted_value BLOB,
         path TEXT, expires_utc INTEGER, is_secure INTEGER, is_httponly INTEGER);",
    )
    .unwrap();
    conn.execute(
        "INSERT INTO cookies VALUES ('.claude.ai', 'sessionKey', '', ?1, '/', 0, 1, 1)",
        [b"v11\x10\x20\x30\x40".to_vec()],
    )
    .unwrap();
}

struct Harness {
    _home: TempDir,
    store: Arc<MemoryCredentialStore>,
    prefs: Arc<MemoryPrefs>,
    presence: Arc<BrowserPresenceCache>,
    importer: Arc<BrowserCookieImporter>,
}

impl Harness {
    fn new() -> Self {
        let home = TempDir::new().unwrap();
        let root = Browser::Chrome.data_root(home.path()).unwrap();
        chromium_db(&root.join("Default").join("Cookies"));

        let store = Arc::new(MemoryCredentialStore::new().deny_service("Chrome Safe Storage"));
        let importer = Arc::new(BrowserCookieImporter::new(store.clone()).with_home(home.path()));
        Self {
            presence: Arc::new(BrowserPresenceCache::new().with_root(home.path())),
            prefs: Arc::new(MemoryPrefs::new()),
            _home: home,
            store,
            importer,
        }
    }

    /// A fresh context, as after an app restart: new gate over the same
    /// preferences.
    fn context(&self, mode: SourceMode) -> FetchContext {
        let gate = BrowserAccessGate::new(self.prefs.clone()).enforced(true);
        FetchContext::builder()
            .source_mode(mode)
            .pty_timeout(Duration::from_secs(15))
            .browser_order(vec![Browser::Chrome])
            .credentials(self.store.clone())
            .browser(self.importer.clone())
            .presence(self.presence.clone())
            .access_gate(Arc::new(gate))
            .build()
    }
}

fn pipeline() -> FetchPipeline {
    FetchPipeline::with_strategies(vec![Box::new(CookieStrategy), Box::new(ShellStatusStrategy)])
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_denied_browser_falls_back_and_stays_suppressed() {
    let harness = Harness::new();

    let first = pipeline().execute(&harness.context(SourceMode::Auto)).await;
    assert!(first.is_success(), "{:?}", first.attempts);
    assert_eq!(first.successful_strategy(), Some("test.cli"));
    assert_eq!(first.attempts_count(), 2);
    assert_eq!(harness.store.reads(), 1);

    let result = first.result.unwrap();
    assert_eq!(result.kind, FetchKind::Cli);
    assert_eq!(result.snapshot.primary.as_ref().unwrap().used_percent, 37.0);

    // Restart: the denial was persisted, so Chrome is not asked again.
    let second = pipeline().execute(&harness.context(SourceMode::Auto)).await;
    assert!(second.is_success());
    assert_eq!(harness.store.reads(), 1);
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_explicit_web_mode_reports_denial() {
    let harness = Harness::new();

    let err = pipeline()
        .run(&harness.context(SourceMode::Web))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        FetchError::AccessDenied {
            browser: Browser::Chrome
        }
    ));
}

#[cfg(unix)]
#[tokio::test]
async fn test_cli_only_mode_uses_pty() {
    let ctx = FetchContext::builder()
        .source_mode(SourceMode::Cli)
        .pty_timeout(Duration::from_secs(15))
        .build();

    let outcome = pipeline().execute(&ctx).await;
    assert_eq!(outcome.skipped, vec!["test.web".to_string()]);
    assert_eq!(outcome.attempts_count(), 1);
    assert!(outcome.is_success());
}

#[test]
fn test_parse_status_text() {
    let snapshot = parse_status("> /status\r\nSession: 12% used\r\n").unwrap();
    assert_eq!(snapshot.primary.unwrap().used_percent, 12.0);
    assert!(parse_status("nothing here").is_err());
}
