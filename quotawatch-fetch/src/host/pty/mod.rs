//! PTY-based execution of interactive CLI tools.
//!
//! Tools like `claude` and `codex` only print their usage screens to a real
//! terminal. [`PtyRunner`] gives them one, types a scripted command, and
//! collects what comes back until a [`CompletionDetector`] is satisfied or
//! the deadline passes.
//!
//! # Example
//!
//! ```no_run
//! use quotawatch_fetch::host::pty::{EchoThenMarker, PtyOptions, PtyRunner};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let runner = PtyRunner::default();
//! let options = PtyOptions::with_timeout(Duration::from_secs(20))
//!     .detector(EchoThenMarker::new("/status").marker("Weekly limit"))
//!     .exit_command("/exit\n");
//!
//! let result = runner.run("codex", "/status\n", options).await?;
//! println!("{}", result.text);
//! # Ok(())
//! # }
//! ```

mod detector;
mod session;

pub use detector::{CompletionDetector, EchoThenMarker, contains_percentage};

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, instrument, warn};

use crate::error::PtyError;

// ============================================================================
// Constants
// ============================================================================

const DEFAULT_COLS: u16 = 120;
const DEFAULT_ROWS: u16 = 40;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);
const DEFAULT_SETTLE: Duration = Duration::from_millis(150);
const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

// ============================================================================
// State
// ============================================================================

/// Lifecycle of one PTY run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PtyState {
    /// Not started.
    Idle,
    /// Allocating the terminal and starting the child.
    Spawning,
    /// Child running, output being collected.
    Running,
    /// Child exited or the detector fired.
    Completed,
    /// Deadline reached.
    TimedOut,
    /// Terminal or child could not be started.
    LaunchFailed,
}

impl fmt::Display for PtyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Spawning => "spawning",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::TimedOut => "timed_out",
            Self::LaunchFailed => "launch_failed",
        };
        f.write_str(s)
    }
}

// ============================================================================
// Options
// ============================================================================

/// Configuration for one PTY run.
#[derive(Clone)]
pub struct PtyOptions {
    /// Hard deadline for the whole run.
    pub timeout: Duration,
    /// Arguments passed to the binary.
    pub extra_args: Vec<String>,
    /// Extra environment for the child.
    pub env: HashMap<String, String>,
    /// Working directory for the child.
    pub working_dir: Option<PathBuf>,
    /// Written to the terminal before the child is signalled.
    pub exit_command: Option<String>,
    /// `(prompt, reply)` pairs; each reply is sent once when its prompt
    /// first appears.
    pub send_on: Vec<(String, String)>,
    /// Early-exit heuristic. Without one the run lasts until the child
    /// exits or the deadline.
    pub detector: Option<Arc<dyn CompletionDetector>>,
    /// Extra reading time after the detector fires.
    pub settle_after_complete: Duration,
    /// How long the exit command gets before signals are sent.
    pub shutdown_grace: Duration,
    /// Strip ANSI escapes from the returned text.
    pub strip_ansi: bool,
    /// Terminal size as `(cols, rows)`, overriding the runner's.
    pub size: Option<(u16, u16)>,
}

impl Default for PtyOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            extra_args: Vec::new(),
            env: HashMap::new(),
            working_dir: None,
            exit_command: None,
            send_on: Vec::new(),
            detector: None,
            settle_after_complete: DEFAULT_SETTLE,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            strip_ansi: true,
            size: None,
        }
    }
}

impl fmt::Debug for PtyOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PtyOptions")
            .field("timeout", &self.timeout)
            .field("extra_args", &self.extra_args)
            .field("working_dir", &self.working_dir)
            .field("exit_command", &self.exit_command)
            .field("detector", &self.detector.is_some())
            .field("strip_ansi", &self.strip_ansi)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

impl PtyOptions {
    /// Options with just a deadline.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }

    /// Adds an argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.extra_args.push(arg.into());
        self
    }

    /// Adds several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets an environment variable.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Sets the working directory.
    #[must_use]
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Sets the command written on shutdown.
    #[must_use]
    pub fn exit_command(mut self, command: impl Into<String>) -> Self {
        self.exit_command = Some(command.into());
        self
    }

    /// Replies to a prompt once.
    #[must_use]
    pub fn send_on(mut self, prompt: impl Into<String>, reply: impl Into<String>) -> Self {
        self.send_on.push((prompt.into(), reply.into()));
        self
    }

    /// Sets the early-exit heuristic.
    #[must_use]
    pub fn detector(mut self, detector: impl CompletionDetector + 'static) -> Self {
        self.detector = Some(Arc::new(detector));
        self
    }

    /// Sets the settle time after completion.
    #[must_use]
    pub fn settle(mut self, settle: Duration) -> Self {
        self.settle_after_complete = settle;
        self
    }

    /// Sets the shutdown grace period.
    #[must_use]
    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Keeps ANSI escapes in the returned text.
    #[must_use]
    pub fn keep_ansi(mut self) -> Self {
        self.strip_ansi = false;
        self
    }

    /// Sets the terminal size for this run.
    #[must_use]
    pub fn size(mut self, cols: u16, rows: u16) -> Self {
        self.size = Some((cols, rows));
        self
    }
}

// ============================================================================
// Result
// ============================================================================

/// Output of a PTY run.
#[derive(Debug, Clone)]
pub struct PtyResult {
    /// Everything the terminal printed, including the echoed input.
    pub text: String,
    /// Exit code, when the child could be reaped normally.
    pub exit_code: Option<i32>,
    /// Wall time of the run.
    pub duration: Duration,
    /// The detector fired before the child exited on its own.
    pub completed_early: bool,
    /// The deadline was reached; `text` is partial.
    pub timed_out: bool,
    /// Final state.
    pub state: PtyState,
}

// ============================================================================
// Runner
// ============================================================================

/// Runs interactive CLIs inside a pseudo-terminal.
#[derive(Debug, Clone)]
pub struct PtyRunner {
    cols: u16,
    rows: u16,
}

impl Default for PtyRunner {
    fn default() -> Self {
        Self::new(DEFAULT_COLS, DEFAULT_ROWS)
    }
}

impl PtyRunner {
    /// Creates a runner with the given terminal size.
    pub fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }

    /// Runs `binary`, writes `input`, and collects output.
    ///
    /// Dropping the returned future cancels the run; the child and its
    /// process group are terminated within one poll interval.
    ///
    /// # Errors
    ///
    /// [`PtyError::NotFound`] if the binary is not on PATH,
    /// [`PtyError::Timeout`] if the deadline passed with no output, and
    /// launch errors if the terminal or child could not be created. A
    /// deadline with partial output is `Ok` with `timed_out` set.
    #[instrument(skip(self, input, options), fields(binary = %binary))]
    pub async fn run(
        &self,
        binary: &str,
        input: &str,
        options: PtyOptions,
    ) -> Result<PtyResult, PtyError> {
        let path = Self::which(binary).ok_or_else(|| {
            warn!(binary = %binary, "Binary not found");
            PtyError::NotFound(binary.to_string())
        })?;

        debug!(path = %path.display(), timeout = ?options.timeout, "Starting PTY run");

        let cancel = Arc::new(AtomicBool::new(false));
        let _cancel_on_drop = CancelOnDrop(Arc::clone(&cancel));

        let (cols, rows) = options.size.unwrap_or((self.cols, self.rows));
        let input = input.to_string();
        let result = tokio::task::spawn_blocking(move || {
            session::drive(&path, &input, cols, rows, &options, &cancel)
        })
        .await
        .map_err(|e| PtyError::SpawnFailed {
            binary: binary.to_string(),
            reason: format!("task join error: {e}"),
        })??;

        debug!(
            duration = ?result.duration,
            exit_code = ?result.exit_code,
            state = %result.state,
            early = result.completed_early,
            len = result.text.len(),
            "PTY run finished"
        );
        Ok(result)
    }

    /// Finds a binary on PATH.
    pub fn which(binary: &str) -> Option<PathBuf> {
        which::which(binary).ok()
    }

    /// Returns true if the binary is on PATH.
    pub fn exists(binary: &str) -> bool {
        Self::which(binary).is_some()
    }
}

struct CancelOnDrop(Arc<AtomicBool>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

/// Strips ANSI escape sequences.
pub fn strip_ansi_codes(text: &str) -> String {
    let stripped = strip_ansi_escapes::strip(text.as_bytes());
    String::from_utf8_lossy(&stripped).into_owned()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Instant;

    #[cfg(target_os = "linux")]
    fn is_running(pid: i32) -> bool {
        // Zombies count as gone: they no longer execute.
        std::fs::read_to_string(format!("/proc/{pid}/stat"))
            .ok()
            .and_then(|s| {
                s.rsplit_once(')')
                    .and_then(|(_, rest)| rest.split_whitespace().next().map(str::to_string))
            })
            .is_some_and(|state| state != "Z" && state != "X")
    }

    #[cfg(target_os = "linux")]
    async fn eventually_gone(pid: i32) -> bool {
        for _ in 0..50 {
            if !is_running(pid) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        false
    }

    #[test]
    fn test_strip_ansi_codes() {
        assert_eq!(strip_ansi_codes("\x1b[31mRed\x1b[0m Normal"), "Red Normal");
        assert_eq!(strip_ansi_codes("\x1b[2J\x1b[HHello"), "Hello");
        assert_eq!(strip_ansi_codes("plain"), "plain");
    }

    #[test]
    fn test_options_builder() {
        let opts = PtyOptions::with_timeout(Duration::from_secs(3))
            .args(["-c", "true"])
            .env("A", "1")
            .exit_command("/exit\n")
            .send_on("Continue?", "y\n")
            .detector(|s: &str| s.contains("done"));
        assert_eq!(opts.timeout, Duration::from_secs(3));
        assert_eq!(opts.extra_args, vec!["-c", "true"]);
        assert_eq!(opts.exit_command.as_deref(), Some("/exit\n"));
        assert!(opts.detector.unwrap().is_complete("all done"));
    }

    #[test]
    fn test_which() {
        assert!(PtyRunner::exists("sh"));
        assert!(!PtyRunner::exists("definitely_not_a_real_command_xyz123"));
    }

    #[tokio::test]
    async fn test_not_found() {
        let result = PtyRunner::default()
            .run("definitely_not_a_real_command_xyz123", "", PtyOptions::default())
            .await;
        assert!(matches!(result, Err(PtyError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_child_exit_completes() {
        let options = PtyOptions::with_timeout(Duration::from_secs(5))
            .args(["-c", "printf '\\033[1mhello\\033[0m pty\\n'"]);
        let result = PtyRunner::default().run("sh", "", options).await.unwrap();

        assert_eq!(result.state, PtyState::Completed);
        assert!(!result.timed_out);
        assert!(result.text.contains("hello pty"));
        assert_eq!(result.exit_code, Some(0));
    }

    #[tokio::test]
    async fn test_working_dir_and_raw_output() {
        let dir = tempfile::TempDir::new().unwrap();
        let name = dir.path().file_name().unwrap().to_string_lossy().into_owned();
        let options = PtyOptions::with_timeout(Duration::from_secs(5))
            .args(["-c", "printf '\\033[1m'; pwd"])
            .in_dir(dir.path())
            .keep_ansi();
        let result = PtyRunner::default().run("sh", "", options).await.unwrap();

        assert!(result.text.contains(&name));
        assert!(result.text.contains('\x1b'));
    }

    #[tokio::test]
    async fn test_silent_child_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let pidfile = dir.path().join("grandchild.pid");
        let script = format!("sleep 30 & echo $! > '{}'; wait", pidfile.display());
        let timeout = Duration::from_millis(500);

        let started = Instant::now();
        let result = PtyRunner::default()
            .run("sh", "", PtyOptions::with_timeout(timeout).args(["-c", script.as_str()]))
            .await;

        assert!(matches!(result, Err(PtyError::Timeout(_))), "{result:?}");
        assert!(started.elapsed() < timeout + Duration::from_secs(2));

        #[cfg(target_os = "linux")]
        {
            let pid: i32 = std::fs::read_to_string(&pidfile)
                .unwrap()
                .trim()
                .parse()
                .unwrap();
            assert!(eventually_gone(pid).await, "grandchild {pid} still running");
        }
    }

    #[tokio::test]
    async fn test_partial_output_on_timeout() {
        let options = PtyOptions::with_timeout(Duration::from_millis(600))
            .args(["-c", "echo partial; sleep 30"]);
        let result = PtyRunner::default().run("sh", "", options).await.unwrap();

        assert!(result.timed_out);
        assert_eq!(result.state, PtyState::TimedOut);
        assert!(result.text.contains("partial"));
    }

    #[tokio::test]
    async fn test_early_exit_on_marker() {
        let options = PtyOptions::with_timeout(Duration::from_secs(15))
            .args(["-c", "echo '> /status'; echo 'Weekly limit: 42% used'; sleep 30"])
            .detector(EchoThenMarker::new("/status").marker("Weekly limit"))
            .exit_command("exit\n");

        let started = Instant::now();
        let result = PtyRunner::default().run("sh", "", options).await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(result.completed_early);
        assert!(!result.timed_out);
        assert!(result.text.contains("42% used"));
    }

    #[tokio::test]
    async fn test_scripted_input_is_echoed() {
        let options = PtyOptions::with_timeout(Duration::from_secs(5))
            .detector(EchoThenMarker::new("/status").without_percent().marker("ok"));
        let result = PtyRunner::default()
            .run("sh", "echo /status; echo ok\n", options)
            .await
            .unwrap();
        assert!(result.completed_early);
    }

    #[tokio::test]
    async fn test_exit_command_ends_child_gracefully() {
        let options = PtyOptions::with_timeout(Duration::from_secs(10))
            .detector(|s: &str| s.contains("READY_7"))
            .exit_command("exit 7\n")
            .shutdown_grace(Duration::from_secs(3));

        let result = PtyRunner::default()
            .run("sh", "echo READY_$((3+4))\n", options)
            .await
            .unwrap();

        assert!(result.completed_early);
        assert_eq!(result.state, PtyState::Completed);
        assert_eq!(result.exit_code, Some(7));
    }

    #[tokio::test]
    async fn test_size_override() {
        let options = PtyOptions::with_timeout(Duration::from_secs(5))
            .args(["-c", "stty size"])
            .size(100, 30);
        let result = PtyRunner::new(80, 24).run("sh", "", options).await.unwrap();
        assert!(result.text.contains("30 100"), "{}", result.text);
    }

    #[tokio::test]
    async fn test_cancel_kills_child() {
        let dir = tempfile::tempdir().unwrap();
        let pidfile = dir.path().join("child.pid");
        let script = format!("echo $$ > '{}'; exec sleep 30", pidfile.display());
        let options = PtyOptions::with_timeout(Duration::from_secs(30)).args(["-c", script.as_str()]);

        let runner = PtyRunner::default();
        let cancelled =
            tokio::time::timeout(Duration::from_millis(400), runner.run("sh", "", options)).await;
        assert!(cancelled.is_err());

        #[cfg(target_os = "linux")]
        {
            let mut pid = None;
            for _ in 0..20 {
                if let Ok(s) = std::fs::read_to_string(&pidfile) {
                    pid = s.trim().parse::<i32>().ok();
                    if pid.is_some() {
                        break;
                    }
                }
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            let pid = pid.unwrap();
            assert!(eventually_gone(pid).await, "child {pid} still running");
        }
    }
}
