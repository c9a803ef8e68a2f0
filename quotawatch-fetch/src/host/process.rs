//! Plain subprocess execution.
//!
//! Used where no terminal is needed, e.g. `claude --version`.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, instrument, warn};

use crate::error::ProcessError;

const DEFAULT_TIMEOUT_SECS: u64 = 10;

// ============================================================================
// Process Output
// ============================================================================

/// Output from a process execution.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    /// Standard output content.
    pub stdout: String,
    /// Standard error content.
    pub stderr: String,
    /// Exit code, -1 if killed by a signal.
    pub exit_code: i32,
    /// How long the command took.
    pub duration: Duration,
}

impl ProcessOutput {
    /// Returns true if the command exited with 0.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Returns stdout if successful, otherwise an error carrying stderr.
    ///
    /// # Errors
    ///
    /// [`ProcessError::NonZeroExit`] if the command failed.
    pub fn stdout_if_success(&self) -> Result<&str, ProcessError> {
        if self.success() {
            Ok(&self.stdout)
        } else {
            Err(ProcessError::NonZeroExit {
                code: self.exit_code,
                stderr: self.stderr.clone(),
            })
        }
    }
}

// ============================================================================
// Process Runner
// ============================================================================

/// Runs subprocesses with a hard deadline.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    /// Creates a new process runner.
    pub fn new() -> Self {
        Self
    }

    /// Runs a command with the default deadline.
    ///
    /// # Errors
    ///
    /// See [`Self::run_with_timeout`].
    pub async fn run(&self, cmd: &str, args: &[&str]) -> Result<ProcessOutput, ProcessError> {
        self.run_with_timeout(cmd, args, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .await
    }

    /// Runs a command, killing it if it outlives `timeout`.
    ///
    /// # Errors
    ///
    /// [`ProcessError::NotFound`] if `cmd` is not on PATH,
    /// [`ProcessError::Timeout`] past the deadline, IO errors otherwise.
    #[instrument(skip(self), fields(cmd = %cmd, timeout = ?timeout))]
    pub async fn run_with_timeout(
        &self,
        cmd: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<ProcessOutput, ProcessError> {
        let path = self.which(cmd).ok_or_else(|| {
            debug!(cmd = %cmd, "Command not found");
            ProcessError::NotFound(cmd.to_string())
        })?;

        let start = Instant::now();
        let mut command = Command::new(&path);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Dropping the output future on timeout must not leak the child.
            .kill_on_drop(true);

        let output = match tokio::time::timeout(timeout, command.output()).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(cmd = %cmd, timeout = ?timeout, "Command timed out");
                return Err(ProcessError::Timeout(timeout));
            }
        };

        let result = ProcessOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(-1),
            duration: start.elapsed(),
        };
        debug!(
            exit_code = result.exit_code,
            duration = ?result.duration,
            stdout_len = result.stdout.len(),
            "Command completed"
        );
        Ok(result)
    }

    /// Finds a command on PATH.
    pub fn which(&self, cmd: &str) -> Option<PathBuf> {
        which::which(cmd).ok()
    }

    /// Returns true if a command is on PATH.
    pub fn command_exists(&self, cmd: &str) -> bool {
        self.which(cmd).is_some()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_echo() {
        let output = ProcessRunner::new().run("echo", &["hello", "world"]).await.unwrap();
        assert!(output.success());
        assert_eq!(output.stdout.trim(), "hello world");
    }

    #[tokio::test]
    async fn test_non_zero_exit() {
        let output = ProcessRunner::new().run("sh", &["-c", "echo oops >&2; exit 3"]).await.unwrap();
        assert_eq!(output.exit_code, 3);
        assert!(matches!(
            output.stdout_if_success(),
            Err(ProcessError::NonZeroExit { code: 3, .. })
        ));
    }

    #[tokio::test]
    async fn test_timeout() {
        let result = ProcessRunner::new()
            .run_with_timeout("sleep", &["5"], Duration::from_millis(100))
            .await;
        assert!(matches!(result, Err(ProcessError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_not_found() {
        let result = ProcessRunner::new().run("not_a_real_command_xyz", &[]).await;
        assert!(matches!(result, Err(ProcessError::NotFound(_))));
    }
}
