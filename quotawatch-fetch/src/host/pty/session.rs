//! One PTY child and the blocking loop that drives it.

use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use portable_pty::{Child, CommandBuilder, MasterPty, PtySize, native_pty_system};
use tracing::{debug, trace, warn};

use super::{PtyOptions, PtyResult, PtyState, strip_ansi_codes};
use crate::error::PtyError;

const READ_BUFFER_SIZE: usize = 4096;
const POLL_INTERVAL: Duration = Duration::from_millis(50);
const TERM_WAIT: Duration = Duration::from_millis(200);

// ============================================================================
// Session
// ============================================================================

/// A spawned child plus the master side of its terminal.
///
/// Dropping a session terminates the child's whole process group and reaps
/// the child, whatever path led to the drop.
struct Session {
    child: Box<dyn Child + Send + Sync>,
    writer: Box<dyn Write + Send>,
    master: Box<dyn MasterPty + Send>,
    pid: Option<u32>,
    exit_command: Option<String>,
    grace: Duration,
    exit_code: Option<u32>,
    finished: bool,
}

impl Session {
    fn spawn(
        binary: &Path,
        cols: u16,
        rows: u16,
        options: &PtyOptions,
    ) -> Result<(Self, mpsc::Receiver<Vec<u8>>), PtyError> {
        let pair = native_pty_system()
            .openpty(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| PtyError::CreateFailed(e.to_string()))?;

        let mut cmd = CommandBuilder::new(binary);
        cmd.args(&options.extra_args);
        if let Some(dir) = &options.working_dir {
            cmd.cwd(dir);
        }
        for (key, value) in &options.env {
            cmd.env(key, value);
        }
        cmd.env("TERM", "xterm-256color");

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| PtyError::SpawnFailed {
                binary: binary.display().to_string(),
                reason: e.to_string(),
            })?;
        // The child holds its own copy; ours would keep the terminal open
        // after the child exits.
        drop(pair.slave);

        let pid = child.process_id();
        let mut session = Self {
            child,
            writer: Box::new(std::io::sink()),
            master: pair.master,
            pid,
            exit_command: options.exit_command.clone(),
            grace: options.shutdown_grace,
            exit_code: None,
            finished: false,
        };

        // From here on, errors drop `session`, which kills the child.
        session.writer = session
            .master
            .take_writer()
            .map_err(|e| PtyError::CreateFailed(format!("no PTY writer: {e}")))?;
        let reader = session
            .master
            .try_clone_reader()
            .map_err(|e| PtyError::CreateFailed(format!("no PTY reader: {e}")))?;

        let (tx, rx) = mpsc::channel();
        thread::spawn(move || read_loop(reader, &tx));

        Ok((session, rx))
    }

    fn write(&mut self, data: &str) -> std::io::Result<()> {
        self.writer.write_all(data.as_bytes())?;
        self.writer.flush()
    }

    fn try_wait(&mut self) -> Option<u32> {
        if self.exit_code.is_none() {
            if let Ok(Some(status)) = self.child.try_wait() {
                self.exit_code = Some(status.exit_code());
            }
        }
        self.exit_code
    }

    fn wait_until(&mut self, limit: Duration) -> Option<u32> {
        let until = Instant::now() + limit;
        loop {
            if let Some(code) = self.try_wait() {
                return Some(code);
            }
            if Instant::now() >= until {
                return None;
            }
            thread::sleep(Duration::from_millis(20));
        }
    }

    /// Ends the child: exit command, grace period, SIGTERM, SIGKILL, reap.
    fn finish(&mut self) -> Option<u32> {
        if self.finished {
            return self.exit_code;
        }
        self.finished = true;

        if self.try_wait().is_none() {
            if let Some(cmd) = self.exit_command.take() {
                trace!(command = %cmd.trim_end(), "Sending exit command");
                if let Err(e) = self.write(&cmd) {
                    debug!(error = %e, "Exit command not delivered");
                }
                self.wait_until(self.grace);
            }
        }

        if self.try_wait().is_none() {
            self.signal_group(Signal::Term);
            if self.wait_until(TERM_WAIT).is_none() {
                self.signal_group(Signal::Kill);
                if let Err(e) = self.child.kill() {
                    trace!(error = %e, "Child kill failed");
                }
            }
        } else {
            // The child is gone; anything it left behind in its group is not.
            self.signal_group(Signal::Kill);
        }

        if self.exit_code.is_none() {
            match self.child.wait() {
                Ok(status) => self.exit_code = Some(status.exit_code()),
                Err(e) => warn!(error = %e, "Failed to reap PTY child"),
            }
        }
        self.exit_code
    }

    /// Signals the child's process group. The child is spawned as a session
    /// leader, so its pid is also its group id.
    #[cfg(unix)]
    fn signal_group(&self, signal: Signal) {
        use nix::sys::signal::{self, killpg};
        use nix::unistd::Pid;

        let Some(pid) = self.pid.and_then(|p| i32::try_from(p).ok()) else {
            return;
        };
        let sig = match signal {
            Signal::Term => signal::Signal::SIGTERM,
            Signal::Kill => signal::Signal::SIGKILL,
        };
        if let Err(e) = killpg(Pid::from_raw(pid), sig) {
            trace!(pid, error = %e, "killpg failed");
        }
    }

    #[cfg(not(unix))]
    fn signal_group(&mut self, _signal: Signal) {
        let _ = self.child.kill();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.finish();
    }
}

#[derive(Debug, Clone, Copy)]
enum Signal {
    Term,
    Kill,
}

fn read_loop(mut reader: Box<dyn Read + Send>, tx: &mpsc::Sender<Vec<u8>>) {
    let mut buffer = [0u8; READ_BUFFER_SIZE];
    loop {
        match reader.read(&mut buffer) {
            // EIO is how Linux reports a hung-up terminal.
            Ok(0) | Err(_) => break,
            Ok(n) => {
                if tx.send(buffer[..n].to_vec()).is_err() {
                    break;
                }
            }
        }
    }
}

// ============================================================================
// Driver
// ============================================================================

/// Runs `binary` to completion, deadline, or cancellation.
pub(super) fn drive(
    binary: &Path,
    input: &str,
    cols: u16,
    rows: u16,
    options: &PtyOptions,
    cancel: &Arc<AtomicBool>,
) -> Result<PtyResult, PtyError> {
    let start = Instant::now();
    let deadline = start + options.timeout;
    trace!(state = %PtyState::Spawning, "PTY state");

    let (mut session, rx) = Session::spawn(binary, cols, rows, options).inspect_err(|e| {
        debug!(state = %PtyState::LaunchFailed, error = %e, "PTY launch failed");
    })?;
    trace!(state = %PtyState::Running, pid = ?session.pid, "PTY state");

    if !input.is_empty() {
        session.write(input)?;
    }

    let mut raw = Vec::new();
    let mut sent = vec![false; options.send_on.len()];
    let mut completed_at: Option<Instant> = None;
    let mut timed_out = false;

    loop {
        if cancel.load(Ordering::Relaxed) {
            debug!("PTY run cancelled");
            drop(session);
            return Err(PtyError::Cancelled);
        }
        let now = Instant::now();
        if completed_at.is_some_and(|at| now.duration_since(at) >= options.settle_after_complete) {
            break;
        }
        if now >= deadline {
            timed_out = completed_at.is_none();
            break;
        }

        match rx.recv_timeout(POLL_INTERVAL.min(deadline - now)) {
            Ok(chunk) => {
                raw.extend_from_slice(&chunk);
                let seen = strip_ansi_codes(&String::from_utf8_lossy(&raw));

                for (i, (pattern, reply)) in options.send_on.iter().enumerate() {
                    if !sent[i] && seen.contains(pattern.as_str()) {
                        sent[i] = true;
                        trace!(pattern = %pattern, "Replying to prompt");
                        if let Err(e) = session.write(reply) {
                            warn!(error = %e, "Failed to write prompt reply");
                        }
                    }
                }

                if completed_at.is_none()
                    && options.detector.as_ref().is_some_and(|d| d.is_complete(&seen))
                {
                    debug!(elapsed = ?start.elapsed(), "Completion detected");
                    completed_at = Some(Instant::now());
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                if session.try_wait().is_some() {
                    thread::sleep(POLL_INTERVAL);
                    while let Ok(chunk) = rx.try_recv() {
                        raw.extend_from_slice(&chunk);
                    }
                    break;
                }
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                // Terminal hung up; the child is on its way out.
                session.wait_until(POLL_INTERVAL);
                break;
            }
        }
    }

    let exit_code = session.finish().and_then(|c| i32::try_from(c).ok());
    drop(session);
    let duration = start.elapsed();

    let text = if options.strip_ansi {
        strip_ansi_codes(&String::from_utf8_lossy(&raw))
    } else {
        String::from_utf8_lossy(&raw).into_owned()
    };

    if timed_out {
        if strip_ansi_codes(&text).trim().is_empty() {
            debug!(state = %PtyState::TimedOut, ?duration, "PTY timed out with no output");
            return Err(PtyError::Timeout(duration));
        }
        debug!(state = %PtyState::TimedOut, ?duration, "PTY timed out with partial output");
    }

    Ok(PtyResult {
        text,
        exit_code,
        duration,
        completed_early: completed_at.is_some(),
        timed_out,
        state: if timed_out {
            PtyState::TimedOut
        } else {
            PtyState::Completed
        },
    })
}
