//! Fetch error types.
//!
//! [`FetchError`] is the taxonomy strategies report to the pipeline. The
//! narrower host errors ([`PtyError`], [`BrowserError`], ...) convert into it
//! so that fallback decisions always see the most specific kind.

use std::time::Duration;
use thiserror::Error;

use quotawatch_core::ParseError;

use crate::host::browser::Browser;

// ============================================================================
// Main Fetch Error
// ============================================================================

/// Error type for fetch operations.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The CLI binary is not on PATH.
    #[error("{0} not found on PATH")]
    BinaryNotFound(String),

    /// The CLI could not be started.
    #[error("failed to launch {binary}: {reason}")]
    LaunchFailed {
        /// Binary that failed to start.
        binary: String,
        /// Underlying reason.
        reason: String,
    },

    /// The operation hit its hard deadline.
    #[error("timed out after {elapsed:?}")]
    Timeout {
        /// Time spent before giving up.
        elapsed: Duration,
        /// Output captured before the deadline, if any.
        partial: Option<String>,
    },

    /// The caller dropped the operation before it finished.
    #[error("fetch was cancelled")]
    Cancelled,

    /// No usable cookie or session exists.
    #[error("no credential available: {0}")]
    NoCredential(String),

    /// A session exists but the service asks for a fresh login.
    #[error("login required: {0}")]
    LoginRequired(String),

    /// The OS denied access to a browser's protected cookie key.
    #[error("access to {} cookies was denied", .browser.display_name())]
    AccessDenied {
        /// Browser whose key could not be read.
        browser: Browser,
    },

    /// An OAuth or API token is required but absent.
    #[error("token missing: {0}")]
    TokenMissing(String),

    /// A token was sent and refused by the service.
    #[error("token rejected: {0}")]
    TokenRejected(String),

    /// The data was fetched but could not be understood.
    #[error("parse failed: {0}")]
    ParseFailed(#[from] ParseError),

    /// No strategy was eligible to run.
    #[error("no fetch strategy available")]
    NoStrategyAvailable,

    /// The service answered with something unexpected.
    #[error("unexpected response: {0}")]
    InvalidResponse(String),

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    /// Subprocess error.
    #[error("process error: {0}")]
    Process(#[from] ProcessError),
}

impl FetchError {
    /// Returns the browser if this error is an access denial.
    pub fn denied_browser(&self) -> Option<Browser> {
        match self {
            Self::AccessDenied { browser } => Some(*browser),
            _ => None,
        }
    }

    /// Returns true for "nothing usable to authenticate with" errors.
    pub fn is_credential_unavailable(&self) -> bool {
        matches!(
            self,
            Self::NoCredential(_) | Self::LoginRequired(_) | Self::AccessDenied { .. }
        )
    }

    /// Returns true for errors that describe a real account-side problem and
    /// must not be masked by a later, less specific error.
    pub fn is_authoritative(&self) -> bool {
        matches!(self, Self::ParseFailed(_) | Self::TokenRejected(_))
    }

    /// Returns output captured before a timeout, if any.
    pub fn partial_output(&self) -> Option<&str> {
        match self {
            Self::Timeout { partial, .. } => partial.as_deref(),
            _ => None,
        }
    }
}

impl From<PtyError> for FetchError {
    fn from(err: PtyError) -> Self {
        match err {
            PtyError::NotFound(binary) => Self::BinaryNotFound(binary),
            PtyError::CreateFailed(reason) => Self::LaunchFailed {
                binary: String::new(),
                reason,
            },
            PtyError::SpawnFailed { binary, reason } => Self::LaunchFailed { binary, reason },
            PtyError::Io(e) => Self::LaunchFailed {
                binary: String::new(),
                reason: e.to_string(),
            },
            PtyError::Timeout(elapsed) => Self::Timeout {
                elapsed,
                partial: None,
            },
            PtyError::Cancelled => Self::Cancelled,
        }
    }
}

impl From<BrowserError> for FetchError {
    fn from(err: BrowserError) -> Self {
        match err {
            BrowserError::AccessDenied(browser) => Self::AccessDenied { browser },
            other => Self::NoCredential(other.to_string()),
        }
    }
}

// ============================================================================
// HTTP Error
// ============================================================================

/// HTTP-specific error type.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Request error.
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    /// Domain not allowed.
    #[error("Domain not allowed: {0}")]
    DomainNotAllowed(String),

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

// ============================================================================
// Credential Error
// ============================================================================

/// Error type for credential store operations.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// The OS refused access (user clicked "Deny" or the store is locked).
    #[error("Access denied to credential store")]
    AccessDenied,

    /// Credential store unavailable.
    #[error("Credential store unavailable: {0}")]
    Unavailable(String),

    /// Platform error.
    #[error("Platform error: {0}")]
    Platform(String),

    /// Generic error.
    #[error("Credential store error: {0}")]
    Other(String),
}

impl From<keyring::Error> for CredentialError {
    fn from(err: keyring::Error) -> Self {
        match err {
            keyring::Error::NoStorageAccess(e) => {
                tracing::debug!(error = %e, "Credential store refused access");
                CredentialError::AccessDenied
            }
            keyring::Error::PlatformFailure(e) => CredentialError::Platform(e.to_string()),
            keyring::Error::Ambiguous(_) => {
                CredentialError::Other("Ambiguous credential entry".to_string())
            }
            other => CredentialError::Other(other.to_string()),
        }
    }
}

// ============================================================================
// Preferences Error
// ============================================================================

/// Error type for key-value preference stores.
#[derive(Debug, Error)]
pub enum PrefsError {
    /// Backend failed to persist.
    #[error("Preferences backend error: {0}")]
    Backend(String),

    /// Value could not be (de)serialized.
    #[error("Preferences serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// ============================================================================
// Process Error
// ============================================================================

/// Error type for process operations.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// Command not found.
    #[error("Command not found: {0}")]
    NotFound(String),

    /// Command timed out.
    #[error("Command timed out after {0:?}")]
    Timeout(Duration),

    /// Non-zero exit code.
    #[error("Command exited with code {code}: {stderr}")]
    NonZeroExit {
        /// Exit code from the process.
        code: i32,
        /// Standard error output.
        stderr: String,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// PTY Error
// ============================================================================

/// Error type for PTY operations.
#[derive(Debug, Error)]
pub enum PtyError {
    /// Binary not found on PATH.
    #[error("Command not found: {0}")]
    NotFound(String),

    /// Failed to allocate a pseudo-terminal.
    #[error("Failed to create PTY: {0}")]
    CreateFailed(String),

    /// Failed to spawn the child.
    #[error("Failed to spawn {binary}: {reason}")]
    SpawnFailed {
        /// Binary that failed to start.
        binary: String,
        /// Underlying reason.
        reason: String,
    },

    /// Deadline reached with nothing captured.
    #[error("Command produced no output within {0:?}")]
    Timeout(Duration),

    /// The caller dropped the run before it finished.
    #[error("PTY run cancelled")]
    Cancelled,

    /// IO error while talking to the terminal.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// Browser Error
// ============================================================================

/// Error type for browser cookie operations.
#[derive(Debug, Error)]
pub enum BrowserError {
    /// Browser has no data on this machine.
    #[error("Browser not found: {0}")]
    BrowserNotFound(String),

    /// No browser in the requested order was usable.
    #[error("No browsers available")]
    NoBrowsersAvailable,

    /// Every candidate browser is in its access cooldown.
    #[error("Browser cookie access suspended after a recent denial")]
    Suspended,

    /// Cookie database not found.
    #[error("Cookie database not found for {browser}: {path}")]
    DatabaseNotFound {
        /// Browser name.
        browser: String,
        /// Expected database path.
        path: String,
    },

    /// Failed to read cookies.
    #[error("Failed to read cookies: {0}")]
    ReadFailed(String),

    /// No cookies found for domain.
    #[error("No cookies found for domain: {0}")]
    NoCookiesFound(String),

    /// Cookie decryption failed.
    #[error("Cookie decryption failed: {0}")]
    DecryptionFailed(String),

    /// The OS denied access to the browser's cookie encryption key.
    #[error("Access to {} Safe Storage was denied", .0.display_name())]
    AccessDenied(Browser),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
