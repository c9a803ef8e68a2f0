//! Host APIs used by fetch strategies.
//!
//! - [`credentials`] - OS credential store behind a narrow trait
//! - [`prefs`] - small key-value preferences (access gate persistence)
//! - [`http`] - HTTP client with domain allowlist
//! - [`process`] - plain subprocesses
//! - [`pty`] - interactive CLIs in a pseudo-terminal
//! - [`browser`] - cookie import, presence cache, access gate

pub mod browser;
pub mod credentials;
pub mod http;
pub mod prefs;
pub mod process;
pub mod pty;

pub use browser::{
    Browser, BrowserAccessGate, BrowserCandidate, BrowserCookieImporter, BrowserPresenceCache,
    Cookie, CookieImport,
};
pub use credentials::{CredentialStore, MemoryCredentialStore, SystemKeychain};
pub use http::{HttpClient, ResponseExt};
pub use prefs::{KeyValueStore, MemoryPrefs};
pub use process::{ProcessOutput, ProcessRunner};
pub use pty::{CompletionDetector, EchoThenMarker, PtyOptions, PtyResult, PtyRunner, PtyState};
