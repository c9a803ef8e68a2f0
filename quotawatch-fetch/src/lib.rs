// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # quotawatch fetch
//!
//! Acquisition core for quotawatch: how usage text and JSON get from a
//! provider's CLI, website, or API into a parser.
//!
//! ## Fetch Pipeline
//!
//! - [`strategy::FetchStrategy`] - one way of fetching, with its own
//!   availability check and fallback policy
//! - [`pipeline::FetchPipeline`] - runs strategies in order, falling back
//!   on recoverable failures
//! - [`context::FetchContext`] - settings plus the host APIs below
//!
//! ## Host APIs
//!
//! - [`host::pty`] - interactive CLIs in a pseudo-terminal
//! - [`host::browser`] - cookie import, presence cache, access gate
//! - [`host::credentials`] - OS credential store
//! - [`host::http`] - HTTP client
//! - [`host::process`] - plain subprocesses
//! - [`host::prefs`] - key-value preferences
//!
//! ## Example
//!
//! ```ignore
//! use quotawatch_fetch::{FetchContext, FetchPipeline};
//!
//! let ctx = FetchContext::builder().build();
//! let pipeline = FetchPipeline::with_strategies(vec![
//!     Box::new(ClaudeOAuthStrategy::new()),
//!     Box::new(ClaudeCliStrategy::new()),
//! ]);
//! let outcome = pipeline.execute(&ctx).await;
//! ```

pub mod context;
pub mod error;
pub mod host;
pub mod pipeline;
pub mod strategy;

// Errors
pub use error::{
    BrowserError, CredentialError, FetchError, HttpError, PrefsError, ProcessError, PtyError,
};

// Host APIs
pub use host::{
    browser::{
        Browser, BrowserAccessGate, BrowserCookieImporter, BrowserPresenceCache, Cookie,
        CookieImport,
    },
    credentials::{CredentialStore, MemoryCredentialStore, SystemKeychain},
    http::HttpClient,
    prefs::{KeyValueStore, MemoryPrefs},
    process::{ProcessOutput, ProcessRunner},
    pty::{PtyOptions, PtyResult, PtyRunner},
};

// Strategy & Pipeline
pub use context::{FetchContext, FetchContextBuilder, FetchSettings, Runtime, SourceMode};
pub use pipeline::{FetchAttempt, FetchOutcome, FetchPipeline};
pub use strategy::{FetchKind, FetchResult, FetchStrategy, StrategyInfo, default_fallback_policy};
