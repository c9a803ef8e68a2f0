// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # quotawatch store
//!
//! Persistence for quotawatch:
//!
//! - **Settings**: the user's `settings.json`
//! - **FilePreferences**: a file-backed `KeyValueStore` for state the
//!   fetch layer keeps across runs, such as browser access cooldowns
//! - **Persistence**: atomic, owner-only JSON file helpers
//!
//! ## Usage
//!
//! ```ignore
//! use quotawatch_store::{FilePreferences, Settings};
//! use quotawatch_fetch::BrowserAccessGate;
//! use std::sync::Arc;
//!
//! let settings = Settings::load_default()?;
//! let gate = BrowserAccessGate::new(Arc::new(FilePreferences::open_default()));
//! ```

pub mod error;
pub mod persistence;
pub mod preferences;
pub mod settings;

pub use error::StoreError;
pub use persistence::{
    CONFIG_DIR_ENV, default_config_dir, default_preferences_path, default_settings_path,
    ensure_dir, load_json, load_json_or_default, save_json, write_atomic,
};
pub use preferences::FilePreferences;
pub use settings::{
    DEFAULT_ACCESS_COOLDOWN_HOURS, DEFAULT_CLI_TIMEOUT_SECS, DEFAULT_WEB_TIMEOUT_SECS, Settings,
};
