// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # quotawatch providers
//!
//! Provider descriptors and the fetch strategies behind them.
//!
//! Each provider module has:
//!
//! - **Descriptor**: metadata, supported source modes, CLI names, and the
//!   function that resolves an ordered strategy list for a context
//! - **Strategies**: [`FetchStrategy`](quotawatch_fetch::FetchStrategy)
//!   implementations (OAuth, web session, CLI, API token, local state)
//! - **Parsers**: response and screen parsing, public for testing
//!
//! | Provider | OAuth | Web | CLI | API Token | Local |
//! |----------|-------|-----|-----|-----------|-------|
//! | Claude   | yes   | yes | yes |           |       |
//! | Codex    | yes   |     | yes |           |       |
//! | Cursor   |       | yes |     |           | yes   |
//! | z.ai     |       |     |     | yes       |       |
//!
//! ## Usage
//!
//! ```ignore
//! use quotawatch_core::ProviderKind;
//! use quotawatch_fetch::FetchContext;
//! use quotawatch_providers::ProviderRegistry;
//!
//! let ctx = FetchContext::builder().build();
//! let desc = ProviderRegistry::get(ProviderKind::Claude).unwrap();
//! let outcome = desc.build_pipeline(&ctx).execute(&ctx).await;
//! ```

pub mod descriptor;
pub mod registry;

mod common;
mod text;

// Provider modules (alphabetical)
pub mod claude;
pub mod codex;
pub mod cursor;
pub mod zai;

pub use descriptor::{CliConfig, ProviderDescriptor, ResolveFn};
pub use registry::ProviderRegistry;

pub use claude::claude_descriptor;
pub use codex::codex_descriptor;
pub use cursor::cursor_descriptor;
pub use zai::zai_descriptor;

pub use claude::{ClaudeCliStrategy, ClaudeOAuthStrategy, ClaudeWebStrategy};
pub use codex::{CodexCliStrategy, CodexOAuthStrategy};
pub use cursor::{CursorLocalStrategy, CursorWebStrategy};
pub use zai::ZaiApiStrategy;
