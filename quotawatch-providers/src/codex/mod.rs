//! Codex (OpenAI) provider.
//!
//! ## Fetch Strategies
//!
//! 1. **OAuth** - the ChatGPT login that `codex login` stores in
//!    `~/.codex/auth.json` (or `$CODEX_HOME`), sent to the ChatGPT backend
//!    usage endpoint
//! 2. **CLI** - `codex` driven in a PTY, typing `/status`
//!
//! The ID token in `auth.json` names the account email and plan.

mod api;
mod auth;
mod descriptor;
mod pty_probe;
mod strategies;

pub use api::{CreditBalance, LimitWindow, RateLimit, UsageResponse, parse_usage_response};
pub use auth::{AuthFile, IdClaims, decode_id_token, parse_auth_file};
pub use descriptor::codex_descriptor;
pub use pty_probe::{StatusExtras, parse_status, parse_status_output};
pub use strategies::{CodexCliStrategy, CodexOAuthStrategy};
