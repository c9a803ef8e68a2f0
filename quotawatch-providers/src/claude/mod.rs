//! Claude (Anthropic) provider.
//!
//! ## Fetch Strategies
//!
//! 1. **OAuth** - Claude Code's token, read from
//!    `~/.claude/.credentials.json` (or the `Claude Code-credentials`
//!    keychain item in the macOS app), sent to the OAuth usage endpoint
//! 2. **Web** - the claude.ai `sessionKey` cookie, imported from a browser
//!    through the access gate
//! 3. **CLI** - `claude` driven in a PTY, typing `/usage`
//!
//! The app tries web before CLI; a one-shot command tries CLI before web.

mod api;
mod descriptor;
mod oauth;
mod pty_probe;
mod strategies;
mod web;

pub use api::{ExtraUsage, UsageApiResponse, UsageWindow, parse_usage_json, parse_usage_response};
pub use descriptor::claude_descriptor;
pub use oauth::{ClaudeOAuthCredentials, CredentialSource, parse_credentials};
pub use pty_probe::parse_usage_output;
pub use strategies::{ClaudeCliStrategy, ClaudeOAuthStrategy, ClaudeWebStrategy};
