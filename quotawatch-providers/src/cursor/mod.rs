//! Cursor provider.
//!
//! ## Fetch Strategies
//!
//! 1. **Web** - the `WorkosCursorSessionToken` cookie, imported from a
//!    browser through the access gate, against cursor.com's usage summary
//! 2. **Local** - the account the editor caches in its global storage;
//!    names the account and plan but carries no usage
//!
//! Plan usage is the primary window. A capped on-demand budget is the
//! secondary window and is also reported as credits.

mod descriptor;
mod local;
mod strategies;
mod web;

pub use descriptor::cursor_descriptor;
pub use local::{LocalAccount, read_local_account};
pub use strategies::{CursorLocalStrategy, CursorWebStrategy};
pub use web::{IndividualUsage, UsageBucket, UsageSummary, parse_usage_summary};
