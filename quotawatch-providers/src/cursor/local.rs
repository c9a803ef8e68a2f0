//! Cursor's local application state.
//!
//! The editor caches the signed-in account under `cursorAuth/*` keys, in
//! the `ItemTable` of `User/globalStorage/state.vscdb` and, in older
//! builds, in `User/globalStorage/storage.json`. Neither holds usage
//! figures, so a local probe yields identity only.

use quotawatch_core::{LoginMethod, ProviderIdentity, ProviderKind};
use rusqlite::{Connection, OpenFlags, OptionalExtension};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

const EMAIL_KEY: &str = "cursorAuth/cachedEmail";
const MEMBERSHIP_KEY: &str = "cursorAuth/stripeMembershipType";

/// Account details cached by the editor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalAccount {
    /// Signed-in email.
    pub email: Option<String>,
    /// Stripe membership type, e.g. `pro`.
    pub membership: Option<String>,
}

impl LocalAccount {
    fn is_empty(&self) -> bool {
        self.email.is_none() && self.membership.is_none()
    }

    fn merge(self, other: Self) -> Self {
        Self {
            email: self.email.or(other.email),
            membership: self.membership.or(other.membership),
        }
    }

    /// Converts to a provider identity.
    pub fn to_identity(&self) -> ProviderIdentity {
        let mut identity =
            ProviderIdentity::new(ProviderKind::Cursor).with_login_method(LoginMethod::Local);
        identity.account_email.clone_from(&self.email);
        identity.plan_name = self.membership.as_deref().map(capitalize);
        identity
    }
}

fn capitalize(raw: &str) -> String {
    let mut chars = raw.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().trim_matches('"').to_string())
        .filter(|v| !v.is_empty())
}

/// Cursor's `User/globalStorage` directory under a config root.
pub fn global_storage_dir(root: &Path) -> PathBuf {
    root.join("Cursor").join("User").join("globalStorage")
}

/// Reads the cached account from `storage.json`.
pub fn read_storage_json(path: &Path) -> Option<LocalAccount> {
    let raw = std::fs::read_to_string(path).ok()?;
    let value: serde_json::Value = serde_json::from_str(&raw).ok()?;
    let field = |key: &str| non_empty(value.get(key)?.as_str().map(str::to_string));
    let account = LocalAccount {
        email: field(EMAIL_KEY),
        membership: field(MEMBERSHIP_KEY),
    };
    (!account.is_empty()).then_some(account)
}

/// Reads the cached account from `state.vscdb`.
pub fn read_state_db(path: &Path) -> Option<LocalAccount> {
    let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    let conn = Connection::open_with_flags(path, flags)
        .inspect_err(|e| debug!(path = %path.display(), error = %e, "Cannot open state.vscdb"))
        .ok()?;
    let lookup = |key: &str| -> Option<String> {
        let value: Option<String> = conn
            .query_row("SELECT value FROM ItemTable WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()
            .ok()
            .flatten();
        non_empty(value)
    };
    let account = LocalAccount {
        email: lookup(EMAIL_KEY),
        membership: lookup(MEMBERSHIP_KEY),
    };
    (!account.is_empty()).then_some(account)
}

/// Reads the cached account, preferring the state database.
///
/// `root` is the platform config directory (`~/Library/Application
/// Support`, `~/.config`, or `%APPDATA%`).
#[instrument]
pub fn read_local_account(root: &Path) -> Option<LocalAccount> {
    let dir = global_storage_dir(root);
    let from_db = read_state_db(&dir.join("state.vscdb"));
    let from_json = read_storage_json(&dir.join("storage.json"));
    match (from_db, from_json) {
        (Some(db), Some(json)) => Some(db.merge(json)),
        (db, json) => db.or(json),
    }
}
