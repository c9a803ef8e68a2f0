//! Claude OAuth credentials.
//!
//! Claude Code keeps its OAuth token either in `~/.claude/.credentials.json`
//! or in the OS keychain under `Claude Code-credentials`. Both hold:
//!
//! ```json
//! {
//!   "claudeAiOauth": {
//!     "accessToken": "...",
//!     "refreshToken": "...",
//!     "expiresAt": 1735000000000,
//!     "scopes": ["user:inference", "user:profile"],
//!     "subscriptionType": "max"
//!   }
//! }
//! ```

use chrono::{DateTime, Duration, Utc};
use quotawatch_core::ParseError;
use quotawatch_fetch::{CredentialError, FetchContext, FetchError};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

use crate::common::{config_dir, parse_epoch};

/// Keychain service Claude Code stores its token under.
pub const KEYCHAIN_SERVICE: &str = "Claude Code-credentials";

/// Scope the usage endpoint requires.
pub const REQUIRED_SCOPE: &str = "user:profile";

/// Environment variable that relocates Claude Code's config directory.
pub const CONFIG_DIR_ENV: &str = "CLAUDE_CONFIG_DIR";

const CREDENTIALS_FILE: &str = ".credentials.json";

/// Tokens this close to expiry are treated as expired.
const EXPIRY_MARGIN_MINUTES: i64 = 5;

// ============================================================================
// File Format
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CredentialsFile {
    claude_ai_oauth: Option<OAuthCredentialsData>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OAuthCredentialsData {
    access_token: String,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    scopes: Option<Vec<String>>,
    #[serde(default)]
    subscription_type: Option<String>,
}

impl fmt::Debug for OAuthCredentialsData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthCredentialsData")
            .field("expires_at", &self.expires_at)
            .field("scopes", &self.scopes)
            .field("subscription_type", &self.subscription_type)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Credentials
// ============================================================================

/// Where credentials were loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// `.credentials.json` in the Claude config directory.
    File,
    /// OS keychain.
    Keychain,
}

/// A Claude OAuth token ready for use.
#[derive(Clone)]
pub struct ClaudeOAuthCredentials {
    /// Bearer token.
    pub access_token: String,
    /// Expiration time.
    pub expires_at: Option<DateTime<Utc>>,
    /// Granted scopes; empty when the store does not record them.
    pub scopes: Vec<String>,
    /// Subscription tier, e.g. "pro" or "max".
    pub subscription_type: Option<String>,
    /// Where the token came from.
    pub source: CredentialSource,
}

impl ClaudeOAuthCredentials {
    /// Returns true if the token is expired or about to expire at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .is_some_and(|exp| exp <= now + Duration::minutes(EXPIRY_MARGIN_MINUTES))
    }

    /// Returns true if the usage endpoint will accept the token's scopes.
    pub fn has_required_scope(&self) -> bool {
        self.scopes.is_empty() || self.scopes.iter().any(|s| s == REQUIRED_SCOPE)
    }

    /// Checks the token is usable at `now`.
    ///
    /// # Errors
    ///
    /// [`FetchError::TokenMissing`] if expired or lacking the usage scope:
    /// neither is worth sending.
    pub fn ensure_usable(&self, now: DateTime<Utc>) -> Result<(), FetchError> {
        if self.is_expired_at(now) {
            return Err(FetchError::TokenMissing(
                "Claude OAuth token expired; run `claude` to refresh it".to_string(),
            ));
        }
        if !self.has_required_scope() {
            return Err(FetchError::TokenMissing(format!(
                "Claude OAuth token lacks the {REQUIRED_SCOPE} scope"
            )));
        }
        Ok(())
    }

    /// Plan name derived from the subscription tier.
    pub fn plan_name(&self) -> Option<String> {
        let tier = self.subscription_type.as_deref()?.trim();
        let mut chars = tier.chars();
        let first = chars.next()?;
        Some(first.to_uppercase().chain(chars).collect())
    }
}

impl fmt::Debug for ClaudeOAuthCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClaudeOAuthCredentials")
            .field("expires_at", &self.expires_at)
            .field("scopes", &self.scopes)
            .field("subscription_type", &self.subscription_type)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

/// Parses a credentials document.
///
/// Accepts the wrapped `{"claudeAiOauth": {...}}` form and the bare inner
/// object.
///
/// # Errors
///
/// [`ParseError::Json`] if neither form decodes, [`ParseError::NoUsageData`]
/// if the wrapper is present but empty.
pub fn parse_credentials(
    json: &str,
    source: CredentialSource,
) -> Result<ClaudeOAuthCredentials, ParseError> {
    if json.trim().is_empty() {
        return Err(ParseError::Empty);
    }
    let data = match serde_json::from_str::<CredentialsFile>(json) {
        Ok(CredentialsFile {
            claude_ai_oauth: Some(data),
        }) => data,
        Ok(CredentialsFile {
            claude_ai_oauth: None,
        }) => serde_json::from_str::<OAuthCredentialsData>(json).map_err(|_| {
            ParseError::NoUsageData("no claudeAiOauth entry".to_string())
        })?,
        Err(e) => return Err(e.into()),
    };

    Ok(ClaudeOAuthCredentials {
        access_token: data.access_token,
        expires_at: data.expires_at.and_then(parse_epoch),
        scopes: data.scopes.unwrap_or_default(),
        subscription_type: data.subscription_type,
        source,
    })
}

// ============================================================================
// Loading
// ============================================================================

/// Path of the credentials file, honoring `CLAUDE_CONFIG_DIR`.
pub fn credentials_path(ctx: &FetchContext, home: Option<&Path>) -> Option<PathBuf> {
    config_dir(ctx.env_var(CONFIG_DIR_ENV), home, ".claude").map(|d| d.join(CREDENTIALS_FILE))
}

/// Loads credentials: the file first, which never prompts, then the
/// keychain when `allow_keychain` is set.
///
/// # Errors
///
/// [`FetchError::TokenMissing`] when no source has a token, including a
/// refused keychain prompt; [`FetchError::ParseFailed`] for a credentials
/// file that exists but cannot be read as one.
#[instrument(skip(ctx, home))]
pub async fn load_credentials(
    ctx: &FetchContext,
    home: Option<&Path>,
    allow_keychain: bool,
) -> Result<ClaudeOAuthCredentials, FetchError> {
    if let Some(path) = credentials_path(ctx, home) {
        match tokio::fs::read_to_string(&path).await {
            Ok(json) => {
                debug!(path = %path.display(), "Read Claude credentials file");
                return Ok(parse_credentials(&json, CredentialSource::File)?);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(FetchError::TokenMissing(format!(
                    "cannot read {}: {e}",
                    path.display()
                )));
            }
        }
    }

    if !allow_keychain {
        return Err(FetchError::TokenMissing(
            "no Claude credentials file".to_string(),
        ));
    }

    let account = ctx.env_var("USER").unwrap_or_default();
    match ctx.credentials.read(KEYCHAIN_SERVICE, account).await {
        Ok(Some(json)) => Ok(parse_credentials(&json, CredentialSource::Keychain)?),
        Ok(None) => Err(FetchError::TokenMissing(
            "no Claude OAuth token in the keychain".to_string(),
        )),
        Err(CredentialError::AccessDenied) => Err(FetchError::TokenMissing(
            "keychain access to Claude credentials was denied".to_string(),
        )),
        Err(e) => Err(FetchError::TokenMissing(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use quotawatch_fetch::MemoryCredentialStore;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tempfile::TempDir;

    const WRAPPED: &str = r#"{
        "claudeAiOauth": {
            "accessToken": "sk-ant-oat01-abc",
            "refreshToken": "sk-ant-ort01-def",
            "expiresAt": 1735000000000,
            "scopes": ["user:inference", "user:profile"],
            "subscriptionType": "max"
        }
    }"#;

    fn ctx_with(store: MemoryCredentialStore) -> FetchContext {
        FetchContext::builder()
            .env(HashMap::from([("USER".to_string(), "me".to_string())]))
            .credentials(Arc::new(store))
            .build()
    }

    #[test]
    fn test_parse_wrapped() {
        let creds = parse_credentials(WRAPPED, CredentialSource::File).unwrap();
        assert_eq!(creds.access_token, "sk-ant-oat01-abc");
        assert_eq!(creds.expires_at, Utc.timestamp_opt(1_735_000_000, 0).single());
        assert!(creds.has_required_scope());
        assert_eq!(creds.plan_name().as_deref(), Some("Max"));
    }

    #[test]
    fn test_parse_bare() {
        let creds = parse_credentials(r#"{"accessToken": "tok"}"#, CredentialSource::Keychain)
            .unwrap();
        assert_eq!(creds.access_token, "tok");
        assert!(creds.expires_at.is_none());
        assert!(creds.has_required_scope());
    }

    #[test]
    fn test_parse_garbage() {
        assert!(matches!(
            parse_credentials("not json", CredentialSource::File),
            Err(ParseError::Json(_))
        ));
        assert!(matches!(
            parse_credentials("{}", CredentialSource::File),
            Err(ParseError::NoUsageData(_))
        ));
    }

    #[test]
    fn test_expiry_margin() {
        let creds = parse_credentials(WRAPPED, CredentialSource::File).unwrap();
        let expiry = creds.expires_at.unwrap();
        assert!(!creds.is_expired_at(expiry - Duration::minutes(10)));
        assert!(creds.is_expired_at(expiry - Duration::minutes(2)));
        assert!(matches!(
            creds.ensure_usable(expiry),
            Err(FetchError::TokenMissing(_))
        ));
    }

    #[test]
    fn test_missing_scope_is_unusable() {
        let json = r#"{"accessToken": "tok", "scopes": ["user:inference"]}"#;
        let creds = parse_credentials(json, CredentialSource::File).unwrap();
        assert!(!creds.has_required_scope());
        assert!(creds.ensure_usable(Utc::now()).is_err());
    }

    #[test]
    fn test_debug_hides_token() {
        let creds = parse_credentials(WRAPPED, CredentialSource::File).unwrap();
        assert!(!format!("{creds:?}").contains("sk-ant"));
    }

    #[test]
    fn test_file_debug_hides_token() {
        let file: CredentialsFile = serde_json::from_str(WRAPPED).unwrap();
        let shown = format!("{file:?}");
        assert!(shown.contains("subscription_type"));
        assert!(!shown.contains("sk-ant"));
    }

    #[tokio::test]
    async fn test_load_from_credentials_file() {
        let home = TempDir::new().unwrap();
        let dir = home.path().join(".claude");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(".credentials.json"), WRAPPED).unwrap();

        let ctx = ctx_with(MemoryCredentialStore::new());
        let creds = load_credentials(&ctx, Some(home.path()), false).await.unwrap();
        assert_eq!(creds.source, CredentialSource::File);
        assert_eq!(creds.access_token, "sk-ant-oat01-abc");
        assert_eq!(creds.scopes, vec!["user:inference", "user:profile"]);
        assert_eq!(creds.plan_name().as_deref(), Some("Max"));
    }

    #[tokio::test]
    async fn test_load_prefers_file() {
        let home = TempDir::new().unwrap();
        let dir = home.path().join(".claude");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(".credentials.json"), WRAPPED).unwrap();

        let store = MemoryCredentialStore::new().insert(KEYCHAIN_SERVICE, "me", r#"{"accessToken":"kc"}"#);
        let ctx = ctx_with(store);
        let creds = load_credentials(&ctx, Some(home.path()), true).await.unwrap();
        assert_eq!(creds.source, CredentialSource::File);
    }

    #[tokio::test]
    async fn test_load_falls_back_to_keychain() {
        let home = TempDir::new().unwrap();
        let store = MemoryCredentialStore::new().insert(KEYCHAIN_SERVICE, "me", r#"{"accessToken":"kc"}"#);
        let ctx = ctx_with(store);

        let creds = load_credentials(&ctx, Some(home.path()), true).await.unwrap();
        assert_eq!(creds.source, CredentialSource::Keychain);
        assert_eq!(creds.access_token, "kc");

        let err = load_credentials(&ctx, Some(home.path()), false).await.unwrap_err();
        assert!(matches!(err, FetchError::TokenMissing(_)));
    }

    #[tokio::test]
    async fn test_keychain_denial_is_token_missing() {
        let home = TempDir::new().unwrap();
        let ctx = ctx_with(MemoryCredentialStore::new().deny_service(KEYCHAIN_SERVICE));
        let err = load_credentials(&ctx, Some(home.path()), true).await.unwrap_err();
        assert!(matches!(err, FetchError::TokenMissing(ref m) if m.contains("denied")));
    }

    #[tokio::test]
    async fn test_config_dir_env_override() {
        let root = TempDir::new().unwrap();
        std::fs::write(root.path().join(".credentials.json"), WRAPPED).unwrap();
        let ctx = FetchContext::builder()
            .env(HashMap::from([(
                CONFIG_DIR_ENV.to_string(),
                root.path().display().to_string(),
            )]))
            .credentials(Arc::new(MemoryCredentialStore::new()))
            .build();
        let creds = load_credentials(&ctx, None, false).await.unwrap();
        assert_eq!(creds.source, CredentialSource::File);
    }
}
