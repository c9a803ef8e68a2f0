//! Codex CLI authentication file.
//!
//! `codex login` writes `~/.codex/auth.json` (or `$CODEX_HOME/auth.json`):
//!
//! ```json
//! {
//!   "OPENAI_API_KEY": null,
//!   "tokens": {
//!     "id_token": "eyJ...",
//!     "access_token": "eyJ...",
//!     "refresh_token": "...",
//!     "account_id": "..."
//!   },
//!   "last_refresh": "2025-01-05T12:00:00Z"
//! }
//! ```
//!
//! The ID token is a JWT whose payload names the account and plan. Its
//! signature is not checked: the claims are only displayed.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use quotawatch_core::ParseError;
use quotawatch_fetch::{FetchContext, FetchError};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

use crate::common::config_dir;

/// Environment variable that relocates the Codex home directory.
pub const CODEX_HOME_ENV: &str = "CODEX_HOME";

const AUTH_FILE: &str = "auth.json";

// ============================================================================
// Auth File
// ============================================================================

/// Parsed `auth.json`.
#[derive(Clone, Default, Deserialize)]
pub struct AuthFile {
    /// API key login, when the user chose one instead of ChatGPT.
    #[serde(default, rename = "OPENAI_API_KEY")]
    pub api_key: Option<String>,
    /// ChatGPT login tokens.
    #[serde(default)]
    pub tokens: Option<AuthTokens>,
}

/// ChatGPT login tokens.
#[derive(Clone, Default, Deserialize)]
pub struct AuthTokens {
    /// JWT with account claims.
    #[serde(default)]
    pub id_token: Option<String>,
    /// Bearer token for the ChatGPT backend.
    #[serde(default)]
    pub access_token: Option<String>,
    /// ChatGPT account the tokens belong to.
    #[serde(default)]
    pub account_id: Option<String>,
}

impl AuthFile {
    /// Returns the access token, if the file holds a ChatGPT login.
    pub fn access_token(&self) -> Option<&str> {
        self.tokens
            .as_ref()?
            .access_token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
    }

    /// Returns the ChatGPT account ID.
    pub fn account_id(&self) -> Option<&str> {
        self.tokens.as_ref()?.account_id.as_deref()
    }

    /// Decodes the ID token's claims.
    pub fn claims(&self) -> Option<IdClaims> {
        let token = self.tokens.as_ref()?.id_token.as_deref()?;
        decode_id_token(token)
            .inspect_err(|e| debug!(error = %e, "Ignoring undecodable ID token"))
            .ok()
    }
}

impl fmt::Debug for AuthFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthFile")
            .field("has_api_key", &self.api_key.is_some())
            .field("has_access_token", &self.access_token().is_some())
            .field("account_id", &self.account_id())
            .finish()
    }
}

/// Parses `auth.json` content.
///
/// # Errors
///
/// [`ParseError::Empty`] or [`ParseError::Json`].
pub fn parse_auth_file(raw: &str) -> Result<AuthFile, ParseError> {
    if raw.trim().is_empty() {
        return Err(ParseError::Empty);
    }
    Ok(serde_json::from_str(raw)?)
}

/// Path of `auth.json`, honoring `CODEX_HOME`.
pub fn auth_file_path(ctx: &FetchContext, home: Option<&Path>) -> Option<PathBuf> {
    config_dir(ctx.env_var(CODEX_HOME_ENV), home, ".codex").map(|d| d.join(AUTH_FILE))
}

/// Reads `auth.json`, returning `None` when there is no file.
///
/// This is a plain file read, cheap enough for availability checks.
pub fn read_auth_file(ctx: &FetchContext, home: Option<&Path>) -> Option<AuthFile> {
    let path = auth_file_path(ctx, home)?;
    let raw = std::fs::read_to_string(&path).ok()?;
    parse_auth_file(&raw)
        .inspect_err(|e| debug!(path = %path.display(), error = %e, "Unreadable auth.json"))
        .ok()
}

/// Loads the ChatGPT login for a fetch.
///
/// # Errors
///
/// [`FetchError::TokenMissing`] when there is no file or it holds only an
/// API key, [`FetchError::ParseFailed`] when the file is not valid JSON.
#[instrument(skip(ctx, home))]
pub async fn load_auth(ctx: &FetchContext, home: Option<&Path>) -> Result<AuthFile, FetchError> {
    let path = auth_file_path(ctx, home)
        .ok_or_else(|| FetchError::TokenMissing("cannot locate the Codex home".to_string()))?;
    let raw = match tokio::fs::read_to_string(&path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(FetchError::TokenMissing(format!(
                "{} not found; run `codex login`",
                path.display()
            )));
        }
        Err(e) => {
            return Err(FetchError::TokenMissing(format!(
                "cannot read {}: {e}",
                path.display()
            )));
        }
    };
    let auth = parse_auth_file(&raw)?;
    if auth.access_token().is_none() {
        return Err(FetchError::TokenMissing(
            "Codex is not signed in with ChatGPT".to_string(),
        ));
    }
    Ok(auth)
}

// ============================================================================
// ID Token
// ============================================================================

/// Claims read from the ID token.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdClaims {
    /// Account email.
    #[serde(default)]
    pub email: Option<String>,
    /// Expiry, epoch seconds.
    #[serde(default)]
    pub exp: Option<i64>,
    /// OpenAI-specific claims.
    #[serde(default, rename = "https://api.openai.com/auth")]
    pub openai: Option<OpenAiClaims>,
}

/// The `https://api.openai.com/auth` claim.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenAiClaims {
    /// ChatGPT plan, e.g. "plus" or "pro".
    #[serde(default)]
    pub chatgpt_plan_type: Option<String>,
}

impl IdClaims {
    /// Returns the plan type, if present.
    pub fn plan(&self) -> Option<&str> {
        self.openai.as_ref()?.chatgpt_plan_type.as_deref()
    }
}

/// Decodes the payload of a JWT without verifying it.
///
/// # Errors
///
/// [`ParseError::InvalidValue`] for a malformed token.
pub fn decode_id_token(token: &str) -> Result<IdClaims, ParseError> {
    let mut parts = token.split('.');
    let payload = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(_), Some(payload), Some(_), None) => payload,
        _ => return Err(ParseError::invalid("id_token", "expected three segments")),
    };
    let trimmed = payload.trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD
        .decode(trimmed)
        .or_else(|_| STANDARD.decode(payload))
        .map_err(|e| ParseError::invalid("id_token", e.to_string()))?;
    Ok(serde_json::from_slice(&bytes)?)
}
