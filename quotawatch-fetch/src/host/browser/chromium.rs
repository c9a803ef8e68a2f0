//! Chromium cookie value decryption.
//!
//! Values are AES-128-CBC with a 16-space IV under a key derived by
//! PBKDF2-HMAC-SHA1 (salt "saltysalt") from the browser's Safe Storage
//! password. The ciphertext carries a "v10" or "v11" prefix. On Linux, "v10"
//! values use the fixed password "peanuts"; "v11" values use the password
//! from the Secret Service.

use std::io::Write;
use std::num::NonZeroU32;
use std::process::{Command, Stdio};

use crate::error::BrowserError;

const SALT: &[u8] = b"saltysalt";
const IV: [u8; 16] = [b' '; 16];

/// PBKDF2 rounds used by Chromium on this platform.
pub(crate) const KEY_ITERATIONS: u32 = if cfg!(target_os = "macos") { 1003 } else { 1 };

/// Password Chromium on Linux uses for "v10" values.
const LINUX_V10_PASSWORD: &str = "peanuts";

/// Database schema version from which plaintexts start with a SHA-256 of
/// the cookie's host.
pub(crate) const HOST_HASH_SCHEMA_VERSION: i64 = 24;
const HOST_HASH_LEN: usize = 32;

/// Encryption scheme of one stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ValueVersion {
    V10,
    V11,
}

impl ValueVersion {
    pub(crate) fn detect(encrypted: &[u8]) -> Option<Self> {
        match encrypted.get(..3) {
            Some(b"v10") => Some(Self::V10),
            Some(b"v11") => Some(Self::V11),
            _ => None,
        }
    }

    /// Whether the password for this version lives in the credential store.
    pub(crate) fn needs_stored_password(self) -> bool {
        cfg!(target_os = "macos") || self == Self::V11
    }

    /// Fixed password for versions that do not use the credential store.
    pub(crate) fn fixed_password(self) -> Option<&'static str> {
        (!self.needs_stored_password()).then_some(LINUX_V10_PASSWORD)
    }
}

/// Derives the AES key from a Safe Storage password.
pub(crate) fn derive_key(password: &str) -> [u8; 16] {
    let mut key = [0u8; 16];
    let iterations = NonZeroU32::new(KEY_ITERATIONS).unwrap_or(NonZeroU32::MIN);
    ring::pbkdf2::derive(
        ring::pbkdf2::PBKDF2_HMAC_SHA1,
        iterations,
        SALT,
        password.as_bytes(),
        &mut key,
    );
    key
}

/// Decrypts one value. `schema_version` comes from the database's `meta`
/// table.
pub(crate) fn decrypt_value(
    encrypted: &[u8],
    key: &[u8; 16],
    schema_version: i64,
) -> Result<String, BrowserError> {
    if ValueVersion::detect(encrypted).is_none() {
        return Err(BrowserError::DecryptionFailed(
            "unknown encryption version".to_string(),
        ));
    }
    let mut plain = decrypt_aes_cbc(key, &IV, &encrypted[3..])?;
    if schema_version >= HOST_HASH_SCHEMA_VERSION {
        if plain.len() < HOST_HASH_LEN {
            return Err(BrowserError::DecryptionFailed(
                "value shorter than host hash".to_string(),
            ));
        }
        plain.drain(..HOST_HASH_LEN);
    }
    String::from_utf8(plain).map_err(|e| BrowserError::DecryptionFailed(format!("UTF-8 error: {e}")))
}

/// Decrypt data using AES-128-CBC through the system `openssl`.
///
/// Key material goes through environment variables rather than arguments so
/// it never shows up in process listings.
fn decrypt_aes_cbc(key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>, BrowserError> {
    let mut child = Command::new("sh")
        .arg("-c")
        .arg("openssl enc -d -aes-128-cbc -K \"$QW_AES_KEY\" -iv \"$QW_AES_IV\"")
        .env("QW_AES_KEY", hex::encode(key))
        .env("QW_AES_IV", hex::encode(iv))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| BrowserError::DecryptionFailed(format!("openssl unavailable: {e}")))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(data)
            .map_err(|e| BrowserError::DecryptionFailed(e.to_string()))?;
    }

    let output = child
        .wait_with_output()
        .map_err(|e| BrowserError::DecryptionFailed(e.to_string()))?;

    if output.status.success() {
        Ok(output.stdout)
    } else {
        Err(BrowserError::DecryptionFailed("bad key or padding".to_string()))
    }
}
