//! OS credential storage.
//!
//! Strategies read secrets (browser "Safe Storage" keys, CLI OAuth blobs)
//! through the narrow [`CredentialStore`] trait so the gating policy around
//! them can be tested against [`MemoryCredentialStore`].
//!
//! The system backend uses the `keyring` crate:
//! - macOS: Keychain Services
//! - Windows: Credential Manager
//! - Linux: Secret Service (GNOME Keyring, KDE Wallet)

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use keyring::Entry;
use tracing::{debug, warn};

use crate::error::CredentialError;

// ============================================================================
// Credential Store Trait
// ============================================================================

/// API for secure credential storage.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Reads a credential.
    ///
    /// Returns `Ok(None)` when no entry exists. A refused prompt is
    /// `Err(CredentialError::AccessDenied)`.
    async fn read(&self, service: &str, account: &str) -> Result<Option<String>, CredentialError>;

    /// Stores a credential.
    async fn write(&self, service: &str, account: &str, secret: &str)
    -> Result<(), CredentialError>;

    /// Deletes a credential. Deleting a missing entry succeeds.
    async fn delete(&self, service: &str, account: &str) -> Result<(), CredentialError>;

    /// Check if a credential exists.
    async fn exists(&self, service: &str, account: &str) -> bool {
        matches!(self.read(service, account).await, Ok(Some(_)))
    }
}

// ============================================================================
// System Keychain Implementation
// ============================================================================

/// Credential store backed by the platform keychain.
///
/// Without a namespace, service names are used verbatim, which is what
/// reading another application's item (e.g. "Chrome Safe Storage")
/// requires. With a namespace, services become `"{namespace}:{service}"`.
#[derive(Debug, Clone, Default)]
pub struct SystemKeychain {
    namespace: Option<String>,
}

impl SystemKeychain {
    /// Creates a keychain that uses service names verbatim.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a keychain that prefixes every service name.
    pub fn namespaced(namespace: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
        }
    }

    fn full_service(&self, service: &str) -> String {
        match &self.namespace {
            Some(ns) => format!("{ns}:{service}"),
            None => service.to_string(),
        }
    }

    /// Runs a blocking keyring call off the async runtime.
    async fn with_entry<T, F>(&self, service: &str, account: &str, op: F) -> Result<T, CredentialError>
    where
        T: Send + 'static,
        F: FnOnce(Entry) -> Result<T, keyring::Error> + Send + 'static,
    {
        let service = self.full_service(service);
        let account = account.to_string();
        tokio::task::spawn_blocking(move || {
            let entry = Entry::new(&service, &account)?;
            op(entry)
        })
        .await
        .map_err(|e| CredentialError::Other(format!("keychain task failed: {e}")))?
        .map_err(CredentialError::from)
    }
}

#[async_trait]
impl CredentialStore for SystemKeychain {
    async fn read(&self, service: &str, account: &str) -> Result<Option<String>, CredentialError> {
        debug!(service = %service, "Reading credential");
        let result = self
            .with_entry(service, account, |entry| match entry.get_password() {
                Ok(secret) if !secret.is_empty() => Ok(Some(secret)),
                Ok(_) | Err(keyring::Error::NoEntry) => Ok(None),
                Err(e) => Err(e),
            })
            .await;
        if let Err(e) = &result {
            warn!(service = %service, error = %e, "Failed to read credential");
        }
        result
    }

    async fn write(
        &self,
        service: &str,
        account: &str,
        secret: &str,
    ) -> Result<(), CredentialError> {
        debug!(service = %service, "Writing credential");
        let secret = secret.to_string();
        self.with_entry(service, account, move |entry| entry.set_password(&secret))
            .await
    }

    async fn delete(&self, service: &str, account: &str) -> Result<(), CredentialError> {
        debug!(service = %service, "Deleting credential");
        self.with_entry(service, account, |entry| match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e),
        })
        .await
    }
}

// ============================================================================
// In-Memory Implementation
// ============================================================================

/// In-memory credential store.
///
/// Services marked with [`deny_service`](Self::deny_service) answer every
/// read with `AccessDenied`, the way a keychain does when the user clicks
/// "Deny". Every read is counted, so tests can assert that a prompt was
/// not raised.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    entries: Mutex<HashMap<(String, String), String>>,
    denied: Mutex<HashSet<String>>,
    reads: AtomicUsize,
}

impl MemoryCredentialStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry.
    #[must_use]
    pub fn insert(self, service: &str, account: &str, secret: &str) -> Self {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((service.to_string(), account.to_string()), secret.to_string());
        self
    }

    /// Makes every read of `service` fail with `AccessDenied`.
    #[must_use]
    pub fn deny_service(self, service: &str) -> Self {
        self.denied
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(service.to_string());
        self
    }

    /// Returns how many reads were attempted.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn read(&self, service: &str, account: &str) -> Result<Option<String>, CredentialError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self
            .denied
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(service)
        {
            return Err(CredentialError::AccessDenied);
        }
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(service.to_string(), account.to_string()))
            .cloned())
    }

    async fn write(
        &self,
        service: &str,
        account: &str,
        secret: &str,
    ) -> Result<(), CredentialError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((service.to_string(), account.to_string()), secret.to_string());
        Ok(())
    }

    async fn delete(&self, service: &str, account: &str) -> Result<(), CredentialError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(service.to_string(), account.to_string()));
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
