//! CLI command implementations.

pub mod browsers;
pub mod check;
pub mod config;
pub mod providers;
pub mod usage;

use anyhow::{Context, Result};
use quotawatch_core::ProviderKind;
use quotawatch_fetch::{BrowserAccessGate, BrowserPresenceCache, FetchContext, FetchSettings};
use quotawatch_providers::ProviderRegistry;
use quotawatch_store::{FilePreferences, Settings};
use std::sync::Arc;

// ============================================================================
// Shared Host State
// ============================================================================

/// Host state shared by every fetch context in one invocation.
///
/// The gate and presence cache live for the whole process so a denial seen
/// by one provider's fetch is honoured by the next.
pub struct SharedHost {
    pub settings: Settings,
    pub gate: Arc<BrowserAccessGate>,
    pub presence: Arc<BrowserPresenceCache>,
}

impl SharedHost {
    /// Loads settings and opens the persisted cooldown store.
    pub fn load() -> Result<Self> {
        let settings = Settings::load_default().context("failed to load settings")?;
        Ok(Self::from_settings(settings, FilePreferences::open_default()))
    }

    /// Builds host state over an explicit preferences file.
    pub fn from_settings(settings: Settings, prefs: FilePreferences) -> Self {
        let cooldown = chrono::Duration::hours(i64::from(settings.access_cooldown_hours));
        let gate = BrowserAccessGate::new(Arc::new(prefs)).with_cooldown(cooldown);
        Self {
            settings,
            gate: Arc::new(gate),
            presence: Arc::new(BrowserPresenceCache::new()),
        }
    }

    /// A fresh context for one provider.
    pub fn context(&self, settings: FetchSettings) -> FetchContext {
        FetchContext::builder()
            .settings(settings)
            .access_gate(Arc::clone(&self.gate))
            .presence(Arc::clone(&self.presence))
            .build()
    }
}

// ============================================================================
// Provider Selection
// ============================================================================

/// Resolves `--provider` into provider kinds.
///
/// `None` means the providers enabled in settings, falling back to each
/// provider's own default.
pub fn select_providers(arg: Option<&str>, settings: &Settings) -> Result<Vec<ProviderKind>> {
    match arg.map(str::trim) {
        None | Some("") => {
            if settings.enabled_providers.is_empty() {
                Ok(ProviderRegistry::default_enabled()
                    .iter()
                    .map(|d| d.id)
                    .collect())
            } else {
                Ok(settings.enabled_providers.clone())
            }
        }
        Some(all) if all.eq_ignore_ascii_case("all") => Ok(ProviderRegistry::kinds()),
        Some(names) => {
            let mut providers = Vec::new();
            for name in names.split(',').map(str::trim).filter(|n| !n.is_empty()) {
                let Some(desc) = ProviderRegistry::get_by_cli_name(name) else {
                    anyhow::bail!("Unknown provider: {name}");
                };
                if !providers.contains(&desc.id) {
                    providers.push(desc.id);
                }
            }
            if providers.is_empty() {
                anyhow::bail!("No valid providers specified");
            }
            Ok(providers)
        }
    }
}

/// Resolves a single provider name.
pub fn provider_by_name(name: &str) -> Result<ProviderKind> {
    ProviderRegistry::get_by_cli_name(name)
        .map(|d| d.id)
        .ok_or_else(|| anyhow::anyhow!("Unknown provider: {name}"))
}
