//! Provider registry.
//!
//! An explicit static table of descriptors, built once on first access.
//! Order is display order and stays stable between runs.

use quotawatch_core::ProviderKind;
use std::sync::OnceLock;

use crate::claude::claude_descriptor;
use crate::codex::codex_descriptor;
use crate::cursor::cursor_descriptor;
use crate::descriptor::ProviderDescriptor;
use crate::zai::zai_descriptor;

static DESCRIPTORS: OnceLock<Vec<ProviderDescriptor>> = OnceLock::new();

fn init_descriptors() -> Vec<ProviderDescriptor> {
    vec![
        claude_descriptor(),
        codex_descriptor(),
        cursor_descriptor(),
        zai_descriptor(),
    ]
}

// ============================================================================
// Provider Registry
// ============================================================================

/// Global registry of provider descriptors.
pub struct ProviderRegistry;

impl ProviderRegistry {
    /// Returns all provider descriptors.
    pub fn all() -> &'static [ProviderDescriptor] {
        DESCRIPTORS.get_or_init(init_descriptors)
    }

    /// Gets a provider descriptor by kind.
    pub fn get(id: ProviderKind) -> Option<&'static ProviderDescriptor> {
        Self::all().iter().find(|d| d.id == id)
    }

    /// Looks up a provider by CLI name or alias, case-insensitively.
    pub fn get_by_cli_name(name: &str) -> Option<&'static ProviderDescriptor> {
        Self::all().iter().find(|d| d.cli.matches(name))
    }

    /// Returns all provider kinds in registry order.
    pub fn kinds() -> Vec<ProviderKind> {
        Self::all().iter().map(|d| d.id).collect()
    }

    /// Returns the providers enabled when settings name none.
    pub fn default_enabled() -> Vec<&'static ProviderDescriptor> {
        Self::all()
            .iter()
            .filter(|d| d.metadata.default_enabled)
            .collect()
    }
}
