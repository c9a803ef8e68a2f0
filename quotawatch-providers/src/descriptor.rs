//! Provider descriptor system.
//!
//! A descriptor holds everything static about a provider:
//! - Metadata (display name, window labels, dashboard URL)
//! - Supported source modes
//! - Strategy resolution (which strategies run, in which order)
//! - CLI binary configuration

use quotawatch_core::{ProviderKind, ProviderMetadata};
use quotawatch_fetch::{FetchContext, FetchPipeline, FetchStrategy, SourceMode};

/// Resolves the ordered strategy list for a context.
///
/// Must be a pure function of the context: no I/O, and the same context
/// always yields the same order.
pub type ResolveFn = fn(&FetchContext) -> Vec<Box<dyn FetchStrategy>>;

// ============================================================================
// Provider Descriptor
// ============================================================================

/// Complete static description of a provider.
pub struct ProviderDescriptor {
    /// Provider identifier.
    pub id: ProviderKind,
    /// Display metadata.
    pub metadata: ProviderMetadata,
    /// Source modes the user may pick, `Auto` first.
    pub source_modes: &'static [SourceMode],
    /// Strategy resolution.
    pub resolve: ResolveFn,
    /// CLI binary configuration.
    pub cli: CliConfig,
}

impl ProviderDescriptor {
    /// Returns the display name.
    pub fn display_name(&self) -> &str {
        self.metadata.display_name
    }

    /// Returns the CLI name used on the command line.
    pub fn cli_name(&self) -> &str {
        self.cli.name
    }

    /// Returns true if the provider accepts `mode`.
    pub fn supports(&self, mode: SourceMode) -> bool {
        self.source_modes.contains(&mode)
    }

    /// Resolves strategies for `ctx` in fetch order.
    pub fn strategies(&self, ctx: &FetchContext) -> Vec<Box<dyn FetchStrategy>> {
        (self.resolve)(ctx)
    }

    /// Builds the fetch pipeline for `ctx`.
    pub fn build_pipeline(&self, ctx: &FetchContext) -> FetchPipeline {
        FetchPipeline::with_strategies(self.strategies(ctx))
    }
}

impl std::fmt::Debug for ProviderDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderDescriptor")
            .field("id", &self.id)
            .field("source_modes", &self.source_modes)
            .field("cli", &self.cli)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// CLI Config
// ============================================================================

/// How the provider's own CLI is found and identified.
#[derive(Debug, Clone, Copy)]
pub struct CliConfig {
    /// Name used for `--provider` and as the binary name.
    pub name: &'static str,
    /// Alternative names accepted on the command line.
    pub aliases: &'static [&'static str],
    /// Binary to look for on PATH, if the provider ships one.
    pub binary: Option<&'static str>,
    /// Arguments that print the binary's version.
    pub version_args: &'static [&'static str],
}

impl CliConfig {
    /// A provider with no local binary.
    pub const fn named(name: &'static str, aliases: &'static [&'static str]) -> Self {
        Self {
            name,
            aliases,
            binary: None,
            version_args: &[],
        }
    }

    /// A provider whose binary is `binary`, queried with `--version`.
    pub const fn with_binary(
        name: &'static str,
        aliases: &'static [&'static str],
        binary: &'static str,
    ) -> Self {
        Self {
            name,
            aliases,
            binary: Some(binary),
            version_args: &["--version"],
        }
    }

    /// Returns true if `name` matches the primary name or an alias.
    pub fn matches(&self, name: &str) -> bool {
        let name = name.trim();
        self.name.eq_ignore_ascii_case(name) || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(name))
    }
}
