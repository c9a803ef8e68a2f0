//! Config command - manage configuration.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use quotawatch_core::ProviderKind;
use quotawatch_fetch::SourceMode;
use quotawatch_providers::ProviderRegistry;
use quotawatch_store::{
    Settings, default_config_dir, default_preferences_path, default_settings_path,
};
use serde_json::Value;
use std::path::Path;
use tracing::info;

use super::provider_by_name;
use crate::output::JsonFormatter;
use crate::{Cli, OutputFormat};

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config subcommands.
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration.
    Show,

    /// Show configuration paths.
    Path,

    /// Set how a provider is fetched.
    SetSource {
        /// Provider name.
        provider: String,
        /// auto, cli, web, oauth, or api.
        source: SourceMode,
    },

    /// Store an API token for a provider.
    SetToken {
        /// Provider name.
        provider: String,
        /// The token; omit together with --clear to remove it.
        token: Option<String>,
        /// Remove the stored token.
        #[arg(long, conflicts_with = "token")]
        clear: bool,
    },

    /// Enable a provider.
    Enable {
        /// Provider to enable.
        provider: String,
    },

    /// Disable a provider.
    Disable {
        /// Provider to disable.
        provider: String,
    },

    /// Reset to defaults.
    Reset,
}

/// Runs the config command.
pub fn run(args: &ConfigArgs, cli: &Cli) -> Result<()> {
    let path = default_settings_path();
    match &args.action {
        ConfigAction::Show => show_config(&path, cli),
        ConfigAction::Path => show_paths(cli),
        ConfigAction::SetSource { provider, source } => {
            let kind = provider_by_name(provider)?;
            set_source(&path, kind, *source)?;
            println!("{}: source set to {source}", kind.display_name());
            Ok(())
        }
        ConfigAction::SetToken {
            provider,
            token,
            clear,
        } => {
            let kind = provider_by_name(provider)?;
            if token.is_none() && !clear {
                anyhow::bail!("Provide a token, or --clear to remove the stored one");
            }
            set_token(&path, kind, token.as_deref())?;
            if token.is_some() {
                println!("{}: token stored", kind.display_name());
            } else {
                println!("{}: token removed", kind.display_name());
            }
            Ok(())
        }
        ConfigAction::Enable { provider } => {
            let kind = provider_by_name(provider)?;
            set_enabled(&path, kind, true)?;
            println!("Enabled: {}", kind.display_name());
            Ok(())
        }
        ConfigAction::Disable { provider } => {
            let kind = provider_by_name(provider)?;
            set_enabled(&path, kind, false)?;
            println!("Disabled: {}", kind.display_name());
            Ok(())
        }
        ConfigAction::Reset => reset_config(&path),
    }
}

// ============================================================================
// Edits
// ============================================================================

fn edit(path: &Path, apply: impl FnOnce(&mut Settings) -> Result<()>) -> Result<()> {
    let mut settings = Settings::load(path).context("failed to load settings")?;
    apply(&mut settings)?;
    settings.save(path).context("failed to save settings")?;
    Ok(())
}

fn set_source(path: &Path, provider: ProviderKind, mode: SourceMode) -> Result<()> {
    let desc = ProviderRegistry::get(provider)
        .ok_or_else(|| anyhow::anyhow!("Provider {provider} not registered"))?;
    if !desc.supports(mode) {
        let supported: Vec<_> = desc.source_modes.iter().map(SourceMode::as_str).collect();
        anyhow::bail!(
            "{} does not support source '{mode}' (supported: {})",
            desc.display_name(),
            supported.join(", ")
        );
    }
    edit(path, |s| {
        s.set_source_mode(provider, mode);
        Ok(())
    })?;
    info!(provider = %provider, source = %mode, "Source mode updated");
    Ok(())
}

fn set_token(path: &Path, provider: ProviderKind, token: Option<&str>) -> Result<()> {
    edit(path, |s| Ok(s.set_api_token(provider, token)?))?;
    info!(provider = %provider, cleared = token.is_none(), "API token updated");
    Ok(())
}

fn set_enabled(path: &Path, provider: ProviderKind, enabled: bool) -> Result<()> {
    edit(path, |s| {
        // An empty list means registry defaults; materialize them first.
        if s.enabled_providers.is_empty() {
            s.enabled_providers = ProviderRegistry::default_enabled()
                .iter()
                .map(|d| d.id)
                .collect();
        }
        s.enabled_providers.retain(|p| *p != provider);
        if enabled {
            s.enabled_providers.push(provider);
            s.enabled_providers.sort();
        }
        Ok(())
    })?;
    info!(provider = %provider, enabled, "Provider toggled");
    Ok(())
}

fn reset_config(path: &Path) -> Result<()> {
    if path.exists() {
        std::fs::remove_file(path)?;
        info!(path = %path.display(), "Settings reset");
        println!("Configuration reset to defaults");
    } else {
        println!("No configuration file to reset");
    }
    Ok(())
}

// ============================================================================
// Display
// ============================================================================

/// Settings as JSON with token values masked.
fn redacted(settings: &Settings) -> Result<Value> {
    let mut value = serde_json::to_value(settings)?;
    if let Some(Value::Object(tokens)) = value.get_mut("api_tokens") {
        for token in tokens.values_mut() {
            *token = Value::String("********".to_string());
        }
    }
    Ok(value)
}

fn show_config(path: &Path, cli: &Cli) -> Result<()> {
    let settings = Settings::load(path).context("failed to load settings")?;

    match cli.format {
        OutputFormat::Text => {
            println!("quotawatch configuration");
            println!("{}", "─".repeat(40));
            println!();
            println!("Providers:");
            for desc in ProviderRegistry::all() {
                let enabled = if settings.enabled_providers.is_empty() {
                    desc.metadata.default_enabled
                } else {
                    settings.is_enabled(desc.id)
                };
                let token = if settings.api_token(desc.id).is_some() {
                    ", token stored"
                } else {
                    ""
                };
                println!(
                    "  {} {:<8} source: {}{}",
                    if enabled { "•" } else { " " },
                    desc.display_name(),
                    settings.source_mode(desc.id),
                    token
                );
            }
            println!();
            println!("CLI timeout:     {}s", settings.cli_timeout().as_secs());
            println!("Web timeout:     {}s", settings.web_timeout().as_secs());
            println!("Access cooldown: {}h", settings.access_cooldown_hours);
            let order: Vec<_> = settings
                .browser_order()
                .iter()
                .map(|b| b.display_name())
                .collect();
            println!("Browser order:   {}", order.join(", "));
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&redacted(&settings)?)?);
        }
    }

    Ok(())
}

fn show_paths(cli: &Cli) -> Result<()> {
    let config_dir = default_config_dir();
    let settings_path = default_settings_path();
    let preferences_path = default_preferences_path();

    match cli.format {
        OutputFormat::Text => {
            println!("Config dir:       {}", config_dir.display());
            println!("Settings file:    {}", settings_path.display());
            println!("Preferences file: {}", preferences_path.display());
        }
        OutputFormat::Json => {
            let paths = serde_json::json!({
                "config_dir": config_dir.display().to_string(),
                "settings_file": settings_path.display().to_string(),
                "preferences_file": preferences_path.display().to_string(),
            });
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&paths)?);
        }
    }

    Ok(())
}
