// Lint configuration for this crate
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! quotawatch CLI - usage and quota telemetry from the command line.
//!
//! # Examples
//!
//! ```bash
//! # Usage for the enabled providers
//! quotawatch
//!
//! # One provider, forcing the CLI scrape
//! quotawatch usage --provider codex --source cli
//!
//! # JSON output
//! quotawatch --format json --pretty
//!
//! # Browser cookie access status, and clearing a cooldown
//! quotawatch browsers
//! quotawatch browsers --reset chrome
//! ```

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use commands::{browsers, check, config, providers, usage};

// ============================================================================
// CLI Definition
// ============================================================================

/// quotawatch CLI - usage and quota telemetry.
#[derive(Parser)]
#[command(name = "quotawatch")]
#[command(about = "Usage and quota telemetry for AI coding tool accounts")]
#[command(long_about = r#"
quotawatch reads how much of each account's rate-limit windows is used,
through OAuth tokens, browser sessions, the providers' own CLIs, or API keys.

Supported providers:
  • Claude (claude)
  • Codex (codex)
  • Cursor (cursor)
  • z.ai (zai)

Examples:
  quotawatch                          # Enabled providers
  quotawatch --provider all           # All providers
  quotawatch usage -p claude -v       # One provider, with the attempt trail
  quotawatch --format json            # JSON output
  quotawatch browsers                 # Cookie access status
"#)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run. If none, runs 'usage'.
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Output format (text or json).
    #[arg(long, short = 'f', default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Pretty-print JSON output.
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Provider to query ("all" for every provider).
    /// Can be comma-separated: "codex,claude"
    #[arg(long, short, global = true)]
    pub provider: Option<String>,

    /// Verbose output (debug logs and fetch attempts).
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Quiet mode (no logs, no error messages).
    #[arg(long, short, global = true)]
    pub quiet: bool,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Fetch current usage (default if no command specified).
    #[command(visible_alias = "u")]
    Usage(usage::UsageArgs),

    /// List available providers.
    #[command(visible_alias = "p")]
    Providers,

    /// Check provider CLIs and which strategies can run.
    Check,

    /// Show browser presence and cookie access cooldowns.
    #[command(visible_alias = "b")]
    Browsers(browsers::BrowsersArgs),

    /// Manage configuration.
    Config(config::ConfigArgs),
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable text with colors.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

/// CLI exit codes.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Success.
    Success = 0,
    /// General error.
    Error = 1,
    /// No provider returned usage.
    NoUsage = 2,
}

// ============================================================================
// Logging Setup
// ============================================================================

fn setup_logging(verbose: bool, quiet: bool) {
    if quiet {
        return;
    }

    let default = if verbose {
        "quotawatch=debug,info"
    } else {
        "quotawatch=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let result: Result<ExitCode> = match &cli.command {
        Some(Commands::Usage(args)) => usage::run(args, &cli).await,
        Some(Commands::Providers) => providers::run(&cli).map(|()| ExitCode::Success),
        Some(Commands::Check) => check::run(&cli).await.map(|()| ExitCode::Success),
        Some(Commands::Browsers(args)) => browsers::run(args, &cli).map(|()| ExitCode::Success),
        Some(Commands::Config(args)) => config::run(args, &cli).map(|()| ExitCode::Success),
        None => usage::run(&usage::UsageArgs::default(), &cli).await,
    };

    let code = match result {
        Ok(code) => code,
        Err(e) => {
            if !cli.quiet {
                eprintln!("Error: {e:#}");
            }
            ExitCode::Error
        }
    };

    if code != ExitCode::Success {
        std::process::exit(code as i32);
    }
}
