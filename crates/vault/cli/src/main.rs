//! vaultctl - drive the yield vault ledger from scenario scripts
//!
//! Scenarios are YAML step lists replayed against an in-memory ledger with
//! in-memory settlement and no-op protocol adapters. The report lists each step
//! outcome, final vault totals, settlement balances and published events.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use vault_engine::LedgerConfig;

mod commands;
mod error;
mod output;
mod script;

#[derive(Parser)]
#[command(name = "vaultctl")]
#[command(about = "Yield vault ledger scenario runner", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "VAULT_CONFIG")]
    config: Option<String>,

    /// Log level override (trace, debug, info, warn, error)
    #[arg(long, env = "VAULT_LOG_LEVEL")]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Output format (table, json, yaml)
    #[arg(short, long, default_value = "table")]
    output: output::OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a scenario script and print the resulting report
    Run {
        /// Path to the scenario YAML
        script: String,
    },

    /// Parse a scenario script without running it
    Validate {
        script: String,
    },

    /// Show the effective configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = LedgerConfig::load(cli.config.as_deref())?;
    init_tracing(
        cli.log_level.as_deref().unwrap_or(&config.logging.level),
        cli.json_logs || config.logging.json,
    );
    debug!(admin = %config.admin, custody = %config.custody, "Configuration loaded");

    let outcome = match cli.command {
        Commands::Run { script } => commands::run::execute(&script, config, cli.output),
        Commands::Validate { script } => commands::run::validate(&script),
        Commands::Config => commands::config::execute(&config, cli.output),
    };

    if let Err(err) = &outcome {
        output::print_error(&err.to_string());
    }
    Ok(outcome?)
}

fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| level.into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json().with_writer(std::io::stderr)).init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}
