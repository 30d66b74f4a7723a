//! carectl CLI - hospital management backend
//!
//! Entry point for the `carectl` binary:
//! - Run the HTTP API (`serve`)
//! - Apply the schema (`migrate`)
//! - Create the first super-admin account (`bootstrap-admin`)
//! - Print pharmacy alerts (`alerts`)
//! - Inspect or scaffold configuration (`config`)

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser, Debug)]
#[command(
    name = "carectl",
    author,
    version,
    about = "Hospital management backend: patients, appointments, pharmacy, staff and billing",
    long_about = "Run the carectl HTTP API and its maintenance tasks. Configuration comes from \
                  ~/.carectl/config.toml (or CARECTL_CONFIG) with environment overrides."
)]
struct Cli {
    /// Verbose logging (same as RUST_LOG=debug)
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API server
    Serve(commands::serve::ServeArgs),
    /// Create or update the database schema
    Migrate,
    /// Create the first super-admin account
    BootstrapAdmin(commands::admin::BootstrapArgs),
    /// Print low-stock and expiry alerts
    Alerts(commands::alerts::AlertsArgs),
    /// Show or scaffold configuration
    Config(commands::config::ConfigArgs),
}

fn init_tracing(debug: bool) -> Result<()> {
    let default = if debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_target(debug)
        .compact()
        .try_init()
        .map_err(|err| anyhow!(err))
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.debug).ok();

    match cli.command {
        Commands::Serve(args) => commands::run_serve(args).await?,
        Commands::Migrate => commands::run_migrate().await?,
        Commands::BootstrapAdmin(args) => commands::run_bootstrap_admin(args).await?,
        Commands::Alerts(args) => commands::run_alerts(args).await?,
        Commands::Config(args) => commands::run_config(args)?,
    }

    Ok(())
}
