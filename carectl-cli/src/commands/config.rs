//! Configuration inspection and scaffolding

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use carectl_core::CareConfig;

#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the effective configuration with secrets masked
    Show,
    /// Write a starter config file referencing environment variables
    Init,
    /// Show config file path
    Path,
}

pub fn run_config(args: ConfigArgs) -> Result<()> {
    match args.command {
        ConfigCommands::Show => run_show(),
        ConfigCommands::Init => run_init(),
        ConfigCommands::Path => {
            println!("{}", CareConfig::config_path().display());
            Ok(())
        }
    }
}

fn run_show() -> Result<()> {
    let config = CareConfig::load().context("Failed to load configuration")?;
    print!("{}", config.redacted().to_toml()?);
    Ok(())
}

fn run_init() -> Result<()> {
    let path = CareConfig::config_path();
    CareConfig::write_template(&path)
        .with_context(|| format!("Could not create {}", path.display()))?;
    println!("Wrote {}", path.display());
    println!("Set DATABASE_URL and CARECTL_JWT_SECRET before running `carectl serve`");
    Ok(())
}
