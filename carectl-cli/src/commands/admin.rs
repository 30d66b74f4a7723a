//! Schema and first-account setup

use anyhow::{bail, Context, Result};
use clap::Parser;

use carectl_core::models::{Email, Password, PersonName};
use carectl_core::{CareConfig, Role};
use carectl_server::db::{NewUser, UserRepo};
use carectl_server::http::auth::hash_password;
use carectl_server::migrations;

/// Environment variable holding the initial password, kept off the command line
pub const ADMIN_PASSWORD_ENV: &str = "CARECTL_ADMIN_PASSWORD";

#[derive(Parser, Debug)]
pub struct BootstrapArgs {
    /// Login email of the super-admin
    #[arg(long)]
    pub email: String,

    /// Display name
    #[arg(long, default_value = "Administrator")]
    pub name: String,
}

pub async fn run_migrate() -> Result<()> {
    let config = CareConfig::load_for_database().context("Failed to load configuration")?;
    let pool = super::connect(&config).await?;
    migrations::run(&pool)
        .await
        .context("Failed to apply database schema")?;
    println!("Schema is up to date");
    Ok(())
}

/// Refuses to run once any super-admin exists.
pub async fn run_bootstrap_admin(args: BootstrapArgs) -> Result<()> {
    let email = Email::new(&args.email)?;
    let name = PersonName::new(&args.name)?;
    let raw = std::env::var(ADMIN_PASSWORD_ENV)
        .with_context(|| format!("Set {} to the initial password", ADMIN_PASSWORD_ENV))?;
    let password = Password::new(&raw)?;

    let config = CareConfig::load_for_database().context("Failed to load configuration")?;
    let pool = super::connect(&config).await?;
    migrations::run(&pool)
        .await
        .context("Failed to apply database schema")?;

    let users = UserRepo::new(&pool);
    if users.count_with_role(Role::SuperAdmin).await? > 0 {
        bail!("A super-admin already exists; create further accounts through the API");
    }

    let user = users
        .create(NewUser {
            email,
            name,
            role: Role::SuperAdmin,
            password_hash: hash_password(&password)?,
            phone: None,
            department: None,
        })
        .await?;

    tracing::info!(user_id = %user.id, "super-admin created");
    println!("Created super-admin {} ({})", user.email, user.id);
    Ok(())
}
