//! Command implementations for the carectl CLI

pub mod admin;
pub mod alerts;
pub mod config;
pub mod serve;

pub use admin::{run_bootstrap_admin, run_migrate};
pub use alerts::run_alerts;
pub use config::run_config;
pub use serve::run_serve;

use anyhow::{Context, Result};
use carectl_core::CareConfig;
use carectl_server::db::create_pool_with_options;
use sqlx::PgPool;

/// Pool for commands that only need the database.
async fn connect(config: &CareConfig) -> Result<PgPool> {
    create_pool_with_options(&config.database.url, config.database.max_connections)
        .await
        .context("Failed to connect to the database")
}
