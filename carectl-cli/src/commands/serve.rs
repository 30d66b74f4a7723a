//! HTTP server command

use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::Parser;

use carectl_core::CareConfig;
use carectl_server::http::auth::JwtKeys;
use carectl_server::{migrations, run_server, AppState, ServerConfig};

#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Address to bind to (overrides server.bind)
    #[arg(long, short = 'b')]
    pub bind: Option<SocketAddr>,

    /// Allow permissive CORS (all origins) - use with caution
    #[arg(long)]
    pub cors_permissive: bool,

    /// Database URL (overrides config/environment)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Skip applying the schema on startup
    #[arg(long)]
    pub no_migrate: bool,
}

pub async fn run_serve(args: ServeArgs) -> Result<()> {
    let config = CareConfig::load_with(|c| {
        if let Some(bind) = args.bind {
            c.server.bind = bind.to_string();
        }
        if let Some(url) = &args.database_url {
            c.database.url = url.clone();
        }
        if args.cors_permissive {
            c.server.cors_permissive = true;
        }
    })
    .context("Failed to load configuration")?;

    let pool = super::connect(&config).await?;
    if !args.no_migrate {
        migrations::run(&pool)
            .await
            .context("Failed to apply database schema")?;
    }

    let state = AppState {
        pool,
        keys: JwtKeys::new(config.auth.jwt_secret.as_bytes(), config.auth.token_ttl_minutes),
        expiry_window_days: config.pharmacy.expiry_window_days,
    };
    let server = ServerConfig {
        bind_addr: config.bind_addr()?,
        cors_permissive: config.server.cors_permissive,
    };

    tracing::info!(bind = %server.bind_addr, "starting carectl server");
    run_server(state, server).await.context("Server error")?;
    Ok(())
}
