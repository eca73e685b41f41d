//! # agora-api: Binary Entry Point
//!
//! Starts the Axum HTTP server. Configuration comes from the environment:
//! `PORT`, `AUTH_TOKEN`, `DATABASE_URL`, `AGORA_LOG_FORMAT`, `RUST_LOG`.

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use agora_api::state::{AppConfig, AppState, LogFormat};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }

    if config.auth_token.is_none() {
        tracing::warn!("AUTH_TOKEN not set, authentication disabled; every request runs as tenant_admin of the default tenant");
    }
    tracing::info!(?config, "starting agora-api");

    let db_pool = agora_api::db::init_pool(config.database_url.as_deref())
        .await
        .context("database initialization failed")?;

    let port = config.port;
    let state = match db_pool {
        Some(pool) => AppState::with_database(config, pool)
            .await
            .context("ledger hydration failed")?,
        None => AppState::with_config(config),
    };

    let app = agora_api::app(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "agora-api listening");
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}
