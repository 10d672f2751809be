use std::sync::Arc;

use anyhow::{bail, Context};
use tracing_subscriber::EnvFilter;

use tikidan_api::config;
use tikidan_api::database::DatabaseManager;
use tikidan_api::server::{app, AppState};
use tikidan_api::services::SystemClock;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    let config = config::config();
    let default_filter = if tikidan_api::is_production!() {
        "tikidan_api=info,tower_http=info"
    } else {
        "tikidan_api=debug,tower_http=debug"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .init();

    tracing::info!("Starting Tikidan API in {:?} mode", config.environment);

    if config.security.jwt_secret.is_empty() {
        bail!("JWT_SECRET must be set");
    }

    let store = DatabaseManager::open_store(&config.database)
        .await
        .context("failed to open document store")?;
    let state = AppState::new(store, Arc::new(SystemClock), config.tracking.clone());

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Tikidan API listening on http://{}", bind_addr);

    axum::serve(listener, app(state, config)).await.context("server error")?;
    Ok(())
}
