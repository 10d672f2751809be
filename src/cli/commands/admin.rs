use std::sync::Arc;

use anyhow::Context;

use crate::cli::{utils::output_success, OutputFormat};
use crate::config::{AppConfig, StoreBackend};
use crate::database::DatabaseManager;
use crate::services::{SystemClock, UserService};

pub async fn handle(
    config: &AppConfig,
    name: String,
    email: String,
    password: String,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    if config.database.backend == StoreBackend::Memory {
        tracing::warn!("The in-memory store is discarded when this command exits");
    }

    let store = DatabaseManager::open_store(&config.database).await.context("opening document store")?;
    let users = UserService::new(store, Arc::new(SystemClock), config.tracking.clone());
    let profile = users.create_admin(name, email, password).await?;

    output_success(
        output_format,
        &format!("Administrator {} created", profile.email),
        Some(serde_json::to_value(&profile)?),
    )
}
