use std::sync::Arc;

use anyhow::Context;
use serde_json::json;
use uuid::Uuid;

use crate::cli::{utils::output_success, OutputFormat};
use crate::config::AppConfig;
use crate::database::DatabaseManager;
use crate::services::{LocationService, SystemClock};

pub async fn handle(config: &AppConfig, employee: Uuid, output_format: OutputFormat) -> anyhow::Result<()> {
    let store = DatabaseManager::open_store(&config.database).await.context("opening document store")?;
    let locations = LocationService::new(store, Arc::new(SystemClock), config.tracking.clone());
    let removed = locations.purge(employee).await?;

    output_success(
        output_format,
        &format!("Removed {} location samples of {}", removed, employee),
        Some(json!({ "employee": employee, "deleted": removed })),
    )
}
