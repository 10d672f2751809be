use anyhow::{bail, Context};
use serde_json::json;

use crate::cli::{utils::output_success, OutputFormat};
use crate::config::{DatabaseConfig, StoreBackend};
use crate::database::DatabaseManager;

pub async fn handle(config: &DatabaseConfig, output_format: OutputFormat) -> anyhow::Result<()> {
    if config.backend == StoreBackend::Memory {
        bail!("migrate needs a Postgres backend; set DATABASE_URL");
    }

    let pool = DatabaseManager::connect(config).await.context("connecting to Postgres")?;
    DatabaseManager::migrate(&pool).await.context("applying schema")?;
    pool.close().await;

    output_success(output_format, "Schema is up to date", Some(json!({ "table": "documents" })))
}
