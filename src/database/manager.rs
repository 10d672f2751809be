use std::sync::Arc;
use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::{info, warn};

use super::memory::MemoryStore;
use super::postgres::PgDocumentStore;
use super::store::{DocumentStore, StoreError};
use crate::config::{DatabaseConfig, StoreBackend};

/// Schema for the documents table. Every statement is idempotent.
const MIGRATIONS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS documents (
        collection TEXT NOT NULL,
        id UUID NOT NULL,
        body JSONB NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        PRIMARY KEY (collection, id)
    )",
    "CREATE INDEX IF NOT EXISTS documents_client_idx ON documents (collection, (body->'client'))",
    "CREATE INDEX IF NOT EXISTS documents_branch_location_idx ON documents (collection, (body->'branch_location'))",
    "CREATE INDEX IF NOT EXISTS documents_created_by_idx ON documents (collection, (body->'created_by'))",
    "CREATE INDEX IF NOT EXISTS documents_employee_time_idx ON documents (collection, (body->'employee'), (body->'timestamp'))",
    "CREATE UNIQUE INDEX IF NOT EXISTS users_email_idx ON documents ((body->'email')) WHERE collection = 'users'",
];

/// Opens the configured store and owns the Postgres pool lifecycle
pub struct DatabaseManager;

impl DatabaseManager {
    /// Build the store selected by `database.backend`
    pub async fn open_store(config: &DatabaseConfig) -> Result<Arc<dyn DocumentStore>, StoreError> {
        match config.backend {
            StoreBackend::Memory => {
                warn!("Using in-memory document store; data is lost on restart");
                Ok(Arc::new(MemoryStore::new()))
            }
            StoreBackend::Postgres => {
                let pool = Self::connect(config).await?;
                Self::migrate(&pool).await?;
                Ok(Arc::new(PgDocumentStore::new(pool)))
            }
        }
    }

    pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, StoreError> {
        let url = config.url.as_deref().ok_or(StoreError::ConfigMissing("DATABASE_URL"))?;
        let redacted = Self::redacted_url(url)?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_secs))
            .connect(url)
            .await?;

        info!("Created database pool for: {}", redacted);
        Ok(pool)
    }

    pub async fn migrate(pool: &PgPool) -> Result<(), StoreError> {
        for statement in MIGRATIONS {
            sqlx::query(statement).execute(pool).await?;
        }
        info!("Applied {} schema statements", MIGRATIONS.len());
        Ok(())
    }

    /// Pings the pool to ensure connectivity
    pub async fn health_check(pool: &PgPool) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(pool).await?;
        Ok(())
    }

    /// Connection string safe for logs: password removed
    fn redacted_url(raw: &str) -> Result<String, StoreError> {
        let mut url = url::Url::parse(raw).map_err(|_| StoreError::InvalidDatabaseUrl)?;
        if url.password().is_some() {
            url.set_password(Some("***")).map_err(|_| StoreError::InvalidDatabaseUrl)?;
        }
        Ok(url.into())
    }
}
