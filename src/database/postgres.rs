use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgPool};
use sqlx::query::Query;
use sqlx::types::Json;
use sqlx::{PgExecutor, Postgres, Row, Transaction};
use uuid::Uuid;

use super::manager::DatabaseManager;
use super::store::{document_id, Collection, Document, DocumentStore, StoreError, StoreTransaction};
use crate::filter::{Filter, FilterData, SqlResult};

/// `DocumentStore` over a single Postgres table of JSONB documents
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Bind `$1` to the collection name and the filter's JSONB values after it
fn bind_filter<'q>(sql: &'q SqlResult, collection: Collection) -> Query<'q, Postgres, PgArguments> {
    let mut query = sqlx::query(&sql.query).bind(collection.name());
    for param in &sql.params {
        query = query.bind(Json(param));
    }
    query
}

async fn select_docs<'c, E>(executor: E, collection: Collection, filter: FilterData) -> Result<Vec<Document>, StoreError>
where
    E: PgExecutor<'c>,
{
    let sql = Filter::from_data(collection.name(), filter)?.to_sql()?;
    let rows = bind_filter(&sql, collection).fetch_all(executor).await?;
    rows.iter()
        .map(|row| -> Result<Document, StoreError> {
            let Json(doc): Json<Document> = row.try_get("body")?;
            Ok(doc)
        })
        .collect()
}

async fn delete_docs<'c, E>(executor: E, collection: Collection, filter: FilterData) -> Result<u64, StoreError>
where
    E: PgExecutor<'c>,
{
    let sql = Filter::from_data(collection.name(), filter)?.to_delete_sql()?;
    let result = bind_filter(&sql, collection).execute(executor).await?;
    Ok(result.rows_affected())
}

async fn insert_doc<'c, E>(executor: E, collection: Collection, doc: Document) -> Result<(), StoreError>
where
    E: PgExecutor<'c>,
{
    let id = document_id(collection, &doc)?;
    let result = sqlx::query("INSERT INTO documents (collection, id, body) VALUES ($1, $2, $3)")
        .bind(collection.name())
        .bind(id)
        .bind(Json(&doc))
        .execute(executor)
        .await;

    match result {
        Ok(_) => Ok(()),
        Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(StoreError::Duplicate { collection, id }),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn find(&self, collection: Collection, filter: FilterData) -> Result<Vec<Document>, StoreError> {
        select_docs(&self.pool, collection, filter).await
    }

    async fn count(&self, collection: Collection, filter: FilterData) -> Result<u64, StoreError> {
        let filter = FilterData { where_clause: filter.where_clause, ..Default::default() };
        let sql = Filter::from_data(collection.name(), filter)?.to_count_sql()?;
        let row = bind_filter(&sql, collection).fetch_one(&self.pool).await?;
        let count: i64 = row.try_get("count")?;
        Ok(count.max(0) as u64)
    }

    async fn insert(&self, collection: Collection, doc: Document) -> Result<(), StoreError> {
        insert_doc(&self.pool, collection, doc).await
    }

    async fn replace(&self, collection: Collection, doc: Document) -> Result<bool, StoreError> {
        let id = document_id(collection, &doc)?;
        let result = sqlx::query(
            "UPDATE documents SET body = $3, updated_at = now() WHERE collection = $1 AND id = $2",
        )
        .bind(collection.name())
        .bind(id)
        .bind(Json(&doc))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_many(&self, collection: Collection, filter: FilterData) -> Result<u64, StoreError> {
        delete_docs(&self.pool, collection, filter).await
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgStoreTransaction { tx }))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        DatabaseManager::health_check(&self.pool).await
    }
}

/// Wraps a `sqlx::Transaction`; sqlx rolls it back when dropped uncommitted
pub struct PgStoreTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PgStoreTransaction {
    async fn find(&mut self, collection: Collection, filter: FilterData) -> Result<Vec<Document>, StoreError> {
        select_docs(&mut *self.tx, collection, filter).await
    }

    async fn insert(&mut self, collection: Collection, doc: Document) -> Result<(), StoreError> {
        insert_doc(&mut *self.tx, collection, doc).await
    }

    async fn delete_many(&mut self, collection: Collection, filter: FilterData) -> Result<u64, StoreError> {
        delete_docs(&mut *self.tx, collection, filter).await
    }

    async fn lock_id(&mut self, collection: Collection, id: Uuid) -> Result<Option<Document>, StoreError> {
        let row = sqlx::query("SELECT body FROM documents WHERE collection = $1 AND id = $2 FOR UPDATE")
            .bind(collection.name())
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        match row {
            Some(row) => {
                let Json(doc): Json<Document> = row.try_get("body")?;
                Ok(Some(doc))
            }
            None => Ok(None),
        }
    }

    async fn find_by_id_and_delete(&mut self, collection: Collection, id: Uuid) -> Result<Option<Document>, StoreError> {
        let row = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2 RETURNING body")
            .bind(collection.name())
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        match row {
            Some(row) => {
                let Json(doc): Json<Document> = row.try_get("body")?;
                Ok(Some(doc))
            }
            None => Ok(None),
        }
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn abort(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
