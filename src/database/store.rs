use std::fmt;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::filter::{FilterData, FilterError};

/// A stored document: a JSON object that always carries an `"id"` field
pub type Document = Map<String, Value>;

/// Errors raised by any `DocumentStore` implementation
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error("Invalid filter: {0}")]
    Filter(#[from] FilterError),

    #[error("Malformed document in {collection}: {message}")]
    MalformedDocument { collection: Collection, message: String },

    #[error("Document {id} already exists in {collection}")]
    Duplicate { collection: Collection, id: Uuid },

    #[error("Store fault on {collection}: {message}")]
    Fault { collection: Collection, message: String },

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl StoreError {
    /// True when the backend itself could not be reached
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            StoreError::Sqlx(sqlx::Error::PoolTimedOut)
                | StoreError::Sqlx(sqlx::Error::PoolClosed)
                | StoreError::Sqlx(sqlx::Error::Io(_))
        )
    }
}

/// The collections of the CRM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Users,
    Clients,
    BranchLocations,
    ContactPersons,
    Meetings,
    Projects,
    Expenses,
    LocationSamples,
}

impl Collection {
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Clients => "clients",
            Collection::BranchLocations => "branch_locations",
            Collection::ContactPersons => "contact_persons",
            Collection::Meetings => "meetings",
            Collection::Projects => "projects",
            Collection::Expenses => "expenses",
            Collection::LocationSamples => "location_samples",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Generic document store consumed by the services.
///
/// Writes outside `begin()` are applied immediately; multi-document mutations that
/// must be all-or-nothing go through a `StoreTransaction`.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find(&self, collection: Collection, filter: FilterData) -> Result<Vec<Document>, StoreError>;

    async fn count(&self, collection: Collection, filter: FilterData) -> Result<u64, StoreError>;

    async fn insert(&self, collection: Collection, doc: Document) -> Result<(), StoreError>;

    /// Replace the document with the same id; returns false when nothing matched
    async fn replace(&self, collection: Collection, doc: Document) -> Result<bool, StoreError>;

    async fn delete_many(&self, collection: Collection, filter: FilterData) -> Result<u64, StoreError>;

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

/// A multi-statement unit of work. Dropping it without `commit` rolls it back.
#[async_trait]
pub trait StoreTransaction: Send {
    async fn find(&mut self, collection: Collection, filter: FilterData) -> Result<Vec<Document>, StoreError>;

    async fn insert(&mut self, collection: Collection, doc: Document) -> Result<(), StoreError>;

    async fn delete_many(&mut self, collection: Collection, filter: FilterData) -> Result<u64, StoreError>;

    /// Read one document and hold an exclusive lock on it until the transaction ends
    async fn lock_id(&mut self, collection: Collection, id: Uuid) -> Result<Option<Document>, StoreError>;

    async fn find_by_id_and_delete(&mut self, collection: Collection, id: Uuid) -> Result<Option<Document>, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn abort(self: Box<Self>) -> Result<(), StoreError>;
}

/// Typed models persisted as documents
pub trait Entity: Serialize + DeserializeOwned + Send + Sync {
    const COLLECTION: Collection;

    fn id(&self) -> Uuid;
}

pub fn to_document<T: Entity>(entity: &T) -> Result<Document, StoreError> {
    match serde_json::to_value(entity) {
        Ok(Value::Object(map)) if map.contains_key("id") => Ok(map),
        Ok(_) => Err(StoreError::MalformedDocument {
            collection: T::COLLECTION,
            message: "entity must serialize to an object with an id".to_string(),
        }),
        Err(e) => Err(StoreError::MalformedDocument {
            collection: T::COLLECTION,
            message: e.to_string(),
        }),
    }
}

pub fn from_document<T: Entity>(doc: Document) -> Result<T, StoreError> {
    serde_json::from_value(Value::Object(doc)).map_err(|e| StoreError::MalformedDocument {
        collection: T::COLLECTION,
        message: e.to_string(),
    })
}

/// Read the `"id"` field of a raw document
pub fn document_id(collection: Collection, doc: &Document) -> Result<Uuid, StoreError> {
    doc.get("id")
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or_else(|| StoreError::MalformedDocument {
            collection,
            message: "document has no valid id".to_string(),
        })
}
