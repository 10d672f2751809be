use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};
use tracing::debug;
use uuid::Uuid;

use super::store::{document_id, Collection, Document, DocumentStore, StoreError, StoreTransaction};
use crate::filter::{matcher, Filter, FilterData};

type Tables = BTreeMap<Collection, Vec<Document>>;

/// In-process document store.
///
/// Used when no database is configured and by the test suite. A transaction holds
/// the writer lock until it finishes and mutates a private copy of the tables, so
/// concurrent writers are serialised and nothing becomes visible before commit.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
    faults: Arc<Mutex<HashSet<Collection>>>,
    writes: Arc<AtomicU64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every delete against `collection` fail until `clear_faults` is called
    pub fn inject_delete_fault(&self, collection: Collection) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.insert(collection);
        }
    }

    pub fn clear_faults(&self) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.clear();
        }
    }

    /// Number of documents inserted, replaced or deleted by committed operations
    pub fn committed_writes(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    fn check_fault(faults: &Mutex<HashSet<Collection>>, collection: Collection) -> Result<(), StoreError> {
        let faulted = faults.lock().map(|f| f.contains(&collection)).unwrap_or(false);
        if faulted {
            return Err(StoreError::Fault {
                collection,
                message: "injected delete failure".to_string(),
            });
        }
        Ok(())
    }
}

fn select(tables: &Tables, collection: Collection, filter: FilterData) -> Result<Vec<Document>, StoreError> {
    let filter = Filter::from_data(collection.name(), filter)?;
    let docs = tables.get(&collection).map(Vec::as_slice).unwrap_or(&[]);
    Ok(matcher::apply(&filter, docs))
}

fn insert_into(tables: &mut Tables, collection: Collection, doc: Document) -> Result<(), StoreError> {
    let id = document_id(collection, &doc)?;
    let rows = tables.entry(collection).or_default();
    if rows.iter().any(|row| document_id(collection, row).ok() == Some(id)) {
        return Err(StoreError::Duplicate { collection, id });
    }
    rows.push(doc);
    Ok(())
}

fn remove_matching(tables: &mut Tables, collection: Collection, filter: FilterData) -> Result<u64, StoreError> {
    let filter = Filter::from_data(collection.name(), filter)?;
    let Some(rows) = tables.get_mut(&collection) else {
        return Ok(0);
    };
    let before = rows.len();
    rows.retain(|row| !matcher::matches(filter.condition(), row));
    Ok((before - rows.len()) as u64)
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find(&self, collection: Collection, filter: FilterData) -> Result<Vec<Document>, StoreError> {
        let tables = self.tables.read().await;
        select(&tables, collection, filter)
    }

    async fn count(&self, collection: Collection, filter: FilterData) -> Result<u64, StoreError> {
        let tables = self.tables.read().await;
        let filter = Filter::from_data(collection.name(), FilterData { where_clause: filter.where_clause, ..Default::default() })?;
        let rows = tables.get(&collection).map(Vec::as_slice).unwrap_or(&[]);
        Ok(rows.iter().filter(|row| matcher::matches(filter.condition(), row)).count() as u64)
    }

    async fn insert(&self, collection: Collection, doc: Document) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        insert_into(&mut tables, collection, doc)?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn replace(&self, collection: Collection, doc: Document) -> Result<bool, StoreError> {
        let id = document_id(collection, &doc)?;
        let mut tables = self.tables.write().await;
        let Some(slot) = tables
            .get_mut(&collection)
            .and_then(|rows| rows.iter_mut().find(|row| document_id(collection, row).ok() == Some(id)))
        else {
            return Ok(false);
        };
        *slot = doc;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }

    async fn delete_many(&self, collection: Collection, filter: FilterData) -> Result<u64, StoreError> {
        Self::check_fault(&self.faults, collection)?;
        let mut tables = self.tables.write().await;
        let removed = remove_matching(&mut tables, collection, filter)?;
        self.writes.fetch_add(removed, Ordering::SeqCst);
        Ok(removed)
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let guard = self.tables.clone().write_owned().await;
        let working = (*guard).clone();
        Ok(Box::new(MemoryTransaction {
            guard,
            working,
            pending_writes: 0,
            faults: self.faults.clone(),
            writes: self.writes.clone(),
        }))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

pub struct MemoryTransaction {
    guard: OwnedRwLockWriteGuard<Tables>,
    working: Tables,
    pending_writes: u64,
    faults: Arc<Mutex<HashSet<Collection>>>,
    writes: Arc<AtomicU64>,
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn find(&mut self, collection: Collection, filter: FilterData) -> Result<Vec<Document>, StoreError> {
        select(&self.working, collection, filter)
    }

    async fn insert(&mut self, collection: Collection, doc: Document) -> Result<(), StoreError> {
        insert_into(&mut self.working, collection, doc)?;
        self.pending_writes += 1;
        Ok(())
    }

    async fn delete_many(&mut self, collection: Collection, filter: FilterData) -> Result<u64, StoreError> {
        MemoryStore::check_fault(&self.faults, collection)?;
        let removed = remove_matching(&mut self.working, collection, filter)?;
        self.pending_writes += removed;
        Ok(removed)
    }

    // The writer guard already excludes every other writer
    async fn lock_id(&mut self, collection: Collection, id: Uuid) -> Result<Option<Document>, StoreError> {
        Ok(select(&self.working, collection, FilterData::by_id(id))?.into_iter().next())
    }

    async fn find_by_id_and_delete(&mut self, collection: Collection, id: Uuid) -> Result<Option<Document>, StoreError> {
        MemoryStore::check_fault(&self.faults, collection)?;
        let Some(rows) = self.working.get_mut(&collection) else {
            return Ok(None);
        };
        let Some(pos) = rows.iter().position(|row| document_id(collection, row).ok() == Some(id)) else {
            return Ok(None);
        };
        self.pending_writes += 1;
        Ok(Some(rows.remove(pos)))
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryTransaction { mut guard, working, pending_writes, writes, .. } = *self;
        *guard = working;
        writes.fetch_add(pending_writes, Ordering::SeqCst);
        Ok(())
    }

    async fn abort(self: Box<Self>) -> Result<(), StoreError> {
        debug!("Discarding {} pending in-memory writes", self.pending_writes);
        Ok(())
    }
}
