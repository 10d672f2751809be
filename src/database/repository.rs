use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use super::store::{from_document, to_document, DocumentStore, Entity, StoreError};
use crate::filter::FilterData;

/// Typed access to one collection
pub struct Repository<T> {
    store: Arc<dyn DocumentStore>,
    _phantom: PhantomData<T>,
}

impl<T: Entity> Repository<T> {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            _phantom: PhantomData,
        }
    }

    pub async fn select_any(&self, filter_data: FilterData) -> Result<Vec<T>, StoreError> {
        self.store
            .find(T::COLLECTION, filter_data)
            .await?
            .into_iter()
            .map(from_document)
            .collect()
    }

    pub async fn select_one(&self, filter_data: FilterData) -> Result<Option<T>, StoreError> {
        let mut rows = self.store.find(T::COLLECTION, filter_data.limit(1)).await?;
        rows.pop().map(from_document).transpose()
    }

    pub async fn select_id(&self, id: Uuid) -> Result<Option<T>, StoreError> {
        self.select_one(FilterData::by_id(id)).await
    }

    pub async fn select_ids(&self, ids: &[Uuid]) -> Result<Vec<T>, StoreError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        self.select_any(FilterData::where_clause(json!({ "id": { "$in": ids } })))
            .await
    }

    pub async fn count(&self, filter_data: FilterData) -> Result<u64, StoreError> {
        self.store.count(T::COLLECTION, filter_data).await
    }

    pub async fn create(&self, entity: &T) -> Result<(), StoreError> {
        self.store.insert(T::COLLECTION, to_document(entity)?).await
    }

    /// Returns false when no document with the entity's id exists
    pub async fn update(&self, entity: &T) -> Result<bool, StoreError> {
        self.store.replace(T::COLLECTION, to_document(entity)?).await
    }

    pub async fn delete_id(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.store.delete_many(T::COLLECTION, FilterData::by_id(id)).await? > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::MemoryStore;
    use crate::database::models::{Client, ClientCategory, ClientStatus};
    use chrono::Utc;

    fn client(name: &str, owner: Uuid) -> Client {
        let now = Utc::now();
        Client {
            id: Uuid::new_v4(),
            category: ClientCategory::Smb,
            name: name.to_string(),
            sales_person: None,
            status: ClientStatus::Active,
            created_by: owner,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn create_select_update_delete() {
        let repo = Repository::<Client>::new(Arc::new(MemoryStore::new()));
        let owner = Uuid::new_v4();
        let mut acme = client("Acme", owner);
        repo.create(&acme).await.unwrap();
        repo.create(&client("Globex", Uuid::new_v4())).await.unwrap();

        let mine = repo
            .select_any(FilterData::where_clause(json!({ "created_by": owner })))
            .await
            .unwrap();
        assert_eq!(mine, vec![acme.clone()]);

        acme.status = ClientStatus::Suspended;
        assert!(repo.update(&acme).await.unwrap());
        assert_eq!(repo.select_id(acme.id).await.unwrap().unwrap().status, ClientStatus::Suspended);

        assert!(repo.delete_id(acme.id).await.unwrap());
        assert!(repo.select_id(acme.id).await.unwrap().is_none());
        assert_eq!(repo.count(FilterData::all()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn select_ids_with_empty_input_skips_the_store() {
        let repo = Repository::<Client>::new(Arc::new(MemoryStore::new()));
        assert!(repo.select_ids(&[]).await.unwrap().is_empty());
    }
}
