use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::clock::Clock;
use super::error::{ServiceError, ServiceResult};
use super::require_text;
use crate::auth::AuthUser;
use crate::database::models::{
    BranchLocation, Client, ClientCategory, ClientStatus, ContactPerson, Meeting, Project,
};
use crate::database::store::{
    document_id, from_document, to_document, Collection, Document, DocumentStore, Entity, StoreError, StoreTransaction,
};
use crate::database::Repository;
use crate::filter::FilterData;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionCounts {
    pub branch_locations: u64,
    pub contact_persons: u64,
    pub meetings: u64,
    pub projects: u64,
}

/// What a cascade delete removed besides the client itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionSummary {
    pub client_name: String,
    pub counts: DeletionCounts,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewContact {
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(default)]
    pub designation: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewBranchLocation {
    pub name: String,
    pub address_line1: String,
    #[serde(default)]
    pub address_line2: Option<String>,
    pub city: String,
    pub state: String,
    pub country: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub contacts: Vec<NewContact>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewClient {
    pub category: ClientCategory,
    pub name: String,
    #[serde(default)]
    pub sales_person: Option<String>,
    #[serde(default)]
    pub status: Option<ClientStatus>,
    #[serde(default)]
    pub locations: Vec<NewBranchLocation>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientUpdate {
    pub category: Option<ClientCategory>,
    pub name: Option<String>,
    pub sales_person: Option<String>,
    pub status: Option<ClientStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LocationView {
    #[serde(flatten)]
    pub location: BranchLocation,
    pub contacts: Vec<ContactPerson>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClientView {
    #[serde(flatten)]
    pub client: Client,
    pub locations: Vec<LocationView>,
    pub meeting_count: usize,
    pub project_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClientDetail {
    #[serde(flatten)]
    pub view: ClientView,
    pub meetings: Vec<Meeting>,
    pub projects: Vec<Project>,
}

/// Load a client and check that `requester` may see it
pub(crate) async fn load_visible_client(
    store: &Arc<dyn DocumentStore>,
    client_id: Uuid,
    requester: &AuthUser,
) -> ServiceResult<Client> {
    let client = Repository::<Client>::new(store.clone())
        .select_id(client_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Client"))?;
    if !requester.can_access(client.created_by) {
        return Err(ServiceError::forbidden("client belongs to another user"));
    }
    Ok(client)
}

/// Insert a document that belongs to `client_id` while holding the client's row lock.
///
/// A concurrent cascade delete either commits first, and this reports the client as
/// not found, or waits for this insert and then removes the new child with the rest.
pub(crate) async fn insert_for_client<T: Entity>(
    store: &Arc<dyn DocumentStore>,
    client_id: Uuid,
    requester: &AuthUser,
    entity: &T,
) -> ServiceResult<()> {
    let doc = to_document(entity)?;
    let mut tx = store.begin().await?;
    match insert_locked(tx.as_mut(), client_id, requester, doc, T::COLLECTION).await {
        Ok(()) => {
            tx.commit().await?;
            Ok(())
        }
        Err(e) => {
            if let Err(abort_err) = tx.abort().await {
                warn!("Rollback of {} insert for client {} failed: {}", T::COLLECTION, client_id, abort_err);
            }
            Err(e)
        }
    }
}

async fn insert_locked(
    tx: &mut dyn StoreTransaction,
    client_id: Uuid,
    requester: &AuthUser,
    doc: Document,
    collection: Collection,
) -> ServiceResult<()> {
    let client: Client = match tx.lock_id(Collection::Clients, client_id).await? {
        Some(doc) => from_document(doc)?,
        None => return Err(ServiceError::not_found("Client")),
    };
    if !requester.can_access(client.created_by) {
        return Err(ServiceError::forbidden("client belongs to another user"));
    }
    tx.insert(collection, doc).await?;
    Ok(())
}

pub struct ClientService {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
}

impl ClientService {
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Delete a client together with its branch locations, their contacts, and
    /// the client's meetings and projects, all in one transaction.
    ///
    /// The work runs on its own task: if the caller's future is dropped the
    /// transaction still commits or rolls back as a whole.
    pub async fn delete_client_cascade(&self, client_id: Uuid, requester: &AuthUser) -> ServiceResult<DeletionSummary> {
        let store = self.store.clone();
        let requester = requester.clone();

        tokio::spawn(async move { cascade_delete(store.as_ref(), client_id, &requester).await })
            .await
            .map_err(|e| {
                error!("Cascade delete task for client {} did not finish: {}", client_id, e);
                ServiceError::transaction(StoreError::Fault {
                    collection: Collection::Clients,
                    message: e.to_string(),
                })
            })?
    }

    /// Clients visible to `requester`, newest first
    pub async fn list_clients(&self, requester: &AuthUser) -> ServiceResult<Vec<ClientView>> {
        let filter = if requester.is_elevated() {
            FilterData::all()
        } else {
            FilterData::where_clause(json!({ "created_by": requester.user_id }))
        };
        let mut clients = Repository::<Client>::new(self.store.clone()).select_any(filter).await?;
        clients.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        self.assemble_views(clients).await
    }

    pub async fn get_client(&self, client_id: Uuid, requester: &AuthUser) -> ServiceResult<ClientDetail> {
        let client = load_visible_client(&self.store, client_id, requester).await?;
        let by_client = || FilterData::where_clause(json!({ "client": client_id }));
        let meetings = Repository::<Meeting>::new(self.store.clone()).select_any(by_client()).await?;
        let projects = Repository::<Project>::new(self.store.clone()).select_any(by_client()).await?;

        let view = self
            .assemble_views(vec![client])
            .await?
            .pop()
            .ok_or_else(|| ServiceError::not_found("Client"))?;
        Ok(ClientDetail { view, meetings, projects })
    }

    /// Insert the client with its locations and contacts atomically
    pub async fn create_client(&self, input: NewClient, requester: &AuthUser) -> ServiceResult<ClientView> {
        require_text("name", &input.name)?;
        for location in &input.locations {
            require_text("location name", &location.name)?;
            require_text("address_line1", &location.address_line1)?;
            require_text("city", &location.city)?;
            require_text("state", &location.state)?;
            require_text("country", &location.country)?;
            for contact in &location.contacts {
                require_text("contact name", &contact.name)?;
                require_text("contact phone", &contact.phone)?;
                if !contact.email.contains('@') {
                    return Err(ServiceError::validation(format!("invalid contact email: {}", contact.email)));
                }
            }
        }

        let now = self.clock.now();
        let client = Client {
            id: Uuid::new_v4(),
            category: input.category,
            name: input.name.trim().to_string(),
            sales_person: input.sales_person,
            status: input.status.unwrap_or_default(),
            created_by: requester.user_id,
            created_at: now,
            updated_at: now,
        };

        let mut locations = Vec::with_capacity(input.locations.len());
        for new_location in input.locations {
            let location = BranchLocation {
                id: Uuid::new_v4(),
                client: client.id,
                name: new_location.name.trim().to_string(),
                address_line1: new_location.address_line1,
                address_line2: new_location.address_line2,
                city: new_location.city,
                state: new_location.state,
                country: new_location.country,
                latitude: new_location.latitude,
                longitude: new_location.longitude,
                created_at: now,
                updated_at: now,
            };
            let contacts = new_location
                .contacts
                .into_iter()
                .map(|c| ContactPerson {
                    id: Uuid::new_v4(),
                    branch_location: location.id,
                    name: c.name.trim().to_string(),
                    email: c.email.trim().to_lowercase(),
                    phone: c.phone,
                    designation: c.designation,
                    created_at: now,
                    updated_at: now,
                })
                .collect();
            locations.push(LocationView { location, contacts });
        }

        let mut tx = self.store.begin().await.map_err(ServiceError::transaction)?;
        match insert_aggregate(tx.as_mut(), &client, &locations).await {
            Ok(()) => tx.commit().await.map_err(ServiceError::transaction)?,
            Err(e) => {
                if let Err(abort_err) = tx.abort().await {
                    warn!("Rollback after failed client insert also failed: {}", abort_err);
                }
                return Err(ServiceError::transaction(e));
            }
        }

        info!("Client {} created by {} with {} locations", client.id, requester.user_id, locations.len());
        Ok(ClientView {
            client,
            locations,
            meeting_count: 0,
            project_count: 0,
        })
    }

    pub async fn update_client(&self, client_id: Uuid, update: ClientUpdate, requester: &AuthUser) -> ServiceResult<Client> {
        let mut client = load_visible_client(&self.store, client_id, requester).await?;

        if let Some(name) = update.name {
            require_text("name", &name)?;
            client.name = name.trim().to_string();
        }
        if let Some(category) = update.category {
            client.category = category;
        }
        if let Some(sales_person) = update.sales_person {
            client.sales_person = Some(sales_person);
        }
        if let Some(status) = update.status {
            client.status = status;
        }
        client.updated_at = self.clock.now();

        if !Repository::<Client>::new(self.store.clone()).update(&client).await? {
            return Err(ServiceError::not_found("Client"));
        }
        Ok(client)
    }

    async fn assemble_views(&self, clients: Vec<Client>) -> ServiceResult<Vec<ClientView>> {
        if clients.is_empty() {
            return Ok(vec![]);
        }
        let client_ids: Vec<Uuid> = clients.iter().map(|c| c.id).collect();
        let in_clients = || FilterData::where_clause(json!({ "client": { "$in": client_ids } }));

        let locations = Repository::<BranchLocation>::new(self.store.clone())
            .select_any(in_clients())
            .await?;
        let location_ids: Vec<Uuid> = locations.iter().map(|l| l.id).collect();
        let contacts = Repository::<ContactPerson>::new(self.store.clone())
            .select_any(FilterData::where_clause(json!({ "branch_location": { "$in": location_ids } })))
            .await?;
        let meetings = Repository::<Meeting>::new(self.store.clone()).select_any(in_clients()).await?;
        let projects = Repository::<Project>::new(self.store.clone()).select_any(in_clients()).await?;

        let mut contacts_by_location: HashMap<Uuid, Vec<ContactPerson>> = HashMap::new();
        for contact in contacts {
            contacts_by_location.entry(contact.branch_location).or_default().push(contact);
        }
        let mut locations_by_client: HashMap<Uuid, Vec<LocationView>> = HashMap::new();
        for location in locations {
            let contacts = contacts_by_location.remove(&location.id).unwrap_or_default();
            locations_by_client
                .entry(location.client)
                .or_default()
                .push(LocationView { location, contacts });
        }
        let mut meeting_counts: HashMap<Uuid, usize> = HashMap::new();
        for meeting in &meetings {
            *meeting_counts.entry(meeting.client).or_default() += 1;
        }
        let mut project_counts: HashMap<Uuid, usize> = HashMap::new();
        for project in &projects {
            *project_counts.entry(project.client).or_default() += 1;
        }

        Ok(clients
            .into_iter()
            .map(|client| ClientView {
                locations: locations_by_client.remove(&client.id).unwrap_or_default(),
                meeting_count: meeting_counts.get(&client.id).copied().unwrap_or(0),
                project_count: project_counts.get(&client.id).copied().unwrap_or(0),
                client,
            })
            .collect())
    }
}

async fn insert_aggregate(tx: &mut dyn StoreTransaction, client: &Client, locations: &[LocationView]) -> Result<(), StoreError> {
    tx.insert(Collection::Clients, to_document(client)?).await?;
    for view in locations {
        tx.insert(Collection::BranchLocations, to_document(&view.location)?).await?;
        for contact in &view.contacts {
            tx.insert(Collection::ContactPersons, to_document(contact)?).await?;
        }
    }
    Ok(())
}

async fn cascade_delete(store: &dyn DocumentStore, client_id: Uuid, requester: &AuthUser) -> ServiceResult<DeletionSummary> {
    let mut tx = store.begin().await.map_err(ServiceError::transaction)?;

    match remove_aggregate(tx.as_mut(), client_id, requester).await {
        Ok(summary) => {
            tx.commit().await.map_err(|e| {
                error!("Commit of cascade delete for client {} failed: {}", client_id, e);
                ServiceError::transaction(e)
            })?;
            info!(
                client_id = %client_id,
                requester = %requester.user_id,
                "Deleted client {:?} with {} branch locations, {} contacts, {} meetings, {} projects",
                summary.client_name,
                summary.counts.branch_locations,
                summary.counts.contact_persons,
                summary.counts.meetings,
                summary.counts.projects,
            );
            Ok(summary)
        }
        Err(e) => {
            if let Err(abort_err) = tx.abort().await {
                warn!("Rollback of cascade delete for client {} failed: {}", client_id, abort_err);
            }
            if matches!(e, ServiceError::TransactionFailure { .. }) {
                error!("Cascade delete for client {} rolled back: {}", client_id, e);
            }
            Err(e)
        }
    }
}

/// Children before parents: contacts, meetings, projects, branch locations, client
async fn remove_aggregate(
    tx: &mut dyn StoreTransaction,
    client_id: Uuid,
    requester: &AuthUser,
) -> ServiceResult<DeletionSummary> {
    let fail = ServiceError::transaction;

    // Locked first so inserts of new meetings or projects for this client wait on us
    let client: Client = match tx.lock_id(Collection::Clients, client_id).await.map_err(fail)? {
        Some(doc) => from_document(doc).map_err(fail)?,
        None => return Err(ServiceError::not_found("Client")),
    };
    if !requester.can_access(client.created_by) {
        return Err(ServiceError::forbidden("only the creator or an admin may delete this client"));
    }

    let by_client = || FilterData::where_clause(json!({ "client": client_id }));

    let locations = tx.find(Collection::BranchLocations, by_client()).await.map_err(fail)?;
    let location_ids = locations
        .iter()
        .map(|doc| document_id(Collection::BranchLocations, doc))
        .collect::<Result<Vec<Uuid>, _>>()
        .map_err(fail)?;

    let contact_persons = tx
        .delete_many(
            Collection::ContactPersons,
            FilterData::where_clause(json!({ "branch_location": { "$in": location_ids } })),
        )
        .await
        .map_err(fail)?;
    let meetings = tx.delete_many(Collection::Meetings, by_client()).await.map_err(fail)?;
    let projects = tx.delete_many(Collection::Projects, by_client()).await.map_err(fail)?;
    tx.delete_many(
        Collection::BranchLocations,
        FilterData::where_clause(json!({ "id": { "$in": location_ids } })),
    )
    .await
    .map_err(fail)?;

    if tx
        .find_by_id_and_delete(Collection::Clients, client_id)
        .await
        .map_err(fail)?
        .is_none()
    {
        // Removed concurrently between the read and the delete
        return Err(ServiceError::not_found("Client"));
    }

    Ok(DeletionSummary {
        client_name: client.name,
        counts: DeletionCounts {
            branch_locations: location_ids.len() as u64,
            contact_persons,
            meetings,
            projects,
        },
    })
}
