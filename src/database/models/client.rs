use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::store::{Collection, Entity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientCategory {
    Enterprise,
    #[serde(rename = "SMB")]
    Smb,
    Startup,
    Government,
    #[serde(rename = "Non-Profit")]
    NonProfit,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ClientStatus {
    #[default]
    Active,
    Inactive,
    Suspended,
}

/// Root of the client aggregate. Branch locations, contacts, meetings and
/// projects all hang off it and are removed with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: Uuid,
    pub category: ClientCategory,
    pub name: String,
    #[serde(default)]
    pub sales_person: Option<String>,
    #[serde(default)]
    pub status: ClientStatus,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Client {
    const COLLECTION: Collection = Collection::Clients;

    fn id(&self) -> Uuid {
        self.id
    }
}
