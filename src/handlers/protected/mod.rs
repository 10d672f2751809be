pub mod auth;
pub mod clients;
pub mod expenses;
pub mod meetings;
pub mod projects;
pub mod reports;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// `?client=<uuid>` narrowing shared by meeting and project listings
#[derive(Debug, Default, Deserialize)]
pub struct ClientScope {
    pub client: Option<Uuid>,
}

/// Body of a plain delete acknowledgement
#[derive(Debug, Serialize)]
pub struct Deleted {
    pub id: Uuid,
}
