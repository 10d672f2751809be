use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::store::{Collection, Entity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Login,
    Logout,
    #[default]
    Tracking,
}

/// One GPS fix reported by an employee device. Append-only.
///
/// `timestamp` is stored as epoch milliseconds so range filters and ordering on
/// it compare numerically in every store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
    pub id: Uuid,
    pub employee: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub accuracy: Option<f64>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    /// UTC calendar day of `timestamp`
    pub day: NaiveDate,
    #[serde(default)]
    pub event_type: EventType,
}

impl Entity for LocationSample {
    const COLLECTION: Collection = Collection::LocationSamples;

    fn id(&self) -> Uuid {
        self.id
    }
}
