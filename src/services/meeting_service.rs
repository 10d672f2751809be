use std::sync::Arc;

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::client_service::{insert_for_client, load_visible_client};
use super::clock::Clock;
use super::error::{ServiceError, ServiceResult};
use super::require_text;
use crate::auth::AuthUser;
use crate::database::models::{Attendee, Client, Meeting, MeetingStatus, MeetingType};
use crate::database::store::DocumentStore;
use crate::database::Repository;
use crate::filter::FilterData;

const DEFAULT_DURATION_MINUTES: u32 = 60;

#[derive(Debug, Clone, Deserialize)]
pub struct NewMeeting {
    pub client: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub date: NaiveDate,
    pub time: String,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub meeting_type: Option<MeetingType>,
    #[serde(default)]
    pub status: Option<MeetingStatus>,
    #[serde(default)]
    pub attendees: Vec<Attendee>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub follow_up_required: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MeetingUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub date: Option<NaiveDate>,
    pub time: Option<String>,
    pub duration_minutes: Option<u32>,
    pub location: Option<String>,
    pub meeting_type: Option<MeetingType>,
    pub status: Option<MeetingStatus>,
    pub attendees: Option<Vec<Attendee>>,
    pub notes: Option<String>,
    pub follow_up_required: Option<bool>,
}

fn validate_attendees(attendees: &[Attendee]) -> ServiceResult<()> {
    for attendee in attendees {
        require_text("attendee name", &attendee.name)?;
        if !attendee.email.contains('@') {
            return Err(ServiceError::validation(format!("invalid attendee email: {}", attendee.email)));
        }
    }
    Ok(())
}

pub struct MeetingService {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
}

impl MeetingService {
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    fn meetings(&self) -> Repository<Meeting> {
        Repository::new(self.store.clone())
    }

    /// Meetings of one client, or of every client the requester can see; soonest first
    pub async fn list(&self, client: Option<Uuid>, requester: &AuthUser) -> ServiceResult<Vec<Meeting>> {
        let filter = match client {
            Some(client_id) => {
                load_visible_client(&self.store, client_id, requester).await?;
                FilterData::where_clause(json!({ "client": client_id }))
            }
            None if requester.is_elevated() => FilterData::all(),
            None => {
                let owned = Repository::<Client>::new(self.store.clone())
                    .select_any(FilterData::where_clause(json!({ "created_by": requester.user_id })))
                    .await?;
                let ids: Vec<Uuid> = owned.iter().map(|c| c.id).collect();
                FilterData::where_clause(json!({ "client": { "$in": ids } }))
            }
        };

        let mut meetings = self.meetings().select_any(filter).await?;
        meetings.sort_by(|a, b| (a.date, &a.time).cmp(&(b.date, &b.time)));
        Ok(meetings)
    }

    pub async fn get(&self, id: Uuid, requester: &AuthUser) -> ServiceResult<Meeting> {
        let meeting = self
            .meetings()
            .select_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Meeting"))?;
        load_visible_client(&self.store, meeting.client, requester).await?;
        Ok(meeting)
    }

    pub async fn create(&self, input: NewMeeting, requester: &AuthUser) -> ServiceResult<Meeting> {
        require_text("title", &input.title)?;
        require_text("time", &input.time)?;
        validate_attendees(&input.attendees)?;

        let now = self.clock.now();
        let meeting = Meeting {
            id: Uuid::new_v4(),
            client: input.client,
            title: input.title.trim().to_string(),
            description: input.description,
            date: input.date,
            time: input.time.trim().to_string(),
            duration_minutes: input.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES),
            location: input.location,
            meeting_type: input.meeting_type.unwrap_or_default(),
            status: input.status.unwrap_or_default(),
            attendees: input.attendees,
            notes: input.notes,
            follow_up_required: input.follow_up_required,
            created_by: requester.user_id,
            created_at: now,
            updated_at: now,
        };
        insert_for_client(&self.store, meeting.client, requester, &meeting).await?;
        Ok(meeting)
    }

    pub async fn update(&self, id: Uuid, update: MeetingUpdate, requester: &AuthUser) -> ServiceResult<Meeting> {
        let mut meeting = self.get(id, requester).await?;

        if let Some(title) = update.title {
            require_text("title", &title)?;
            meeting.title = title.trim().to_string();
        }
        if let Some(time) = update.time {
            require_text("time", &time)?;
            meeting.time = time.trim().to_string();
        }
        if let Some(attendees) = update.attendees {
            validate_attendees(&attendees)?;
            meeting.attendees = attendees;
        }
        if let Some(description) = update.description {
            meeting.description = Some(description);
        }
        if let Some(date) = update.date {
            meeting.date = date;
        }
        if let Some(duration) = update.duration_minutes {
            meeting.duration_minutes = duration;
        }
        if let Some(location) = update.location {
            meeting.location = Some(location);
        }
        if let Some(meeting_type) = update.meeting_type {
            meeting.meeting_type = meeting_type;
        }
        if let Some(status) = update.status {
            meeting.status = status;
        }
        if let Some(notes) = update.notes {
            meeting.notes = Some(notes);
        }
        if let Some(follow_up) = update.follow_up_required {
            meeting.follow_up_required = follow_up;
        }
        meeting.updated_at = self.clock.now();

        if !self.meetings().update(&meeting).await? {
            return Err(ServiceError::not_found("Meeting"));
        }
        Ok(meeting)
    }

    pub async fn delete(&self, id: Uuid, requester: &AuthUser) -> ServiceResult<()> {
        let meeting = self.get(id, requester).await?;
        if !self.meetings().delete_id(meeting.id).await? {
            return Err(ServiceError::not_found("Meeting"));
        }
        Ok(())
    }
}
