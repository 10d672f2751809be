use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::client_service::{insert_for_client, load_visible_client};
use super::clock::Clock;
use super::error::{ServiceError, ServiceResult};
use super::require_text;
use crate::auth::AuthUser;
use crate::database::models::{Client, Project, ProjectPriority, ProjectStatus, TeamMember};
use crate::database::store::DocumentStore;
use crate::database::Repository;
use crate::filter::FilterData;

#[derive(Debug, Clone, Deserialize)]
pub struct NewProject {
    pub client: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub budget: Option<Decimal>,
    #[serde(default)]
    pub status: Option<ProjectStatus>,
    #[serde(default)]
    pub priority: Option<ProjectPriority>,
    #[serde(default)]
    pub team_members: Vec<TeamMember>,
    #[serde(default)]
    pub progress: Option<u8>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub budget: Option<Decimal>,
    pub status: Option<ProjectStatus>,
    pub priority: Option<ProjectPriority>,
    pub team_members: Option<Vec<TeamMember>>,
    pub progress: Option<u8>,
    pub notes: Option<String>,
}

fn validate(project: &Project) -> ServiceResult<()> {
    require_text("title", &project.title)?;
    if project.progress > 100 {
        return Err(ServiceError::validation("progress must be between 0 and 100"));
    }
    if project.budget.is_some_and(|b| b.is_sign_negative()) {
        return Err(ServiceError::validation("budget cannot be negative"));
    }
    if project.end_date.is_some_and(|end| end < project.start_date) {
        return Err(ServiceError::validation("end_date is before start_date"));
    }
    for member in &project.team_members {
        require_text("team member name", &member.name)?;
        require_text("team member role", &member.role)?;
    }
    Ok(())
}

pub struct ProjectService {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
}

impl ProjectService {
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    fn projects(&self) -> Repository<Project> {
        Repository::new(self.store.clone())
    }

    pub async fn list(&self, client: Option<Uuid>, requester: &AuthUser) -> ServiceResult<Vec<Project>> {
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

        let mut projects = self.projects().select_any(filter).await?;
        projects.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(projects)
    }

    pub async fn get(&self, id: Uuid, requester: &AuthUser) -> ServiceResult<Project> {
        let project = self
            .projects()
            .select_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Project"))?;
        load_visible_client(&self.store, project.client, requester).await?;
        Ok(project)
    }

    pub async fn create(&self, input: NewProject, requester: &AuthUser) -> ServiceResult<Project> {
        let now = self.clock.now();
        let project = Project {
            id: Uuid::new_v4(),
            client: input.client,
            title: input.title.trim().to_string(),
            description: input.description,
            start_date: input.start_date,
            end_date: input.end_date,
            budget: input.budget,
            status: input.status.unwrap_or_default(),
            priority: input.priority.unwrap_or_default(),
            team_members: input.team_members,
            progress: input.progress.unwrap_or(0),
            notes: input.notes,
            created_by: requester.user_id,
            created_at: now,
            updated_at: now,
        };
        validate(&project)?;
        insert_for_client(&self.store, project.client, requester, &project).await?;
        Ok(project)
    }

    pub async fn update(&self, id: Uuid, update: ProjectUpdate, requester: &AuthUser) -> ServiceResult<Project> {
        let mut project = self.get(id, requester).await?;

        if let Some(title) = update.title {
            project.title = title.trim().to_string();
        }
        if let Some(description) = update.description {
            project.description = Some(description);
        }
        if let Some(start_date) = update.start_date {
            project.start_date = start_date;
        }
        if let Some(end_date) = update.end_date {
            project.end_date = Some(end_date);
        }
        if let Some(budget) = update.budget {
            project.budget = Some(budget);
        }
        if let Some(status) = update.status {
            project.status = status;
        }
        if let Some(priority) = update.priority {
            project.priority = priority;
        }
        if let Some(team_members) = update.team_members {
            project.team_members = team_members;
        }
        if let Some(progress) = update.progress {
            project.progress = progress;
        }
        if let Some(notes) = update.notes {
            project.notes = Some(notes);
        }
        validate(&project)?;
        project.updated_at = self.clock.now();

        if !self.projects().update(&project).await? {
            return Err(ServiceError::not_found("Project"));
        }
        Ok(project)
    }

    pub async fn delete(&self, id: Uuid, requester: &AuthUser) -> ServiceResult<()> {
        let project = self.get(id, requester).await?;
        if !self.projects().delete_id(project.id).await? {
            return Err(ServiceError::not_found("Project"));
        }
        Ok(())
    }
}
