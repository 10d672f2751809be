use axum::extract::{Extension, Path, Query, State};
use uuid::Uuid;

use super::{ClientScope, Deleted};
use crate::auth::AuthUser;
use crate::database::models::Project;
use crate::handlers::JsonBody;
use crate::middleware::{ApiResponse, ApiResult};
use crate::server::AppState;
use crate::services::project_service::{NewProject, ProjectUpdate};

/// GET /api/projects[?client=<uuid>]
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(scope): Query<ClientScope>,
) -> ApiResult<Vec<Project>> {
    Ok(ApiResponse::success(state.projects().list(scope.client, &user).await?))
}

pub async fn show(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Project> {
    Ok(ApiResponse::success(state.projects().get(id, &user).await?))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    JsonBody(input): JsonBody<NewProject>,
) -> ApiResult<Project> {
    let project = state.projects().create(input, &user).await?;
    Ok(ApiResponse::created(project).with_message("Project created successfully"))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    JsonBody(update): JsonBody<ProjectUpdate>,
) -> ApiResult<Project> {
    Ok(ApiResponse::success(state.projects().update(id, update, &user).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Deleted> {
    state.projects().delete(id, &user).await?;
    Ok(ApiResponse::success(Deleted { id }).with_message("Project deleted successfully"))
}
