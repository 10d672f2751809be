use axum::extract::{Extension, Path, Query, State};
use uuid::Uuid;

use super::{ClientScope, Deleted};
use crate::auth::AuthUser;
use crate::database::models::Meeting;
use crate::handlers::JsonBody;
use crate::middleware::{ApiResponse, ApiResult};
use crate::server::AppState;
use crate::services::meeting_service::{MeetingUpdate, NewMeeting};

/// GET /api/meetings[?client=<uuid>]
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(scope): Query<ClientScope>,
) -> ApiResult<Vec<Meeting>> {
    Ok(ApiResponse::success(state.meetings().list(scope.client, &user).await?))
}

pub async fn show(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Meeting> {
    Ok(ApiResponse::success(state.meetings().get(id, &user).await?))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    JsonBody(input): JsonBody<NewMeeting>,
) -> ApiResult<Meeting> {
    let meeting = state.meetings().create(input, &user).await?;
    Ok(ApiResponse::created(meeting).with_message("Meeting scheduled successfully"))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    JsonBody(update): JsonBody<MeetingUpdate>,
) -> ApiResult<Meeting> {
    Ok(ApiResponse::success(state.meetings().update(id, update, &user).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Deleted> {
    state.meetings().delete(id, &user).await?;
    Ok(ApiResponse::success(Deleted { id }).with_message("Meeting deleted successfully"))
}
