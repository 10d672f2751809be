use axum::extract::{Extension, Path, State};
use uuid::Uuid;

use super::Deleted;
use crate::auth::AuthUser;
use crate::handlers::JsonBody;
use crate::middleware::{ApiResponse, ApiResult};
use crate::server::AppState;
use crate::services::user_service::{Coordinates, NewEmployee, UserProfile};

/// GET /api/auth/me - profile of the authenticated user with role permissions
pub async fn me(State(state): State<AppState>, Extension(user): Extension<AuthUser>) -> ApiResult<UserProfile> {
    Ok(ApiResponse::success(state.users().me(&user).await?))
}

/// POST /api/auth/logout - tokens are stateless; optional coordinates record a logout sample
pub async fn logout(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    body: Option<JsonBody<Coordinates>>,
) -> ApiResult<()> {
    let coordinates = body.map(|JsonBody(c)| c).unwrap_or_default();
    state.users().logout(&user, coordinates).await?;
    Ok(ApiResponse::success(()).with_message("Logged out successfully"))
}

/// GET /api/auth/employees - admin only
pub async fn list_employees(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Vec<UserProfile>> {
    Ok(ApiResponse::success(state.users().list_employees(&user).await?))
}

/// POST /api/auth/employees - admin creates an employee with any role
pub async fn create_employee(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    JsonBody(employee): JsonBody<NewEmployee>,
) -> ApiResult<UserProfile> {
    let profile = state.users().create_employee(employee, &user).await?;
    Ok(ApiResponse::created(profile).with_message("Employee registered successfully"))
}

/// DELETE /api/auth/employees/:id - admin only, never the caller
pub async fn delete_employee(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Deleted> {
    state.users().delete_employee(id, &user).await?;
    Ok(ApiResponse::success(Deleted { id }).with_message("Employee deleted successfully"))
}
