use axum::extract::{Extension, Path, State};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::database::models::Client;
use crate::handlers::JsonBody;
use crate::middleware::{ApiResponse, ApiResult};
use crate::server::AppState;
use crate::services::client_service::{ClientDetail, ClientUpdate, ClientView, DeletionSummary, NewClient};

/// GET /api/clients - clients visible to the caller with locations, contacts and counts
pub async fn list(State(state): State<AppState>, Extension(user): Extension<AuthUser>) -> ApiResult<Vec<ClientView>> {
    Ok(ApiResponse::success(state.clients().list_clients(&user).await?))
}

/// GET /api/clients/:id - one client with its meetings and projects
pub async fn show(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<ClientDetail> {
    Ok(ApiResponse::success(state.clients().get_client(id, &user).await?))
}

/// POST /api/clients - client, branch locations and contacts are created together
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    JsonBody(input): JsonBody<NewClient>,
) -> ApiResult<ClientView> {
    let view = state.clients().create_client(input, &user).await?;
    Ok(ApiResponse::created(view).with_message("Client created successfully"))
}

/// PUT /api/clients/:id
pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    JsonBody(update): JsonBody<ClientUpdate>,
) -> ApiResult<Client> {
    let client = state.clients().update_client(id, update, &user).await?;
    Ok(ApiResponse::success(client).with_message("Client updated successfully"))
}

/// DELETE /api/clients/:id - cascade delete of the whole client aggregate
///
/// Expected Output (Success):
/// ```json
/// {
///   "success": true,
///   "message": "Client \"Acme\" and all related data deleted successfully",
///   "data": {
///     "client_name": "Acme",
///     "counts": { "branch_locations": 2, "contact_persons": 4, "meetings": 3, "projects": 1 }
///   }
/// }
/// ```
///
/// Nothing is removed unless every step succeeds; a failure answers 500 `TRANSACTION_FAILED`.
pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<DeletionSummary> {
    let summary = state.clients().delete_client_cascade(id, &user).await?;
    let message = format!("Client \"{}\" and all related data deleted successfully", summary.client_name);
    Ok(ApiResponse::success(summary).with_message(message))
}
