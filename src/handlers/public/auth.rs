// handlers/public/auth.rs - token acquisition

use axum::extract::State;

use crate::handlers::JsonBody;
use crate::middleware::{ApiResponse, ApiResult};
use crate::server::AppState;
use crate::services::user_service::{LoginRequest, LoginResponse, RegisterRequest};

/// POST /api/auth/register - self-service signup; always creates a `user` role account
pub async fn register(State(state): State<AppState>, JsonBody(request): JsonBody<RegisterRequest>) -> ApiResult<LoginResponse> {
    let response = state.users().register(request).await?;
    Ok(ApiResponse::created(response).with_message("User registered successfully"))
}

/// POST /api/auth/login - authenticate user and receive JWT token
///
/// Expected Input:
/// ```json
/// {
///   "email": "string",
///   "password": "string",
///   "latitude": 12.97,      // Optional: records a login location sample
///   "longitude": 77.59,
///   "accuracy": 10.0
/// }
/// ```
///
/// Bad email and bad password both yield the same 401.
pub async fn login(State(state): State<AppState>, JsonBody(request): JsonBody<LoginRequest>) -> ApiResult<LoginResponse> {
    let response = state.users().login(request).await?;
    Ok(ApiResponse::success(response).with_message("Login successful"))
}
