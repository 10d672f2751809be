// handlers/protected/reports.rs - employee GPS tracking reports

use axum::extract::{Extension, Path, Query, State};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::database::models::LocationSample;
use crate::handlers::JsonBody;
use crate::middleware::{ApiResponse, ApiResult};
use crate::server::AppState;
use crate::services::location_service::{LiveLocation, LocationHistory, LocationReport, MovementReport};

#[derive(Debug, Deserialize)]
pub struct MovementQuery {
    /// UTC day to report; today when absent
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub days: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ResetSummary {
    pub employee: Uuid,
    pub deleted: u64,
}

/// POST /api/reports/log-location - the caller reports their own position
pub async fn log_location(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    JsonBody(report): JsonBody<LocationReport>,
) -> ApiResult<LocationSample> {
    let sample = state.locations().record_sample(user.user_id, report).await?;
    Ok(ApiResponse::created(sample).with_message("Location logged successfully"))
}

/// GET /api/reports/employee/:id/movement?date=YYYY-MM-DD
///
/// Samples of that day in time order, each with the distance and minutes
/// since the previous one, plus the day's totals.
pub async fn movement(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(employee): Path<Uuid>,
    Query(query): Query<MovementQuery>,
) -> ApiResult<MovementReport> {
    Ok(ApiResponse::success(state.locations().movement(employee, query.date, &user).await?))
}

/// GET /api/reports/employee/:id/live-location
pub async fn live_location(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(employee): Path<Uuid>,
) -> ApiResult<LiveLocation> {
    Ok(ApiResponse::success(state.locations().live_location(employee, &user).await?))
}

/// GET /api/reports/employee/:id/location-history?days=N
pub async fn location_history(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(employee): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<LocationHistory> {
    Ok(ApiResponse::success(state.locations().location_history(employee, query.days, &user).await?))
}

/// DELETE /api/reports/employee/:id/locations - admin wipes an employee's samples
pub async fn reset_locations(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(employee): Path<Uuid>,
) -> ApiResult<ResetSummary> {
    let deleted = state.locations().reset_locations(employee, &user).await?;
    Ok(ApiResponse::success(ResetSummary { employee, deleted }).with_message("Location history cleared"))
}
