use axum::extract::{Extension, Path, Query, State};
use uuid::Uuid;

use super::Deleted;
use crate::auth::AuthUser;
use crate::database::models::Expense;
use crate::handlers::JsonBody;
use crate::middleware::{ApiResponse, ApiResult};
use crate::server::AppState;
use crate::services::expense_service::{ExpenseQuery, ExpenseReview, ExpenseStats, ExpenseUpdate, NewExpense};

/// GET /api/expenses[?status=&category=&start_date=&end_date=&employee=]
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ExpenseQuery>,
) -> ApiResult<Vec<Expense>> {
    Ok(ApiResponse::success(state.expenses().list(query, &user).await?))
}

/// GET /api/expenses/stats - totals of the caller's own expenses, per status
pub async fn stats(State(state): State<AppState>, Extension(user): Extension<AuthUser>) -> ApiResult<ExpenseStats> {
    Ok(ApiResponse::success(state.expenses().stats(&user).await?))
}

pub async fn show(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Expense> {
    Ok(ApiResponse::success(state.expenses().get(id, &user).await?))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    JsonBody(input): JsonBody<NewExpense>,
) -> ApiResult<Expense> {
    let expense = state.expenses().create(input, &user).await?;
    Ok(ApiResponse::created(expense).with_message("Expense submitted successfully"))
}

/// PUT /api/expenses/:id - owner only, while still pending
pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    JsonBody(update): JsonBody<ExpenseUpdate>,
) -> ApiResult<Expense> {
    Ok(ApiResponse::success(state.expenses().update(id, update, &user).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Deleted> {
    state.expenses().delete(id, &user).await?;
    Ok(ApiResponse::success(Deleted { id }).with_message("Expense deleted successfully"))
}

/// PUT /api/expenses/:id/review - admin approves, rejects or marks paid
pub async fn review(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    JsonBody(review): JsonBody<ExpenseReview>,
) -> ApiResult<Expense> {
    Ok(ApiResponse::success(state.expenses().review(id, review, &user).await?))
}
