pub mod auth;
pub mod roles;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::server::AppState;

/// GET / - service banner and route map
pub async fn root() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "name": "Tikidan API",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Sales CRM backend: clients, meetings, projects, expenses and field tracking",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "public_auth": "/api/auth/register, /api/auth/login (public - token acquisition)",
                "roles": "/api/roles[/:role/permissions] (public)",
                "auth": "/api/auth/me, /api/auth/logout, /api/auth/employees (protected)",
                "clients": "/api/clients[/:id] (protected)",
                "meetings": "/api/meetings[/:id] (protected)",
                "projects": "/api/projects[/:id] (protected)",
                "expenses": "/api/expenses[/:id|/stats|/:id/review] (protected)",
                "reports": "/api/reports/log-location, /api/reports/employee/:id/* (protected)",
            }
        }
    }))
}

/// GET /health - liveness plus a store ping
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = state.clock.now();

    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "database unavailable",
                    "data": {
                        "status": "degraded",
                        "timestamp": now,
                        "database_error": e.to_string()
                    }
                })),
            )
        }
    }
}
