// Router-level checks without a socket, driven through tower's `oneshot`

use std::sync::Arc;

use anyhow::Result;
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use chrono::Utc;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use tikidan_api::auth::{generate_jwt, Claims};
use tikidan_api::config::{self, roles::Role, AppConfig, TrackingConfig};
use tikidan_api::database::{models::User, DocumentStore, MemoryStore, Repository};
use tikidan_api::server::{app, AppState};
use tikidan_api::services::SystemClock;

fn router_with(store: &MemoryStore, config: &AppConfig) -> axum::Router {
    let state = AppState::new(Arc::new(store.clone()), Arc::new(SystemClock), TrackingConfig::default());
    app(state, config)
}

fn router(store: &MemoryStore) -> axum::Router {
    router_with(store, config::config())
}

/// Store a user and mint a token for it; returns (user id, bearer token)
async fn seed_user(store: &MemoryStore, email: &str, role: Role) -> Result<(Uuid, String)> {
    let user = User {
        id: Uuid::new_v4(),
        name: "Seeded".into(),
        email: email.into(),
        password_hash: "unused".into(),
        role,
        department: None,
        employee_code: None,
        designation: None,
        mobile: None,
        created_at: Utc::now(),
    };
    let store: Arc<dyn DocumentStore> = Arc::new(store.clone());
    Repository::<User>::new(store).create(&user).await?;
    let token = generate_jwt(&Claims::new(user.id, user.email.clone(), user.role))?;
    Ok((user.id, token))
}

async fn json_body(response: axum::response::Response) -> Result<Value> {
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[tokio::test]
async fn unknown_route_is_404() -> Result<()> {
    let response = router(&MemoryStore::new())
        .oneshot(Request::builder().uri("/api/nowhere").body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn non_bearer_scheme_is_rejected() -> Result<()> {
    let response = router(&MemoryStore::new())
        .oneshot(
            Request::builder()
                .uri("/api/auth/me")
                .header(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await?;
    assert_eq!(body["error"], true);
    assert_eq!(body["message"], "Authorization header must use Bearer token format");
    Ok(())
}

#[tokio::test]
async fn token_for_a_deleted_user_is_unauthorized() -> Result<()> {
    let store = MemoryStore::new();
    let (id, token) = seed_user(&store, "gone@tikidan.test", Role::Admin).await?;
    let users: Arc<dyn DocumentStore> = Arc::new(store.clone());
    assert!(Repository::<User>::new(users).delete_id(id).await?);

    let response = router(&store)
        .oneshot(
            Request::builder()
                .uri("/api/auth/me")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await?["message"], "User no longer exists");
    Ok(())
}

#[tokio::test]
async fn role_comes_from_the_stored_user() -> Result<()> {
    let store = MemoryStore::new();
    let (id, _) = seed_user(&store, "rep@tikidan.test", Role::User).await?;
    // Token claims admin, the account does not
    let forged = generate_jwt(&Claims::new(id, "rep@tikidan.test".into(), Role::Admin))?;

    let response = router(&store)
        .oneshot(
            Request::builder()
                .uri("/api/auth/employees")
                .header(header::AUTHORIZATION, format!("Bearer {}", forged))
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn invalid_uuid_path_is_a_client_error() -> Result<()> {
    let store = MemoryStore::new();
    let (_, token) = seed_user(&store, "rep@tikidan.test", Role::User).await?;
    let response = router(&store)
        .oneshot(
            Request::builder()
                .method(Method::DELETE)
                .uri("/api/clients/not-a-uuid")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn oversized_body_is_413_and_keeps_cors_headers() -> Result<()> {
    let mut config = config::config().clone();
    config.api.max_request_size_bytes = 256;
    config.security.cors_origins = vec!["*".to_string()];

    let payload = json!({
        "name": "x".repeat(1024),
        "email": "big@tikidan.test",
        "password": "correct-horse"
    });
    let response = router_with(&MemoryStore::new(), &config)
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/api/auth/register")
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::ORIGIN, "http://localhost:5173")
                .body(Body::from(serde_json::to_vec(&payload)?))?,
        )
        .await?;

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(response.headers().contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    assert_eq!(json_body(response).await?["code"], "PAYLOAD_TOO_LARGE");
    Ok(())
}
