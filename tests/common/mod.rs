#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use reqwest::{RequestBuilder, StatusCode};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use tikidan_api::config::{self, TrackingConfig};
use tikidan_api::database::{DocumentStore, MemoryStore};
use tikidan_api::server::{app, AppState};
use tikidan_api::services::{FixedClock, UserService};

pub const PASSWORD: &str = "correct-horse";

/// One in-process server per test, backed by its own memory store and clock
pub struct TestApp {
    pub base_url: String,
    pub http: reqwest::Client,
    pub store: MemoryStore,
    pub clock: Arc<FixedClock>,
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap()
}

impl TestApp {
    pub async fn spawn() -> Result<Self> {
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let addr = SocketAddr::from(([127, 0, 0, 1], port));
        let listener = TcpListener::bind(addr).await.context("failed to bind test listener")?;

        let store = MemoryStore::new();
        let clock = Arc::new(FixedClock::new(start_time()));
        let state = AppState::new(Arc::new(store.clone()), clock.clone(), TrackingConfig::default());
        let router = app(state, config::config());

        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        Ok(Self {
            base_url: format!("http://{}", addr),
            http: reqwest::Client::new(),
            store,
            clock,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn get(&self, token: &str, path: &str) -> RequestBuilder {
        self.http.get(self.url(path)).bearer_auth(token)
    }

    pub fn post(&self, token: &str, path: &str) -> RequestBuilder {
        self.http.post(self.url(path)).bearer_auth(token)
    }

    pub fn put(&self, token: &str, path: &str) -> RequestBuilder {
        self.http.put(self.url(path)).bearer_auth(token)
    }

    pub fn delete(&self, token: &str, path: &str) -> RequestBuilder {
        self.http.delete(self.url(path)).bearer_auth(token)
    }

    /// Register a regular user over HTTP; returns (token, user id)
    pub async fn register(&self, email: &str) -> Result<(String, String)> {
        let res = self
            .http
            .post(self.url("/api/auth/register"))
            .json(&json!({ "name": "Field Rep", "email": email, "password": PASSWORD }))
            .send()
            .await?;
        assert_eq!(res.status(), StatusCode::CREATED, "register failed");
        let body = res.json::<Value>().await?;
        Ok(token_and_id(&body))
    }

    /// Admins cannot self-register; seed one directly, then log in over HTTP
    pub async fn admin(&self) -> Result<(String, String)> {
        let store: Arc<dyn DocumentStore> = Arc::new(self.store.clone());
        UserService::new(store, self.clock.clone(), TrackingConfig::default())
            .create_admin("Admin".into(), "admin@tikidan.test".into(), PASSWORD.into())
            .await?;
        self.login("admin@tikidan.test").await
    }

    pub async fn login(&self, email: &str) -> Result<(String, String)> {
        let res = self
            .http
            .post(self.url("/api/auth/login"))
            .json(&json!({ "email": email, "password": PASSWORD }))
            .send()
            .await?;
        assert_eq!(res.status(), StatusCode::OK, "login failed");
        let body = res.json::<Value>().await?;
        Ok(token_and_id(&body))
    }
}

fn token_and_id(body: &Value) -> (String, String) {
    (
        body["data"]["token"].as_str().unwrap_or_default().to_string(),
        body["data"]["user"]["id"].as_str().unwrap_or_default().to_string(),
    )
}
