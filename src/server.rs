use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::{AppConfig, TrackingConfig};
use crate::database::DocumentStore;
use crate::handlers::{protected, public};
use crate::middleware::jwt_auth_middleware;
use crate::services::{
    Clock, ClientService, ExpenseService, LocationService, MeetingService, ProjectService, UserService,
};

/// Shared handles every request handler builds its services from
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub clock: Arc<dyn Clock>,
    pub tracking: TrackingConfig,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>, tracking: TrackingConfig) -> Self {
        Self { store, clock, tracking }
    }

    pub fn clients(&self) -> ClientService {
        ClientService::new(self.store.clone(), self.clock.clone())
    }

    pub fn meetings(&self) -> MeetingService {
        MeetingService::new(self.store.clone(), self.clock.clone())
    }

    pub fn projects(&self) -> ProjectService {
        ProjectService::new(self.store.clone(), self.clock.clone())
    }

    pub fn expenses(&self) -> ExpenseService {
        ExpenseService::new(self.store.clone(), self.clock.clone())
    }

    pub fn locations(&self) -> LocationService {
        LocationService::new(self.store.clone(), self.clock.clone(), self.tracking.clone())
    }

    pub fn users(&self) -> UserService {
        UserService::new(self.store.clone(), self.clock.clone(), self.tracking.clone())
    }
}

/// Full HTTP surface: public routes, JWT-protected `/api` routes, global layers
pub fn app(state: AppState, config: &AppConfig) -> Router {
    let router = Router::new()
        .merge(public_routes())
        .merge(
            protected_routes().route_layer(middleware::from_fn_with_state(state.clone(), jwt_auth_middleware)),
        )
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.api.max_request_size_bytes))
        .layer(cors_layer(&config.security.cors_origins));

    if config.api.enable_request_logging {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(public::root))
        .route("/health", get(public::health))
        .route("/api/auth/register", post(public::auth::register))
        .route("/api/auth/login", post(public::auth::login))
        .route("/api/roles", get(public::roles::list))
        .route("/api/roles/:role/permissions", get(public::roles::permissions))
}

fn protected_routes() -> Router<AppState> {
    use protected::{auth, clients, expenses, meetings, projects, reports};

    Router::new()
        // Session and employee management
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/employees", get(auth::list_employees).post(auth::create_employee))
        .route("/api/auth/employees/:id", delete(auth::delete_employee))
        // Clients with their branch locations and contacts
        .route("/api/clients", get(clients::list).post(clients::create))
        .route("/api/clients/:id", get(clients::show).put(clients::update).delete(clients::delete))
        .route("/api/meetings", get(meetings::list).post(meetings::create))
        .route("/api/meetings/:id", get(meetings::show).put(meetings::update).delete(meetings::delete))
        .route("/api/projects", get(projects::list).post(projects::create))
        .route("/api/projects/:id", get(projects::show).put(projects::update).delete(projects::delete))
        .route("/api/expenses", get(expenses::list).post(expenses::create))
        .route("/api/expenses/stats", get(expenses::stats))
        .route("/api/expenses/:id", get(expenses::show).put(expenses::update).delete(expenses::delete))
        .route("/api/expenses/:id/review", put(expenses::review))
        // GPS tracking reports
        .route("/api/reports/log-location", post(reports::log_location))
        .route("/api/reports/employee/:id/movement", get(reports::movement))
        .route("/api/reports/employee/:id/live-location", get(reports::live_location))
        .route("/api/reports/employee/:id/location-history", get(reports::location_history))
        .route("/api/reports/employee/:id/locations", delete(reports::reset_locations))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    if origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    layer.allow_origin(AllowOrigin::list(origins))
}
