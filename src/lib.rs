//! Back office API for a custom sign fabrication shop.
//!
//! Layering: `handlers` (HTTP, auth gates) over `services` (business logic,
//! transactions) over `entities` (sea-orm models). Cross-cutting concerns
//! live in `auth`, `rate_limiter`, `errors`, and `config`.

use std::sync::Arc;

use axum::{
    extract::State,
    middleware,
    response::IntoResponse,
    routing::get,
    Extension, Json, Router,
};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod rate_limiter;
pub mod services;

use auth::AuthService;
use db::DbPool;
use errors::ServiceError;
use rate_limiter::{rate_limit_middleware, RateLimiter};
use services::{
    CustomerService, InventoryService, OrderService, ProductService, ProductionService,
    UserService,
};

/// Shared application state; cheap to clone, everything inside is Arc-backed.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbPool>,
    pub auth: Arc<AuthService>,
    pub customers: CustomerService,
    pub products: ProductService,
    pub orders: OrderService,
    pub production: ProductionService,
    pub inventory: InventoryService,
    pub users: UserService,
}

impl AppState {
    pub fn new(db: Arc<DbPool>, auth: Arc<AuthService>) -> Self {
        Self {
            customers: CustomerService::new(db.clone()),
            products: ProductService::new(db.clone()),
            orders: OrderService::new(db.clone()),
            production: ProductionService::new(db.clone()),
            inventory: InventoryService::new(db.clone()),
            users: UserService::new(db.clone()),
            db,
            auth,
        }
    }
}

/// Builds the full router: versioned API, auth, health, and the
/// rate-limiting and tracing layers.
pub fn app(state: AppState, limiter: Arc<RateLimiter>) -> Router {
    let api = Router::new()
        .nest("/customers", handlers::customers::routes())
        .nest("/products", handlers::products::routes())
        .nest("/orders", handlers::orders::routes())
        .nest("/production/stages", handlers::production::stage_routes())
        .nest("/production/tasks", handlers::production::task_routes())
        .nest("/inventory", handlers::inventory::routes())
        .nest("/users", handlers::users::routes());

    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .nest("/api/v1", api)
        .with_state(state.clone())
        .nest("/auth", auth::auth_routes().with_state(state.auth.clone()))
        .layer(Extension(state.auth.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(middleware::from_fn_with_state(
            limiter,
            rate_limit_middleware,
        ))
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Liveness plus a database round-trip.
async fn status(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    state.db.ping().await?;
    Ok(Json(serde_json::json!({
        "status": "ok",
        "database": "reachable",
        "version": env!("CARGO_PKG_VERSION"),
    })))
}
