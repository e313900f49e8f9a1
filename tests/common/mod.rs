//! Shared harness for integration tests: in-memory sqlite with migrations
//! applied, a fully wired router, and one seeded account per role.

// Each test binary compiles this module separately and uses a subset of it.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use http_body_util::BodyExt;
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, Set};
use serde_json::Value;
use tower::util::ServiceExt;

use signcraft_api::auth::{AuthConfig, AuthService};
use signcraft_api::db::DbPool;
use signcraft_api::entities::user;
use signcraft_api::rate_limiter::{RateLimitConfig, RateLimitPolicy, RateLimiter};
use signcraft_api::{app, AppState};

pub struct TestApp {
    pub router: Router,
    pub db: Arc<DbPool>,
    pub admin_token: String,
    pub manager_token: String,
    pub worker_token: String,
}

pub const ADMIN_PASSWORD: &str = "admin-password-1";
pub const WORKER_PASSWORD: &str = "worker-password-1";

pub async fn spawn_app() -> TestApp {
    spawn_app_with_limits(10_000).await
}

/// Variant with a configurable request budget so rate-limit tests can use a
/// tight window while everything else stays unconstrained.
pub async fn spawn_app_with_limits(requests_per_window: u32) -> TestApp {
    // a single pooled connection so every handle sees the same in-memory db
    let mut options = ConnectOptions::new("sqlite::memory:".to_string());
    options.max_connections(1).sqlx_logging(false);
    let db = Arc::new(
        Database::connect(options)
            .await
            .expect("sqlite in-memory connect"),
    );
    signcraft_api::db::run_migrations(&db)
        .await
        .expect("migrations apply");

    let auth = Arc::new(AuthService::new(
        AuthConfig {
            jwt_secret: "integration-test-secret".to_string(),
            jwt_issuer: "signcraft-api".to_string(),
            jwt_audience: "signcraft-dashboard".to_string(),
            access_token_expiration: Duration::from_secs(3600),
        },
        db.clone(),
    ));

    let admin = seed_user(&db, "admin@signcraft.test", "Alva Admin", ADMIN_PASSWORD, "ADMIN").await;
    let manager = seed_user(
        &db,
        "manager@signcraft.test",
        "Mori Manager",
        "manager-password-1",
        "MANAGER",
    )
    .await;
    let worker = seed_user(
        &db,
        "worker@signcraft.test",
        "Wen Worker",
        WORKER_PASSWORD,
        "WORKER",
    )
    .await;

    let admin_token = auth.token_for(&admin).expect("admin token");
    let manager_token = auth.token_for(&manager).expect("manager token");
    let worker_token = auth.token_for(&worker).expect("worker token");

    let limiter = Arc::new(RateLimiter::new(RateLimitConfig {
        default_policy: RateLimitPolicy {
            requests_per_window,
            window: Duration::from_secs(60),
        },
        path_policies: vec![(
            "/auth/login".to_string(),
            RateLimitPolicy {
                requests_per_window: requests_per_window.min(5),
                window: Duration::from_secs(60),
            },
        )],
        sweep_interval: Duration::from_secs(60),
    }));

    let state = AppState::new(db.clone(), auth);
    let router = app(state, limiter);

    TestApp {
        router,
        db,
        admin_token,
        manager_token,
        worker_token,
    }
}

async fn seed_user(
    db: &DbPool,
    email: &str,
    name: &str,
    password: &str,
    role: &str,
) -> user::Model {
    let now = Utc::now();
    user::ActiveModel {
        email: Set(email.to_string()),
        name: Set(name.to_string()),
        password_hash: Set(AuthService::hash_password(password).expect("hash")),
        role: Set(role.to_string()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("seed user")
}

impl TestApp {
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&json).expect("serialize")))
                .expect("request"),
            None => builder.body(Body::empty()).expect("request"),
        };

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("read body")
            .to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PATCH, uri, Some(token), Some(body))
            .await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, Some(token), None).await
    }

    /// Creates a customer through the API and returns its id.
    pub async fn seed_customer(&self, name: &str, email: &str) -> i32 {
        let (status, body) = self
            .post(
                "/api/v1/customers",
                &self.admin_token,
                serde_json::json!({ "name": name, "email": email }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "seed customer: {body}");
        body["data"]["id"].as_i64().expect("customer id") as i32
    }

    /// Creates a product through the API and returns its id.
    pub async fn seed_product(&self, name: &str, material_cost: f64, labor_cost: f64) -> i32 {
        let (status, body) = self
            .post(
                "/api/v1/products",
                &self.admin_token,
                serde_json::json!({
                    "name": name,
                    "product_type": "NEON",
                    "material_cost": material_cost,
                    "labor_cost": labor_cost,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "seed product: {body}");
        body["data"]["id"].as_i64().expect("product id") as i32
    }

    /// Creates an order with a single line and returns its id.
    pub async fn seed_order(&self, customer_id: i32, product_id: i32, quantity: i32) -> i32 {
        let (status, body) = self
            .post(
                "/api/v1/orders",
                &self.admin_token,
                serde_json::json!({
                    "customer_id": customer_id,
                    "order_products": [
                        { "product_id": product_id, "quantity": quantity }
                    ],
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "seed order: {body}");
        body["data"]["id"].as_i64().expect("order id") as i32
    }
}
