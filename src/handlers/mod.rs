//! HTTP handlers. Each handler authenticates via the [`AuthUser`] extractor,
//! gates mutations through the policy table, validates the DTO, and
//! delegates to a service. No business logic lives here.
//!
//! [`AuthUser`]: crate::auth::AuthUser

pub mod customers;
pub mod inventory;
pub mod orders;
pub mod production;
pub mod products;
pub mod users;

use axum::{http::StatusCode, Json};
use serde::Serialize;

/// Success envelope shared by every endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

pub(crate) fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        success: true,
        data,
    })
}

pub(crate) fn created<T: Serialize>(data: T) -> (StatusCode, Json<ApiResponse<T>>) {
    (StatusCode::CREATED, ok(data))
}
