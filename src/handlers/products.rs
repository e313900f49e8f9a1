use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use crate::auth::{AuthUser, Operation};
use crate::errors::ServiceError;
use crate::handlers::{created, ok};
use crate::services::products::{CreateProductRequest, ProductListQuery, UpdateProductRequest};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route(
            "/:id",
            get(get_product).patch(update_product).delete(delete_product),
        )
}

async fn list_products(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<ProductListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let response = state.products.list_products(query).await?;
    Ok(ok(response))
}

async fn get_product(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    let response = state.products.get_product(id).await?;
    Ok(ok(response))
}

async fn create_product(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CreateProductRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    user.require(Operation::ProductCreate)?;
    let response = state.products.create_product(request).await?;
    Ok(created(response))
}

async fn update_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
    Json(request): Json<UpdateProductRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    user.require(Operation::ProductUpdate)?;
    let response = state.products.update_product(id, request).await?;
    Ok(ok(response))
}

async fn delete_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    user.require(Operation::ProductDelete)?;
    state.products.delete_product(id).await?;
    Ok(ok(serde_json::json!({ "deleted": true })))
}
