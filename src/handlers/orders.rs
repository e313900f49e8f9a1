use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::auth::{AuthUser, Operation};
use crate::errors::ServiceError;
use crate::handlers::{created, ok};
use crate::services::orders::{CreateOrderRequest, OrderListQuery, UpdateOrderRequest};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders).post(create_order))
        .route(
            "/:id",
            get(get_order).patch(update_order).delete(delete_order),
        )
}

#[derive(Debug, Default, Deserialize)]
struct GetOrderQuery {
    #[serde(default)]
    include_deleted: bool,
}

async fn list_orders(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<OrderListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let response = state.orders.list_orders(query).await?;
    Ok(ok(response))
}

async fn get_order(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<i32>,
    Query(query): Query<GetOrderQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let response = state.orders.get_order(id, query.include_deleted).await?;
    Ok(ok(response))
}

async fn create_order(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CreateOrderRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    user.require(Operation::OrderCreate)?;
    let response = state.orders.create_order(request).await?;
    Ok(created(response))
}

async fn update_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
    Json(request): Json<UpdateOrderRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    user.require(Operation::OrderUpdate)?;
    let response = state.orders.update_order(id, request).await?;
    Ok(ok(response))
}

async fn delete_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    user.require(Operation::OrderDelete)?;
    state.orders.delete_order(id).await?;
    Ok(ok(serde_json::json!({ "deleted": true })))
}
