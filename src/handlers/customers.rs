use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use crate::auth::{AuthUser, Operation};
use crate::errors::ServiceError;
use crate::handlers::{created, ok};
use crate::services::customers::{
    CreateCustomerRequest, CustomerListQuery, UpdateCustomerRequest,
};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_customers).post(create_customer))
        .route(
            "/:id",
            get(get_customer).patch(update_customer).delete(delete_customer),
        )
}

async fn list_customers(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<CustomerListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let response = state.customers.list_customers(query).await?;
    Ok(ok(response))
}

async fn get_customer(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    let response = state.customers.get_customer(id).await?;
    Ok(ok(response))
}

async fn create_customer(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CreateCustomerRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    user.require(Operation::CustomerCreate)?;
    let response = state.customers.create_customer(request).await?;
    Ok(created(response))
}

async fn update_customer(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
    Json(request): Json<UpdateCustomerRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    user.require(Operation::CustomerUpdate)?;
    let response = state.customers.update_customer(id, request).await?;
    Ok(ok(response))
}

async fn delete_customer(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    user.require(Operation::CustomerDelete)?;
    state.customers.delete_customer(id).await?;
    Ok(ok(serde_json::json!({ "deleted": true })))
}
