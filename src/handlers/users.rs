use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use crate::auth::{AuthUser, Operation};
use crate::errors::ServiceError;
use crate::handlers::{created, ok};
use crate::services::users::{CreateUserRequest, UpdateUserRequest, UserListQuery};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/:id", get(get_user).patch(update_user).delete(delete_user))
}

async fn list_users(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<UserListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let response = state.users.list_users(query).await?;
    Ok(ok(response))
}

async fn get_user(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    let response = state.users.get_user(id).await?;
    Ok(ok(response))
}

async fn create_user(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    user.require(Operation::UserCreate)?;
    let response = state.users.create_user(request).await?;
    Ok(created(response))
}

async fn update_user(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    user.require(Operation::UserUpdate)?;
    let response = state.users.update_user(id, request).await?;
    Ok(ok(response))
}

async fn delete_user(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    user.require(Operation::UserDelete)?;
    state.users.delete_user(id).await?;
    Ok(ok(serde_json::json!({ "deleted": true })))
}
