use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use crate::auth::{AuthUser, Operation};
use crate::errors::ServiceError;
use crate::handlers::{created, ok};
use crate::services::production::{
    CreateStageRequest, CreateTaskRequest, StageListQuery, TaskListQuery, UpdateStageRequest,
    UpdateTaskRequest,
};
use crate::AppState;

pub fn stage_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_stages).post(create_stage))
        .route("/:id", get(get_stage).patch(update_stage).delete(delete_stage))
}

pub fn task_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_tasks).post(create_task))
        .route("/:id", get(get_task).patch(update_task).delete(delete_task))
}

async fn list_stages(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<StageListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let response = state.production.list_stages(query).await?;
    Ok(ok(response))
}

async fn get_stage(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    let response = state.production.get_stage(id).await?;
    Ok(ok(response))
}

async fn create_stage(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CreateStageRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    user.require(Operation::StageCreate)?;
    let response = state.production.create_stage(request).await?;
    Ok(created(response))
}

async fn update_stage(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
    Json(request): Json<UpdateStageRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    user.require(Operation::StageUpdate)?;
    let response = state.production.update_stage(id, request).await?;
    Ok(ok(response))
}

async fn delete_stage(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    user.require(Operation::StageDelete)?;
    state.production.delete_stage(id).await?;
    Ok(ok(serde_json::json!({ "deleted": true })))
}

async fn list_tasks(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<TaskListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let response = state.production.list_tasks(query).await?;
    Ok(ok(response))
}

async fn get_task(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    let response = state.production.get_task(id).await?;
    Ok(ok(response))
}

async fn create_task(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CreateTaskRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    user.require(Operation::TaskCreate)?;
    let response = state.production.create_task(request).await?;
    Ok(created(response))
}

async fn update_task(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
    Json(request): Json<UpdateTaskRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    user.require(Operation::TaskUpdate)?;
    let response = state.production.update_task(id, request).await?;
    Ok(ok(response))
}

async fn delete_task(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    user.require(Operation::TaskDelete)?;
    state.production.delete_task(id).await?;
    Ok(ok(serde_json::json!({ "deleted": true })))
}
