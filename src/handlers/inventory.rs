use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use crate::auth::{AuthUser, Operation};
use crate::errors::ServiceError;
use crate::handlers::{created, ok};
use crate::services::inventory::{
    CreateMaterialRequest, MaterialListQuery, UpdateMaterialRequest,
};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_materials).post(create_material))
        .route("/low-stock", get(list_low_stock))
        .route(
            "/:id",
            get(get_material).patch(update_material).delete(delete_material),
        )
}

async fn list_materials(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<MaterialListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let response = state.inventory.list_materials(query).await?;
    Ok(ok(response))
}

/// Shortcut for the dashboard's reorder report.
async fn list_low_stock(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(mut query): Query<MaterialListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    query.low_stock = true;
    let response = state.inventory.list_materials(query).await?;
    Ok(ok(response))
}

async fn get_material(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    let response = state.inventory.get_material(id).await?;
    Ok(ok(response))
}

async fn create_material(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CreateMaterialRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    user.require(Operation::InventoryCreate)?;
    let response = state.inventory.create_material(request).await?;
    Ok(created(response))
}

async fn update_material(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
    Json(request): Json<UpdateMaterialRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    user.require(Operation::InventoryUpdate)?;
    let response = state.inventory.update_material(id, request).await?;
    Ok(ok(response))
}

async fn delete_material(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    user.require(Operation::InventoryDelete)?;
    state.inventory.delete_material(id).await?;
    Ok(ok(serde_json::json!({ "deleted": true })))
}
