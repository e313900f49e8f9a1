//! Material inventory for the fabrication floor: sheet acrylic, LED strip,
//! transformers, packaging. Carries a low-stock report driven by per-item
//! reorder points.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use sea_orm::sea_query::Expr;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use validator::Validate;

use crate::db::DbPool;
use crate::entities::material_inventory;
use crate::errors::ServiceError;
use crate::models::MaterialType;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateMaterialRequest {
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    pub material_type: String,
    #[validate(range(min = 0, message = "quantity must not be negative"))]
    pub quantity: i32,
    #[validate(length(min = 1, message = "unit is required"))]
    pub unit: String,
    #[validate(range(min = 0, message = "reorder point must not be negative"))]
    pub reorder_point: i32,
    pub supplier_name: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateMaterialRequest {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: Option<String>,
    pub material_type: Option<String>,
    #[validate(range(min = 0, message = "quantity must not be negative"))]
    pub quantity: Option<i32>,
    #[validate(length(min = 1, message = "unit must not be empty"))]
    pub unit: Option<String>,
    #[validate(range(min = 0, message = "reorder point must not be negative"))]
    pub reorder_point: Option<i32>,
    pub supplier_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MaterialListQuery {
    pub material_type: Option<String>,
    /// Only items at or below their reorder point.
    #[serde(default)]
    pub low_stock: bool,
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

fn default_page() -> u64 {
    1
}
fn default_limit() -> u64 {
    20
}

#[derive(Debug, Serialize)]
pub struct MaterialResponse {
    pub id: i32,
    pub name: String,
    pub material_type: String,
    pub quantity: i32,
    pub unit: String,
    pub reorder_point: i32,
    pub low_stock: bool,
    pub supplier_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct MaterialListResponse {
    pub materials: Vec<MaterialResponse>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
}

#[derive(Clone)]
pub struct InventoryService {
    db: Arc<DbPool>,
}

impl InventoryService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request))]
    pub async fn create_material(
        &self,
        request: CreateMaterialRequest,
    ) -> Result<MaterialResponse, ServiceError> {
        request.validate()?;
        let material_type = parse_material_type(&request.material_type)?;
        let now = Utc::now();

        let model = material_inventory::ActiveModel {
            name: Set(request.name),
            material_type: Set(material_type.to_string()),
            quantity: Set(request.quantity),
            unit: Set(request.unit),
            reorder_point: Set(request.reorder_point),
            supplier_name: Set(request.supplier_name),
            deleted: Set(false),
            deleted_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        info!(material_id = model.id, "material created");
        Ok(to_response(model))
    }

    #[instrument(skip(self))]
    pub async fn get_material(&self, material_id: i32) -> Result<MaterialResponse, ServiceError> {
        let model = self.find_live(material_id).await?;
        Ok(to_response(model))
    }

    #[instrument(skip(self))]
    pub async fn list_materials(
        &self,
        query: MaterialListQuery,
    ) -> Result<MaterialListResponse, ServiceError> {
        let mut finder =
            material_inventory::Entity::find().filter(material_inventory::Column::Deleted.eq(false));
        if let Some(raw) = query.material_type.as_deref() {
            let kind = parse_material_type(raw)?;
            finder = finder.filter(material_inventory::Column::MaterialType.eq(kind.to_string()));
        }
        if query.low_stock {
            finder = finder.filter(
                Expr::col(material_inventory::Column::Quantity)
                    .lte(Expr::col(material_inventory::Column::ReorderPoint)),
            );
        }

        let page = query.page.max(1);
        let limit = query.limit.clamp(1, 100);
        let paginator = finder
            .order_by_asc(material_inventory::Column::Name)
            .paginate(&*self.db, limit);
        let total = paginator.num_items().await?;
        let materials = paginator.fetch_page(page - 1).await?;

        Ok(MaterialListResponse {
            materials: materials.into_iter().map(to_response).collect(),
            total,
            page,
            limit,
        })
    }

    #[instrument(skip(self, request))]
    pub async fn update_material(
        &self,
        material_id: i32,
        request: UpdateMaterialRequest,
    ) -> Result<MaterialResponse, ServiceError> {
        request.validate()?;
        let existing = self.find_live(material_id).await?;

        let mut active: material_inventory::ActiveModel = existing.into();
        if let Some(name) = request.name {
            active.name = Set(name);
        }
        if let Some(raw) = request.material_type.as_deref() {
            active.material_type = Set(parse_material_type(raw)?.to_string());
        }
        if let Some(quantity) = request.quantity {
            active.quantity = Set(quantity);
        }
        if let Some(unit) = request.unit {
            active.unit = Set(unit);
        }
        if let Some(reorder_point) = request.reorder_point {
            active.reorder_point = Set(reorder_point);
        }
        if let Some(supplier_name) = request.supplier_name {
            active.supplier_name = Set(Some(supplier_name));
        }
        active.updated_at = Set(Utc::now());
        let updated = active.update(&*self.db).await?;

        info!(material_id, "material updated");
        Ok(to_response(updated))
    }

    #[instrument(skip(self))]
    pub async fn delete_material(&self, material_id: i32) -> Result<(), ServiceError> {
        let existing = self.find_live(material_id).await?;

        let now = Utc::now();
        let mut active: material_inventory::ActiveModel = existing.into();
        active.deleted = Set(true);
        active.deleted_at = Set(Some(now));
        active.updated_at = Set(now);
        active.update(&*self.db).await?;

        info!(material_id, "material soft-deleted");
        Ok(())
    }

    async fn find_live(&self, material_id: i32) -> Result<material_inventory::Model, ServiceError> {
        material_inventory::Entity::find_by_id(material_id)
            .filter(material_inventory::Column::Deleted.eq(false))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("material {material_id} not found")))
    }
}

fn to_response(model: material_inventory::Model) -> MaterialResponse {
    let low_stock = model.quantity <= model.reorder_point;
    MaterialResponse {
        id: model.id,
        name: model.name,
        material_type: model.material_type,
        quantity: model.quantity,
        unit: model.unit,
        reorder_point: model.reorder_point,
        low_stock,
        supplier_name: model.supplier_name,
        created_at: model.created_at,
        updated_at: model.updated_at,
    }
}

fn parse_material_type(raw: &str) -> Result<MaterialType, ServiceError> {
    MaterialType::from_str(raw)
        .map_err(|_| ServiceError::ValidationError(format!("unknown material type: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_quantities_fail_validation() {
        let request = CreateMaterialRequest {
            name: "12mm acrylic sheet".to_string(),
            material_type: "RAW".to_string(),
            quantity: -1,
            unit: "sheet".to_string(),
            reorder_point: 5,
            supplier_name: None,
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn low_stock_is_at_or_below_reorder_point() {
        let now = Utc::now();
        let model = material_inventory::Model {
            id: 1,
            name: "LED strip 24V".to_string(),
            material_type: "COMPONENT".to_string(),
            quantity: 5,
            unit: "roll".to_string(),
            reorder_point: 5,
            supplier_name: None,
            deleted: false,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };
        assert!(to_response(model).low_stock);
    }
}
