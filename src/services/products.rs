//! Product catalog. The selling price defaults to the cost basis times a
//! fixed markup when the caller does not set it explicitly; cost updates
//! recompute the derived price inside the update transaction.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use validator::Validate;

use crate::db::DbPool;
use crate::entities::product;
use crate::errors::ServiceError;
use crate::models::{ProductStatus, ProductType};

/// Markup applied over material plus labor cost for the default price.
const PRICE_MARKUP: Decimal = dec!(1.3);

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    pub description: Option<String>,
    pub product_type: String,
    pub material_cost: Decimal,
    pub labor_cost: Decimal,
    /// Explicit selling price; omitted means derive from costs.
    pub price: Option<Decimal>,
    pub status: Option<String>,
    pub stock: Option<i32>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub product_type: Option<String>,
    pub material_cost: Option<Decimal>,
    pub labor_cost: Option<Decimal>,
    pub price: Option<Decimal>,
    pub status: Option<String>,
    pub stock: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductListQuery {
    pub product_type: Option<String>,
    pub status: Option<String>,
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
pub struct ProductResponse {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub product_type: String,
    pub material_cost: Decimal,
    pub labor_cost: Decimal,
    pub price: Decimal,
    pub status: String,
    pub stock: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ProductListResponse {
    pub products: Vec<ProductResponse>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
}

#[derive(Clone)]
pub struct ProductService {
    db: Arc<DbPool>,
}

impl ProductService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request))]
    pub async fn create_product(
        &self,
        request: CreateProductRequest,
    ) -> Result<ProductResponse, ServiceError> {
        request.validate()?;
        validate_costs(request.material_cost, request.labor_cost, request.price)?;
        let product_type = parse_product_type(&request.product_type)?;
        let status = match request.status.as_deref() {
            Some(raw) => parse_product_status(raw)?,
            None => ProductStatus::Active,
        };

        let price = request
            .price
            .unwrap_or_else(|| derive_price(request.material_cost, request.labor_cost));
        let now = Utc::now();

        let model = product::ActiveModel {
            name: Set(request.name),
            description: Set(request.description),
            product_type: Set(product_type.to_string()),
            material_cost: Set(request.material_cost),
            labor_cost: Set(request.labor_cost),
            price: Set(price),
            status: Set(status.to_string()),
            stock: Set(request.stock.unwrap_or(0)),
            deleted: Set(false),
            deleted_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        info!(product_id = model.id, %price, "product created");
        Ok(to_response(model))
    }

    #[instrument(skip(self))]
    pub async fn get_product(&self, product_id: i32) -> Result<ProductResponse, ServiceError> {
        let model = product::Entity::find_by_id(product_id)
            .filter(product::Column::Deleted.eq(false))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("product {product_id} not found")))?;
        Ok(to_response(model))
    }

    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        query: ProductListQuery,
    ) -> Result<ProductListResponse, ServiceError> {
        let mut finder = product::Entity::find().filter(product::Column::Deleted.eq(false));
        if let Some(raw) = query.product_type.as_deref() {
            let kind = parse_product_type(raw)?;
            finder = finder.filter(product::Column::ProductType.eq(kind.to_string()));
        }
        if let Some(raw) = query.status.as_deref() {
            let status = parse_product_status(raw)?;
            finder = finder.filter(product::Column::Status.eq(status.to_string()));
        }

        let page = query.page.max(1);
        let limit = query.limit.clamp(1, 100);
        let paginator = finder
            .order_by_desc(product::Column::CreatedAt)
            .paginate(&*self.db, limit);
        let total = paginator.num_items().await?;
        let products = paginator.fetch_page(page - 1).await?;

        Ok(ProductListResponse {
            products: products.into_iter().map(to_response).collect(),
            total,
            page,
            limit,
        })
    }

    /// Applies a patch. When a cost changes without an explicit price, the
    /// price is recomputed from the merged costs; an explicit price always
    /// wins. The pre-update row is read and merged inside one transaction.
    #[instrument(skip(self, request))]
    pub async fn update_product(
        &self,
        product_id: i32,
        request: UpdateProductRequest,
    ) -> Result<ProductResponse, ServiceError> {
        request.validate()?;
        let txn = self.db.begin().await?;

        let existing = product::Entity::find_by_id(product_id)
            .filter(product::Column::Deleted.eq(false))
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("product {product_id} not found")))?;

        let material_cost = request.material_cost.unwrap_or(existing.material_cost);
        let labor_cost = request.labor_cost.unwrap_or(existing.labor_cost);
        validate_costs(material_cost, labor_cost, request.price)?;

        let costs_changed = request.material_cost.is_some() || request.labor_cost.is_some();
        let price = match (request.price, costs_changed) {
            (Some(explicit), _) => Some(explicit),
            (None, true) => Some(derive_price(material_cost, labor_cost)),
            (None, false) => None,
        };

        let mut active: product::ActiveModel = existing.into();
        if let Some(name) = request.name {
            active.name = Set(name);
        }
        if let Some(description) = request.description {
            active.description = Set(Some(description));
        }
        if let Some(raw) = request.product_type.as_deref() {
            active.product_type = Set(parse_product_type(raw)?.to_string());
        }
        if let Some(raw) = request.status.as_deref() {
            active.status = Set(parse_product_status(raw)?.to_string());
        }
        if let Some(stock) = request.stock {
            if stock < 0 {
                return Err(ServiceError::ValidationError(
                    "stock must not be negative".to_string(),
                ));
            }
            active.stock = Set(stock);
        }
        active.material_cost = Set(material_cost);
        active.labor_cost = Set(labor_cost);
        if let Some(price) = price {
            active.price = Set(price);
        }
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await?;
        txn.commit().await?;

        info!(product_id, price = %updated.price, "product updated");
        Ok(to_response(updated))
    }

    /// Soft-delete. Existing order lines keep their snapshotted price; the
    /// product simply stops resolving for new orders.
    #[instrument(skip(self))]
    pub async fn delete_product(&self, product_id: i32) -> Result<(), ServiceError> {
        let existing = product::Entity::find_by_id(product_id)
            .filter(product::Column::Deleted.eq(false))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("product {product_id} not found")))?;

        let now = Utc::now();
        let mut active: product::ActiveModel = existing.into();
        active.deleted = Set(true);
        active.deleted_at = Set(Some(now));
        active.updated_at = Set(now);
        active.update(&*self.db).await?;

        info!(product_id, "product soft-deleted");
        Ok(())
    }
}

fn to_response(model: product::Model) -> ProductResponse {
    ProductResponse {
        id: model.id,
        name: model.name,
        description: model.description,
        product_type: model.product_type,
        material_cost: model.material_cost,
        labor_cost: model.labor_cost,
        price: model.price,
        status: model.status,
        stock: model.stock,
        created_at: model.created_at,
        updated_at: model.updated_at,
    }
}

pub(crate) fn derive_price(material_cost: Decimal, labor_cost: Decimal) -> Decimal {
    (material_cost + labor_cost) * PRICE_MARKUP
}

fn validate_costs(
    material_cost: Decimal,
    labor_cost: Decimal,
    price: Option<Decimal>,
) -> Result<(), ServiceError> {
    if material_cost < Decimal::ZERO || labor_cost < Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "costs must not be negative".to_string(),
        ));
    }
    if let Some(price) = price {
        if price < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "price must not be negative".to_string(),
            ));
        }
    }
    Ok(())
}

fn parse_product_type(raw: &str) -> Result<ProductType, ServiceError> {
    ProductType::from_str(raw)
        .map_err(|_| ServiceError::ValidationError(format!("unknown product type: {raw}")))
}

fn parse_product_status(raw: &str) -> Result<ProductStatus, ServiceError> {
    ProductStatus::from_str(raw)
        .map_err(|_| ServiceError::ValidationError(format!("unknown product status: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_price_is_costs_times_markup() {
        assert_eq!(derive_price(dec!(150), dec!(100)), dec!(325.0));
        assert_eq!(derive_price(dec!(0), dec!(0)), dec!(0.0));
    }

    #[test]
    fn negative_costs_are_rejected() {
        assert!(validate_costs(dec!(-1), dec!(0), None).is_err());
        assert!(validate_costs(dec!(1), dec!(1), Some(dec!(-5))).is_err());
        assert!(validate_costs(dec!(1), dec!(1), Some(dec!(5))).is_ok());
    }

    #[test]
    fn product_type_parsing_is_strict() {
        assert!(parse_product_type("NEON").is_ok());
        assert!(parse_product_type("LED").is_ok());
        assert!(parse_product_type("HOLOGRAM").is_err());
    }
}
