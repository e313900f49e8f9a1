//! Customer CRUD. Deletion is guarded: a customer with live orders cannot be
//! removed, checked inside the delete transaction.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::db::DbPool;
use crate::entities::{customer, order};
use crate::errors::ServiceError;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCustomerRequest {
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    #[validate(email(message = "email must be a valid address"))]
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateCustomerRequest {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: Option<String>,
    #[validate(email(message = "email must be a valid address"))]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CustomerListQuery {
    /// Case-insensitive substring match on name or email.
    pub search: Option<String>,
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
pub struct CustomerResponse {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct CustomerListResponse {
    pub customers: Vec<CustomerResponse>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
}

#[derive(Clone)]
pub struct CustomerService {
    db: Arc<DbPool>,
}

impl CustomerService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request))]
    pub async fn create_customer(
        &self,
        request: CreateCustomerRequest,
    ) -> Result<CustomerResponse, ServiceError> {
        request.validate()?;
        let now = Utc::now();

        let duplicate = customer::Entity::find()
            .filter(customer::Column::Email.eq(request.email.clone()))
            .filter(customer::Column::Deleted.eq(false))
            .count(&*self.db)
            .await?
            > 0;
        if duplicate {
            return Err(ServiceError::Conflict(format!(
                "customer with email {} already exists",
                request.email
            )));
        }

        let model = customer::ActiveModel {
            name: Set(request.name),
            email: Set(request.email),
            phone: Set(request.phone),
            address: Set(request.address),
            deleted: Set(false),
            deleted_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        info!(customer_id = model.id, "customer created");
        Ok(to_response(model))
    }

    #[instrument(skip(self))]
    pub async fn get_customer(&self, customer_id: i32) -> Result<CustomerResponse, ServiceError> {
        let model = customer::Entity::find_by_id(customer_id)
            .filter(customer::Column::Deleted.eq(false))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("customer {customer_id} not found")))?;
        Ok(to_response(model))
    }

    #[instrument(skip(self))]
    pub async fn list_customers(
        &self,
        query: CustomerListQuery,
    ) -> Result<CustomerListResponse, ServiceError> {
        let mut finder = customer::Entity::find().filter(customer::Column::Deleted.eq(false));
        if let Some(search) = query.search.as_deref().filter(|s| !s.is_empty()) {
            // LOWER() on both sides keeps the match case-insensitive on
            // backends whose LIKE is case-sensitive.
            let pattern = format!("%{}%", search.to_lowercase());
            let lowered = |column: customer::Column| {
                Expr::expr(Func::lower(Expr::col((customer::Entity, column))))
            };
            finder = finder.filter(
                sea_orm::Condition::any()
                    .add(lowered(customer::Column::Name).like(pattern.clone()))
                    .add(lowered(customer::Column::Email).like(pattern)),
            );
        }

        let page = query.page.max(1);
        let limit = query.limit.clamp(1, 100);
        let paginator = finder
            .order_by_desc(customer::Column::CreatedAt)
            .paginate(&*self.db, limit);
        let total = paginator.num_items().await?;
        let customers = paginator.fetch_page(page - 1).await?;

        Ok(CustomerListResponse {
            customers: customers.into_iter().map(to_response).collect(),
            total,
            page,
            limit,
        })
    }

    #[instrument(skip(self, request))]
    pub async fn update_customer(
        &self,
        customer_id: i32,
        request: UpdateCustomerRequest,
    ) -> Result<CustomerResponse, ServiceError> {
        request.validate()?;
        let existing = customer::Entity::find_by_id(customer_id)
            .filter(customer::Column::Deleted.eq(false))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("customer {customer_id} not found")))?;

        if let Some(email) = request.email.as_deref() {
            let taken = customer::Entity::find()
                .filter(customer::Column::Email.eq(email))
                .filter(customer::Column::Deleted.eq(false))
                .filter(customer::Column::Id.ne(customer_id))
                .count(&*self.db)
                .await?
                > 0;
            if taken {
                return Err(ServiceError::Conflict(format!(
                    "customer with email {email} already exists"
                )));
            }
        }

        let mut active: customer::ActiveModel = existing.into();
        if let Some(name) = request.name {
            active.name = Set(name);
        }
        if let Some(email) = request.email {
            active.email = Set(email);
        }
        if let Some(phone) = request.phone {
            active.phone = Set(Some(phone));
        }
        if let Some(address) = request.address {
            active.address = Set(Some(address));
        }
        active.updated_at = Set(Utc::now());
        let updated = active.update(&*self.db).await?;

        info!(customer_id, "customer updated");
        Ok(to_response(updated))
    }

    /// Soft-deletes the customer unless live orders still reference it. The
    /// existence check and the delete run in one transaction so a
    /// concurrently created order cannot slip past the guard.
    #[instrument(skip(self))]
    pub async fn delete_customer(&self, customer_id: i32) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        let existing = customer::Entity::find_by_id(customer_id)
            .filter(customer::Column::Deleted.eq(false))
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("customer {customer_id} not found")))?;

        let live_orders = order::Entity::find()
            .filter(order::Column::CustomerId.eq(customer_id))
            .filter(order::Column::Deleted.eq(false))
            .count(&txn)
            .await?;
        if live_orders > 0 {
            warn!(customer_id, live_orders, "customer delete blocked by orders");
            return Err(ServiceError::Conflict(format!(
                "customer {customer_id} still has {live_orders} active orders"
            )));
        }

        let now = Utc::now();
        let mut active: customer::ActiveModel = existing.into();
        active.deleted = Set(true);
        active.deleted_at = Set(Some(now));
        active.updated_at = Set(now);
        active.update(&txn).await?;

        txn.commit().await?;
        info!(customer_id, "customer soft-deleted");
        Ok(())
    }
}

fn to_response(model: customer::Model) -> CustomerResponse {
    CustomerResponse {
        id: model.id,
        name: model.name,
        email: model.email,
        phone: model.phone,
        address: model.address,
        created_at: model.created_at,
        updated_at: model.updated_at,
    }
}
