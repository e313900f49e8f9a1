//! Order lifecycle: transactional creation with snapshot pricing and a
//! bootstrap production stage, guarded status transitions, and the cascading
//! soft-delete across lines, stages, and tasks.

use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::db::DbPool;
use crate::entities::{customer, order, order_product, product, production_stage, task};
use crate::errors::ServiceError;
use crate::models::{OrderStatus, StageStatus};

/// Name of the stage bootstrapped for every new order.
const INITIAL_STAGE_NAME: &str = "Initial Design";

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderRequest {
    pub customer_id: i32,
    /// Defaults to PENDING; only PENDING or IN_PRODUCTION are accepted at
    /// creation time.
    pub status: Option<String>,
    pub notes: Option<String>,
    #[validate(length(min = 1, message = "order must contain at least one line item"))]
    pub order_products: Vec<CreateOrderLine>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateOrderLine {
    pub product_id: i32,
    pub quantity: i32,
    pub customization: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateOrderRequest {
    pub status: Option<String>,
    pub notes: Option<String>,
    /// The total is derived from the snapshotted lines; a patch naming it is
    /// rejected rather than silently dropped.
    pub total_amount: Option<Decimal>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OrderListQuery {
    pub status: Option<String>,
    pub customer_id: Option<i32>,
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
pub struct CustomerSummary {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProductSummary {
    pub id: i32,
    pub name: String,
    pub product_type: String,
    pub price: Decimal,
}

#[derive(Debug, Serialize)]
pub struct OrderLineResponse {
    pub id: i32,
    pub product: Option<ProductSummary>,
    pub quantity: i32,
    pub price: Decimal,
    pub customization: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TaskResponse {
    pub id: i32,
    pub production_stage_id: i32,
    pub order_id: i32,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub assigned_to_id: Option<i32>,
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct StageResponse {
    pub id: i32,
    pub order_id: i32,
    pub name: String,
    pub description: Option<String>,
    pub status: String,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub tasks: Vec<TaskResponse>,
}

#[derive(Debug, Serialize)]
pub struct OrderDetailResponse {
    pub id: i32,
    pub customer: Option<CustomerSummary>,
    pub status: String,
    pub total_amount: Decimal,
    pub notes: Option<String>,
    pub deleted: bool,
    pub order_products: Vec<OrderLineResponse>,
    pub production_stages: Vec<StageResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct OrderSummaryResponse {
    pub id: i32,
    pub customer_id: i32,
    pub status: String,
    pub total_amount: Decimal,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct OrderListResponse {
    pub orders: Vec<OrderSummaryResponse>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
}

/// Orchestrates order creation, status transitions, and the cascading
/// soft-delete across order lines, production stages, and tasks.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DbPool>,
}

impl OrderService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Creates an order atomically: snapshot product prices, write the order
    /// and its lines, and bootstrap the initial production stage. Any
    /// failure rolls back the whole transaction.
    #[instrument(skip(self, request), fields(customer_id = request.customer_id))]
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
    ) -> Result<OrderDetailResponse, ServiceError> {
        request.validate()?;
        validate_lines(&request.order_products)?;

        let status = match request.status.as_deref() {
            None => OrderStatus::Pending,
            Some(raw) => {
                let parsed = parse_order_status(raw)?;
                if parsed.is_terminal() {
                    return Err(ServiceError::InvalidStatus(format!(
                        "orders cannot be created as {parsed}"
                    )));
                }
                parsed
            }
        };

        let now = Utc::now();
        let txn = self.db.begin().await?;

        let customer_exists = customer::Entity::find_by_id(request.customer_id)
            .filter(customer::Column::Deleted.eq(false))
            .count(&txn)
            .await?
            > 0;
        if !customer_exists {
            return Err(ServiceError::ValidationError(
                "customer not found or deleted".to_string(),
            ));
        }

        let requested_ids: BTreeSet<i32> = request
            .order_products
            .iter()
            .map(|line| line.product_id)
            .collect();
        let products = product::Entity::find()
            .filter(product::Column::Id.is_in(requested_ids.iter().copied()))
            .filter(product::Column::Deleted.eq(false))
            .all(&txn)
            .await?;

        if products.len() != requested_ids.len() {
            warn!(
                requested = requested_ids.len(),
                resolved = products.len(),
                "order creation referenced missing products"
            );
            return Err(ServiceError::ValidationError(
                "some products not found or deleted".to_string(),
            ));
        }

        // Snapshot prices at this instant; later catalog edits must not
        // affect this order.
        let price_by_id: HashMap<i32, Decimal> =
            products.iter().map(|p| (p.id, p.price)).collect();

        let total_amount: Decimal = request
            .order_products
            .iter()
            .map(|line| price_by_id[&line.product_id] * Decimal::from(line.quantity))
            .sum();

        let order_model = order::ActiveModel {
            customer_id: Set(request.customer_id),
            status: Set(status.to_string()),
            total_amount: Set(total_amount),
            notes: Set(request.notes.clone()),
            deleted: Set(false),
            deleted_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let lines: Vec<order_product::ActiveModel> = request
            .order_products
            .iter()
            .map(|line| order_product::ActiveModel {
                order_id: Set(order_model.id),
                product_id: Set(line.product_id),
                quantity: Set(line.quantity),
                price: Set(price_by_id[&line.product_id]),
                customization: Set(line.customization.clone()),
                deleted: Set(false),
                deleted_at: Set(None),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            })
            .collect();
        order_product::Entity::insert_many(lines).exec(&txn).await?;

        production_stage::ActiveModel {
            order_id: Set(order_model.id),
            name: Set(INITIAL_STAGE_NAME.to_string()),
            description: Set(Some("Initial design phase of the order".to_string())),
            status: Set(StageStatus::Planned.to_string()),
            start_date: Set(now),
            end_date: Set(None),
            deleted: Set(false),
            deleted_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let detail = self.load_detail(&txn, order_model.id, false).await?;
        txn.commit().await?;

        info!(order_id = order_model.id, %total_amount, "order created");
        Ok(detail)
    }

    /// Fetches one order with relations. Soft-deleted orders are only
    /// visible when `include_deleted` is set.
    #[instrument(skip(self))]
    pub async fn get_order(
        &self,
        order_id: i32,
        include_deleted: bool,
    ) -> Result<OrderDetailResponse, ServiceError> {
        self.load_detail(&*self.db, order_id, include_deleted).await
    }

    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        query: OrderListQuery,
    ) -> Result<OrderListResponse, ServiceError> {
        let mut finder = order::Entity::find().filter(order::Column::Deleted.eq(false));

        if let Some(raw) = query.status.as_deref() {
            let status = parse_order_status(raw)?;
            finder = finder.filter(order::Column::Status.eq(status.to_string()));
        }
        if let Some(customer_id) = query.customer_id {
            finder = finder.filter(order::Column::CustomerId.eq(customer_id));
        }

        let page = query.page.max(1);
        let limit = query.limit.clamp(1, 100);
        let paginator = finder
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db, limit);
        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page - 1).await?;

        Ok(OrderListResponse {
            orders: orders.into_iter().map(summarize).collect(),
            total,
            page,
            limit,
        })
    }

    /// Applies a patch to status and notes. Status transitions follow the
    /// forward-only graph; COMPLETED and CANCELLED are terminal. The total
    /// is recorded at creation and is not client-writable.
    #[instrument(skip(self, request))]
    pub async fn update_order(
        &self,
        order_id: i32,
        request: UpdateOrderRequest,
    ) -> Result<OrderDetailResponse, ServiceError> {
        request.validate()?;
        if request.total_amount.is_some() {
            return Err(ServiceError::ValidationError(
                "total_amount is computed from the order lines and cannot be patched".to_string(),
            ));
        }
        let now = Utc::now();
        let txn = self.db.begin().await?;

        let existing = order::Entity::find_by_id(order_id)
            .filter(order::Column::Deleted.eq(false))
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("order {order_id} not found")))?;

        let current_status = parse_order_status(&existing.status)?;
        let old_status = existing.status.clone();

        let mut active: order::ActiveModel = existing.into();
        if let Some(raw) = request.status.as_deref() {
            let next = parse_order_status(raw)?;
            if !current_status.can_transition_to(next) {
                return Err(ServiceError::InvalidStatus(format!(
                    "cannot move order from {current_status} to {next}"
                )));
            }
            active.status = Set(next.to_string());
        }
        if let Some(notes) = request.notes {
            active.notes = Set(Some(notes));
        }
        active.updated_at = Set(now);
        let updated = active.update(&txn).await?;

        let detail = self.load_detail(&txn, order_id, false).await?;
        txn.commit().await?;

        info!(
            order_id,
            old_status,
            new_status = %updated.status,
            "order updated"
        );
        Ok(detail)
    }

    /// Soft-deletes the order and every dependent row in one transaction:
    /// lines, stages, and tasks reachable through either the stage join or
    /// the direct order reference. Deleting an already-deleted order is a
    /// no-op that never re-timestamps children.
    #[instrument(skip(self))]
    pub async fn delete_order(&self, order_id: i32) -> Result<(), ServiceError> {
        let now = Utc::now();
        let txn = self.db.begin().await?;

        let existing = order::Entity::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("order {order_id} not found")))?;
        if existing.deleted {
            info!(order_id, "delete of already-deleted order ignored");
            return Ok(());
        }

        order_product::Entity::update_many()
            .col_expr(order_product::Column::Deleted, Expr::value(true))
            .col_expr(order_product::Column::DeletedAt, Expr::value(now))
            .col_expr(order_product::Column::UpdatedAt, Expr::value(now))
            .filter(order_product::Column::OrderId.eq(order_id))
            .filter(order_product::Column::Deleted.eq(false))
            .exec(&txn)
            .await?;

        let stage_ids: Vec<i32> = production_stage::Entity::find()
            .select_only()
            .column(production_stage::Column::Id)
            .filter(production_stage::Column::OrderId.eq(order_id))
            .into_tuple()
            .all(&txn)
            .await?;

        production_stage::Entity::update_many()
            .col_expr(production_stage::Column::Deleted, Expr::value(true))
            .col_expr(production_stage::Column::DeletedAt, Expr::value(now))
            .col_expr(production_stage::Column::UpdatedAt, Expr::value(now))
            .filter(production_stage::Column::OrderId.eq(order_id))
            .filter(production_stage::Column::Deleted.eq(false))
            .exec(&txn)
            .await?;

        // Tasks hang off the order through two paths; honor both.
        let mut task_linkage = Condition::any().add(task::Column::OrderId.eq(order_id));
        if !stage_ids.is_empty() {
            task_linkage = task_linkage.add(task::Column::ProductionStageId.is_in(stage_ids));
        }
        task::Entity::update_many()
            .col_expr(task::Column::Deleted, Expr::value(true))
            .col_expr(task::Column::DeletedAt, Expr::value(now))
            .col_expr(task::Column::UpdatedAt, Expr::value(now))
            .filter(task_linkage)
            .filter(task::Column::Deleted.eq(false))
            .exec(&txn)
            .await?;

        let mut active: order::ActiveModel = existing.into();
        active.deleted = Set(true);
        active.deleted_at = Set(Some(now));
        active.updated_at = Set(now);
        active.update(&txn).await?;

        txn.commit().await?;
        info!(order_id, "order and descendants soft-deleted");
        Ok(())
    }

    async fn load_detail<C: ConnectionTrait>(
        &self,
        conn: &C,
        order_id: i32,
        include_deleted: bool,
    ) -> Result<OrderDetailResponse, ServiceError> {
        let mut finder = order::Entity::find_by_id(order_id);
        if !include_deleted {
            finder = finder.filter(order::Column::Deleted.eq(false));
        }
        let order_model = finder
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("order {order_id} not found")))?;

        let customer_model = customer::Entity::find_by_id(order_model.customer_id)
            .one(conn)
            .await?;

        let lines = order_product::Entity::find()
            .filter(order_product::Column::OrderId.eq(order_id))
            .filter(order_product::Column::Deleted.eq(false))
            .all(conn)
            .await?;

        let product_ids: BTreeSet<i32> = lines.iter().map(|l| l.product_id).collect();
        let product_models = if product_ids.is_empty() {
            Vec::new()
        } else {
            product::Entity::find()
                .filter(product::Column::Id.is_in(product_ids))
                .all(conn)
                .await?
        };
        let products_by_id: HashMap<i32, &product::Model> =
            product_models.iter().map(|p| (p.id, p)).collect();

        let stages = production_stage::Entity::find()
            .filter(production_stage::Column::OrderId.eq(order_id))
            .filter(production_stage::Column::Deleted.eq(false))
            .order_by_desc(production_stage::Column::CreatedAt)
            .all(conn)
            .await?;

        let tasks = task::Entity::find()
            .filter(task::Column::OrderId.eq(order_id))
            .filter(task::Column::Deleted.eq(false))
            .order_by_asc(task::Column::CreatedAt)
            .all(conn)
            .await?;
        let mut tasks_by_stage: HashMap<i32, Vec<TaskResponse>> = HashMap::new();
        for t in tasks {
            tasks_by_stage
                .entry(t.production_stage_id)
                .or_default()
                .push(task_to_response(t));
        }

        Ok(OrderDetailResponse {
            id: order_model.id,
            customer: customer_model.map(|c| CustomerSummary {
                id: c.id,
                name: c.name,
                email: c.email,
                phone: c.phone,
            }),
            status: order_model.status,
            total_amount: order_model.total_amount,
            notes: order_model.notes,
            deleted: order_model.deleted,
            order_products: lines
                .into_iter()
                .map(|line| OrderLineResponse {
                    id: line.id,
                    product: products_by_id.get(&line.product_id).map(|p| ProductSummary {
                        id: p.id,
                        name: p.name.clone(),
                        product_type: p.product_type.clone(),
                        price: p.price,
                    }),
                    quantity: line.quantity,
                    price: line.price,
                    customization: line.customization,
                })
                .collect(),
            production_stages: stages
                .into_iter()
                .map(|stage| {
                    let tasks = tasks_by_stage.remove(&stage.id).unwrap_or_default();
                    StageResponse {
                        id: stage.id,
                        order_id: stage.order_id,
                        name: stage.name,
                        description: stage.description,
                        status: stage.status,
                        start_date: stage.start_date,
                        end_date: stage.end_date,
                        tasks,
                    }
                })
                .collect(),
            created_at: order_model.created_at,
            updated_at: order_model.updated_at,
        })
    }
}

pub(crate) fn task_to_response(t: task::Model) -> TaskResponse {
    TaskResponse {
        id: t.id,
        production_stage_id: t.production_stage_id,
        order_id: t.order_id,
        title: t.title,
        description: t.description,
        status: t.status,
        assigned_to_id: t.assigned_to_id,
        due_date: t.due_date,
    }
}

fn summarize(model: order::Model) -> OrderSummaryResponse {
    OrderSummaryResponse {
        id: model.id,
        customer_id: model.customer_id,
        status: model.status,
        total_amount: model.total_amount,
        notes: model.notes,
        created_at: model.created_at,
        updated_at: model.updated_at,
    }
}

fn validate_lines(lines: &[CreateOrderLine]) -> Result<(), ServiceError> {
    if lines.iter().any(|line| line.quantity < 1) {
        return Err(ServiceError::ValidationError(
            "quantity must be positive".to_string(),
        ));
    }
    Ok(())
}

fn parse_order_status(raw: &str) -> Result<OrderStatus, ServiceError> {
    OrderStatus::from_str(raw)
        .map_err(|_| ServiceError::InvalidStatus(format!("unknown order status: {raw}")))
}
