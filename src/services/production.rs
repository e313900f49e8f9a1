//! Production tracking: stages under an order and tasks under a stage.
//!
//! Tasks carry a denormalized order reference derived from their stage at
//! creation; deleting a stage soft-deletes its live tasks in the same
//! transaction.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use validator::Validate;

use crate::db::DbPool;
use crate::entities::{order, production_stage, task, user};
use crate::errors::ServiceError;
use crate::models::{StageStatus, TaskStatus};
use crate::services::orders::{task_to_response, StageResponse, TaskResponse};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateStageRequest {
    pub order_id: i32,
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    pub description: Option<String>,
    pub status: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateStageRequest {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StageListQuery {
    pub order_id: Option<i32>,
    pub status: Option<String>,
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTaskRequest {
    pub production_stage_id: i32,
    #[validate(length(min = 1, message = "title is required"))]
    pub title: String,
    pub description: Option<String>,
    pub status: Option<String>,
    pub assigned_to_id: Option<i32>,
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateTaskRequest {
    #[validate(length(min = 1, message = "title must not be empty"))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub assigned_to_id: Option<i32>,
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TaskListQuery {
    pub production_stage_id: Option<i32>,
    pub order_id: Option<i32>,
    pub assigned_to_id: Option<i32>,
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
pub struct StageListResponse {
    pub stages: Vec<StageResponse>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
}

#[derive(Debug, Serialize)]
pub struct TaskListResponse {
    pub tasks: Vec<TaskResponse>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
}

#[derive(Clone)]
pub struct ProductionService {
    db: Arc<DbPool>,
}

impl ProductionService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(order_id = request.order_id))]
    pub async fn create_stage(
        &self,
        request: CreateStageRequest,
    ) -> Result<StageResponse, ServiceError> {
        request.validate()?;
        let status = match request.status.as_deref() {
            Some(raw) => parse_stage_status(raw)?,
            None => StageStatus::Planned,
        };

        let order_exists = order::Entity::find_by_id(request.order_id)
            .filter(order::Column::Deleted.eq(false))
            .count(&*self.db)
            .await?
            > 0;
        if !order_exists {
            return Err(ServiceError::ValidationError(
                "order not found or deleted".to_string(),
            ));
        }

        let now = Utc::now();
        let model = production_stage::ActiveModel {
            order_id: Set(request.order_id),
            name: Set(request.name),
            description: Set(request.description),
            status: Set(status.to_string()),
            start_date: Set(request.start_date.unwrap_or(now)),
            end_date: Set(request.end_date),
            deleted: Set(false),
            deleted_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        info!(stage_id = model.id, order_id = model.order_id, "stage created");
        self.stage_with_tasks(model).await
    }

    #[instrument(skip(self))]
    pub async fn get_stage(&self, stage_id: i32) -> Result<StageResponse, ServiceError> {
        let model = self.find_live_stage(stage_id).await?;
        self.stage_with_tasks(model).await
    }

    #[instrument(skip(self))]
    pub async fn list_stages(
        &self,
        query: StageListQuery,
    ) -> Result<StageListResponse, ServiceError> {
        let mut finder =
            production_stage::Entity::find().filter(production_stage::Column::Deleted.eq(false));
        if let Some(order_id) = query.order_id {
            finder = finder.filter(production_stage::Column::OrderId.eq(order_id));
        }
        if let Some(raw) = query.status.as_deref() {
            let status = parse_stage_status(raw)?;
            finder = finder.filter(production_stage::Column::Status.eq(status.to_string()));
        }

        let page = query.page.max(1);
        let limit = query.limit.clamp(1, 100);
        let paginator = finder
            .order_by_asc(production_stage::Column::StartDate)
            .paginate(&*self.db, limit);
        let total = paginator.num_items().await?;
        let stage_models = paginator.fetch_page(page - 1).await?;

        let mut stages = Vec::with_capacity(stage_models.len());
        for model in stage_models {
            stages.push(self.stage_with_tasks(model).await?);
        }

        Ok(StageListResponse {
            stages,
            total,
            page,
            limit,
        })
    }

    #[instrument(skip(self, request))]
    pub async fn update_stage(
        &self,
        stage_id: i32,
        request: UpdateStageRequest,
    ) -> Result<StageResponse, ServiceError> {
        request.validate()?;
        let existing = self.find_live_stage(stage_id).await?;

        let mut active: production_stage::ActiveModel = existing.into();
        if let Some(name) = request.name {
            active.name = Set(name);
        }
        if let Some(description) = request.description {
            active.description = Set(Some(description));
        }
        if let Some(raw) = request.status.as_deref() {
            active.status = Set(parse_stage_status(raw)?.to_string());
        }
        if let Some(start_date) = request.start_date {
            active.start_date = Set(start_date);
        }
        if let Some(end_date) = request.end_date {
            active.end_date = Set(Some(end_date));
        }
        active.updated_at = Set(Utc::now());
        let updated = active.update(&*self.db).await?;

        info!(stage_id, "stage updated");
        self.stage_with_tasks(updated).await
    }

    /// Soft-deletes the stage and its live tasks together.
    #[instrument(skip(self))]
    pub async fn delete_stage(&self, stage_id: i32) -> Result<(), ServiceError> {
        let now = Utc::now();
        let txn = self.db.begin().await?;

        let existing = production_stage::Entity::find_by_id(stage_id)
            .filter(production_stage::Column::Deleted.eq(false))
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("stage {stage_id} not found")))?;

        task::Entity::update_many()
            .col_expr(task::Column::Deleted, Expr::value(true))
            .col_expr(task::Column::DeletedAt, Expr::value(now))
            .col_expr(task::Column::UpdatedAt, Expr::value(now))
            .filter(task::Column::ProductionStageId.eq(stage_id))
            .filter(task::Column::Deleted.eq(false))
            .exec(&txn)
            .await?;

        let mut active: production_stage::ActiveModel = existing.into();
        active.deleted = Set(true);
        active.deleted_at = Set(Some(now));
        active.updated_at = Set(now);
        active.update(&txn).await?;

        txn.commit().await?;
        info!(stage_id, "stage and its tasks soft-deleted");
        Ok(())
    }

    #[instrument(skip(self, request), fields(stage_id = request.production_stage_id))]
    pub async fn create_task(
        &self,
        request: CreateTaskRequest,
    ) -> Result<TaskResponse, ServiceError> {
        request.validate()?;
        let status = match request.status.as_deref() {
            Some(raw) => parse_task_status(raw)?,
            None => TaskStatus::Pending,
        };

        let stage = production_stage::Entity::find_by_id(request.production_stage_id)
            .filter(production_stage::Column::Deleted.eq(false))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::ValidationError("production stage not found or deleted".to_string())
            })?;

        if let Some(assignee_id) = request.assigned_to_id {
            let assignee_exists = user::Entity::find_by_id(assignee_id)
                .count(&*self.db)
                .await?
                > 0;
            if !assignee_exists {
                return Err(ServiceError::ValidationError(
                    "assignee not found".to_string(),
                ));
            }
        }

        let now = Utc::now();
        let model = task::ActiveModel {
            production_stage_id: Set(stage.id),
            // the order reference always comes from the stage, never the client
            order_id: Set(stage.order_id),
            title: Set(request.title),
            description: Set(request.description),
            status: Set(status.to_string()),
            assigned_to_id: Set(request.assigned_to_id),
            due_date: Set(request.due_date),
            deleted: Set(false),
            deleted_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        info!(task_id = model.id, stage_id = model.production_stage_id, "task created");
        Ok(task_to_response(model))
    }

    #[instrument(skip(self))]
    pub async fn get_task(&self, task_id: i32) -> Result<TaskResponse, ServiceError> {
        let model = self.find_live_task(task_id).await?;
        Ok(task_to_response(model))
    }

    #[instrument(skip(self))]
    pub async fn list_tasks(&self, query: TaskListQuery) -> Result<TaskListResponse, ServiceError> {
        let mut finder = task::Entity::find().filter(task::Column::Deleted.eq(false));
        if let Some(stage_id) = query.production_stage_id {
            finder = finder.filter(task::Column::ProductionStageId.eq(stage_id));
        }
        if let Some(order_id) = query.order_id {
            finder = finder.filter(task::Column::OrderId.eq(order_id));
        }
        if let Some(assignee_id) = query.assigned_to_id {
            finder = finder.filter(task::Column::AssignedToId.eq(assignee_id));
        }
        if let Some(raw) = query.status.as_deref() {
            let status = parse_task_status(raw)?;
            finder = finder.filter(task::Column::Status.eq(status.to_string()));
        }

        let page = query.page.max(1);
        let limit = query.limit.clamp(1, 100);
        let paginator = finder
            .order_by_asc(task::Column::CreatedAt)
            .paginate(&*self.db, limit);
        let total = paginator.num_items().await?;
        let tasks = paginator.fetch_page(page - 1).await?;

        Ok(TaskListResponse {
            tasks: tasks.into_iter().map(task_to_response).collect(),
            total,
            page,
            limit,
        })
    }

    #[instrument(skip(self, request))]
    pub async fn update_task(
        &self,
        task_id: i32,
        request: UpdateTaskRequest,
    ) -> Result<TaskResponse, ServiceError> {
        request.validate()?;
        let existing = self.find_live_task(task_id).await?;

        if let Some(assignee_id) = request.assigned_to_id {
            let assignee_exists = user::Entity::find_by_id(assignee_id)
                .count(&*self.db)
                .await?
                > 0;
            if !assignee_exists {
                return Err(ServiceError::ValidationError(
                    "assignee not found".to_string(),
                ));
            }
        }

        let mut active: task::ActiveModel = existing.into();
        if let Some(title) = request.title {
            active.title = Set(title);
        }
        if let Some(description) = request.description {
            active.description = Set(Some(description));
        }
        if let Some(raw) = request.status.as_deref() {
            active.status = Set(parse_task_status(raw)?.to_string());
        }
        if let Some(assignee_id) = request.assigned_to_id {
            active.assigned_to_id = Set(Some(assignee_id));
        }
        if let Some(due_date) = request.due_date {
            active.due_date = Set(Some(due_date));
        }
        active.updated_at = Set(Utc::now());
        let updated = active.update(&*self.db).await?;

        info!(task_id, "task updated");
        Ok(task_to_response(updated))
    }

    #[instrument(skip(self))]
    pub async fn delete_task(&self, task_id: i32) -> Result<(), ServiceError> {
        let existing = self.find_live_task(task_id).await?;

        let now = Utc::now();
        let mut active: task::ActiveModel = existing.into();
        active.deleted = Set(true);
        active.deleted_at = Set(Some(now));
        active.updated_at = Set(now);
        active.update(&*self.db).await?;

        info!(task_id, "task soft-deleted");
        Ok(())
    }

    async fn find_live_stage(
        &self,
        stage_id: i32,
    ) -> Result<production_stage::Model, ServiceError> {
        production_stage::Entity::find_by_id(stage_id)
            .filter(production_stage::Column::Deleted.eq(false))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("stage {stage_id} not found")))
    }

    async fn find_live_task(&self, task_id: i32) -> Result<task::Model, ServiceError> {
        task::Entity::find_by_id(task_id)
            .filter(task::Column::Deleted.eq(false))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("task {task_id} not found")))
    }

    async fn stage_with_tasks(
        &self,
        model: production_stage::Model,
    ) -> Result<StageResponse, ServiceError> {
        let tasks = task::Entity::find()
            .filter(task::Column::ProductionStageId.eq(model.id))
            .filter(task::Column::Deleted.eq(false))
            .order_by_asc(task::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        Ok(StageResponse {
            id: model.id,
            order_id: model.order_id,
            name: model.name,
            description: model.description,
            status: model.status,
            start_date: model.start_date,
            end_date: model.end_date,
            tasks: tasks.into_iter().map(task_to_response).collect(),
        })
    }
}

fn parse_stage_status(raw: &str) -> Result<StageStatus, ServiceError> {
    StageStatus::from_str(raw)
        .map_err(|_| ServiceError::InvalidStatus(format!("unknown stage status: {raw}")))
}

fn parse_task_status(raw: &str) -> Result<TaskStatus, ServiceError> {
    TaskStatus::from_str(raw)
        .map_err(|_| ServiceError::InvalidStatus(format!("unknown task status: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_status_parsing_is_strict() {
        assert!(parse_stage_status("PLANNED").is_ok());
        assert!(parse_stage_status("DELAYED").is_ok());
        assert!(parse_stage_status("planned").is_err());
    }

    #[test]
    fn task_requests_validate_titles() {
        let request = CreateTaskRequest {
            production_stage_id: 1,
            title: String::new(),
            description: None,
            status: None,
            assigned_to_id: None,
            due_date: None,
        };
        assert!(request.validate().is_err());
    }
}
