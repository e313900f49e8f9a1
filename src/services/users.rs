//! Account administration. Creation, update, and deletion are admin-only
//! (enforced at the handler) and responses never include the password hash.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use validator::Validate;

use crate::auth::AuthService;
use crate::db::DbPool;
use crate::entities::{task, user};
use crate::errors::ServiceError;
use crate::models::Role;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(email(message = "email must be a valid address"))]
    pub email: String,
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    #[validate(length(min = 8, message = "password must be at least 8 characters"))]
    pub password: String,
    pub role: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(email(message = "email must be a valid address"))]
    pub email: Option<String>,
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserListQuery {
    pub role: Option<String>,
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

/// Account DTO without the credential hash.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i32,
    pub email: String,
    pub name: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub users: Vec<UserResponse>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
}

#[derive(Clone)]
pub struct UserService {
    db: Arc<DbPool>,
}

impl UserService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn create_user(
        &self,
        request: CreateUserRequest,
    ) -> Result<UserResponse, ServiceError> {
        request.validate()?;
        let role = Role::from_str(&request.role)
            .map_err(|_| ServiceError::ValidationError(format!("unknown role: {}", request.role)))?;

        let duplicate = user::Entity::find()
            .filter(user::Column::Email.eq(request.email.clone()))
            .count(&*self.db)
            .await?
            > 0;
        if duplicate {
            return Err(ServiceError::Conflict(format!(
                "user with email {} already exists",
                request.email
            )));
        }

        let password_hash = AuthService::hash_password(&request.password)?;
        let now = Utc::now();
        let model = user::ActiveModel {
            email: Set(request.email),
            name: Set(request.name),
            password_hash: Set(password_hash),
            role: Set(role.to_string()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        info!(user_id = model.id, role = %model.role, "user created");
        Ok(to_response(model))
    }

    #[instrument(skip(self))]
    pub async fn get_user(&self, user_id: i32) -> Result<UserResponse, ServiceError> {
        let model = user::Entity::find_by_id(user_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("user {user_id} not found")))?;
        Ok(to_response(model))
    }

    #[instrument(skip(self))]
    pub async fn list_users(&self, query: UserListQuery) -> Result<UserListResponse, ServiceError> {
        let mut finder = user::Entity::find();
        if let Some(raw) = query.role.as_deref() {
            let role = Role::from_str(raw)
                .map_err(|_| ServiceError::ValidationError(format!("unknown role: {raw}")))?;
            finder = finder.filter(user::Column::Role.eq(role.to_string()));
        }

        let page = query.page.max(1);
        let limit = query.limit.clamp(1, 100);
        let paginator = finder
            .order_by_asc(user::Column::Email)
            .paginate(&*self.db, limit);
        let total = paginator.num_items().await?;
        let users = paginator.fetch_page(page - 1).await?;

        Ok(UserListResponse {
            users: users.into_iter().map(to_response).collect(),
            total,
            page,
            limit,
        })
    }

    #[instrument(skip(self, request))]
    pub async fn update_user(
        &self,
        user_id: i32,
        request: UpdateUserRequest,
    ) -> Result<UserResponse, ServiceError> {
        request.validate()?;
        let existing = user::Entity::find_by_id(user_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("user {user_id} not found")))?;

        if let Some(email) = request.email.as_deref() {
            let taken = user::Entity::find()
                .filter(user::Column::Email.eq(email))
                .filter(user::Column::Id.ne(user_id))
                .count(&*self.db)
                .await?
                > 0;
            if taken {
                return Err(ServiceError::Conflict(format!(
                    "user with email {email} already exists"
                )));
            }
        }

        let mut active: user::ActiveModel = existing.into();
        if let Some(email) = request.email {
            active.email = Set(email);
        }
        if let Some(name) = request.name {
            active.name = Set(name);
        }
        if let Some(raw) = request.role.as_deref() {
            let role = Role::from_str(raw)
                .map_err(|_| ServiceError::ValidationError(format!("unknown role: {raw}")))?;
            active.role = Set(role.to_string());
        }
        active.updated_at = Set(Utc::now());
        let updated = active.update(&*self.db).await?;

        info!(user_id, role = %updated.role, "user updated");
        Ok(to_response(updated))
    }

    /// Removes the account. Blocked while live tasks are assigned to it;
    /// soft-deleted tasks are unassigned so the row can go.
    #[instrument(skip(self))]
    pub async fn delete_user(&self, user_id: i32) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        let existing = user::Entity::find_by_id(user_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("user {user_id} not found")))?;

        let assigned = task::Entity::find()
            .filter(task::Column::AssignedToId.eq(user_id))
            .filter(task::Column::Deleted.eq(false))
            .count(&txn)
            .await?;
        if assigned > 0 {
            return Err(ServiceError::Conflict(format!(
                "user {user_id} is still assigned to {assigned} active tasks"
            )));
        }

        task::Entity::update_many()
            .col_expr(task::Column::AssignedToId, Expr::value(Option::<i32>::None))
            .filter(task::Column::AssignedToId.eq(user_id))
            .exec(&txn)
            .await?;
        existing.delete(&txn).await?;

        txn.commit().await?;
        info!(user_id, "user deleted");
        Ok(())
    }
}

fn to_response(model: user::Model) -> UserResponse {
    UserResponse {
        id: model.id,
        email: model.email,
        name: model.name,
        role: model.role,
        created_at: model.created_at,
        updated_at: model.updated_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_passwords_fail_validation() {
        let request = CreateUserRequest {
            email: "new@signcraft.test".to_string(),
            name: "New Hire".to_string(),
            password: "short".to_string(),
            role: "WORKER".to_string(),
        };
        assert!(request.validate().is_err());
    }
}
