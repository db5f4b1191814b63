use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use tracing::{info, instrument};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    auth::{hash_password, AuthUser},
    db::DbPool,
    entities::{employee, user::Role},
    errors::ServiceError,
};

const USERNAME_TAKEN: &str = "username already exists for this owner";

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateEmployeeRequest {
    #[validate(length(min = 1, message = "username is required"))]
    pub username: String,
    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    pub password: String,
    #[serde(default)]
    pub name: String,
    pub phone: Option<String>,
    pub role: Option<String>,
    pub profile_pic_url: Option<String>,
    pub can_manage_inventory: Option<bool>,
    pub can_manage_orders: Option<bool>,
    pub can_chat: Option<bool>,
    pub can_change_status: Option<bool>,
    pub can_rate: Option<bool>,
    pub status_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateEmployeeRequest {
    #[validate(length(min = 1, message = "username cannot be empty"))]
    pub username: Option<String>,
    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    pub password: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub role: Option<String>,
    pub profile_pic_url: Option<String>,
    pub can_manage_inventory: Option<bool>,
    pub can_manage_orders: Option<bool>,
    pub can_chat: Option<bool>,
    pub can_change_status: Option<bool>,
    pub can_rate: Option<bool>,
    pub status_active: Option<bool>,
}

impl UpdateEmployeeRequest {
    /// Whether the request touches anything beyond the self-service profile
    /// fields (name, phone, password, profile picture).
    fn touches_owner_fields(&self) -> bool {
        self.username.is_some()
            || self.role.is_some()
            || self.can_manage_inventory.is_some()
            || self.can_manage_orders.is_some()
            || self.can_chat.is_some()
            || self.can_change_status.is_some()
            || self.can_rate.is_some()
            || self.status_active.is_some()
    }
}

fn require_owner(actor: &AuthUser) -> Result<(), ServiceError> {
    if actor.is_employee() {
        return Err(ServiceError::Forbidden(
            "employees cannot manage employees".into(),
        ));
    }
    actor.require_role(
        &[Role::Supplier, Role::Store],
        "only suppliers or stores can manage employees",
    )
}

#[derive(Clone)]
pub struct EmployeeService {
    db_pool: Arc<DbPool>,
}

impl EmployeeService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    pub async fn list(&self, actor: &AuthUser) -> Result<Vec<employee::Model>, ServiceError> {
        require_owner(actor)?;
        Ok(employee::find_active()
            .filter(employee::Column::OwnerUserId.eq(actor.user_id))
            .order_by_asc(employee::Column::Id)
            .all(&*self.db_pool)
            .await?)
    }

    async fn username_taken(&self, owner_id: i32, username: &str) -> Result<bool, ServiceError> {
        // Soft-deleted rows still hold the unique index slot.
        Ok(employee::Entity::find()
            .filter(employee::Column::OwnerUserId.eq(owner_id))
            .filter(employee::Column::Username.eq(username))
            .one(&*self.db_pool)
            .await?
            .is_some())
    }

    #[instrument(skip(self, actor, request), fields(owner_id = actor.user_id))]
    pub async fn create(
        &self,
        actor: &AuthUser,
        request: CreateEmployeeRequest,
    ) -> Result<employee::Model, ServiceError> {
        require_owner(actor)?;
        request.validate()?;
        let username = request.username.trim().to_string();
        if username.is_empty() {
            return Err(ServiceError::ValidationError("username is required".into()));
        }
        if self.username_taken(actor.user_id, &username).await? {
            return Err(ServiceError::Conflict(USERNAME_TAKEN.into()));
        }

        let now = Utc::now();
        let saved = employee::ActiveModel {
            owner_user_id: Set(actor.user_id),
            username: Set(username),
            password_hash: Set(hash_password(&request.password)?),
            name: Set(request.name),
            phone: Set(request.phone),
            role: Set(request.role),
            can_manage_inventory: Set(request.can_manage_inventory.unwrap_or(true)),
            can_manage_orders: Set(request.can_manage_orders.unwrap_or(true)),
            can_chat: Set(request.can_chat.unwrap_or(true)),
            can_change_status: Set(request.can_change_status.unwrap_or(true)),
            can_rate: Set(request.can_rate.unwrap_or(false)),
            status_active: Set(request.status_active.unwrap_or(true)),
            profile_pic_url: Set(request.profile_pic_url),
            created_at: Set(now),
            updated_at: Set(now),
            deleted_at: Set(None),
            ..Default::default()
        }
        .insert(&*self.db_pool)
        .await
        .map_err(|e| ServiceError::from_db_with_conflict(e, USERNAME_TAKEN))?;

        info!(employee_id = saved.id, "employee created");
        Ok(saved)
    }

    /// Owners may change anything on their employees; an employee may only
    /// edit their own profile fields.
    #[instrument(skip(self, actor, request), fields(user_id = actor.user_id))]
    pub async fn update(
        &self,
        actor: &AuthUser,
        employee_id: i32,
        request: UpdateEmployeeRequest,
    ) -> Result<employee::Model, ServiceError> {
        request.validate()?;
        if let Some(own_id) = actor.employee_id() {
            if own_id != employee_id || request.touches_owner_fields() {
                return Err(ServiceError::Forbidden(
                    "employees can only update their own profile".into(),
                ));
            }
        } else {
            actor.require_role(
                &[Role::Supplier, Role::Store],
                "only suppliers or stores can update employees",
            )?;
        }

        let current = employee::find_active()
            .filter(employee::Column::Id.eq(employee_id))
            .filter(employee::Column::OwnerUserId.eq(actor.user_id))
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound("employee not found".into()))?;

        if let Some(username) = request.username.as_deref().map(str::trim) {
            if username != current.username && self.username_taken(actor.user_id, username).await? {
                return Err(ServiceError::Conflict(USERNAME_TAKEN.into()));
            }
        }

        let mut active = current.into_active_model();
        if let Some(username) = request.username {
            active.username = Set(username.trim().to_string());
        }
        if let Some(password) = request.password {
            active.password_hash = Set(hash_password(&password)?);
        }
        if let Some(name) = request.name {
            active.name = Set(name);
        }
        if let Some(phone) = request.phone {
            active.phone = Set(Some(phone));
        }
        if let Some(url) = request.profile_pic_url {
            active.profile_pic_url = Set(Some(url));
        }
        if let Some(role) = request.role {
            active.role = Set(Some(role));
        }
        if let Some(v) = request.can_manage_inventory {
            active.can_manage_inventory = Set(v);
        }
        if let Some(v) = request.can_manage_orders {
            active.can_manage_orders = Set(v);
        }
        if let Some(v) = request.can_chat {
            active.can_chat = Set(v);
        }
        if let Some(v) = request.can_change_status {
            active.can_change_status = Set(v);
        }
        if let Some(v) = request.can_rate {
            active.can_rate = Set(v);
        }
        if let Some(v) = request.status_active {
            active.status_active = Set(v);
        }
        active.updated_at = Set(Utc::now());

        let saved = active
            .update(&*self.db_pool)
            .await
            .map_err(|e| ServiceError::from_db_with_conflict(e, USERNAME_TAKEN))?;
        info!(employee_id, "employee updated");
        Ok(saved)
    }

    /// The calling employee's own record.
    pub async fn me(&self, actor: &AuthUser) -> Result<employee::Model, ServiceError> {
        let employee_id = actor
            .employee_id()
            .ok_or_else(|| ServiceError::Forbidden("not an employee".into()))?;
        employee::find_active()
            .filter(employee::Column::Id.eq(employee_id))
            .filter(employee::Column::OwnerUserId.eq(actor.user_id))
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound("employee not found".into()))
    }
}
