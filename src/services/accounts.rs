//! Sign-up and sign-in for marketplace accounts and their employees.

use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    auth::{hash_password, verify_password, AuthService, AuthUser, ADMIN_LEVEL_FULL, ADMIN_LEVEL_LIMITED},
    db::DbPool,
    entities::{
        employee,
        user::{self, Role},
    },
    errors::ServiceError,
    events::{Event, EventSender},
};

const EMAIL_TAKEN: &str = "email already exists";
const PHONE_TAKEN: &str = "phone already exists";
const BAD_USER_LOGIN: &str = "invalid email or password";
const BAD_EMPLOYEE_LOGIN: &str = "invalid credentials";

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(email(message = "invalid email address"))]
    pub email: String,
    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    pub password: String,
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "phone is required"))]
    pub phone: String,
    pub role: String,
    pub admin_level: Option<i32>,
    pub logo_url: Option<String>,
    pub banner_url: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub facebook: Option<String>,
    pub instagram: Option<String>,
    pub twitter: Option<String>,
    pub linkedin: Option<String>,
    pub youtube: Option<String>,
    pub tiktok: Option<String>,
    pub website: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LoginRequest {
    /// An email signs in an account; anything else is an employee username.
    pub email_or_username: Option<String>,
    pub email: Option<String>,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct EmployeeLoginRequest {
    #[validate(email(message = "invalid email address"))]
    pub owner_email: String,
    #[validate(length(min = 1, message = "username is required"))]
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    #[schema(value_type = Object)]
    pub user: user::Model,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EmployeeAuthResponse {
    pub token: String,
    #[schema(value_type = Object)]
    pub user: user::Model,
    #[schema(value_type = Object)]
    pub employee: employee::Model,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum LoginResponse {
    Account(AuthResponse),
    Employee(EmployeeAuthResponse),
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RegisteredUser {
    #[schema(value_type = Object)]
    pub user: user::Model,
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Checks who an admin of `caller_level` may create.
pub fn check_admin_creation(
    caller_level: i32,
    role: Role,
    requested_level: Option<i32>,
) -> Result<Option<i32>, ServiceError> {
    if role != Role::Admin {
        return Ok(None);
    }
    let level = requested_level.ok_or_else(|| {
        ServiceError::BadRequest("admin_level is required when creating admin users".into())
    })?;
    if !(ADMIN_LEVEL_LIMITED..=3).contains(&level) {
        return Err(ServiceError::BadRequest("admin_level must be 2 or 3".into()));
    }
    if level == ADMIN_LEVEL_LIMITED && caller_level > ADMIN_LEVEL_FULL {
        return Err(ServiceError::Forbidden(
            "only level 1 admins can create level 2 admins".into(),
        ));
    }
    Ok(Some(level))
}

#[derive(Clone)]
pub struct AccountService {
    db_pool: Arc<DbPool>,
    auth: Arc<AuthService>,
    event_sender: Option<Arc<EventSender>>,
}

impl AccountService {
    pub fn new(
        db_pool: Arc<DbPool>,
        auth: Arc<AuthService>,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        Self {
            db_pool,
            auth,
            event_sender,
        }
    }

    async fn ensure_unique(&self, email: &str, phone: &str) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        let email_taken = user::Entity::find()
            .filter(user::Column::Email.eq(email))
            .one(db)
            .await?
            .is_some();
        if email_taken {
            return Err(ServiceError::Conflict(EMAIL_TAKEN.into()));
        }
        let phone_taken = user::Entity::find()
            .filter(user::Column::Phone.eq(phone))
            .one(db)
            .await?
            .is_some();
        if phone_taken {
            return Err(ServiceError::Conflict(PHONE_TAKEN.into()));
        }
        Ok(())
    }

    async fn insert_user(
        &self,
        request: RegisterRequest,
        role: Role,
        admin_level: Option<i32>,
    ) -> Result<user::Model, ServiceError> {
        let email = request.email.trim().to_lowercase();
        let phone = request.phone.trim().to_string();
        self.ensure_unique(&email, &phone).await?;

        let now = Utc::now();
        user::ActiveModel {
            email: Set(email),
            password_hash: Set(hash_password(&request.password)?),
            name: Set(request.name.trim().to_string()),
            phone: Set(phone),
            role: Set(role),
            admin_level: Set(admin_level),
            address: Set(blank_to_none(request.address)),
            latitude: Set(request.latitude),
            longitude: Set(request.longitude),
            logo_url: Set(blank_to_none(request.logo_url)),
            banner_url: Set(blank_to_none(request.banner_url)),
            facebook: Set(blank_to_none(request.facebook)),
            instagram: Set(blank_to_none(request.instagram)),
            twitter: Set(blank_to_none(request.twitter)),
            linkedin: Set(blank_to_none(request.linkedin)),
            youtube: Set(blank_to_none(request.youtube)),
            tiktok: Set(blank_to_none(request.tiktok)),
            website: Set(blank_to_none(request.website)),
            opening_time: Set(None),
            closing_time: Set(None),
            closed_days_of_week: Set(None),
            is_open: Set(true),
            last_login: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            deleted_at: Set(None),
            ..Default::default()
        }
        .insert(&*self.db_pool)
        .await
        .map_err(|e| ServiceError::from_db_with_conflict(e, EMAIL_TAKEN))
    }

    /// Public sign-up for suppliers and stores.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn register(&self, request: RegisterRequest) -> Result<AuthResponse, ServiceError> {
        request.validate()?;
        let role = match Role::from_str(request.role.trim()) {
            Ok(role) if role.is_trading_party() => role,
            _ => {
                return Err(ServiceError::BadRequest(
                    "role must be 'supplier' or 'store'".into(),
                ))
            }
        };

        let account = self.insert_user(request, role, None).await?;
        let token = self.auth.generate_token(&account)?;
        info!(user_id = account.id, role = %account.role, "account registered");

        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::UserRegistered {
                    user_id: account.id,
                })
                .await;
        }
        Ok(AuthResponse {
            token,
            user: account,
        })
    }

    /// Account creation by an admin of level 1 or 2.
    #[instrument(skip(self, actor, request), fields(user_id = actor.user_id))]
    pub async fn admin_register(
        &self,
        actor: &AuthUser,
        request: RegisterRequest,
    ) -> Result<RegisteredUser, ServiceError> {
        if !actor.is_admin() {
            return Err(ServiceError::Forbidden("only admin can register users".into()));
        }
        let caller_level = actor.effective_admin_level();
        if caller_level > ADMIN_LEVEL_LIMITED {
            return Err(ServiceError::Forbidden(
                "level 3 admins cannot register users".into(),
            ));
        }
        request.validate()?;
        let role = Role::from_str(request.role.trim()).map_err(|_| {
            ServiceError::BadRequest("role must be 'supplier', 'store', or 'admin'".into())
        })?;
        let admin_level = check_admin_creation(caller_level, role, request.admin_level)?;

        let account = self.insert_user(request, role, admin_level).await?;
        info!(created_user_id = account.id, role = %account.role, "account registered by admin");
        Ok(RegisteredUser { user: account })
    }

    async fn touch_last_login(&self, account: user::Model) -> Result<user::Model, ServiceError> {
        let mut active = account.into_active_model();
        active.last_login = Set(Some(Utc::now()));
        Ok(active.update(&*self.db_pool).await?)
    }

    async fn owner_of(&self, staff: &employee::Model) -> Result<Option<user::Model>, ServiceError> {
        Ok(user::find_active()
            .filter(user::Column::Id.eq(staff.owner_user_id))
            .filter(user::Column::Role.is_in([Role::Supplier, Role::Store]))
            .one(&*self.db_pool)
            .await?)
    }

    fn employee_session(
        &self,
        staff: employee::Model,
        owner: user::Model,
    ) -> Result<EmployeeAuthResponse, ServiceError> {
        let token = self.auth.generate_employee_token(&staff, &owner)?;
        info!(employee_id = staff.id, owner_id = owner.id, "employee signed in");
        Ok(EmployeeAuthResponse {
            token,
            user: owner,
            employee: staff,
        })
    }

    /// Unified sign-in: emails go to accounts, usernames to employees.
    #[instrument(skip(self, request))]
    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse, ServiceError> {
        let identifier = request
            .email_or_username
            .or(request.email)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ServiceError::ValidationError("email_or_username is required".into()))?;

        if identifier.contains('@') {
            let account = user::find_active()
                .filter(user::Column::Email.eq(identifier.to_lowercase()))
                .one(&*self.db_pool)
                .await?
                .filter(|u| verify_password(&request.password, &u.password_hash))
                .ok_or_else(|| {
                    warn!("failed account sign-in");
                    ServiceError::Unauthorized(BAD_USER_LOGIN.into())
                })?;
            let account = self.touch_last_login(account).await?;
            let token = self.auth.generate_token(&account)?;
            info!(user_id = account.id, "account signed in");
            return Ok(LoginResponse::Account(AuthResponse {
                token,
                user: account,
            }));
        }

        let candidates = employee::find_active()
            .filter(employee::Column::Username.eq(identifier))
            .filter(employee::Column::StatusActive.eq(true))
            .order_by_asc(employee::Column::Id)
            .all(&*self.db_pool)
            .await?;
        for staff in candidates {
            if !verify_password(&request.password, &staff.password_hash) {
                continue;
            }
            if let Some(owner) = self.owner_of(&staff).await? {
                return self.employee_session(staff, owner).map(LoginResponse::Employee);
            }
        }
        warn!("failed employee sign-in");
        Err(ServiceError::Unauthorized(BAD_EMPLOYEE_LOGIN.into()))
    }

    #[instrument(skip(self, request), fields(owner_email = %request.owner_email))]
    pub async fn employee_login(
        &self,
        request: EmployeeLoginRequest,
    ) -> Result<EmployeeAuthResponse, ServiceError> {
        request.validate()?;
        let unauthorized = || ServiceError::Unauthorized(BAD_EMPLOYEE_LOGIN.into());

        let owner = user::find_active()
            .filter(user::Column::Email.eq(request.owner_email.trim().to_lowercase()))
            .filter(user::Column::Role.is_in([Role::Supplier, Role::Store]))
            .one(&*self.db_pool)
            .await?
            .ok_or_else(unauthorized)?;
        let staff = employee::find_active()
            .filter(employee::Column::OwnerUserId.eq(owner.id))
            .filter(employee::Column::Username.eq(request.username.trim()))
            .one(&*self.db_pool)
            .await?
            .ok_or_else(unauthorized)?;
        if !staff.status_active {
            return Err(ServiceError::Forbidden("employee account is inactive".into()));
        }
        if !verify_password(&request.password, &staff.password_hash) {
            return Err(unauthorized());
        }
        self.employee_session(staff, owner)
    }
}
