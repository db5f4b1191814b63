use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use tracing::{info, instrument};
use utoipa::ToSchema;

use crate::{
    auth::{AuthUser, ADMIN_LEVEL_READ_ONLY},
    db::DbPool,
    entities::user::{self, Role},
    errors::ServiceError,
    services::schedule::validate_optional_time,
};

const USER_NOT_FOUND: &str = "user not found";

/// Profile fields an account may change about itself. Absent fields are
/// left untouched; empty strings clear optional fields.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub logo_url: Option<String>,
    pub banner_url: Option<String>,
    pub facebook: Option<String>,
    pub instagram: Option<String>,
    pub twitter: Option<String>,
    pub linkedin: Option<String>,
    pub youtube: Option<String>,
    pub tiktok: Option<String>,
    pub website: Option<String>,
    pub opening_time: Option<String>,
    pub closing_time: Option<String>,
    /// Comma separated weekday numbers, 0 = Sunday.
    pub closed_days_of_week: Option<String>,
}

fn optional(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Normalizes a closed-days list, rejecting anything but weekday numbers 0..=6.
pub fn normalize_closed_days(raw: &str) -> Result<Option<String>, ServiceError> {
    let mut days = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.parse::<u8>() {
            Ok(day) if day <= 6 => {
                if !days.contains(&day) {
                    days.push(day);
                }
            }
            _ => {
                return Err(ServiceError::ValidationError(
                    "closed_days_of_week must list weekday numbers 0-6".into(),
                ))
            }
        }
    }
    days.sort_unstable();
    Ok(if days.is_empty() {
        None
    } else {
        Some(days.iter().map(u8::to_string).collect::<Vec<_>>().join(","))
    })
}

#[derive(Clone)]
pub struct UserService {
    db_pool: Arc<DbPool>,
}

impl UserService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    pub async fn me(&self, actor: &AuthUser) -> Result<user::Model, ServiceError> {
        user::find_active()
            .filter(user::Column::Id.eq(actor.user_id))
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(USER_NOT_FOUND.into()))
    }

    #[instrument(skip(self, actor, request), fields(user_id = actor.user_id))]
    pub async fn update_me(
        &self,
        actor: &AuthUser,
        request: UpdateProfileRequest,
    ) -> Result<user::Model, ServiceError> {
        validate_optional_time(request.opening_time.as_deref(), "opening_time")?;
        validate_optional_time(request.closing_time.as_deref(), "closing_time")?;
        let closed_days = request
            .closed_days_of_week
            .as_deref()
            .map(normalize_closed_days)
            .transpose()?;

        let current = self.me(actor).await?;

        if let Some(phone) = request.phone.as_deref().map(str::trim) {
            if phone.is_empty() {
                return Err(ServiceError::ValidationError("phone cannot be empty".into()));
            }
            if phone != current.phone {
                let taken = user::Entity::find()
                    .filter(user::Column::Phone.eq(phone))
                    .filter(user::Column::Id.ne(current.id))
                    .one(&*self.db_pool)
                    .await?
                    .is_some();
                if taken {
                    return Err(ServiceError::Conflict("phone already exists".into()));
                }
            }
        }

        let mut active = current.into_active_model();
        if let Some(name) = request.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()) {
            active.name = Set(name);
        }
        if let Some(phone) = request.phone {
            active.phone = Set(phone.trim().to_string());
        }
        if let Some(v) = request.address {
            active.address = Set(optional(v));
        }
        if let Some(v) = request.latitude {
            active.latitude = Set(Some(v));
        }
        if let Some(v) = request.longitude {
            active.longitude = Set(Some(v));
        }
        let links = [
            (request.logo_url, &mut active.logo_url),
            (request.banner_url, &mut active.banner_url),
            (request.facebook, &mut active.facebook),
            (request.instagram, &mut active.instagram),
            (request.twitter, &mut active.twitter),
            (request.linkedin, &mut active.linkedin),
            (request.youtube, &mut active.youtube),
            (request.tiktok, &mut active.tiktok),
            (request.website, &mut active.website),
            (request.opening_time, &mut active.opening_time),
            (request.closing_time, &mut active.closing_time),
        ];
        for (value, column) in links {
            if let Some(v) = value {
                *column = Set(optional(v));
            }
        }
        if let Some(days) = closed_days {
            active.closed_days_of_week = Set(days);
        }
        active.updated_at = Set(Utc::now());

        let saved = active.update(&*self.db_pool).await?;
        info!("profile updated");
        Ok(saved)
    }

    /// Flips the manual open flag; 409 when it already has that value.
    #[instrument(skip(self, actor), fields(user_id = actor.user_id))]
    pub async fn set_open(&self, actor: &AuthUser, open: bool) -> Result<user::Model, ServiceError> {
        actor.require_role(
            &[Role::Supplier, Role::Store],
            "only suppliers and stores can change open status",
        )?;
        let current = self.me(actor).await?;
        if current.is_open == open {
            return Err(ServiceError::Conflict(if open {
                "store is already open".into()
            } else {
                "store is already closed".into()
            }));
        }
        let mut active = current.into_active_model();
        active.is_open = Set(open);
        active.updated_at = Set(Utc::now());
        let saved = active.update(&*self.db_pool).await?;
        info!(is_open = open, "open status changed");
        Ok(saved)
    }

    pub async fn list(&self, actor: &AuthUser) -> Result<Vec<user::Model>, ServiceError> {
        actor.require_admin_level(ADMIN_LEVEL_READ_ONLY)?;
        Ok(user::find_active()
            .order_by_asc(user::Column::Id)
            .all(&*self.db_pool)
            .await?)
    }

    pub async fn get(&self, actor: &AuthUser, user_id: i32) -> Result<user::Model, ServiceError> {
        actor.require_admin_level(ADMIN_LEVEL_READ_ONLY)?;
        user::find_active()
            .filter(user::Column::Id.eq(user_id))
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(USER_NOT_FOUND.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_days_are_normalized() {
        assert_eq!(normalize_closed_days("6, 0,6").unwrap().as_deref(), Some("0,6"));
        assert_eq!(normalize_closed_days(" ").unwrap(), None);
        assert!(normalize_closed_days("7").is_err());
        assert!(normalize_closed_days("sun").is_err());
    }

    #[test]
    fn blank_strings_clear_fields() {
        assert_eq!(optional("  ".into()), None);
        assert_eq!(optional(" Main St ".into()).as_deref(), Some("Main St"));
    }
}
