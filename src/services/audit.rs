use std::sync::Arc;

use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    auth::{AuthUser, ADMIN_LEVEL_FULL},
    db::DbPool,
    entities::audit_log,
    errors::ServiceError,
    services::{page_window, Paginated},
};

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AuditLogQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub role: Option<String>,
    pub user_id: Option<i32>,
    /// Substring of the request path.
    pub endpoint: Option<String>,
}

#[derive(Clone)]
pub struct AuditLogService {
    db_pool: Arc<DbPool>,
}

impl AuditLogService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    pub async fn list(
        &self,
        actor: &AuthUser,
        query: AuditLogQuery,
    ) -> Result<Paginated<audit_log::Model>, ServiceError> {
        actor.require_admin_level(ADMIN_LEVEL_FULL)?;
        let db = &*self.db_pool;
        let (page, limit) = page_window(query.page, query.limit);

        let mut select = audit_log::Entity::find();
        if let Some(role) = query.role.filter(|r| !r.is_empty()) {
            select = select.filter(audit_log::Column::Role.eq(role));
        }
        if let Some(user_id) = query.user_id {
            select = select.filter(audit_log::Column::UserId.eq(user_id));
        }
        if let Some(endpoint) = query.endpoint.filter(|e| !e.is_empty()) {
            select = select.filter(audit_log::Column::Endpoint.contains(&endpoint));
        }

        let total = select.clone().count(db).await?;
        let data = select
            .order_by_desc(audit_log::Column::CreatedAt)
            .order_by_desc(audit_log::Column::Id)
            .limit(limit)
            .offset((page - 1) * limit)
            .all(db)
            .await?;

        Ok(Paginated::new(data, page, limit, total))
    }
}
