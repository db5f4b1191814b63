use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde::Deserialize;
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    auth::{AuthUser, ADMIN_LEVEL_FULL},
    db::DbPool,
    entities::bug_report::{self, BugStatus},
    errors::ServiceError,
    services::{page_window, Paginated},
};

const NOT_FOUND: &str = "bug report not found";

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateBugReportRequest {
    #[validate(length(min = 1, message = "platform is required"))]
    pub platform: String,
    #[validate(length(min = 1, message = "title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "description is required"))]
    pub description: String,
    pub error_type: Option<String>,
    pub stack_trace: Option<String>,
    pub device_info: Option<String>,
    pub app_version: Option<String>,
    pub os_version: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateBugReportRequest {
    pub status: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BugReportQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub status: Option<String>,
    pub platform: Option<String>,
}

fn parse_status(raw: &str) -> Result<BugStatus, ServiceError> {
    BugStatus::from_str(raw.trim()).map_err(|_| ServiceError::ValidationError("invalid status".into()))
}

#[derive(Clone)]
pub struct BugReportService {
    db_pool: Arc<DbPool>,
}

impl BugReportService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self, actor, request), fields(user_id = actor.user_id))]
    pub async fn create(
        &self,
        actor: &AuthUser,
        request: CreateBugReportRequest,
    ) -> Result<bug_report::Model, ServiceError> {
        request.validate()?;
        let now = Utc::now();
        let saved = bug_report::ActiveModel {
            user_id: Set(Some(actor.user_id)),
            platform: Set(request.platform.trim().to_string()),
            title: Set(request.title.trim().to_string()),
            description: Set(request.description),
            error_type: Set(request.error_type),
            stack_trace: Set(request.stack_trace),
            device_info: Set(request.device_info),
            app_version: Set(request.app_version),
            os_version: Set(request.os_version),
            status: Set(BugStatus::Open),
            resolved_by: Set(None),
            resolved_at: Set(None),
            notes: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&*self.db_pool)
        .await?;
        info!(bug_report_id = saved.id, platform = %saved.platform, "bug report filed");
        Ok(saved)
    }

    pub async fn list(
        &self,
        actor: &AuthUser,
        query: BugReportQuery,
    ) -> Result<Paginated<bug_report::Model>, ServiceError> {
        actor.require_admin_level(ADMIN_LEVEL_FULL)?;
        let db = &*self.db_pool;
        let (page, limit) = page_window(query.page, query.limit);

        let mut select = bug_report::Entity::find();
        if let Some(status) = query.status.as_deref().filter(|s| !s.is_empty()) {
            select = select.filter(bug_report::Column::Status.eq(parse_status(status)?));
        }
        if let Some(platform) = query.platform.filter(|p| !p.is_empty()) {
            select = select.filter(bug_report::Column::Platform.eq(platform));
        }

        let total = select.clone().count(db).await?;
        let data = select
            .order_by_desc(bug_report::Column::CreatedAt)
            .order_by_desc(bug_report::Column::Id)
            .limit(limit)
            .offset((page - 1) * limit)
            .all(db)
            .await?;
        Ok(Paginated::new(data, page, limit, total))
    }

    pub async fn get(&self, actor: &AuthUser, id: i32) -> Result<bug_report::Model, ServiceError> {
        actor.require_admin_level(ADMIN_LEVEL_FULL)?;
        bug_report::Entity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(NOT_FOUND.into()))
    }

    /// Resolution statuses stamp the resolving admin and time.
    #[instrument(skip(self, actor, request), fields(user_id = actor.user_id))]
    pub async fn update(
        &self,
        actor: &AuthUser,
        id: i32,
        request: UpdateBugReportRequest,
    ) -> Result<bug_report::Model, ServiceError> {
        let report = self.get(actor, id).await?;
        let status = request.status.as_deref().map(parse_status).transpose()?;

        let mut active = report.into_active_model();
        if let Some(status) = status {
            if status.is_resolution() {
                active.resolved_by = Set(Some(actor.user_id));
                active.resolved_at = Set(Some(Utc::now()));
            }
            active.status = Set(status);
        }
        if let Some(notes) = request.notes {
            active.notes = Set(Some(notes));
        }
        active.updated_at = Set(Utc::now());
        let saved = active.update(&*self.db_pool).await?;
        info!(bug_report_id = id, status = %saved.status, "bug report updated");
        Ok(saved)
    }

    pub async fn delete(&self, actor: &AuthUser, id: i32) -> Result<(), ServiceError> {
        actor.require_admin_level(ADMIN_LEVEL_FULL)?;
        let result = bug_report::Entity::delete_by_id(id)
            .exec(&*self.db_pool)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(NOT_FOUND.into()));
        }
        info!(bug_report_id = id, "bug report deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn statuses_parse_or_reject() {
        assert_eq!(parse_status("investigating").unwrap(), BugStatus::Investigating);
        assert_eq!(parse_status(" fixed ").unwrap(), BugStatus::Fixed);
        assert_matches!(
            parse_status("wontfix"),
            Err(ServiceError::ValidationError(msg)) if msg == "invalid status"
        );
    }

    #[test]
    fn required_fields_are_checked() {
        let request = CreateBugReportRequest {
            platform: "android".into(),
            title: String::new(),
            description: "crash on launch".into(),
            error_type: None,
            stack_trace: None,
            device_info: None,
            app_version: None,
            os_version: None,
        };
        let err: ServiceError = request.validate().unwrap_err().into();
        assert_eq!(err.to_string(), "title is required");
    }
}
