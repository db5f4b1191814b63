use axum::{extract::State, routing::get, Json, Router};

use crate::{
    auth::AuthUser,
    entities::audit_log,
    errors::ServiceError,
    handlers::common::ApiQuery,
    services::{audit::AuditLogQuery, Paginated},
    AppState,
};

pub fn audit_log_routes() -> Router<AppState> {
    Router::new().route("/audit-logs", get(list_audit_logs))
}

#[utoipa::path(
    get,
    path = "/api/audit-logs",
    tag = "Admin",
    params(AuditLogQuery),
    responses(
        (status = 200, description = "Audit records, newest first, paginated"),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn list_audit_logs(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ApiQuery(query): ApiQuery<AuditLogQuery>,
) -> Result<Json<Paginated<audit_log::Model>>, ServiceError> {
    Ok(Json(state.services.audit_logs.list(&auth_user, query).await?))
}
