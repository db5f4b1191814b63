use axum::{extract::State, response::Response, routing::get, Json, Router};

use crate::{
    auth::AuthUser,
    entities::bug_report,
    errors::ServiceError,
    handlers::common::{created_response, message_response, ApiJson, ApiPath, ApiQuery},
    services::{
        bug_reports::{BugReportQuery, CreateBugReportRequest, UpdateBugReportRequest},
        Paginated,
    },
    AppState,
};

pub fn bug_report_routes() -> Router<AppState> {
    Router::new()
        .route("/bug-reports", get(list_bug_reports).post(create_bug_report))
        .route(
            "/bug-reports/:id",
            get(get_bug_report)
                .put(update_bug_report)
                .delete(delete_bug_report),
        )
}

#[utoipa::path(
    post,
    path = "/api/bug-reports",
    tag = "Bug Reports",
    request_body = CreateBugReportRequest,
    responses(
        (status = 201, description = "Report filed"),
        (status = 400, description = "Missing required field", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn create_bug_report(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ApiJson(request): ApiJson<CreateBugReportRequest>,
) -> Result<Response, ServiceError> {
    let report = state.services.bug_reports.create(&auth_user, request).await?;
    Ok(created_response(report))
}

#[utoipa::path(
    get,
    path = "/api/bug-reports",
    tag = "Bug Reports",
    params(BugReportQuery),
    responses(
        (status = 200, description = "Reports, newest first, paginated"),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn list_bug_reports(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ApiQuery(query): ApiQuery<BugReportQuery>,
) -> Result<Json<Paginated<bug_report::Model>>, ServiceError> {
    Ok(Json(state.services.bug_reports.list(&auth_user, query).await?))
}

#[utoipa::path(
    get,
    path = "/api/bug-reports/{id}",
    tag = "Bug Reports",
    params(("id" = i32, Path, description = "Bug report id")),
    responses(
        (status = 200, description = "The report"),
        (status = 404, description = "Bug report not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn get_bug_report(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<bug_report::Model>, ServiceError> {
    Ok(Json(state.services.bug_reports.get(&auth_user, id).await?))
}

#[utoipa::path(
    put,
    path = "/api/bug-reports/{id}",
    tag = "Bug Reports",
    params(("id" = i32, Path, description = "Bug report id")),
    request_body = UpdateBugReportRequest,
    responses(
        (status = 200, description = "Report updated"),
        (status = 400, description = "Invalid status", body = crate::errors::ErrorResponse),
        (status = 404, description = "Bug report not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_bug_report(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ApiPath(id): ApiPath<i32>,
    ApiJson(request): ApiJson<UpdateBugReportRequest>,
) -> Result<Json<bug_report::Model>, ServiceError> {
    Ok(Json(
        state.services.bug_reports.update(&auth_user, id, request).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/api/bug-reports/{id}",
    tag = "Bug Reports",
    params(("id" = i32, Path, description = "Bug report id")),
    responses(
        (status = 200, description = "Report deleted"),
        (status = 404, description = "Bug report not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn delete_bug_report(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ApiPath(id): ApiPath<i32>,
) -> Result<Response, ServiceError> {
    state.services.bug_reports.delete(&auth_user, id).await?;
    Ok(message_response("bug report deleted"))
}
