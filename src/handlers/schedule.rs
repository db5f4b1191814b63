//! Per-date opening-hour overrides owned by the caller.

use axum::{
    extract::State,
    response::Response,
    routing::{get, post, put},
    Json, Router,
};

use crate::{
    auth::AuthUser,
    entities::schedule_exception,
    errors::ServiceError,
    handlers::common::{created_response, message_response, ApiJson, ApiPath},
    services::schedule::{
        BulkCreateResult, BulkScheduleExceptionRequest, CreateScheduleExceptionRequest,
        UpdateScheduleExceptionRequest,
    },
    AppState,
};

pub fn schedule_routes() -> Router<AppState> {
    Router::new()
        .route("/schedule/exceptions", get(list_exceptions).post(create_exception))
        .route("/schedule/exceptions/bulk", post(bulk_create_exceptions))
        .route(
            "/schedule/exceptions/:id",
            put(update_exception).delete(delete_exception),
        )
}

#[utoipa::path(
    get,
    path = "/api/schedule/exceptions",
    tag = "Schedule",
    responses((status = 200, description = "The caller's exceptions by date")),
    security(("Bearer" = []))
)]
pub async fn list_exceptions(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Json<Vec<schedule_exception::Model>>, ServiceError> {
    Ok(Json(state.services.schedule.list(auth_user.user_id).await?))
}

#[utoipa::path(
    post,
    path = "/api/schedule/exceptions",
    tag = "Schedule",
    request_body = CreateScheduleExceptionRequest,
    responses(
        (status = 201, description = "Exception created"),
        (status = 400, description = "Invalid date or time", body = crate::errors::ErrorResponse),
        (status = 409, description = "Exception already exists for this date", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn create_exception(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ApiJson(request): ApiJson<CreateScheduleExceptionRequest>,
) -> Result<Response, ServiceError> {
    let created = state
        .services
        .schedule
        .create(auth_user.user_id, request)
        .await?;
    Ok(created_response(created))
}

#[utoipa::path(
    post,
    path = "/api/schedule/exceptions/bulk",
    tag = "Schedule",
    request_body = BulkScheduleExceptionRequest,
    responses(
        (status = 201, description = "Exceptions created; existing dates skipped", body = BulkCreateResult),
        (status = 400, description = "Invalid date", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn bulk_create_exceptions(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ApiJson(request): ApiJson<BulkScheduleExceptionRequest>,
) -> Result<Response, ServiceError> {
    let result = state
        .services
        .schedule
        .bulk_create(auth_user.user_id, request)
        .await?;
    Ok(created_response(result))
}

#[utoipa::path(
    put,
    path = "/api/schedule/exceptions/{id}",
    tag = "Schedule",
    params(("id" = i32, Path, description = "Exception id")),
    request_body = UpdateScheduleExceptionRequest,
    responses(
        (status = 200, description = "Exception updated"),
        (status = 404, description = "Schedule exception not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_exception(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ApiPath(id): ApiPath<i32>,
    ApiJson(request): ApiJson<UpdateScheduleExceptionRequest>,
) -> Result<Json<schedule_exception::Model>, ServiceError> {
    Ok(Json(
        state
            .services
            .schedule
            .update(auth_user.user_id, id, request)
            .await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/api/schedule/exceptions/{id}",
    tag = "Schedule",
    params(("id" = i32, Path, description = "Exception id")),
    responses(
        (status = 200, description = "Exception deleted"),
        (status = 404, description = "Schedule exception not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn delete_exception(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ApiPath(id): ApiPath<i32>,
) -> Result<Response, ServiceError> {
    state.services.schedule.delete(auth_user.user_id, id).await?;
    Ok(message_response("schedule exception deleted"))
}
