use axum::{
    extract::State,
    response::Response,
    routing::{get, put},
    Json, Router,
};

use crate::{
    auth::AuthUser,
    entities::employee,
    errors::ServiceError,
    handlers::common::{created_response, ApiJson, ApiPath},
    services::employees::{CreateEmployeeRequest, UpdateEmployeeRequest},
    AppState,
};

pub fn employee_routes() -> Router<AppState> {
    Router::new()
        .route("/employees", get(list_employees).post(create_employee))
        .route("/employees/me", get(current_employee))
        .route("/employees/:id", put(update_employee))
}

#[utoipa::path(
    get,
    path = "/api/employees",
    tag = "Employees",
    responses(
        (status = 200, description = "The owner's employees"),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn list_employees(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Json<Vec<employee::Model>>, ServiceError> {
    Ok(Json(state.services.employees.list(&auth_user).await?))
}

#[utoipa::path(
    post,
    path = "/api/employees",
    tag = "Employees",
    request_body = CreateEmployeeRequest,
    responses(
        (status = 201, description = "Employee created"),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 409, description = "Username already exists for this owner", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn create_employee(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ApiJson(request): ApiJson<CreateEmployeeRequest>,
) -> Result<Response, ServiceError> {
    let created = state.services.employees.create(&auth_user, request).await?;
    Ok(created_response(created))
}

#[utoipa::path(
    put,
    path = "/api/employees/{id}",
    tag = "Employees",
    params(("id" = i32, Path, description = "Employee id")),
    request_body = UpdateEmployeeRequest,
    responses(
        (status = 200, description = "Employee updated"),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Employee not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_employee(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ApiPath(id): ApiPath<i32>,
    ApiJson(request): ApiJson<UpdateEmployeeRequest>,
) -> Result<Json<employee::Model>, ServiceError> {
    Ok(Json(
        state.services.employees.update(&auth_user, id, request).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/employees/me",
    tag = "Employees",
    responses(
        (status = 200, description = "The calling employee"),
        (status = 403, description = "Not an employee", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn current_employee(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Json<employee::Model>, ServiceError> {
    Ok(Json(state.services.employees.me(&auth_user).await?))
}
