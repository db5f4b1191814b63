//! Public authentication endpoints: registration and the two login flows.

use axum::{extract::State, response::Response, routing::post, Json, Router};
use tracing::info;

use crate::{
    errors::ServiceError,
    handlers::common::{created_response, ApiJson},
    services::accounts::{EmployeeAuthResponse, EmployeeLoginRequest, LoginRequest, LoginResponse, RegisterRequest},
    AppState,
};

/// Routes reachable without a bearer token.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/employee/login", post(employee_login))
}

#[utoipa::path(
    post,
    path = "/api/register",
    tag = "Auth",
    summary = "Register a supplier or store",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = crate::services::accounts::AuthResponse),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 409, description = "Email or phone already exists", body = crate::errors::ErrorResponse),
    )
)]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> Result<Response, ServiceError> {
    let response = state.services.accounts.register(request).await?;
    info!(user_id = response.user.id, "account registered");
    Ok(created_response(response))
}

#[utoipa::path(
    post,
    path = "/api/login",
    tag = "Auth",
    summary = "Log in with email (accounts) or username (employees)",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued"),
        (status = 401, description = "Invalid credentials", body = crate::errors::ErrorResponse),
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>, ServiceError> {
    Ok(Json(state.services.accounts.login(request).await?))
}

#[utoipa::path(
    post,
    path = "/api/employee/login",
    tag = "Auth",
    summary = "Log in as an employee of a given owner",
    request_body = EmployeeLoginRequest,
    responses(
        (status = 200, description = "Token issued", body = EmployeeAuthResponse),
        (status = 401, description = "Invalid credentials", body = crate::errors::ErrorResponse),
        (status = 403, description = "Employee account is inactive", body = crate::errors::ErrorResponse),
    )
)]
pub async fn employee_login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<EmployeeLoginRequest>,
) -> Result<Json<EmployeeAuthResponse>, ServiceError> {
    Ok(Json(state.services.accounts.employee_login(request).await?))
}
