use axum::{
    extract::State,
    response::Response,
    routing::{get, post},
    Json, Router,
};

use crate::{
    auth::AuthUser,
    entities::user,
    errors::ServiceError,
    handlers::common::{created_response, ApiJson, ApiPath},
    services::{accounts::RegisterRequest, users::UpdateProfileRequest},
    AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(get_me).put(update_me))
        .route("/me/open", post(open_store))
        .route("/me/close", post(close_store))
        .route("/users", get(list_users))
        .route("/users/register", post(admin_register_user))
        .route("/users/:id", get(get_user))
}

#[utoipa::path(
    get,
    path = "/api/me",
    tag = "Users",
    responses(
        (status = 200, description = "The caller's account"),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn get_me(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Json<user::Model>, ServiceError> {
    Ok(Json(state.services.users.me(&auth_user).await?))
}

#[utoipa::path(
    put,
    path = "/api/me",
    tag = "Users",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated"),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 409, description = "Phone already exists", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_me(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ApiJson(request): ApiJson<UpdateProfileRequest>,
) -> Result<Json<user::Model>, ServiceError> {
    Ok(Json(state.services.users.update_me(&auth_user, request).await?))
}

#[utoipa::path(
    post,
    path = "/api/me/open",
    tag = "Users",
    responses(
        (status = 200, description = "Marked open"),
        (status = 409, description = "Already open", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn open_store(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Json<user::Model>, ServiceError> {
    Ok(Json(state.services.users.set_open(&auth_user, true).await?))
}

#[utoipa::path(
    post,
    path = "/api/me/close",
    tag = "Users",
    responses(
        (status = 200, description = "Marked closed"),
        (status = 409, description = "Already closed", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn close_store(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Json<user::Model>, ServiceError> {
    Ok(Json(state.services.users.set_open(&auth_user, false).await?))
}

#[utoipa::path(
    get,
    path = "/api/users",
    tag = "Admin",
    responses(
        (status = 200, description = "All accounts"),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn list_users(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Json<Vec<user::Model>>, ServiceError> {
    Ok(Json(state.services.users.list(&auth_user).await?))
}

#[utoipa::path(
    get,
    path = "/api/users/{id}",
    tag = "Admin",
    params(("id" = i32, Path, description = "User id")),
    responses(
        (status = 200, description = "The account"),
        (status = 404, description = "User not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn get_user(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<user::Model>, ServiceError> {
    Ok(Json(state.services.users.get(&auth_user, id).await?))
}

#[utoipa::path(
    post,
    path = "/api/users/register",
    tag = "Admin",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = crate::services::accounts::RegisteredUser),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 409, description = "Email or phone already exists", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn admin_register_user(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> Result<Response, ServiceError> {
    let created = state
        .services
        .accounts
        .admin_register(&auth_user, request)
        .await?;
    Ok(created_response(created))
}
