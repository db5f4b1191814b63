use axum::{extract::State, routing::get, Json, Router};

use crate::{
    auth::AuthUser,
    errors::ServiceError,
    handlers::common::ApiPath,
    services::analytics::{AccountAnalytics, DashboardAnalytics},
    AppState,
};

pub fn analytics_routes() -> Router<AppState> {
    Router::new()
        .route("/me/analytics", get(my_analytics))
        .route("/users/:id/analytics", get(user_analytics))
        .route("/dashboard/analytics", get(dashboard_analytics))
}

#[utoipa::path(
    get,
    path = "/api/me/analytics",
    tag = "Analytics",
    responses(
        (status = 200, description = "Order and product totals for the caller"),
        (status = 403, description = "Only stores and suppliers", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn my_analytics(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Json<AccountAnalytics>, ServiceError> {
    Ok(Json(state.services.analytics.for_me(&auth_user).await?))
}

#[utoipa::path(
    get,
    path = "/api/users/{id}/analytics",
    tag = "Analytics",
    params(("id" = i32, Path, description = "User id")),
    responses(
        (status = 200, description = "Order and product totals for the account"),
        (status = 400, description = "Account is not a store or supplier", body = crate::errors::ErrorResponse),
        (status = 404, description = "User not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn user_analytics(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<AccountAnalytics>, ServiceError> {
    Ok(Json(state.services.analytics.for_user(&auth_user, id).await?))
}

#[utoipa::path(
    get,
    path = "/api/dashboard/analytics",
    tag = "Analytics",
    responses(
        (status = 200, description = "Marketplace-wide totals and 30-day daily stats"),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn dashboard_analytics(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Json<DashboardAnalytics>, ServiceError> {
    Ok(Json(state.services.analytics.dashboard(&auth_user).await?))
}
