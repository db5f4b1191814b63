use axum::{
    extract::State,
    response::Response,
    routing::{get, post},
    Json, Router,
};

use crate::{
    auth::AuthUser,
    errors::ServiceError,
    handlers::common::{created_response, ApiJson, ApiPath},
    services::ratings::{CreateRatingRequest, MyRatings, RatedOrders, RatingsSummary},
    AppState,
};

pub fn rating_routes() -> Router<AppState> {
    Router::new()
        .route("/orders/:id/rating", post(rate_order))
        .route("/me/ratings", get(my_ratings))
        .route("/ratings/summary", get(ratings_summary))
        .route("/ratings/orders", get(rated_orders))
}

#[utoipa::path(
    post,
    path = "/api/orders/{id}/rating",
    tag = "Ratings",
    params(("id" = i32, Path, description = "Delivered order id")),
    request_body = CreateRatingRequest,
    responses(
        (status = 201, description = "Rating recorded"),
        (status = 400, description = "Order not delivered or rating out of range", body = crate::errors::ErrorResponse),
        (status = 403, description = "Access denied", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Already rated", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn rate_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ApiPath(id): ApiPath<i32>,
    ApiJson(request): ApiJson<CreateRatingRequest>,
) -> Result<Response, ServiceError> {
    let rating = state.services.ratings.create(&auth_user, id, request).await?;
    Ok(created_response(rating))
}

#[utoipa::path(
    get,
    path = "/api/me/ratings",
    tag = "Ratings",
    responses((status = 200, description = "Ratings received by the caller", body = MyRatings)),
    security(("Bearer" = []))
)]
pub async fn my_ratings(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Json<MyRatings>, ServiceError> {
    Ok(Json(state.services.ratings.mine(&auth_user).await?))
}

#[utoipa::path(
    get,
    path = "/api/ratings/summary",
    tag = "Ratings",
    responses(
        (status = 200, description = "Per-party and per-order averages", body = RatingsSummary),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn ratings_summary(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Json<RatingsSummary>, ServiceError> {
    Ok(Json(state.services.ratings.summary(&auth_user).await?))
}

#[utoipa::path(
    get,
    path = "/api/ratings/orders",
    tag = "Ratings",
    responses(
        (status = 200, description = "Ids of orders that carry ratings", body = RatedOrders),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn rated_orders(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Json<RatedOrders>, ServiceError> {
    Ok(Json(state.services.ratings.rated_orders(&auth_user).await?))
}
