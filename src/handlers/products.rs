use axum::{
    extract::State,
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    auth::AuthUser,
    entities::product,
    errors::ServiceError,
    handlers::common::{created_response, message_response, ApiJson, ApiPath, ApiQuery},
    services::{
        products::{BulkCreateProductsRequest, CreateProductRequest, ProductQuery, UpdateProductRequest},
        stock_history::{StockHistoryPage, StockHistoryQuery},
    },
    AppState,
};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryWindow {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products).post(create_product))
        .route("/products/bulk", post(bulk_create_products))
        .route("/products/reset-stocks", post(reset_stocks))
        .route(
            "/products/:id",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/products/:id/restore", post(restore_product))
        .route("/products/:id/stock-history", get(product_stock_history))
        .route("/stock-history", get(list_stock_history))
}

#[utoipa::path(
    get,
    path = "/api/products",
    tag = "Products",
    params(ProductQuery),
    responses(
        (status = 200, description = "Products visible to the caller, newest first"),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn list_products(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ApiQuery(query): ApiQuery<ProductQuery>,
) -> Result<Json<Vec<product::Model>>, ServiceError> {
    Ok(Json(state.services.products.list(&auth_user, query).await?))
}

#[utoipa::path(
    get,
    path = "/api/products/{id}",
    tag = "Products",
    params(("id" = i32, Path, description = "Product id")),
    responses(
        (status = 200, description = "The product"),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn get_product(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<product::Model>, ServiceError> {
    Ok(Json(state.services.products.get(&auth_user, id).await?))
}

#[utoipa::path(
    post,
    path = "/api/products",
    tag = "Products",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Product created"),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 409, description = "SKU already exists", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn create_product(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ApiJson(request): ApiJson<CreateProductRequest>,
) -> Result<Response, ServiceError> {
    let created = state.services.products.create(&auth_user, request).await?;
    Ok(created_response(created))
}

#[utoipa::path(
    post,
    path = "/api/products/bulk",
    tag = "Products",
    request_body = BulkCreateProductsRequest,
    responses(
        (status = 201, description = "Per-item results", body = crate::services::products::BulkCreateProductsResult),
        (status = 400, description = "No products provided", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn bulk_create_products(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ApiJson(request): ApiJson<BulkCreateProductsRequest>,
) -> Result<Response, ServiceError> {
    let result = state
        .services
        .products
        .bulk_create(&auth_user, request.products)
        .await?;
    Ok(created_response(result))
}

#[utoipa::path(
    put,
    path = "/api/products/{id}",
    tag = "Products",
    params(("id" = i32, Path, description = "Product id")),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Product updated"),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_product(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ApiPath(id): ApiPath<i32>,
    ApiJson(request): ApiJson<UpdateProductRequest>,
) -> Result<Json<product::Model>, ServiceError> {
    Ok(Json(
        state.services.products.update(&auth_user, id, request).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/api/products/{id}",
    tag = "Products",
    params(("id" = i32, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product soft-deleted"),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn delete_product(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ApiPath(id): ApiPath<i32>,
) -> Result<Response, ServiceError> {
    state.services.products.delete(&auth_user, id).await?;
    Ok(message_response("product deleted"))
}

#[utoipa::path(
    post,
    path = "/api/products/{id}/restore",
    tag = "Products",
    params(("id" = i32, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product restored"),
        (status = 404, description = "No deleted product with this id", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn restore_product(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<product::Model>, ServiceError> {
    Ok(Json(state.services.products.restore(&auth_user, id).await?))
}

#[utoipa::path(
    post,
    path = "/api/products/reset-stocks",
    tag = "Products",
    responses(
        (status = 200, description = "Number of products reset to zero stock"),
        (status = 403, description = "Only suppliers", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn reset_stocks(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let updated = state.services.products.reset_stocks(&auth_user).await?;
    Ok(Json(serde_json::json!({ "updated": updated })))
}

#[utoipa::path(
    get,
    path = "/api/stock-history",
    tag = "Products",
    params(StockHistoryQuery),
    responses(
        (status = 200, description = "Stock ledger rows", body = StockHistoryPage),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn list_stock_history(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ApiQuery(query): ApiQuery<StockHistoryQuery>,
) -> Result<Json<StockHistoryPage>, ServiceError> {
    Ok(Json(state.services.stock_history.list(&auth_user, query).await?))
}

#[utoipa::path(
    get,
    path = "/api/products/{id}/stock-history",
    tag = "Products",
    params(("id" = i32, Path, description = "Product id"), HistoryWindow),
    responses(
        (status = 200, description = "Stock ledger rows for one product", body = StockHistoryPage),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn product_stock_history(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ApiPath(id): ApiPath<i32>,
    ApiQuery(window): ApiQuery<HistoryWindow>,
) -> Result<Json<StockHistoryPage>, ServiceError> {
    Ok(Json(
        state
            .services
            .stock_history
            .for_product(&auth_user, id, window.limit, window.offset)
            .await?,
    ))
}
