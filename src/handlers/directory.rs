use axum::{extract::State, routing::get, Json, Router};

use crate::{
    auth::AuthUser,
    entities::product,
    errors::ServiceError,
    handlers::common::{ApiPath, ApiQuery},
    services::directory::{DirectoryEntry, DirectoryQuery},
    AppState,
};

pub fn directory_routes() -> Router<AppState> {
    Router::new()
        .route("/suppliers", get(list_suppliers))
        .route("/suppliers/:id/products", get(supplier_products))
        .route("/stores", get(list_stores))
}

#[utoipa::path(
    get,
    path = "/api/suppliers",
    tag = "Directory",
    params(DirectoryQuery),
    responses(
        (status = 200, description = "Suppliers, open ones first", body = [DirectoryEntry]),
        (status = 403, description = "Only stores and admins", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn list_suppliers(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ApiQuery(query): ApiQuery<DirectoryQuery>,
) -> Result<Json<Vec<DirectoryEntry>>, ServiceError> {
    Ok(Json(state.services.directory.suppliers(&auth_user, query).await?))
}

#[utoipa::path(
    get,
    path = "/api/stores",
    tag = "Directory",
    params(DirectoryQuery),
    responses(
        (status = 200, description = "Stores, open ones first", body = [DirectoryEntry]),
        (status = 403, description = "Only suppliers and admins", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn list_stores(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ApiQuery(query): ApiQuery<DirectoryQuery>,
) -> Result<Json<Vec<DirectoryEntry>>, ServiceError> {
    Ok(Json(state.services.directory.stores(&auth_user, query).await?))
}

#[utoipa::path(
    get,
    path = "/api/suppliers/{id}/products",
    tag = "Directory",
    params(("id" = i32, Path, description = "Supplier id")),
    responses(
        (status = 200, description = "The supplier's catalog"),
        (status = 404, description = "Supplier not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn supplier_products(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<Vec<product::Model>>, ServiceError> {
    Ok(Json(
        state
            .services
            .directory
            .supplier_products(&auth_user, id)
            .await?,
    ))
}
