use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use tracing::info;
use utoipa::IntoParams;

use crate::{
    auth::AuthUser,
    errors::ServiceError,
    handlers::common::{message_response, ApiJson, ApiPath, ApiQuery},
    services::{
        invoicing::{InvoiceLink, InvoiceSent},
        orders::{
            AddItemRequest, CreateDraftRequest, OrderDetail, SubmitOrderRequest,
            UpdateItemRequest, UpdateStatusRequest,
        },
    },
    AppState,
};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OrderListQuery {
    /// Includes drafts when set to `draft`.
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DraftQuery {
    pub supplier_id: Option<i32>,
}

pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_orders))
        .route("/orders/draft", get(get_draft_order).post(create_draft_order))
        .route("/orders/items/:item_id", put(update_order_item).delete(remove_order_item))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/items", post(add_order_item))
        .route("/orders/:id/submit", post(submit_order))
        .route("/orders/:id/status", put(update_order_status))
        .route("/orders/:id/payment/paid", post(mark_payment_paid))
        .route("/orders/:id/payment/pending", post(mark_payment_pending))
        .route("/orders/:id/send-invoice", post(send_invoice))
        .route("/orders/:id/invoice", get(get_invoice))
}

#[utoipa::path(
    get,
    path = "/api/orders",
    tag = "Orders",
    params(OrderListQuery),
    responses(
        (status = 200, description = "The caller's orders, newest first"),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn list_orders(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ApiQuery(query): ApiQuery<OrderListQuery>,
) -> Result<Json<Vec<OrderDetail>>, ServiceError> {
    Ok(Json(state.services.orders.list(&auth_user, query.status).await?))
}

#[utoipa::path(
    get,
    path = "/api/orders/draft",
    tag = "Orders",
    params(DraftQuery),
    responses(
        (status = 200, description = "The caller's draft order"),
        (status = 404, description = "No draft order found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn get_draft_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ApiQuery(query): ApiQuery<DraftQuery>,
) -> Result<Json<OrderDetail>, ServiceError> {
    Ok(Json(
        state
            .services
            .orders
            .get_draft(&auth_user, query.supplier_id)
            .await?,
    ))
}

#[utoipa::path(
    post,
    path = "/api/orders/draft",
    tag = "Orders",
    request_body = CreateDraftRequest,
    responses(
        (status = 200, description = "Existing draft returned"),
        (status = 201, description = "Draft created"),
        (status = 403, description = "Only stores can create orders", body = crate::errors::ErrorResponse),
        (status = 404, description = "Supplier not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn create_draft_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ApiJson(request): ApiJson<CreateDraftRequest>,
) -> Result<Response, ServiceError> {
    let (draft, created) = state
        .services
        .orders
        .create_draft(&auth_user, request.supplier_id)
        .await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(draft)).into_response())
}

#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    tag = "Orders",
    params(("id" = i32, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order with items, ratings and parties"),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn get_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<OrderDetail>, ServiceError> {
    Ok(Json(state.services.orders.get(&auth_user, id).await?))
}

#[utoipa::path(
    post,
    path = "/api/orders/{id}/items",
    tag = "Orders",
    params(("id" = i32, Path, description = "Draft order id")),
    request_body = AddItemRequest,
    responses(
        (status = 200, description = "Updated draft order"),
        (status = 400, description = "Insufficient stock or invalid quantity", body = crate::errors::ErrorResponse),
        (status = 404, description = "Draft order or product not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn add_order_item(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ApiPath(id): ApiPath<i32>,
    ApiJson(request): ApiJson<AddItemRequest>,
) -> Result<Json<OrderDetail>, ServiceError> {
    Ok(Json(
        state.services.orders.add_item(&auth_user, id, request).await?,
    ))
}

#[utoipa::path(
    put,
    path = "/api/orders/items/{item_id}",
    tag = "Orders",
    params(("item_id" = i32, Path, description = "Order item id")),
    request_body = UpdateItemRequest,
    responses(
        (status = 200, description = "Updated draft order"),
        (status = 400, description = "Insufficient stock or invalid quantity", body = crate::errors::ErrorResponse),
        (status = 403, description = "Not the caller's draft", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order item not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_order_item(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ApiPath(item_id): ApiPath<i32>,
    ApiJson(request): ApiJson<UpdateItemRequest>,
) -> Result<Json<OrderDetail>, ServiceError> {
    Ok(Json(
        state
            .services
            .orders
            .update_item(&auth_user, item_id, request)
            .await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/api/orders/items/{item_id}",
    tag = "Orders",
    params(("item_id" = i32, Path, description = "Order item id")),
    responses(
        (status = 200, description = "Item removed and stock restored"),
        (status = 403, description = "Not the caller's draft", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order item not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn remove_order_item(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ApiPath(item_id): ApiPath<i32>,
) -> Result<Response, ServiceError> {
    state.services.orders.remove_item(&auth_user, item_id).await?;
    Ok(message_response("item removed"))
}

#[utoipa::path(
    post,
    path = "/api/orders/{id}/submit",
    tag = "Orders",
    params(("id" = i32, Path, description = "Draft order id")),
    request_body = SubmitOrderRequest,
    responses(
        (status = 200, description = "Submitted order"),
        (status = 400, description = "Empty order, invalid payment or delivery, below minimum, missing address", body = crate::errors::ErrorResponse),
        (status = 404, description = "Draft order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn submit_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ApiPath(id): ApiPath<i32>,
    ApiJson(request): ApiJson<SubmitOrderRequest>,
) -> Result<Json<OrderDetail>, ServiceError> {
    let order = state.services.orders.submit(&auth_user, id, request).await?;
    info!(order_id = id, "order submitted");
    Ok(Json(order))
}

#[utoipa::path(
    put,
    path = "/api/orders/{id}/status",
    tag = "Orders",
    params(("id" = i32, Path, description = "Order id")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Order with its new status"),
        (status = 400, description = "Invalid status or transition", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ApiPath(id): ApiPath<i32>,
    ApiJson(request): ApiJson<UpdateStatusRequest>,
) -> Result<Json<OrderDetail>, ServiceError> {
    Ok(Json(
        state
            .services
            .orders
            .update_status(&auth_user, id, &request.status)
            .await?,
    ))
}

#[utoipa::path(
    post,
    path = "/api/orders/{id}/payment/paid",
    tag = "Orders",
    params(("id" = i32, Path, description = "Order id")),
    responses(
        (status = 200, description = "Payment marked as paid"),
        (status = 400, description = "Not a GCash order or already paid", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found or access denied", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn mark_payment_paid(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<OrderDetail>, ServiceError> {
    Ok(Json(state.services.orders.mark_paid(&auth_user, id).await?))
}

#[utoipa::path(
    post,
    path = "/api/orders/{id}/payment/pending",
    tag = "Orders",
    params(("id" = i32, Path, description = "Order id")),
    responses(
        (status = 200, description = "Payment marked as pending"),
        (status = 400, description = "Already pending", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found or access denied", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn mark_payment_pending(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<OrderDetail>, ServiceError> {
    Ok(Json(state.services.orders.mark_pending(&auth_user, id).await?))
}

#[utoipa::path(
    post,
    path = "/api/orders/{id}/send-invoice",
    tag = "Orders",
    params(("id" = i32, Path, description = "Order id")),
    responses(
        (status = 200, description = "Invoice generated and queued for email", body = InvoiceSent),
        (status = 400, description = "Store email is required", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn send_invoice(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<InvoiceSent>, ServiceError> {
    Ok(Json(state.services.invoices.send_invoice(&auth_user, id).await?))
}

#[utoipa::path(
    get,
    path = "/api/orders/{id}/invoice",
    tag = "Orders",
    params(("id" = i32, Path, description = "Order id")),
    responses(
        (status = 200, description = "Link to the invoice document", body = InvoiceLink),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn get_invoice(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<InvoiceLink>, ServiceError> {
    Ok(Json(state.services.invoices.get_invoice(&auth_user, id).await?))
}
