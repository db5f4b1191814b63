use axum::{extract::State, response::Response, routing::get, Json, Router};

use crate::{
    auth::AuthUser,
    entities::message,
    errors::ServiceError,
    handlers::common::{created_response, ApiJson, ApiPath},
    services::messages::SendMessageRequest,
    AppState,
};

pub fn message_routes() -> Router<AppState> {
    Router::new().route("/orders/:id/messages", get(list_messages).post(send_message))
}

#[utoipa::path(
    get,
    path = "/api/orders/{id}/messages",
    tag = "Messages",
    params(("id" = i32, Path, description = "Order id")),
    responses(
        (status = 200, description = "Conversation, oldest first"),
        (status = 403, description = "Only suppliers and stores", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn list_messages(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<Vec<message::Model>>, ServiceError> {
    Ok(Json(state.services.messages.list(&auth_user, id).await?))
}

#[utoipa::path(
    post,
    path = "/api/orders/{id}/messages",
    tag = "Messages",
    params(("id" = i32, Path, description = "Order id")),
    request_body = SendMessageRequest,
    responses(
        (status = 201, description = "Message sent"),
        (status = 400, description = "Empty or oversized message", body = crate::errors::ErrorResponse),
        (status = 403, description = "Messaging closed or not permitted", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn send_message(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ApiPath(id): ApiPath<i32>,
    ApiJson(request): ApiJson<SendMessageRequest>,
) -> Result<Response, ServiceError> {
    let sent = state.services.messages.send(&auth_user, id, request).await?;
    Ok(created_response(sent))
}
