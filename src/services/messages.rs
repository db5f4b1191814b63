use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use tracing::{debug, info, instrument};
use utoipa::ToSchema;

use crate::{
    auth::{AuthUser, Capability},
    db::DbPool,
    entities::{
        message,
        order::{self, OrderStatus},
        user::Role,
    },
    errors::ServiceError,
};

pub const MAX_MESSAGE_CHARS: usize = 5000;

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub content: String,
    pub image_url: Option<String>,
}

/// Whether the chat on `order` still accepts messages at `now`.
pub fn messaging_open(order: &order::Model, window: Duration, now: DateTime<Utc>) -> bool {
    order.status != OrderStatus::Delivered || now - order.updated_at < window
}

/// Trims and validates message input, returning `(content, image_url)`.
pub fn normalize_message(
    request: SendMessageRequest,
) -> Result<(String, Option<String>), ServiceError> {
    let content = request.content.trim().to_string();
    let image_url = request.image_url.map(|u| u.trim().to_string()).filter(|u| !u.is_empty());
    if content.is_empty() && image_url.is_none() {
        return Err(ServiceError::BadRequest(
            "message must have either content or an image".into(),
        ));
    }
    if content.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ServiceError::BadRequest(
            "message content must be between 1 and 5000 characters".into(),
        ));
    }
    Ok((content, image_url))
}

#[derive(Clone)]
pub struct MessageService {
    db_pool: Arc<DbPool>,
    window: Duration,
}

impl MessageService {
    pub fn new(db_pool: Arc<DbPool>, window_hours: i64) -> Self {
        Self {
            db_pool,
            window: Duration::hours(window_hours),
        }
    }

    async fn party_order(&self, actor: &AuthUser, order_id: i32) -> Result<order::Model, ServiceError> {
        let column = match actor.role {
            Role::Store => order::Column::StoreId,
            _ => order::Column::SupplierId,
        };
        order::Entity::find_by_id(order_id)
            .filter(column.eq(actor.user_id))
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound("order not found".into()))
    }

    /// Conversation for an order, oldest first. Messages from the other party
    /// are marked read as a side effect.
    #[instrument(skip(self, actor), fields(user_id = actor.user_id))]
    pub async fn list(&self, actor: &AuthUser, order_id: i32) -> Result<Vec<message::Model>, ServiceError> {
        actor.require_role(
            &[Role::Supplier, Role::Store],
            "only suppliers and stores can view messages",
        )?;
        let order = self.party_order(actor, order_id).await?;
        let db = &*self.db_pool;

        let marked = message::Entity::update_many()
            .col_expr(message::Column::ReadAt, Expr::value(Utc::now()))
            .filter(message::Column::OrderId.eq(order.id))
            .filter(message::Column::SenderId.ne(actor.user_id))
            .filter(message::Column::ReadAt.is_null())
            .exec(db)
            .await?;
        if marked.rows_affected > 0 {
            debug!(order_id, count = marked.rows_affected, "marked messages read");
        }

        Ok(message::Entity::find()
            .filter(message::Column::OrderId.eq(order.id))
            .order_by_asc(message::Column::CreatedAt)
            .order_by_asc(message::Column::Id)
            .all(db)
            .await?)
    }

    #[instrument(skip(self, actor, request), fields(user_id = actor.user_id))]
    pub async fn send(
        &self,
        actor: &AuthUser,
        order_id: i32,
        request: SendMessageRequest,
    ) -> Result<message::Model, ServiceError> {
        actor.require_role(
            &[Role::Supplier, Role::Store],
            "only suppliers and stores can send messages",
        )?;
        actor.require_capability(Capability::Chat)?;
        let order = self.party_order(actor, order_id).await?;

        if !messaging_open(&order, self.window, Utc::now()) {
            return Err(ServiceError::Forbidden(format!(
                "messaging is closed. order was delivered more than {} hours ago",
                self.window.num_hours()
            )));
        }
        let (content, image_url) = normalize_message(request)?;

        let now = Utc::now();
        let saved = message::ActiveModel {
            order_id: Set(order.id),
            sender_id: Set(actor.user_id),
            sender_employee_id: Set(actor.employee_id()),
            content: Set(content),
            image_url: Set(image_url),
            read_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&*self.db_pool)
        .await?;

        info!(order_id, message_id = saved.id, "message sent");
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::order::PaymentStatus;
    use rust_decimal::Decimal;

    fn order_at(status: OrderStatus, updated_at: DateTime<Utc>) -> order::Model {
        order::Model {
            id: 1,
            store_id: 7,
            supplier_id: 3,
            status,
            total_amount: Decimal::ZERO,
            payment_method: None,
            payment_status: PaymentStatus::Pending,
            payment_proof_url: None,
            delivery_option: None,
            delivery_fee: Decimal::ZERO,
            distance: Decimal::ZERO,
            shipping_address: None,
            notes: None,
            invoice_url: None,
            draft_key: None,
            created_at: updated_at,
            updated_at,
        }
    }

    #[test]
    fn delivered_orders_close_after_the_window() {
        let now = Utc::now();
        let window = Duration::hours(12);
        assert!(messaging_open(&order_at(OrderStatus::Delivered, now - Duration::hours(11)), window, now));
        assert!(!messaging_open(&order_at(OrderStatus::Delivered, now - Duration::hours(12)), window, now));
        assert!(messaging_open(&order_at(OrderStatus::InTransit, now - Duration::days(30)), window, now));
    }

    #[test]
    fn message_needs_text_or_image() {
        let err = normalize_message(SendMessageRequest {
            content: "   ".into(),
            image_url: Some(" ".into()),
        })
        .unwrap_err();
        assert_eq!(err.to_string(), "message must have either content or an image");

        let (content, image) = normalize_message(SendMessageRequest {
            content: String::new(),
            image_url: Some("http://x/uploads/a.png".into()),
        })
        .unwrap();
        assert!(content.is_empty());
        assert!(image.is_some());

        let err = normalize_message(SendMessageRequest {
            content: "x".repeat(MAX_MESSAGE_CHARS + 1),
            image_url: None,
        })
        .unwrap_err();
        assert_eq!(err.to_string(), "message content must be between 1 and 5000 characters");
    }
}
