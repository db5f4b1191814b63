use sea_orm::{EntityTrait, ModelTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::{
    db::DbPool,
    entities::{order, order::OrderStatus, order_item, user},
    notifications::{self, Email, Mailer},
};

/// Capacity of the in-process event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends and logs a failure instead of returning it.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!(error = %e, "dropping domain event");
        }
    }
}

/// Domain events that trigger outbound notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    UserRegistered {
        user_id: i32,
    },
    OrderSubmitted {
        order_id: i32,
    },
    OrderStatusChanged {
        order_id: i32,
        old_status: OrderStatus,
        new_status: OrderStatus,
    },
    PaymentConfirmed {
        order_id: i32,
    },
    OrderDelivered {
        order_id: i32,
    },
    InvoiceReady {
        order_id: i32,
        invoice_url: String,
    },
}

/// Builds a sender/receiver pair with the standard capacity.
pub fn channel() -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    (EventSender::new(tx), rx)
}

/// Drains the event channel, rendering and mailing a message per event.
/// Failures are logged and the loop keeps going.
pub async fn process_events(
    mut rx: mpsc::Receiver<Event>,
    db: Arc<DbPool>,
    mailer: Arc<dyn Mailer>,
) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        debug!(?event, "received event");
        match render(&db, &event).await {
            Ok(Some(email)) => {
                if let Err(e) = mailer.send(email).await {
                    error!(?event, error = %e, "failed to deliver notification");
                }
            }
            Ok(None) => debug!(?event, "event produced no notification"),
            Err(e) => error!(?event, error = %e, "failed to prepare notification"),
        }
    }

    warn!("Event processing loop has ended");
}

async fn load_order_with_store(
    db: &DbPool,
    order_id: i32,
) -> Result<Option<(order::Model, user::Model)>, sea_orm::DbErr> {
    let Some(o) = order::Entity::find_by_id(order_id).one(db).await? else {
        return Ok(None);
    };
    let store = user::Entity::find_by_id(o.store_id).one(db).await?;
    Ok(store.map(|s| (o, s)))
}

async fn render(db: &DbPool, event: &Event) -> Result<Option<Email>, sea_orm::DbErr> {
    let email = match event {
        Event::UserRegistered { user_id } => user::Entity::find_by_id(*user_id)
            .one(db)
            .await?
            .map(|u| notifications::welcome_email(&u)),
        Event::OrderSubmitted { order_id } => {
            let Some((o, store)) = load_order_with_store(db, *order_id).await? else {
                return Ok(None);
            };
            let items = o.find_related(order_item::Entity).all(db).await?;
            let Some(supplier) = user::Entity::find_by_id(o.supplier_id).one(db).await? else {
                return Ok(None);
            };
            Some(notifications::order_confirmation_email(
                &o, &items, &store, &supplier,
            ))
        }
        Event::OrderStatusChanged {
            order_id,
            old_status,
            ..
        } => load_order_with_store(db, *order_id)
            .await?
            .map(|(o, store)| notifications::status_change_email(&o, &store, *old_status)),
        Event::PaymentConfirmed { order_id } => load_order_with_store(db, *order_id)
            .await?
            .map(|(o, store)| notifications::payment_confirmation_email(&o, &store)),
        Event::OrderDelivered { order_id } => load_order_with_store(db, *order_id)
            .await?
            .map(|(o, store)| notifications::delivery_email(&o, &store)),
        Event::InvoiceReady {
            order_id,
            invoice_url,
        } => load_order_with_store(db, *order_id)
            .await?
            .map(|(o, store)| notifications::invoice_email(&o, &store, invoice_url)),
    };
    Ok(email)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sender_reports_closed_channel() {
        let (sender, rx) = channel();
        drop(rx);
        let err = sender
            .send(Event::UserRegistered { user_id: 1 })
            .await
            .unwrap_err();
        assert!(err.starts_with("Failed to send event"));
    }

    #[tokio::test]
    async fn events_arrive_in_order() {
        let (sender, mut rx) = channel();
        sender.send(Event::OrderSubmitted { order_id: 1 }).await.unwrap();
        sender.send(Event::OrderDelivered { order_id: 1 }).await.unwrap();
        assert_eq!(rx.recv().await, Some(Event::OrderSubmitted { order_id: 1 }));
        assert_eq!(rx.recv().await, Some(Event::OrderDelivered { order_id: 1 }));
    }
}
