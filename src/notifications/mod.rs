use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{info, instrument};

use crate::entities::{order, order_item, user};

/// An outbound transactional email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Notification delivery errors
#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("missing recipient address")]
    MissingRecipient,
    #[error("transport error: {0}")]
    Transport(String),
}

/// Delivery channel for transactional mail. SMTP lives behind this trait.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: Email) -> Result<(), NotificationError>;
}

/// Writes every message to the log instead of delivering it.
#[derive(Debug, Clone)]
pub struct LogMailer {
    from: String,
}

impl LogMailer {
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    #[instrument(skip(self, email), fields(to = %email.to))]
    async fn send(&self, email: Email) -> Result<(), NotificationError> {
        if email.to.trim().is_empty() {
            return Err(NotificationError::MissingRecipient);
        }
        info!(
            from = %self.from,
            subject = %email.subject,
            bytes = email.body.len(),
            "email dispatched"
        );
        Ok(())
    }
}

/// Keeps sent messages in memory; handy for inspecting what the event loop produced.
#[derive(Debug, Clone, Default)]
pub struct MemoryMailer {
    sent: Arc<Mutex<Vec<Email>>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, email: Email) -> Result<(), NotificationError> {
        if email.to.trim().is_empty() {
            return Err(NotificationError::MissingRecipient);
        }
        self.sent
            .lock()
            .map_err(|e| NotificationError::Transport(e.to_string()))?
            .push(email);
        Ok(())
    }
}

fn money(amount: Decimal) -> String {
    format!("₱{:.2}", amount)
}

fn item_lines(items: &[order_item::Model]) -> String {
    items
        .iter()
        .map(|i| {
            format!(
                "  product #{} x{} @ {} = {}",
                i.product_id,
                i.quantity,
                money(i.unit_price),
                money(i.subtotal)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn welcome_email(account: &user::Model) -> Email {
    Email {
        to: account.email.clone(),
        subject: "Welcome to the marketplace".into(),
        body: format!(
            "Hi {},\n\nYour {} account is ready. Sign in with {} to get started.\n",
            account.name, account.role, account.email
        ),
    }
}

pub fn order_confirmation_email(
    order: &order::Model,
    items: &[order_item::Model],
    store: &user::Model,
    supplier: &user::Model,
) -> Email {
    Email {
        to: store.email.clone(),
        subject: format!("Order #{} confirmed", order.id),
        body: format!(
            "Hi {},\n\nYour order #{} with {} was submitted.\n\n{}\n\nDelivery fee: {}\nTotal: {}\nPayment: {} ({})\n",
            store.name,
            order.id,
            supplier.name,
            item_lines(items),
            money(order.delivery_fee),
            money(order.total_amount),
            order
                .payment_method
                .map(|m| m.to_string())
                .unwrap_or_else(|| "-".into()),
            order.payment_status,
        ),
    }
}

pub fn status_change_email(
    order: &order::Model,
    store: &user::Model,
    old_status: order::OrderStatus,
) -> Email {
    Email {
        to: store.email.clone(),
        subject: format!("Order #{} is now {}", order.id, order.status),
        body: format!(
            "Hi {},\n\nOrder #{} moved from {} to {}.\n",
            store.name, order.id, old_status, order.status
        ),
    }
}

pub fn payment_confirmation_email(order: &order::Model, store: &user::Model) -> Email {
    Email {
        to: store.email.clone(),
        subject: format!("Payment received for order #{}", order.id),
        body: format!(
            "Hi {},\n\nWe confirmed your payment of {} for order #{}.\n",
            store.name,
            money(order.total_amount),
            order.id
        ),
    }
}

pub fn delivery_email(order: &order::Model, store: &user::Model) -> Email {
    Email {
        to: store.email.clone(),
        subject: format!("Order #{} delivered", order.id),
        body: format!(
            "Hi {},\n\nOrder #{} has been delivered. You can now rate the supplier.\n",
            store.name, order.id
        ),
    }
}

pub fn invoice_email(order: &order::Model, store: &user::Model, invoice_url: &str) -> Email {
    Email {
        to: store.email.clone(),
        subject: format!("Invoice for order #{}", order.id),
        body: format!(
            "Hi {},\n\nThe invoice for order #{} ({}) is available at {}\n",
            store.name,
            order.id,
            money(order.total_amount),
            invoice_url
        ),
    }
}
