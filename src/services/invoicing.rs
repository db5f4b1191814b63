use std::fmt::Write as _;
use std::sync::Arc;

use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, QueryFilter, QueryOrder, Set};
use serde::Serialize;
use tracing::{error, info, instrument};
use utoipa::ToSchema;

use crate::{
    auth::AuthUser,
    db::DbPool,
    entities::{
        order::{self, OrderStatus},
        order_item, product, user,
        user::Role,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    storage::ObjectStorage,
};

pub const INVOICE_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

#[derive(Debug, Serialize, ToSchema)]
pub struct InvoiceLink {
    pub invoice_url: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct InvoiceSent {
    pub message: String,
    pub to: String,
    pub invoice_url: String,
}

/// One printed invoice line.
#[derive(Debug, Clone)]
pub struct InvoiceLine {
    pub name: String,
    pub quantity: i32,
    pub unit: String,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
}

impl InvoiceLine {
    fn from_item(item: &order_item::Model, product: Option<&product::Model>) -> Self {
        Self {
            name: product
                .map(|p| p.name.clone())
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| format!("Product {}", item.product_id)),
            quantity: item.quantity,
            unit: product
                .and_then(|p| p.unit.clone())
                .filter(|u| !u.is_empty())
                .unwrap_or_else(|| "-".to_string()),
            unit_price: item.unit_price,
            subtotal: item.subtotal,
        }
    }
}

fn party_block(label: &str, party: &user::Model) -> Vec<String> {
    let mut lines = vec![label.to_string(), party.name.clone()];
    lines.extend(party.address.clone().filter(|a| !a.is_empty()));
    if !party.email.is_empty() {
        lines.push(party.email.clone());
    }
    if !party.phone.is_empty() {
        lines.push(party.phone.clone());
    }
    lines
}

/// Renders the text invoice for an order.
pub fn render_invoice(
    order: &order::Model,
    lines: &[InvoiceLine],
    store: &user::Model,
    supplier: &user::Model,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "INVOICE No: {}", order.id);
    let _ = writeln!(out, "Date: {}", order.created_at.format("%Y-%m-%d"));
    out.push('\n');

    let sender = party_block("Sender (Supplier)", supplier);
    let recipient = party_block("Recipient (Store)", store);
    for i in 0..sender.len().max(recipient.len()) {
        let left = sender.get(i).map(String::as_str).unwrap_or("");
        let right = recipient.get(i).map(String::as_str).unwrap_or("");
        let _ = writeln!(out, "{:<40}{}", left, right);
    }
    out.push('\n');

    let _ = writeln!(
        out,
        "{:<32} {:>6} {:<8} {:>14} {:>14}",
        "Item", "Qty", "Unit", "Unit Price", "Subtotal"
    );
    for line in lines {
        let _ = writeln!(
            out,
            "{:<32} {:>6} {:<8} {:>14} {:>14}",
            line.name,
            line.quantity,
            line.unit,
            format!("PHP {:.2}", line.unit_price),
            format!("PHP {:.2}", line.subtotal)
        );
    }
    if order.delivery_fee > Decimal::ZERO {
        let _ = writeln!(out, "{:>62} {:>14}", "Delivery fee", format!("PHP {:.2}", order.delivery_fee));
    }
    let _ = writeln!(out, "{:>62} {:>14}", "Total", format!("PHP {:.2}", order.total_amount));
    out
}

pub fn invoice_key(order_id: i32) -> String {
    format!("invoices/{}.txt", order_id)
}

#[derive(Clone)]
pub struct InvoiceService {
    db_pool: Arc<DbPool>,
    storage: Arc<dyn ObjectStorage>,
    event_sender: Option<Arc<EventSender>>,
}

impl InvoiceService {
    pub fn new(
        db_pool: Arc<DbPool>,
        storage: Arc<dyn ObjectStorage>,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        Self {
            db_pool,
            storage,
            event_sender,
        }
    }

    async fn load(
        &self,
        actor: &AuthUser,
        order_id: i32,
    ) -> Result<(order::Model, user::Model, user::Model), ServiceError> {
        let db = &*self.db_pool;
        let mut select = order::Entity::find_by_id(order_id);
        select = match actor.role {
            Role::Supplier => select.filter(order::Column::SupplierId.eq(actor.user_id)),
            Role::Store => select.filter(order::Column::StoreId.eq(actor.user_id)),
            Role::Admin => select,
        };
        let order = select
            .one(db)
            .await?
            .filter(|o| o.status != OrderStatus::Draft)
            .ok_or_else(|| ServiceError::NotFound("order not found".into()))?;
        let store = user::Entity::find_by_id(order.store_id).one(db).await?;
        let supplier = user::Entity::find_by_id(order.supplier_id).one(db).await?;
        match (store, supplier) {
            (Some(store), Some(supplier)) => Ok((order, store, supplier)),
            _ => Err(ServiceError::NotFound("order not found".into())),
        }
    }

    async fn generate(
        &self,
        order: order::Model,
        store: &user::Model,
        supplier: &user::Model,
    ) -> Result<order::Model, ServiceError> {
        let db = &*self.db_pool;
        let items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order.id))
            .order_by_asc(order_item::Column::Id)
            .all(db)
            .await?;
        let product_ids: Vec<i32> = items.iter().map(|i| i.product_id).collect();
        let products = product::Entity::find()
            .filter(product::Column::Id.is_in(product_ids))
            .all(db)
            .await?;
        let lines: Vec<InvoiceLine> = items
            .iter()
            .map(|item| {
                InvoiceLine::from_item(item, products.iter().find(|p| p.id == item.product_id))
            })
            .collect();

        let document = render_invoice(&order, &lines, store, supplier);
        let url = self
            .storage
            .put(&invoice_key(order.id), document.into_bytes(), INVOICE_CONTENT_TYPE)
            .await?;

        let mut active = order.into_active_model();
        active.invoice_url = Set(Some(url));
        active.update(db).await.map_err(|e| {
            error!(error = %e, "failed to save invoice url");
            ServiceError::DatabaseError(e)
        })
    }

    /// Returns the stored invoice URL, rendering the document on first use.
    #[instrument(skip(self, actor), fields(user_id = actor.user_id))]
    pub async fn get_invoice(&self, actor: &AuthUser, order_id: i32) -> Result<InvoiceLink, ServiceError> {
        let (order, store, supplier) = self.load(actor, order_id).await?;
        if let Some(url) = order.invoice_url.clone().filter(|u| !u.is_empty()) {
            return Ok(InvoiceLink { invoice_url: url });
        }
        let order = self.generate(order, &store, &supplier).await?;
        Ok(InvoiceLink {
            invoice_url: order.invoice_url.unwrap_or_default(),
        })
    }

    /// Re-renders the invoice and queues it for the store.
    #[instrument(skip(self, actor), fields(user_id = actor.user_id))]
    pub async fn send_invoice(&self, actor: &AuthUser, order_id: i32) -> Result<InvoiceSent, ServiceError> {
        let (order, store, supplier) = self.load(actor, order_id).await?;
        if store.email.trim().is_empty() {
            return Err(ServiceError::BadRequest("store email is required".into()));
        }
        let order = self.generate(order, &store, &supplier).await?;
        let invoice_url = order.invoice_url.clone().unwrap_or_default();

        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::InvoiceReady {
                    order_id,
                    invoice_url: invoice_url.clone(),
                })
                .await;
        }
        info!(order_id, to = %store.email, "invoice queued");
        Ok(InvoiceSent {
            message: "invoice email sent".into(),
            to: store.email,
            invoice_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::order::PaymentStatus;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn party(id: i32, name: &str, role: Role) -> user::Model {
        let now = Utc::now();
        user::Model {
            id,
            email: format!("{}@example.com", name.to_lowercase()),
            password_hash: String::new(),
            name: name.into(),
            phone: "0917".into(),
            role,
            admin_level: None,
            address: Some("Siargao".into()),
            latitude: None,
            longitude: None,
            logo_url: None,
            banner_url: None,
            facebook: None,
            instagram: None,
            twitter: None,
            linkedin: None,
            youtube: None,
            tiktok: None,
            website: None,
            opening_time: None,
            closing_time: None,
            closed_days_of_week: None,
            is_open: true,
            last_login: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[test]
    fn invoice_lists_parties_lines_and_total() {
        let now = Utc::now();
        let order = order::Model {
            id: 101,
            store_id: 7,
            supplier_id: 3,
            status: OrderStatus::Preparing,
            total_amount: dec!(8150),
            payment_method: None,
            payment_status: PaymentStatus::Pending,
            payment_proof_url: None,
            delivery_option: None,
            delivery_fee: dec!(150),
            distance: Decimal::ZERO,
            shipping_address: None,
            notes: None,
            invoice_url: None,
            draft_key: None,
            created_at: now,
            updated_at: now,
        };
        let lines = vec![InvoiceLine {
            name: "Rice".into(),
            quantity: 10,
            unit: "sack".into(),
            unit_price: dec!(800),
            subtotal: dec!(8000),
        }];
        let doc = render_invoice(&order, &lines, &party(7, "Corner", Role::Store), &party(3, "Farm", Role::Supplier));
        assert!(doc.starts_with("INVOICE No: 101"));
        assert!(doc.contains("Sender (Supplier)"));
        assert!(doc.contains("corner@example.com"));
        assert!(doc.contains("PHP 800.00"));
        assert!(doc.contains("PHP 150.00"));
        assert!(doc.contains("PHP 8150.00"));
        assert_eq!(invoice_key(101), "invoices/101.txt");
    }
}
