//! Draft-to-delivery order workflow.
//!
//! Every operation that touches stock runs in a single transaction. Order and
//! product rows are re-read with `FOR UPDATE`, stock is decremented through a
//! guarded `UPDATE ... WHERE stock_quantity >= n`, and the order total is
//! recomputed from the item rows read inside the same transaction.

use crate::{
    auth::{AuthUser, Capability},
    db::DbPool,
    entities::{
        order::{self, DeliveryOption, OrderStatus, PaymentMethod, PaymentStatus},
        order_item, product, rating,
        stock_history::ChangeType,
        user::{self, Role},
    },
    errors::{is_unique_violation, ServiceError},
    events::{Event, EventSender},
    services::stock_history::{self, StockChange},
};
use chrono::Utc;
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait,
    DatabaseTransaction, EntityTrait, IntoActiveModel, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use validator::Validate;

const DRAFT_NOT_FOUND: &str = "draft order not found";
const ORDER_NOT_FOUND: &str = "order not found";
const ITEM_NOT_FOUND: &str = "order item not found";
const PRODUCT_NOT_FOUND: &str = "product not found";
const PAYMENT_ORDER_NOT_FOUND: &str = "order not found or access denied";

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateDraftRequest {
    pub supplier_id: i32,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct AddItemRequest {
    pub product_id: i32,
    #[validate(range(min = 1, message = "quantity must be at least 1"))]
    pub quantity: i32,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateItemRequest {
    #[validate(range(min = 1, message = "quantity must be at least 1"))]
    pub quantity: i32,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct SubmitOrderRequest {
    pub payment_method: String,
    pub delivery_option: String,
    pub shipping_address: Option<String>,
    pub payment_proof_url: Option<String>,
    #[schema(value_type = Option<f64>)]
    pub delivery_fee: Option<Decimal>,
    #[schema(value_type = Option<f64>)]
    pub distance: Option<Decimal>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    pub status: String,
}

/// Public profile fields of an order's counterparties.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PartySummary {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: Option<String>,
    pub logo_url: Option<String>,
}

impl From<&user::Model> for PartySummary {
    fn from(u: &user::Model) -> Self {
        Self {
            id: u.id,
            name: u.name.clone(),
            email: u.email.clone(),
            phone: u.phone.clone(),
            address: u.address.clone(),
            logo_url: u.logo_url.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderItemDetail {
    #[serde(flatten)]
    pub item: order_item::Model,
    pub product: Option<product::Model>,
}

/// An order with its lines, ratings and both parties.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: order::Model,
    pub items: Vec<OrderItemDetail>,
    pub ratings: Vec<rating::Model>,
    pub store: Option<PartySummary>,
    pub supplier: Option<PartySummary>,
}

fn insufficient_stock(product: &product::Model) -> ServiceError {
    ServiceError::InsufficientStock(format!(
        "insufficient stock: only {} {} available",
        product.stock_quantity,
        product.unit_label()
    ))
}

fn require_store(actor: &AuthUser, message: &str) -> Result<(), ServiceError> {
    actor.require_role(&[Role::Store], message)?;
    actor.require_capability(Capability::ManageOrders)
}

fn txn_err(context: &'static str) -> impl Fn(sea_orm::DbErr) -> ServiceError {
    move |e| {
        error!(error = %e, "{}", context);
        ServiceError::DatabaseError(e)
    }
}

/// Takes `quantity` units off a product only if that many are on hand.
async fn take_stock(
    txn: &DatabaseTransaction,
    product: &product::Model,
    quantity: i32,
) -> Result<(), ServiceError> {
    let result = product::Entity::update_many()
        .col_expr(
            product::Column::StockQuantity,
            Expr::col(product::Column::StockQuantity).sub(quantity),
        )
        .col_expr(product::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(product::Column::Id.eq(product.id))
        .filter(product::Column::StockQuantity.gte(quantity))
        .exec(txn)
        .await?;
    if result.rows_affected == 0 {
        return Err(insufficient_stock(product));
    }
    Ok(())
}

async fn return_stock<C: ConnectionTrait>(
    conn: &C,
    product_id: i32,
    quantity: i32,
) -> Result<(), ServiceError> {
    product::Entity::update_many()
        .col_expr(
            product::Column::StockQuantity,
            Expr::col(product::Column::StockQuantity).add(quantity),
        )
        .col_expr(product::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(product::Column::Id.eq(product_id))
        .exec(conn)
        .await?;
    Ok(())
}

/// Re-derives the order total from its current lines and persists it.
async fn recompute_total(
    txn: &DatabaseTransaction,
    order: order::Model,
) -> Result<order::Model, ServiceError> {
    let items = order_item::Entity::find()
        .filter(order_item::Column::OrderId.eq(order.id))
        .all(txn)
        .await?;
    let total = order_item::sum_subtotals(&items) + order.delivery_fee;
    let mut active = order.into_active_model();
    active.total_amount = Set(total);
    active.updated_at = Set(Utc::now());
    Ok(active.update(txn).await?)
}

#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
    min_order_amount: Decimal,
}

impl OrderService {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Option<Arc<EventSender>>,
        min_order_amount: Decimal,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            min_order_amount,
        }
    }

    async fn emit(&self, event: Event) {
        if let Some(sender) = &self.event_sender {
            sender.send_or_log(event).await;
        }
    }

    /// Attaches items, products, ratings and parties to a batch of orders.
    pub async fn hydrate(&self, orders: Vec<order::Model>) -> Result<Vec<OrderDetail>, ServiceError> {
        if orders.is_empty() {
            return Ok(Vec::new());
        }
        let db = &*self.db_pool;
        let order_ids: Vec<i32> = orders.iter().map(|o| o.id).collect();

        let items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.is_in(order_ids.clone()))
            .order_by_asc(order_item::Column::Id)
            .all(db)
            .await?;
        let product_ids: Vec<i32> = items.iter().map(|i| i.product_id).collect();
        let products: HashMap<i32, product::Model> = product::Entity::find()
            .filter(product::Column::Id.is_in(product_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();
        let ratings = rating::Entity::find()
            .filter(rating::Column::OrderId.is_in(order_ids))
            .order_by_asc(rating::Column::Id)
            .all(db)
            .await?;
        let party_ids: Vec<i32> = orders
            .iter()
            .flat_map(|o| [o.store_id, o.supplier_id])
            .collect();
        let parties: HashMap<i32, user::Model> = user::Entity::find()
            .filter(user::Column::Id.is_in(party_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();

        let mut items_by_order: HashMap<i32, Vec<OrderItemDetail>> = HashMap::new();
        for item in items {
            let product = products.get(&item.product_id).cloned();
            items_by_order
                .entry(item.order_id)
                .or_default()
                .push(OrderItemDetail { item, product });
        }
        let mut ratings_by_order: HashMap<i32, Vec<rating::Model>> = HashMap::new();
        for r in ratings {
            ratings_by_order.entry(r.order_id).or_default().push(r);
        }

        Ok(orders
            .into_iter()
            .map(|order| OrderDetail {
                items: items_by_order.remove(&order.id).unwrap_or_default(),
                ratings: ratings_by_order.remove(&order.id).unwrap_or_default(),
                store: parties.get(&order.store_id).map(PartySummary::from),
                supplier: parties.get(&order.supplier_id).map(PartySummary::from),
                order,
            })
            .collect())
    }

    async fn detail(&self, order: order::Model) -> Result<OrderDetail, ServiceError> {
        self.hydrate(vec![order])
            .await?
            .pop()
            .ok_or_else(|| ServiceError::InternalError("order vanished while loading".into()))
    }

    /// Orders the caller is a party to, newest first. Drafts only show up
    /// when explicitly requested through `status`.
    #[instrument(skip(self, actor), fields(user_id = actor.user_id))]
    pub async fn list(
        &self,
        actor: &AuthUser,
        status: Option<String>,
    ) -> Result<Vec<OrderDetail>, ServiceError> {
        let mut select = order::Entity::find();
        select = match actor.role {
            Role::Store => select.filter(order::Column::StoreId.eq(actor.user_id)),
            Role::Supplier => select.filter(order::Column::SupplierId.eq(actor.user_id)),
            Role::Admin => select,
        };
        match status.as_deref().filter(|s| !s.is_empty()) {
            Some(s) => {
                let status = OrderStatus::from_str(s)
                    .map_err(|_| ServiceError::ValidationError("invalid status".into()))?;
                select = select.filter(order::Column::Status.eq(status));
            }
            None => select = select.filter(order::Column::Status.ne(OrderStatus::Draft)),
        }
        let orders = select
            .order_by_desc(order::Column::CreatedAt)
            .order_by_desc(order::Column::Id)
            .all(&*self.db_pool)
            .await?;
        self.hydrate(orders).await
    }

    pub async fn get(&self, actor: &AuthUser, order_id: i32) -> Result<OrderDetail, ServiceError> {
        let order = self.find_visible(actor, order_id).await?;
        self.detail(order).await
    }

    /// Loads an order the caller is a party to (admins see all).
    pub async fn find_visible(
        &self,
        actor: &AuthUser,
        order_id: i32,
    ) -> Result<order::Model, ServiceError> {
        let order = order::Entity::find_by_id(order_id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(ORDER_NOT_FOUND.into()))?;
        if actor.is_admin() || order.involves(actor.user_id) {
            Ok(order)
        } else {
            Err(ServiceError::NotFound(ORDER_NOT_FOUND.into()))
        }
    }

    /// The caller's draft for `supplier_id`, or their most recently touched draft.
    pub async fn get_draft(
        &self,
        actor: &AuthUser,
        supplier_id: Option<i32>,
    ) -> Result<OrderDetail, ServiceError> {
        actor.require_role(&[Role::Store], "only stores can view draft orders")?;
        let mut select = order::Entity::find()
            .filter(order::Column::StoreId.eq(actor.user_id))
            .filter(order::Column::Status.eq(OrderStatus::Draft));
        if let Some(supplier_id) = supplier_id {
            select = select.filter(order::Column::SupplierId.eq(supplier_id));
        }
        let order = select
            .order_by_desc(order::Column::UpdatedAt)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound("no draft order found".into()))?;
        self.detail(order).await
    }

    /// Returns the existing draft for (store, supplier) or opens a new one.
    /// The boolean is true when a new draft was created.
    #[instrument(skip(self, actor), fields(store_id = actor.user_id))]
    pub async fn create_draft(
        &self,
        actor: &AuthUser,
        supplier_id: i32,
    ) -> Result<(OrderDetail, bool), ServiceError> {
        require_store(actor, "only stores can create orders")?;
        let db = &*self.db_pool;

        let supplier = user::find_active()
            .filter(user::Column::Id.eq(supplier_id))
            .filter(user::Column::Role.eq(Role::Supplier))
            .one(db)
            .await?;
        if supplier.is_none() {
            return Err(ServiceError::NotFound("supplier not found".into()));
        }

        let key = order::draft_key(actor.user_id, supplier_id);
        let find_draft = || {
            order::Entity::find()
                .filter(order::Column::DraftKey.eq(key.clone()))
                .one(db)
        };
        if let Some(existing) = find_draft().await? {
            return Ok((self.detail(existing).await?, false));
        }

        let now = Utc::now();
        let inserted = order::ActiveModel {
            store_id: Set(actor.user_id),
            supplier_id: Set(supplier_id),
            status: Set(OrderStatus::Draft),
            total_amount: Set(Decimal::ZERO),
            payment_status: Set(PaymentStatus::Pending),
            delivery_fee: Set(Decimal::ZERO),
            distance: Set(Decimal::ZERO),
            draft_key: Set(Some(key.clone())),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await;

        match inserted {
            Ok(order) => {
                info!(order_id = order.id, supplier_id, "draft order created");
                Ok((self.detail(order).await?, true))
            }
            Err(e) if is_unique_violation(&e) => {
                let winner = find_draft()
                    .await?
                    .ok_or_else(|| ServiceError::Conflict("draft order already exists".into()))?;
                Ok((self.detail(winner).await?, false))
            }
            Err(e) => {
                error!(error = %e, "failed to create draft order");
                Err(ServiceError::DatabaseError(e))
            }
        }
    }

    #[instrument(skip(self, actor, request), fields(store_id = actor.user_id, product_id = request.product_id))]
    pub async fn add_item(
        &self,
        actor: &AuthUser,
        order_id: i32,
        request: AddItemRequest,
    ) -> Result<OrderDetail, ServiceError> {
        require_store(actor, "only stores can add items to orders")?;
        request.validate()?;

        let txn = self
            .db_pool
            .begin()
            .await
            .map_err(txn_err("failed to start add-item transaction"))?;

        let order = order::Entity::find_by_id(order_id)
            .filter(order::Column::StoreId.eq(actor.user_id))
            .filter(order::Column::Status.eq(OrderStatus::Draft))
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(DRAFT_NOT_FOUND.into()))?;

        let product = product::find_active()
            .filter(product::Column::Id.eq(request.product_id))
            .filter(product::Column::SupplierId.eq(order.supplier_id))
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(PRODUCT_NOT_FOUND.into()))?;

        let existing = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order.id))
            .filter(order_item::Column::ProductId.eq(product.id))
            .one(&txn)
            .await?;

        let already_in_order = existing.as_ref().map(|i| i.quantity).unwrap_or(0);
        match already_in_order.checked_add(request.quantity) {
            Some(requested) if requested <= product.stock_quantity => {}
            _ => return Err(insufficient_stock(&product)),
        }
        take_stock(&txn, &product, request.quantity).await?;

        let now = Utc::now();
        match existing {
            Some(item) => {
                let quantity = item.quantity + request.quantity;
                let subtotal = order_item::line_subtotal(quantity, item.unit_price);
                let mut active = item.into_active_model();
                active.quantity = Set(quantity);
                active.subtotal = Set(subtotal);
                active.updated_at = Set(now);
                active.update(&txn).await?;
            }
            None => {
                order_item::ActiveModel {
                    order_id: Set(order.id),
                    product_id: Set(product.id),
                    quantity: Set(request.quantity),
                    unit_price: Set(product.price),
                    subtotal: Set(order_item::line_subtotal(request.quantity, product.price)),
                    created_at: Set(now),
                    updated_at: Set(now),
                    ..Default::default()
                }
                .insert(&txn)
                .await?;
            }
        }

        let order = recompute_total(&txn, order).await?;
        txn.commit()
            .await
            .map_err(txn_err("failed to commit add-item transaction"))?;

        counter!("order_items_added_total", 1);
        info!(order_id, total = %order.total_amount, "item added to order");
        self.detail(order).await
    }

    /// Loads an item and its order inside `txn`, checking the caller owns the draft.
    async fn lock_item_for_change(
        &self,
        txn: &DatabaseTransaction,
        actor: &AuthUser,
        item_id: i32,
        forbidden: &str,
    ) -> Result<(order_item::Model, order::Model), ServiceError> {
        let item = order_item::Entity::find_by_id(item_id)
            .lock_exclusive()
            .one(txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(ITEM_NOT_FOUND.into()))?;
        let order = order::Entity::find_by_id(item.order_id)
            .lock_exclusive()
            .one(txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(ITEM_NOT_FOUND.into()))?;
        if order.store_id != actor.user_id || order.status != OrderStatus::Draft {
            return Err(ServiceError::Forbidden(forbidden.to_string()));
        }
        Ok((item, order))
    }

    #[instrument(skip(self, actor, request), fields(store_id = actor.user_id))]
    pub async fn update_item(
        &self,
        actor: &AuthUser,
        item_id: i32,
        request: UpdateItemRequest,
    ) -> Result<OrderDetail, ServiceError> {
        require_store(actor, "only stores can update order items")?;
        request.validate()?;

        let txn = self
            .db_pool
            .begin()
            .await
            .map_err(txn_err("failed to start update-item transaction"))?;
        let (item, order) = self
            .lock_item_for_change(&txn, actor, item_id, "cannot update this order item")
            .await?;

        let product = product::Entity::find_by_id(item.product_id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(PRODUCT_NOT_FOUND.into()))?;

        let diff = request.quantity - item.quantity;
        if diff > 0 {
            take_stock(&txn, &product, diff).await?;
        } else if diff < 0 {
            return_stock(&txn, product.id, -diff).await?;
        }

        let subtotal = order_item::line_subtotal(request.quantity, item.unit_price);
        let mut active = item.into_active_model();
        active.quantity = Set(request.quantity);
        active.subtotal = Set(subtotal);
        active.updated_at = Set(Utc::now());
        active.update(&txn).await?;

        let order = recompute_total(&txn, order).await?;
        txn.commit()
            .await
            .map_err(txn_err("failed to commit update-item transaction"))?;

        info!(item_id, quantity = request.quantity, "order item updated");
        self.detail(order).await
    }

    #[instrument(skip(self, actor), fields(store_id = actor.user_id))]
    pub async fn remove_item(&self, actor: &AuthUser, item_id: i32) -> Result<(), ServiceError> {
        require_store(actor, "only stores can remove order items")?;

        let txn = self
            .db_pool
            .begin()
            .await
            .map_err(txn_err("failed to start remove-item transaction"))?;
        let (item, order) = self
            .lock_item_for_change(&txn, actor, item_id, "cannot remove this order item")
            .await?;

        let product_exists = product::Entity::find_by_id(item.product_id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .is_some();
        if !product_exists {
            return Err(ServiceError::NotFound(PRODUCT_NOT_FOUND.into()));
        }
        return_stock(&txn, item.product_id, item.quantity).await?;
        order_item::Entity::delete_by_id(item.id).exec(&txn).await?;

        let order = recompute_total(&txn, order).await?;
        txn.commit()
            .await
            .map_err(txn_err("failed to commit remove-item transaction"))?;

        info!(item_id, order_id = order.id, total = %order.total_amount, "order item removed");
        Ok(())
    }

    /// Moves a draft to `preparing` after checking items, payment, delivery,
    /// the minimum amount and the shipping address, in that order.
    #[instrument(skip(self, actor, request), fields(store_id = actor.user_id))]
    pub async fn submit(
        &self,
        actor: &AuthUser,
        order_id: i32,
        request: SubmitOrderRequest,
    ) -> Result<OrderDetail, ServiceError> {
        require_store(actor, "only stores can submit orders")?;

        let txn = self
            .db_pool
            .begin()
            .await
            .map_err(txn_err("failed to start submit transaction"))?;

        let order = order::Entity::find_by_id(order_id)
            .filter(order::Column::StoreId.eq(actor.user_id))
            .filter(order::Column::Status.eq(OrderStatus::Draft))
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(DRAFT_NOT_FOUND.into()))?;

        let items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order.id))
            .all(&txn)
            .await?;
        if items.is_empty() {
            return Err(ServiceError::BadRequest(
                "cannot submit order with no items".into(),
            ));
        }

        let payment_method = PaymentMethod::from_str(request.payment_method.trim())
            .map_err(|_| ServiceError::BadRequest("invalid payment method".into()))?;
        let delivery_option = DeliveryOption::from_str(request.delivery_option.trim())
            .map_err(|_| ServiceError::BadRequest("invalid delivery option".into()))?;

        let subtotal = order_item::sum_subtotals(&items);
        if subtotal < self.min_order_amount {
            return Err(ServiceError::BadRequest(format!(
                "minimum order amount is ₱{:.2}. Current total: ₱{:.2}",
                self.min_order_amount, subtotal
            )));
        }

        let requested_address = request
            .shipping_address
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty());
        let shipping_address = match delivery_option {
            DeliveryOption::Deliver => {
                let address = match requested_address {
                    Some(a) => Some(a),
                    None => user::Entity::find_by_id(actor.user_id)
                        .one(&txn)
                        .await?
                        .and_then(|store| store.address)
                        .map(|a| a.trim().to_string())
                        .filter(|a| !a.is_empty()),
                };
                Some(address.ok_or_else(|| {
                    ServiceError::BadRequest("shipping address is required for delivery".into())
                })?)
            }
            DeliveryOption::Pickup => requested_address,
        };

        let delivery_fee = request.delivery_fee.unwrap_or(Decimal::ZERO).round_dp(2);
        let distance = request.distance.unwrap_or(Decimal::ZERO).round_dp(2);
        if delivery_fee < Decimal::ZERO || distance < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "delivery_fee and distance cannot be negative".into(),
            ));
        }

        let payment_status = match payment_method {
            PaymentMethod::CashOnDelivery => PaymentStatus::Paid,
            PaymentMethod::Gcash => PaymentStatus::Pending,
        };

        let mut active = order.into_active_model();
        active.status = Set(OrderStatus::Preparing);
        active.draft_key = Set(None);
        active.payment_method = Set(Some(payment_method));
        active.payment_status = Set(payment_status);
        active.payment_proof_url = Set(request.payment_proof_url.filter(|u| !u.trim().is_empty()));
        active.delivery_option = Set(Some(delivery_option));
        active.shipping_address = Set(shipping_address);
        active.delivery_fee = Set(delivery_fee);
        active.distance = Set(distance);
        active.total_amount = Set(subtotal + delivery_fee);
        active.notes = Set(request.notes);
        active.updated_at = Set(Utc::now());
        let order = active.update(&txn).await?;

        txn.commit()
            .await
            .map_err(txn_err("failed to commit submit transaction"))?;

        counter!("orders_submitted_total", 1);
        info!(order_id, total = %order.total_amount, "order submitted");
        self.emit(Event::OrderSubmitted { order_id }).await;
        self.detail(order).await
    }

    /// Applies a status change requested by the order's supplier or store.
    /// Cancelling returns every line's quantity to stock.
    #[instrument(skip(self, actor), fields(user_id = actor.user_id))]
    pub async fn update_status(
        &self,
        actor: &AuthUser,
        order_id: i32,
        status: &str,
    ) -> Result<OrderDetail, ServiceError> {
        actor.require_capability(Capability::ChangeStatus)?;
        let target = OrderStatus::from_str(status.trim())
            .ok()
            .filter(|s| *s != OrderStatus::Draft)
            .ok_or_else(|| ServiceError::ValidationError("invalid status".into()))?;

        let txn = self
            .db_pool
            .begin()
            .await
            .map_err(txn_err("failed to start status transaction"))?;

        let order = order::Entity::find_by_id(order_id)
            .filter(
                Condition::any()
                    .add(order::Column::StoreId.eq(actor.user_id))
                    .add(order::Column::SupplierId.eq(actor.user_id)),
            )
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(ORDER_NOT_FOUND.into()))?;
        if !actor.role.is_trading_party() {
            return Err(ServiceError::NotFound(ORDER_NOT_FOUND.into()));
        }

        let previous = order.status;
        previous
            .check_transition(target)
            .map_err(|e| ServiceError::BadRequest(e.to_string()))?;

        let mut restored = Vec::new();
        if target == OrderStatus::Cancelled {
            let items = order_item::Entity::find()
                .filter(order_item::Column::OrderId.eq(order.id))
                .all(&txn)
                .await?;
            for item in items {
                let Some(p) = product::Entity::find_by_id(item.product_id)
                    .lock_exclusive()
                    .one(&txn)
                    .await?
                else {
                    continue;
                };
                return_stock(&txn, p.id, item.quantity).await?;
                restored.push(
                    StockChange::new(
                        p.id,
                        p.stock_quantity,
                        p.stock_quantity + item.quantity,
                        ChangeType::OrderCancelled,
                    )
                    .by(actor)
                    .for_order(order.id),
                );
            }
        }

        let mut active = order.into_active_model();
        active.status = Set(target);
        if previous == OrderStatus::Draft {
            active.draft_key = Set(None);
        }
        active.updated_at = Set(Utc::now());
        let order = active.update(&txn).await?;

        txn.commit()
            .await
            .map_err(txn_err("failed to commit status transaction"))?;

        for change in restored {
            stock_history::record(&*self.db_pool, change).await;
        }

        info!(order_id, from = %previous, to = %target, "order status changed");
        self.emit(Event::OrderStatusChanged {
            order_id,
            old_status: previous,
            new_status: target,
        })
        .await;
        if target == OrderStatus::Delivered {
            self.emit(Event::OrderDelivered { order_id }).await;
        }
        self.detail(order).await
    }

    async fn supplier_order(&self, actor: &AuthUser, order_id: i32) -> Result<order::Model, ServiceError> {
        order::Entity::find_by_id(order_id)
            .filter(order::Column::SupplierId.eq(actor.user_id))
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(PAYMENT_ORDER_NOT_FOUND.into()))
    }

    async fn set_payment_status(
        &self,
        order: order::Model,
        status: PaymentStatus,
    ) -> Result<order::Model, ServiceError> {
        let mut active = order.into_active_model();
        active.payment_status = Set(status);
        active.updated_at = Set(Utc::now());
        Ok(active.update(&*self.db_pool).await?)
    }

    pub async fn mark_paid(&self, actor: &AuthUser, order_id: i32) -> Result<OrderDetail, ServiceError> {
        actor.require_role(&[Role::Supplier], "only suppliers can mark payment as paid")?;
        actor.require_capability(Capability::ChangeStatus)?;
        let order = self.supplier_order(actor, order_id).await?;
        if order.payment_method != Some(PaymentMethod::Gcash) {
            return Err(ServiceError::BadRequest(
                "payment confirmation is only applicable for GCash orders".into(),
            ));
        }
        if order.payment_status == PaymentStatus::Paid {
            return Err(ServiceError::BadRequest(
                "payment is already marked as paid".into(),
            ));
        }
        let order = self.set_payment_status(order, PaymentStatus::Paid).await?;
        info!(order_id, "payment marked as paid");
        self.emit(Event::PaymentConfirmed { order_id }).await;
        self.detail(order).await
    }

    pub async fn mark_pending(&self, actor: &AuthUser, order_id: i32) -> Result<OrderDetail, ServiceError> {
        actor.require_role(&[Role::Supplier], "only suppliers can revert payment")?;
        actor.require_capability(Capability::ChangeStatus)?;
        let order = self.supplier_order(actor, order_id).await?;
        if order.payment_method.is_none() {
            return Err(ServiceError::BadRequest(
                "payment revert is only applicable for GCash or cash on delivery orders".into(),
            ));
        }
        if order.payment_status == PaymentStatus::Pending {
            return Err(ServiceError::BadRequest("payment is already pending".into()));
        }
        let order = self.set_payment_status(order, PaymentStatus::Pending).await?;
        info!(order_id, "payment reverted to pending");
        self.detail(order).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn product(stock: i32, unit: Option<&str>) -> product::Model {
        let now = Utc::now();
        product::Model {
            id: 55,
            supplier_id: 3,
            name: "Rice".into(),
            description: None,
            sku: "RICE-1".into(),
            price: dec!(100),
            stock_quantity: stock,
            unit: unit.map(String::from),
            category: None,
            image_url: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[test]
    fn insufficient_stock_message_names_the_unit() {
        assert_eq!(
            insufficient_stock(&product(3, Some("kg"))).to_string(),
            "insufficient stock: only 3 kg available"
        );
        assert_eq!(
            insufficient_stock(&product(0, None)).to_string(),
            "insufficient stock: only 0 units available"
        );
    }

    #[test]
    fn party_summary_copies_public_fields() {
        let now = Utc::now();
        let u = user::Model {
            id: 7,
            email: "store@example.com".into(),
            password_hash: "secret".into(),
            name: "Corner Store".into(),
            phone: "0917".into(),
            role: Role::Store,
            admin_level: None,
            address: Some("Main St".into()),
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
        };
        let summary = PartySummary::from(&u);
        assert_eq!(summary.id, 7);
        assert_eq!(summary.address.as_deref(), Some("Main St"));
    }

    #[derive(Debug, Clone)]
    enum Op {
        Add(i32),
        Set(i32),
        Remove,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            prop_oneof![(1..8i32).prop_map(Op::Add), Just(Op::Add(i32::MAX))],
            (1..12i32).prop_map(Op::Set),
            Just(Op::Remove),
        ]
    }

    proptest! {
        // Mirrors the item workflow on a single line: stock plus the line's
        // quantity is conserved and the total always equals the line subtotal.
        #[test]
        fn stock_and_total_stay_consistent(ops in proptest::collection::vec(op(), 1..30)) {
            let initial = 20;
            let price = dec!(100);
            let mut stock = initial;
            let mut line: Option<i32> = None;

            for op in ops {
                match op {
                    Op::Add(q) => {
                        let already = line.unwrap_or(0);
                        let fits = already.checked_add(q).is_some_and(|r| r <= stock);
                        if fits && stock >= q {
                            stock -= q;
                            line = Some(already + q);
                        }
                    }
                    Op::Set(q) => {
                        if let Some(old) = line {
                            let diff = q - old;
                            if stock - diff >= 0 {
                                stock -= diff;
                                line = Some(q);
                            }
                        }
                    }
                    Op::Remove => {
                        if let Some(old) = line.take() {
                            stock += old;
                        }
                    }
                }
                prop_assert!(stock >= 0);
                prop_assert_eq!(stock + line.unwrap_or(0), initial);
                let total = line.map(|q| order_item::line_subtotal(q, price)).unwrap_or(Decimal::ZERO);
                prop_assert_eq!(total, Decimal::from(initial - stock) * price);
            }
        }
    }
}
