use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect};
use serde::Serialize;
use tracing::instrument;

use crate::{
    auth::{AuthUser, ADMIN_LEVEL_READ_ONLY},
    db::DbPool,
    entities::{
        order::{self, OrderStatus},
        product,
        user::{self, Role},
    },
    errors::ServiceError,
    services::orders::{OrderDetail, OrderService},
};

pub const RECENT_WINDOW_DAYS: i64 = 30;
pub const DASHBOARD_RECENT_ORDERS: u64 = 100;

/// A product as seen from the buying store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PurchasedProduct {
    pub product_id: i32,
    pub product_name: String,
    pub quantity: i64,
    pub total_spent: Decimal,
}

/// A product as seen from the selling supplier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogProduct {
    pub product_id: i32,
    pub product_name: String,
    pub price: Decimal,
    pub stock: i32,
    pub unit: Option<String>,
    pub category: Option<String>,
    pub sku: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ProductSummary {
    Purchased(PurchasedProduct),
    Catalog(CatalogProduct),
}

#[derive(Debug, Serialize)]
pub struct AccountAnalytics {
    pub total_orders: u64,
    pub total_earnings: Decimal,
    /// Units bought (stores) or units in stock (suppliers).
    pub total_products_bought: i64,
    pub orders: Vec<OrderDetail>,
    pub products_bought: Vec<ProductSummary>,
    pub recent_orders: Vec<OrderDetail>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyStat {
    pub date: String,
    pub orders: u64,
    pub earnings: Decimal,
}

#[derive(Debug, Serialize)]
pub struct DashboardAnalytics {
    pub total_users: u64,
    pub total_suppliers: u64,
    pub total_stores: u64,
    pub total_orders: u64,
    pub total_earnings: Decimal,
    pub recent_orders: Vec<OrderDetail>,
    pub daily_stats: Vec<DailyStat>,
}

/// Aggregates a store's order lines per product.
pub fn purchased_products(orders: &[OrderDetail]) -> (i64, Vec<PurchasedProduct>) {
    let mut by_product: BTreeMap<i32, PurchasedProduct> = BTreeMap::new();
    let mut units = 0i64;
    for line in orders.iter().flat_map(|o| o.items.iter()) {
        units += i64::from(line.item.quantity);
        let entry = by_product
            .entry(line.item.product_id)
            .or_insert_with(|| PurchasedProduct {
                product_id: line.item.product_id,
                product_name: line.product.as_ref().map(|p| p.name.clone()).unwrap_or_default(),
                quantity: 0,
                total_spent: Decimal::ZERO,
            });
        entry.quantity += i64::from(line.item.quantity);
        entry.total_spent += line.item.subtotal;
    }
    (units, by_product.into_values().collect())
}

/// One bucket per day for the `days` days ending on `today`, oldest first.
pub fn daily_stats(
    orders: &[(DateTime<Utc>, Decimal)],
    today: NaiveDate,
    days: i64,
) -> Vec<DailyStat> {
    let first = today - Duration::days(days - 1);
    let mut buckets: BTreeMap<NaiveDate, (u64, Decimal)> = (0..days)
        .map(|i| (first + Duration::days(i), (0, Decimal::ZERO)))
        .collect();
    for (created_at, total) in orders {
        if let Some(bucket) = buckets.get_mut(&created_at.date_naive()) {
            bucket.0 += 1;
            bucket.1 += *total;
        }
    }
    buckets
        .into_iter()
        .map(|(date, (orders, earnings))| DailyStat {
            date: date.format("%Y-%m-%d").to_string(),
            orders,
            earnings,
        })
        .collect()
}

#[derive(Clone)]
pub struct AnalyticsService {
    db_pool: Arc<DbPool>,
    orders: OrderService,
}

impl AnalyticsService {
    pub fn new(db_pool: Arc<DbPool>, orders: OrderService) -> Self {
        Self { db_pool, orders }
    }

    #[instrument(skip(self, actor), fields(user_id = actor.user_id))]
    pub async fn for_me(&self, actor: &AuthUser) -> Result<AccountAnalytics, ServiceError> {
        if !actor.role.is_trading_party() {
            return Err(ServiceError::Forbidden(
                "analytics only available for stores and suppliers".into(),
            ));
        }
        let account = user::Entity::find_by_id(actor.user_id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound("user not found".into()))?;
        self.for_account(&account).await
    }

    pub async fn for_user(&self, actor: &AuthUser, user_id: i32) -> Result<AccountAnalytics, ServiceError> {
        actor.require_admin_level(ADMIN_LEVEL_READ_ONLY)?;
        let account = user::Entity::find_by_id(user_id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound("user not found".into()))?;
        if !account.role.is_trading_party() {
            return Err(ServiceError::BadRequest(
                "analytics only available for stores and suppliers".into(),
            ));
        }
        self.for_account(&account).await
    }

    async fn for_account(&self, account: &user::Model) -> Result<AccountAnalytics, ServiceError> {
        let db = &*self.db_pool;
        let party_column = match account.role {
            Role::Store => order::Column::StoreId,
            _ => order::Column::SupplierId,
        };
        let rows = order::Entity::find()
            .filter(party_column.eq(account.id))
            .filter(order::Column::Status.ne(OrderStatus::Draft))
            .order_by_desc(order::Column::CreatedAt)
            .order_by_desc(order::Column::Id)
            .all(db)
            .await?;
        let total_earnings = rows.iter().map(|o| o.total_amount).sum();
        let orders = self.orders.hydrate(rows).await?;

        let cutoff = Utc::now() - Duration::days(RECENT_WINDOW_DAYS);
        let recent_orders: Vec<OrderDetail> = orders
            .iter()
            .filter(|o| o.order.created_at >= cutoff)
            .cloned()
            .collect();

        let (total_products_bought, products_bought) = match account.role {
            Role::Store => {
                let (units, products) = purchased_products(&orders);
                (units, products.into_iter().map(ProductSummary::Purchased).collect())
            }
            _ => {
                let catalog = product::Entity::find()
                    .filter(product::Column::SupplierId.eq(account.id))
                    .order_by_asc(product::Column::Id)
                    .all(db)
                    .await?;
                let stock = catalog.iter().map(|p| i64::from(p.stock_quantity)).sum();
                let products = catalog
                    .into_iter()
                    .map(|p| {
                        ProductSummary::Catalog(CatalogProduct {
                            product_id: p.id,
                            product_name: p.name,
                            price: p.price,
                            stock: p.stock_quantity,
                            unit: p.unit,
                            category: p.category,
                            sku: p.sku,
                        })
                    })
                    .collect();
                (stock, products)
            }
        };

        Ok(AccountAnalytics {
            total_orders: orders.len() as u64,
            total_earnings,
            total_products_bought,
            orders,
            products_bought,
            recent_orders,
        })
    }

    #[instrument(skip(self, actor), fields(user_id = actor.user_id))]
    pub async fn dashboard(&self, actor: &AuthUser) -> Result<DashboardAnalytics, ServiceError> {
        actor.require_admin_level(ADMIN_LEVEL_READ_ONLY)?;
        let db = &*self.db_pool;

        let total_users = user::Entity::find().count(db).await?;
        let total_suppliers = user::Entity::find()
            .filter(user::Column::Role.eq(Role::Supplier))
            .count(db)
            .await?;
        let total_stores = user::Entity::find()
            .filter(user::Column::Role.eq(Role::Store))
            .count(db)
            .await?;

        let submitted = order::Entity::find().filter(order::Column::Status.ne(OrderStatus::Draft));
        let totals: Vec<(DateTime<Utc>, Decimal)> = submitted
            .clone()
            .all(db)
            .await?
            .into_iter()
            .map(|o| (o.created_at, o.total_amount))
            .collect();
        let total_earnings = totals.iter().map(|(_, t)| *t).sum();

        let recent = submitted
            .order_by_desc(order::Column::CreatedAt)
            .order_by_desc(order::Column::Id)
            .limit(DASHBOARD_RECENT_ORDERS)
            .all(db)
            .await?;

        Ok(DashboardAnalytics {
            total_users,
            total_suppliers,
            total_stores,
            total_orders: totals.len() as u64,
            total_earnings,
            recent_orders: self.orders.hydrate(recent).await?,
            daily_stats: daily_stats(&totals, Utc::now().date_naive(), RECENT_WINDOW_DAYS),
        })
    }
}
