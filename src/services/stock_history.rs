use chrono::Utc;
use metrics::counter;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::AuthUser,
    db::DbPool,
    entities::{product, stock_history, stock_history::ChangeType, user::Role},
    errors::ServiceError,
};

pub const DEFAULT_HISTORY_LIMIT: u64 = 100;
pub const MAX_HISTORY_LIMIT: u64 = 1000;

/// A net change to a product's stock level.
#[derive(Debug, Clone)]
pub struct StockChange {
    pub product_id: i32,
    pub previous_stock: i32,
    pub new_stock: i32,
    pub change_type: ChangeType,
    pub order_id: Option<i32>,
    pub user_id: Option<i32>,
    pub employee_id: Option<i32>,
    pub notes: Option<String>,
}

impl StockChange {
    pub fn new(product_id: i32, previous_stock: i32, new_stock: i32, change_type: ChangeType) -> Self {
        Self {
            product_id,
            previous_stock,
            new_stock,
            change_type,
            order_id: None,
            user_id: None,
            employee_id: None,
            notes: None,
        }
    }

    /// Attributes the change to the caller (owner or employee).
    pub fn by(mut self, actor: &AuthUser) -> Self {
        self.user_id = Some(actor.user_id);
        self.employee_id = actor.employee_id();
        self
    }

    pub fn for_order(mut self, order_id: i32) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn delta(&self) -> i32 {
        self.new_stock - self.previous_stock
    }
}

/// Appends a ledger row. Zero deltas are skipped and failures are only
/// logged and counted; the stock mutation itself stands either way.
pub async fn record<C: ConnectionTrait>(conn: &C, change: StockChange) {
    if change.delta() == 0 {
        return;
    }
    let entry = stock_history::ActiveModel {
        product_id: Set(change.product_id),
        previous_stock: Set(change.previous_stock),
        new_stock: Set(change.new_stock),
        change_amount: Set(change.delta()),
        change_type: Set(change.change_type),
        order_id: Set(change.order_id),
        user_id: Set(change.user_id),
        employee_id: Set(change.employee_id),
        notes: Set(change.notes.clone()),
        created_at: Set(Utc::now()),
        ..Default::default()
    };
    match entry.insert(conn).await {
        Ok(row) => debug!(history_id = row.id, product_id = change.product_id, "stock history recorded"),
        Err(e) => {
            counter!("stock_history_write_failures_total", 1);
            warn!(error = %e, product_id = change.product_id, change_type = %change.change_type, "failed to record stock history");
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StockHistoryQuery {
    pub product_id: Option<i32>,
    pub change_type: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StockHistoryPage {
    #[schema(value_type = Vec<Object>)]
    pub history: Vec<stock_history::Model>,
    pub total: u64,
    pub limit: u64,
    pub offset: u64,
}

#[derive(Clone)]
pub struct StockHistoryService {
    db_pool: Arc<DbPool>,
}

impl StockHistoryService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Lists ledger rows visible to `viewer`.
    #[instrument(skip(self, viewer), fields(user_id = viewer.user_id))]
    pub async fn list(
        &self,
        viewer: &AuthUser,
        query: StockHistoryQuery,
    ) -> Result<StockHistoryPage, ServiceError> {
        let db = &*self.db_pool;
        let mut select = stock_history::Entity::find();

        match viewer.role {
            Role::Admin => {}
            Role::Supplier => {
                if let Some(product_id) = query.product_id {
                    let owned = product::Entity::find_by_id(product_id)
                        .filter(product::Column::SupplierId.eq(viewer.user_id))
                        .one(db)
                        .await?;
                    if owned.is_none() {
                        return Err(ServiceError::Forbidden("access denied".into()));
                    }
                } else {
                    let owned_ids: Vec<i32> = product::Entity::find()
                        .select_only()
                        .column(product::Column::Id)
                        .filter(product::Column::SupplierId.eq(viewer.user_id))
                        .into_tuple()
                        .all(db)
                        .await?;
                    select = select.filter(stock_history::Column::ProductId.is_in(owned_ids));
                }
            }
            Role::Store => return Err(ServiceError::Forbidden("access denied".into())),
        }

        if let Some(product_id) = query.product_id {
            select = select.filter(stock_history::Column::ProductId.eq(product_id));
        }
        if let Some(change_type) = query.change_type.as_deref().filter(|s| !s.is_empty()) {
            let change_type: ChangeType = change_type
                .parse()
                .map_err(|_| ServiceError::ValidationError("invalid change_type".into()))?;
            select = select.filter(stock_history::Column::ChangeType.eq(change_type));
        }

        let limit = query
            .limit
            .filter(|l| *l > 0)
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
            .min(MAX_HISTORY_LIMIT);
        let offset = query.offset.unwrap_or(0);

        let total = select.clone().count(db).await?;
        let history = select
            .order_by_desc(stock_history::Column::CreatedAt)
            .order_by_desc(stock_history::Column::Id)
            .limit(limit)
            .offset(offset)
            .all(db)
            .await?;

        Ok(StockHistoryPage {
            history,
            total,
            limit,
            offset,
        })
    }

    /// History of one product, scoped like [`Self::list`].
    pub async fn for_product(
        &self,
        viewer: &AuthUser,
        product_id: i32,
        limit: Option<u64>,
        offset: Option<u64>,
    ) -> Result<StockHistoryPage, ServiceError> {
        let mut select = product::Entity::find_by_id(product_id);
        if viewer.role == Role::Supplier {
            select = select.filter(product::Column::SupplierId.eq(viewer.user_id));
        } else if viewer.role == Role::Store {
            return Err(ServiceError::Forbidden("access denied".into()));
        }
        if select.one(&*self.db_pool).await?.is_none() {
            return Err(ServiceError::NotFound("product not found".into()));
        }
        self.list(
            viewer,
            StockHistoryQuery {
                product_id: Some(product_id),
                change_type: None,
                limit,
                offset,
            },
        )
        .await
    }
}
