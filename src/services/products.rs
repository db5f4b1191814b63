use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::{Expr, Func},
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, QuerySelect, Select, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    auth::{AuthUser, Capability},
    db::DbPool,
    entities::{product, stock_history::ChangeType, user, user::Role},
    errors::ServiceError,
    services::stock_history::{self, StockChange},
};

const SKU_TAKEN: &str = "SKU already exists";
const PRODUCT_NOT_FOUND: &str = "product not found";

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProductQuery {
    pub search: Option<String>,
    #[serde(default)]
    pub include_deleted: bool,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    pub description: Option<String>,
    #[validate(length(min = 1, message = "sku is required"))]
    pub sku: String,
    #[schema(value_type = f64)]
    pub price: Decimal,
    #[serde(default)]
    pub stock_quantity: i32,
    pub unit: Option<String>,
    pub category: Option<String>,
    pub image_url: Option<String>,
    /// Required when an admin creates a product for a supplier.
    pub supplier_id: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub sku: Option<String>,
    #[schema(value_type = Option<f64>)]
    pub price: Option<Decimal>,
    pub stock_quantity: Option<i32>,
    pub unit: Option<String>,
    pub category: Option<String>,
    pub image_url: Option<String>,
}

impl UpdateProductRequest {
    fn touches_more_than_stock(&self) -> bool {
        self.name.is_some()
            || self.description.is_some()
            || self.sku.is_some()
            || self.price.is_some()
            || self.unit.is_some()
            || self.category.is_some()
            || self.image_url.is_some()
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct BulkCreateProductsRequest {
    pub products: Vec<CreateProductRequest>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BulkCreateProductsResult {
    #[schema(value_type = Vec<Object>)]
    pub created: Vec<product::Model>,
    pub errors: Vec<String>,
}

fn require_inventory_access(actor: &AuthUser) -> Result<(), ServiceError> {
    if actor.has_capability(Capability::ManageInventory) {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(
            "employee lacks inventory permission".into(),
        ))
    }
}

fn name_contains(search: &str) -> sea_orm::sea_query::SimpleExpr {
    Expr::expr(Func::lower(Expr::col((product::Entity, product::Column::Name))))
        .like(format!("%{}%", search.trim().to_lowercase()))
}

/// Catalog management scoped by supplier ownership.
#[derive(Clone)]
pub struct ProductService {
    db_pool: Arc<DbPool>,
}

impl ProductService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Products the actor may mutate: suppliers their own, admins any.
    fn owned_scope(actor: &AuthUser, select: Select<product::Entity>) -> Result<Select<product::Entity>, ServiceError> {
        match actor.role {
            Role::Supplier => Ok(select.filter(product::Column::SupplierId.eq(actor.user_id))),
            Role::Admin => Ok(select),
            Role::Store => Err(ServiceError::Forbidden(
                "only suppliers and admins can manage products".into(),
            )),
        }
    }

    #[instrument(skip(self, actor, query), fields(user_id = actor.user_id))]
    pub async fn list(
        &self,
        actor: &AuthUser,
        query: ProductQuery,
    ) -> Result<Vec<product::Model>, ServiceError> {
        require_inventory_access(actor)?;

        let may_see_deleted = matches!(actor.role, Role::Admin | Role::Supplier);
        let mut select = if query.include_deleted && may_see_deleted {
            product::Entity::find()
        } else {
            product::find_active()
        };
        if actor.role == Role::Supplier {
            select = select.filter(product::Column::SupplierId.eq(actor.user_id));
        }
        if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
            select = select.filter(name_contains(search));
        }

        Ok(select
            .order_by_desc(product::Column::CreatedAt)
            .order_by_desc(product::Column::Id)
            .all(&*self.db_pool)
            .await?)
    }

    pub async fn get(&self, actor: &AuthUser, id: i32) -> Result<product::Model, ServiceError> {
        require_inventory_access(actor)?;
        let mut select = product::find_active().filter(product::Column::Id.eq(id));
        if actor.role == Role::Supplier {
            select = select.filter(product::Column::SupplierId.eq(actor.user_id));
        }
        select
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(PRODUCT_NOT_FOUND.into()))
    }

    async fn resolve_supplier(
        &self,
        actor: &AuthUser,
        requested: Option<i32>,
    ) -> Result<i32, ServiceError> {
        match actor.role {
            Role::Supplier => Ok(actor.user_id),
            Role::Admin => {
                let supplier_id = requested.ok_or_else(|| {
                    ServiceError::ValidationError(
                        "supplier_id is required when creating product as admin".into(),
                    )
                })?;
                let supplier = user::find_active()
                    .filter(user::Column::Id.eq(supplier_id))
                    .filter(user::Column::Role.eq(Role::Supplier))
                    .one(&*self.db_pool)
                    .await?;
                supplier
                    .map(|s| s.id)
                    .ok_or_else(|| ServiceError::ValidationError("invalid supplier_id".into()))
            }
            Role::Store => Err(ServiceError::Forbidden(
                "only suppliers and admins can manage products".into(),
            )),
        }
    }

    async fn sku_taken<C: ConnectionTrait>(
        conn: &C,
        sku: &str,
        except: Option<i32>,
    ) -> Result<bool, ServiceError> {
        let mut select = product::Entity::find().filter(product::Column::Sku.eq(sku));
        if let Some(id) = except {
            select = select.filter(product::Column::Id.ne(id));
        }
        Ok(select.one(conn).await?.is_some())
    }

    #[instrument(skip(self, actor, request), fields(user_id = actor.user_id, sku = %request.sku))]
    pub async fn create(
        &self,
        actor: &AuthUser,
        request: CreateProductRequest,
    ) -> Result<product::Model, ServiceError> {
        require_inventory_access(actor)?;
        let supplier_id = self.resolve_supplier(actor, request.supplier_id).await?;
        request.validate()?;
        if request.price <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "price must be greater than 0".into(),
            ));
        }
        if request.stock_quantity < 0 {
            return Err(ServiceError::ValidationError(
                "stock_quantity cannot be negative".into(),
            ));
        }
        let sku = request.sku.trim().to_string();
        if Self::sku_taken(&*self.db_pool, &sku, None).await? {
            return Err(ServiceError::Conflict(SKU_TAKEN.into()));
        }

        let db = &*self.db_pool;
        let now = Utc::now();
        let created = product::ActiveModel {
            supplier_id: Set(supplier_id),
            name: Set(request.name.trim().to_string()),
            description: Set(request.description),
            sku: Set(sku),
            price: Set(request.price.round_dp(2)),
            stock_quantity: Set(request.stock_quantity),
            unit: Set(request.unit),
            category: Set(request.category),
            image_url: Set(request.image_url),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
        .map_err(|e| {
            if !crate::errors::is_unique_violation(&e) {
                error!(error = %e, "failed to create product");
            }
            ServiceError::from_db_with_conflict(e, SKU_TAKEN)
        })?;

        if created.stock_quantity > 0 {
            stock_history::record(
                db,
                StockChange::new(created.id, 0, created.stock_quantity, ChangeType::InitialStock)
                    .by(actor),
            )
            .await;
        }

        info!(product_id = created.id, supplier_id, "product created");
        Ok(created)
    }

    /// Creates each product independently, collecting per-item failures.
    pub async fn bulk_create(
        &self,
        actor: &AuthUser,
        products: Vec<CreateProductRequest>,
    ) -> Result<BulkCreateProductsResult, ServiceError> {
        require_inventory_access(actor)?;
        if products.is_empty() {
            return Err(ServiceError::ValidationError("no products provided".into()));
        }

        let mut created = Vec::new();
        let mut errors = Vec::new();
        for (index, request) in products.into_iter().enumerate() {
            match self.create(actor, request).await {
                Ok(product) => created.push(product),
                Err(e @ ServiceError::Forbidden(_)) => return Err(e),
                Err(e) => errors.push(format!("Product {}: {}", index + 1, e.response_message())),
            }
        }
        Ok(BulkCreateProductsResult { created, errors })
    }

    #[instrument(skip(self, actor, request), fields(user_id = actor.user_id))]
    pub async fn update(
        &self,
        actor: &AuthUser,
        id: i32,
        request: UpdateProductRequest,
    ) -> Result<product::Model, ServiceError> {
        require_inventory_access(actor)?;
        if actor.is_employee()
            && (request.stock_quantity.is_none() || request.touches_more_than_stock())
        {
            return Err(ServiceError::ValidationError(
                "employees can only update stock quantity".into(),
            ));
        }

        // Stock is written as an absolute value; the row stays locked until commit
        let txn = self.db_pool.begin().await.map_err(|e| {
            error!(error = %e, "failed to start product update transaction");
            ServiceError::DatabaseError(e)
        })?;
        let existing = Self::owned_scope(actor, product::find_active().filter(product::Column::Id.eq(id)))?
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(PRODUCT_NOT_FOUND.into()))?;
        let previous_stock = existing.stock_quantity;
        let mut active = existing.into_active_model();

        if let Some(name) = request.name {
            if name.trim().is_empty() {
                return Err(ServiceError::ValidationError("name is required".into()));
            }
            active.name = Set(name.trim().to_string());
        }
        if let Some(sku) = request.sku {
            let sku = sku.trim().to_string();
            if sku.is_empty() {
                return Err(ServiceError::ValidationError("sku is required".into()));
            }
            if Self::sku_taken(&txn, &sku, Some(id)).await? {
                return Err(ServiceError::Conflict(SKU_TAKEN.into()));
            }
            active.sku = Set(sku);
        }
        if let Some(price) = request.price {
            if price <= Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "price must be greater than 0".into(),
                ));
            }
            active.price = Set(price.round_dp(2));
        }
        if let Some(stock) = request.stock_quantity {
            if stock < 0 {
                return Err(ServiceError::ValidationError(
                    "stock_quantity cannot be negative".into(),
                ));
            }
            active.stock_quantity = Set(stock);
        }
        if request.description.is_some() {
            active.description = Set(request.description);
        }
        if request.unit.is_some() {
            active.unit = Set(request.unit);
        }
        if request.category.is_some() {
            active.category = Set(request.category);
        }
        if request.image_url.is_some() {
            active.image_url = Set(request.image_url);
        }
        active.updated_at = Set(Utc::now());

        let updated = active
            .update(&txn)
            .await
            .map_err(|e| ServiceError::from_db_with_conflict(e, SKU_TAKEN))?;
        txn.commit().await.map_err(|e| {
            error!(error = %e, "failed to commit product update");
            ServiceError::DatabaseError(e)
        })?;

        stock_history::record(
            &*self.db_pool,
            StockChange::new(
                updated.id,
                previous_stock,
                updated.stock_quantity,
                ChangeType::ManualAdjustment,
            )
            .by(actor),
        )
        .await;

        info!(product_id = id, "product updated");
        Ok(updated)
    }

    pub async fn delete(&self, actor: &AuthUser, id: i32) -> Result<(), ServiceError> {
        if actor.is_employee() {
            return Err(ServiceError::Forbidden(
                "employees cannot delete products".into(),
            ));
        }
        let db = &*self.db_pool;
        let existing = Self::owned_scope(actor, product::find_active().filter(product::Column::Id.eq(id)))?
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(PRODUCT_NOT_FOUND.into()))?;

        let now = Utc::now();
        let mut active = existing.into_active_model();
        active.deleted_at = Set(Some(now));
        active.updated_at = Set(now);
        active.update(db).await?;
        info!(product_id = id, "product soft-deleted");
        Ok(())
    }

    pub async fn restore(&self, actor: &AuthUser, id: i32) -> Result<product::Model, ServiceError> {
        require_inventory_access(actor)?;
        let db = &*self.db_pool;
        let existing = Self::owned_scope(
            actor,
            product::Entity::find()
                .filter(product::Column::Id.eq(id))
                .filter(product::Column::DeletedAt.is_not_null()),
        )?
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::NotFound(PRODUCT_NOT_FOUND.into()))?;

        let mut active = existing.into_active_model();
        active.deleted_at = Set(None);
        active.updated_at = Set(Utc::now());
        let restored = active.update(db).await?;
        info!(product_id = id, "product restored");
        Ok(restored)
    }

    /// Zeroes stock on all of the supplier's live products. Returns how many changed.
    #[instrument(skip(self, actor), fields(user_id = actor.user_id))]
    pub async fn reset_stocks(&self, actor: &AuthUser) -> Result<u64, ServiceError> {
        require_inventory_access(actor)?;
        if actor.role != Role::Supplier {
            return Err(ServiceError::Forbidden(
                "only suppliers can reset stocks".into(),
            ));
        }

        let db = &*self.db_pool;
        let affected = product::find_active()
            .filter(product::Column::SupplierId.eq(actor.user_id))
            .filter(product::Column::StockQuantity.ne(0))
            .all(db)
            .await?;
        if affected.is_empty() {
            return Ok(0);
        }

        for p in &affected {
            stock_history::record(
                db,
                StockChange::new(p.id, p.stock_quantity, 0, ChangeType::StockReset).by(actor),
            )
            .await;
        }

        let ids: Vec<i32> = affected.iter().map(|p| p.id).collect();
        let result = product::Entity::update_many()
            .col_expr(product::Column::StockQuantity, Expr::value(0))
            .col_expr(product::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(product::Column::Id.is_in(ids))
            .exec(db)
            .await
            .map_err(|e| {
                error!(error = %e, "failed to reset stocks");
                ServiceError::DatabaseError(e)
            })?;

        info!(updated = result.rows_affected, "stocks reset");
        Ok(result.rows_affected)
    }
}
