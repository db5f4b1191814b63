use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    auth::{AuthUser, Capability, ADMIN_LEVEL_FULL},
    db::DbPool,
    entities::{
        order::{self, OrderStatus},
        rating,
        user::{self, Role},
    },
    errors::ServiceError,
};

const ALREADY_RATED: &str = "you have already rated this order";

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateRatingRequest {
    #[validate(range(min = 1, max = 5, message = "rating must be between 1 and 5"))]
    pub rating: i32,
    pub comment: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MyRatings {
    #[schema(value_type = Vec<Object>)]
    pub ratings: Vec<rating::Model>,
    pub average_rating: Option<f64>,
    pub rating_count: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SupplierRatingSummary {
    pub supplier_id: i32,
    pub supplier_name: String,
    pub average_rating: f64,
    pub rating_count: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StoreRatingSummary {
    pub store_id: i32,
    pub store_name: String,
    pub average_rating: f64,
    pub rating_count: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderRatingSummary {
    pub order_id: i32,
    pub store_name: String,
    pub supplier_name: String,
    pub rating_count: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RatingsSummary {
    pub suppliers: Vec<SupplierRatingSummary>,
    pub stores: Vec<StoreRatingSummary>,
    pub orders_with_ratings: Vec<OrderRatingSummary>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RatedOrders {
    pub order_ids: Vec<i32>,
}

/// Mean of a set of 1..5 scores, `None` when empty.
pub fn average(scores: &[i32]) -> Option<f64> {
    if scores.is_empty() {
        None
    } else {
        Some(scores.iter().map(|s| f64::from(*s)).sum::<f64>() / scores.len() as f64)
    }
}

/// (average, count) per rated account.
pub async fn stats_by_rated(
    db: &DbPool,
    rated_ids: &[i32],
) -> Result<HashMap<i32, (f64, u64)>, ServiceError> {
    let rows = rating::Entity::find()
        .filter(rating::Column::RatedId.is_in(rated_ids.to_vec()))
        .all(db)
        .await?;
    let mut scores: HashMap<i32, Vec<i32>> = HashMap::new();
    for r in rows {
        scores.entry(r.rated_id).or_default().push(r.rating);
    }
    Ok(scores
        .into_iter()
        .filter_map(|(id, s)| average(&s).map(|avg| (id, (avg, s.len() as u64))))
        .collect())
}

#[derive(Clone)]
pub struct RatingService {
    db_pool: Arc<DbPool>,
}

impl RatingService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Stores rate the supplier of a delivered order and suppliers rate the store.
    #[instrument(skip(self, actor, request), fields(user_id = actor.user_id))]
    pub async fn create(
        &self,
        actor: &AuthUser,
        order_id: i32,
        request: CreateRatingRequest,
    ) -> Result<rating::Model, ServiceError> {
        let db = &*self.db_pool;
        let order = order::Entity::find_by_id(order_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("order not found".into()))?;

        let rated_id = match actor.role {
            Role::Store if order.store_id == actor.user_id => order.supplier_id,
            Role::Supplier if order.supplier_id == actor.user_id => order.store_id,
            _ => return Err(ServiceError::Forbidden("access denied".into())),
        };
        actor.require_capability(Capability::Rate)?;
        if order.status != OrderStatus::Delivered {
            return Err(ServiceError::BadRequest(
                "can only rate delivered orders".into(),
            ));
        }
        request.validate()?;

        let existing = rating::Entity::find()
            .filter(rating::Column::OrderId.eq(order.id))
            .filter(rating::Column::RaterId.eq(actor.user_id))
            .one(db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(ALREADY_RATED.into()));
        }

        let now = Utc::now();
        let saved = rating::ActiveModel {
            order_id: Set(order.id),
            rater_id: Set(actor.user_id),
            rated_id: Set(rated_id),
            rating: Set(request.rating),
            comment: Set(request.comment.filter(|c| !c.trim().is_empty())),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
        .map_err(|e| ServiceError::from_db_with_conflict(e, ALREADY_RATED))?;

        info!(order_id, rated_id, rating = saved.rating, "order rated");
        Ok(saved)
    }

    pub async fn mine(&self, actor: &AuthUser) -> Result<MyRatings, ServiceError> {
        let ratings = rating::Entity::find()
            .filter(rating::Column::RatedId.eq(actor.user_id))
            .order_by_desc(rating::Column::CreatedAt)
            .order_by_desc(rating::Column::Id)
            .all(&*self.db_pool)
            .await?;
        let scores: Vec<i32> = ratings.iter().map(|r| r.rating).collect();
        Ok(MyRatings {
            average_rating: average(&scores),
            rating_count: scores.len() as u64,
            ratings,
        })
    }

    /// Per-supplier, per-store and per-order aggregates. Admin level 1 only.
    pub async fn summary(&self, actor: &AuthUser) -> Result<RatingsSummary, ServiceError> {
        actor.require_admin_level(ADMIN_LEVEL_FULL)?;
        let db = &*self.db_pool;

        let ratings = rating::Entity::find().all(db).await?;
        let order_ids: BTreeSet<i32> = ratings.iter().map(|r| r.order_id).collect();
        let orders: HashMap<i32, order::Model> = order::Entity::find()
            .filter(order::Column::Id.is_in(order_ids.iter().copied()))
            .all(db)
            .await?
            .into_iter()
            .map(|o| (o.id, o))
            .collect();
        let mut user_ids: BTreeSet<i32> = ratings.iter().map(|r| r.rated_id).collect();
        user_ids.extend(orders.values().flat_map(|o| [o.store_id, o.supplier_id]));
        let users: HashMap<i32, user::Model> = user::Entity::find()
            .filter(user::Column::Id.is_in(user_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();

        let mut by_rated: BTreeMap<i32, Vec<i32>> = BTreeMap::new();
        let mut by_order: BTreeMap<i32, u64> = BTreeMap::new();
        for r in &ratings {
            by_rated.entry(r.rated_id).or_default().push(r.rating);
            *by_order.entry(r.order_id).or_default() += 1;
        }

        let mut suppliers = Vec::new();
        let mut stores = Vec::new();
        for (rated_id, scores) in by_rated {
            let (Some(account), Some(avg)) = (users.get(&rated_id), average(&scores)) else {
                continue;
            };
            let count = scores.len() as u64;
            match account.role {
                Role::Supplier => suppliers.push(SupplierRatingSummary {
                    supplier_id: rated_id,
                    supplier_name: account.name.clone(),
                    average_rating: avg,
                    rating_count: count,
                }),
                Role::Store => stores.push(StoreRatingSummary {
                    store_id: rated_id,
                    store_name: account.name.clone(),
                    average_rating: avg,
                    rating_count: count,
                }),
                Role::Admin => {}
            }
        }

        let name_of = |id: i32| users.get(&id).map(|u| u.name.clone()).unwrap_or_default();
        let orders_with_ratings = by_order
            .into_iter()
            .filter_map(|(order_id, count)| {
                orders.get(&order_id).map(|o| OrderRatingSummary {
                    order_id,
                    store_name: name_of(o.store_id),
                    supplier_name: name_of(o.supplier_id),
                    rating_count: count,
                })
            })
            .collect();

        Ok(RatingsSummary {
            suppliers,
            stores,
            orders_with_ratings,
        })
    }

    pub async fn rated_orders(&self, actor: &AuthUser) -> Result<RatedOrders, ServiceError> {
        actor.require_admin_level(ADMIN_LEVEL_FULL)?;
        let order_ids: BTreeSet<i32> = rating::Entity::find()
            .all(&*self.db_pool)
            .await?
            .into_iter()
            .map(|r| r.order_id)
            .collect();
        Ok(RatedOrders {
            order_ids: order_ids.into_iter().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_of_scores() {
        assert_eq!(average(&[]), None);
        assert_eq!(average(&[5]), Some(5.0));
        assert_eq!(average(&[4, 5]), Some(4.5));
    }

    #[test]
    fn rating_range_is_validated() {
        let bad = CreateRatingRequest {
            rating: 6,
            comment: None,
        };
        let err: ServiceError = bad.validate().unwrap_err().into();
        assert_eq!(err.to_string(), "rating must be between 1 and 5");
        assert!(CreateRatingRequest {
            rating: 1,
            comment: None
        }
        .validate()
        .is_ok());
    }
}
