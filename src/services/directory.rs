//! Supplier and store listings with open-now evaluation.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    sea_query::{Expr, Func},
    ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::AuthUser,
    db::DbPool,
    entities::{
        product,
        user::{self, Role},
    },
    errors::ServiceError,
    services::{
        ratings::stats_by_rated,
        schedule::{is_open_at, marketplace_now, ScheduleService},
    },
};

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DirectoryQuery {
    /// Case-insensitive substring of the account name.
    pub search: Option<String>,
    /// `open` or `closed`.
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DirectoryEntry {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_count: Option<u64>,
    pub logo_url: Option<String>,
    pub banner_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_rating: Option<f64>,
    pub rating_count: u64,
    pub opening_time: Option<String>,
    pub closing_time: Option<String>,
    pub is_open: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

/// Open entries first, then by lowercase name.
pub fn directory_order(a: &DirectoryEntry, b: &DirectoryEntry) -> Ordering {
    b.is_open
        .cmp(&a.is_open)
        .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
}

#[derive(Clone)]
pub struct DirectoryService {
    db_pool: Arc<DbPool>,
    schedule: ScheduleService,
}

impl DirectoryService {
    pub fn new(db_pool: Arc<DbPool>, schedule: ScheduleService) -> Self {
        Self { db_pool, schedule }
    }

    pub async fn suppliers(
        &self,
        actor: &AuthUser,
        query: DirectoryQuery,
    ) -> Result<Vec<DirectoryEntry>, ServiceError> {
        actor.require_role(
            &[Role::Store, Role::Admin],
            "only stores and admins can view suppliers",
        )?;
        self.entries(Role::Supplier, query).await
    }

    pub async fn stores(
        &self,
        actor: &AuthUser,
        query: DirectoryQuery,
    ) -> Result<Vec<DirectoryEntry>, ServiceError> {
        actor.require_role(
            &[Role::Supplier, Role::Admin],
            "only suppliers and admins can view stores",
        )?;
        self.entries(Role::Store, query).await
    }

    async fn entries(
        &self,
        role: Role,
        query: DirectoryQuery,
    ) -> Result<Vec<DirectoryEntry>, ServiceError> {
        let db = &*self.db_pool;
        let status = query
            .status
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());

        let mut select = user::find_active().filter(user::Column::Role.eq(role));
        if let Some(search) = query.search.map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty()) {
            select = select.filter(
                Expr::expr(Func::lower(Expr::col((user::Entity, user::Column::Name))))
                    .like(format!("%{}%", search)),
            );
        }
        let accounts = select.order_by_asc(user::Column::Name).all(db).await?;
        let ids: Vec<i32> = accounts.iter().map(|a| a.id).collect();

        let local = marketplace_now(Utc::now());
        let exceptions = self.schedule.exceptions_on(&ids, local.date()).await?;
        let ratings = stats_by_rated(db, &ids).await?;
        let product_counts = if role == Role::Supplier {
            Some(self.product_counts(&ids).await?)
        } else {
            None
        };

        let mut entries: Vec<DirectoryEntry> = accounts
            .into_iter()
            .map(|account| {
                let is_open = is_open_at(&account, exceptions.get(&account.id), local);
                let rating = ratings.get(&account.id).copied();
                let product_count = product_counts
                    .as_ref()
                    .map(|counts| counts.get(&account.id).copied().unwrap_or(0));
                DirectoryEntry {
                    id: account.id,
                    name: account.name,
                    email: account.email,
                    phone: account.phone,
                    product_count,
                    logo_url: account.logo_url,
                    banner_url: account.banner_url,
                    average_rating: rating.map(|(avg, _)| avg),
                    rating_count: rating.map(|(_, count)| count).unwrap_or(0),
                    opening_time: account.opening_time,
                    closing_time: account.closing_time,
                    is_open,
                    latitude: account.latitude,
                    longitude: account.longitude,
                }
            })
            .filter(|entry| match status.as_deref() {
                Some("open") => entry.is_open,
                Some("closed") => !entry.is_open,
                _ => true,
            })
            .collect();
        entries.sort_by(directory_order);
        Ok(entries)
    }

    async fn product_counts(&self, supplier_ids: &[i32]) -> Result<HashMap<i32, u64>, ServiceError> {
        let rows: Vec<i32> = product::find_active()
            .select_only()
            .column(product::Column::SupplierId)
            .filter(product::Column::SupplierId.is_in(supplier_ids.iter().copied()))
            .into_tuple()
            .all(&*self.db_pool)
            .await?;
        let mut counts = HashMap::new();
        for supplier_id in rows {
            *counts.entry(supplier_id).or_insert(0u64) += 1;
        }
        Ok(counts)
    }

    /// Non-deleted products of one supplier.
    pub async fn supplier_products(
        &self,
        actor: &AuthUser,
        supplier_id: i32,
    ) -> Result<Vec<product::Model>, ServiceError> {
        actor.require_role(
            &[Role::Store, Role::Admin],
            "only stores and admins can view supplier products",
        )?;
        let db = &*self.db_pool;
        let exists = user::find_active()
            .filter(user::Column::Id.eq(supplier_id))
            .filter(user::Column::Role.eq(Role::Supplier))
            .one(db)
            .await?
            .is_some();
        if !exists {
            return Err(ServiceError::NotFound("supplier not found".into()));
        }
        Ok(product::find_active()
            .filter(product::Column::SupplierId.eq(supplier_id))
            .order_by_asc(product::Column::Name)
            .all(db)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, is_open: bool) -> DirectoryEntry {
        DirectoryEntry {
            id: 1,
            name: name.into(),
            email: String::new(),
            phone: String::new(),
            product_count: None,
            logo_url: None,
            banner_url: None,
            average_rating: None,
            rating_count: 0,
            opening_time: None,
            closing_time: None,
            is_open,
            latitude: None,
            longitude: None,
        }
    }

    #[test]
    fn open_accounts_sort_first() {
        let mut entries = vec![
            entry("zeta", true),
            entry("Alpha", false),
            entry("beta", true),
        ];
        entries.sort_by(directory_order);
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["beta", "zeta", "Alpha"]);
    }

    #[test]
    fn unrated_entries_omit_average() {
        let json = serde_json::to_value(entry("x", true)).unwrap();
        assert!(json.get("average_rating").is_none());
        assert_eq!(json["rating_count"], 0);
    }
}
