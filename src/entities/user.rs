use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Trading role of an account.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    #[sea_orm(string_value = "supplier")]
    Supplier,
    #[sea_orm(string_value = "store")]
    Store,
    #[sea_orm(string_value = "admin")]
    Admin,
}

impl Role {
    /// Suppliers and stores are the two trading parties.
    pub fn is_trading_party(self) -> bool {
        matches!(self, Role::Supplier | Role::Store)
    }
}

/// The `users` table.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub name: String,
    pub phone: String,
    pub role: Role,
    /// 1 = full, 2 = limited, 3 = read-only. Only meaningful for admins.
    pub admin_level: Option<i32>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub logo_url: Option<String>,
    pub banner_url: Option<String>,
    pub facebook: Option<String>,
    pub instagram: Option<String>,
    pub twitter: Option<String>,
    pub linkedin: Option<String>,
    pub youtube: Option<String>,
    pub tiktok: Option<String>,
    pub website: Option<String>,
    pub opening_time: Option<String>,
    pub closing_time: Option<String>,
    /// Comma separated weekday numbers, 0 = Sunday.
    pub closed_days_of_week: Option<String>,
    pub is_open: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Model {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::product::Entity")]
    Product,
    #[sea_orm(has_many = "super::employee::Entity")]
    Employee,
    #[sea_orm(has_many = "super::schedule_exception::Entity")]
    ScheduleException,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl Related<super::employee::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Employee.def()
    }
}

impl Related<super::schedule_exception::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ScheduleException.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Default scope: rows that are not soft-deleted.
pub fn find_active() -> Select<Entity> {
    Entity::find().filter(Column::DeletedAt.is_null())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn role_parses_lowercase_names() {
        assert_eq!(Role::from_str("supplier").unwrap(), Role::Supplier);
        assert_eq!(Role::from_str("store").unwrap(), Role::Store);
        assert!(Role::from_str("customer").is_err());
        assert_eq!(Role::Admin.to_string(), "admin");
    }

    #[test]
    fn only_suppliers_and_stores_trade() {
        assert!(Role::Supplier.is_trading_party());
        assert!(Role::Store.is_trading_party());
        assert!(!Role::Admin.is_trading_party());
    }
}
