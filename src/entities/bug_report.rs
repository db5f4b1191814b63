use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
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
pub enum BugStatus {
    #[sea_orm(string_value = "open")]
    Open,
    #[sea_orm(string_value = "investigating")]
    Investigating,
    #[sea_orm(string_value = "fixed")]
    Fixed,
    #[sea_orm(string_value = "resolved")]
    Resolved,
    #[sea_orm(string_value = "closed")]
    Closed,
}

impl BugStatus {
    /// Statuses that record who resolved the report and when.
    pub fn is_resolution(self) -> bool {
        matches!(self, BugStatus::Fixed | BugStatus::Resolved | BugStatus::Closed)
    }
}

/// The `bug_reports` table.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bug_reports")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: Option<i32>,
    pub platform: String,
    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub error_type: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub stack_trace: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub device_info: Option<String>,
    pub app_version: Option<String>,
    pub os_version: Option<String>,
    pub status: BugStatus,
    pub resolved_by: Option<i32>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
