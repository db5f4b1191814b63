//! Opening hours and per-date schedule exceptions.
//!
//! All schedule evaluation happens in the marketplace's fixed UTC+8 zone.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::ToSchema;

use crate::{
    db::DbPool,
    entities::{schedule_exception, user},
    errors::{is_unique_violation, ServiceError},
};

pub const MARKETPLACE_UTC_OFFSET_HOURS: i64 = 8;

const DATE_FORMAT_ERROR: &str = "invalid date format. Use YYYY-MM-DD";
const DUPLICATE_EXCEPTION: &str = "schedule exception already exists for this date";

/// Wall-clock time in the marketplace zone.
pub fn marketplace_now(now: DateTime<Utc>) -> NaiveDateTime {
    now.naive_utc() + Duration::hours(MARKETPLACE_UTC_OFFSET_HOURS)
}

/// Parses `HH:MM`; blank or malformed values yield `None`.
pub fn parse_hhmm(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    NaiveTime::parse_from_str(value, "%H:%M").ok()
}

pub fn parse_date(value: &str) -> Result<NaiveDate, ServiceError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| ServiceError::ValidationError(DATE_FORMAT_ERROR.into()))
}

/// True when `weekday` (0 = Sunday) appears in the comma separated list.
/// Unparseable entries are ignored.
pub fn is_closed_on(closed_days: Option<&str>, weekday: u32) -> bool {
    closed_days
        .unwrap_or_default()
        .split(',')
        .filter_map(|part| part.trim().parse::<u32>().ok())
        .any(|day| day == weekday)
}

/// Whether `at` falls in the `[open, close)` window. A close at or before the
/// open wraps past midnight, so the tail of yesterday's window counts too.
/// `None` when either bound is missing or malformed.
pub fn within_hours(opening: Option<&str>, closing: Option<&str>, at: NaiveTime) -> Option<bool> {
    let open = parse_hhmm(opening?)?;
    let close = parse_hhmm(closing?)?;
    Some(if close > open {
        open <= at && at < close
    } else {
        at >= open || at < close
    })
}

/// Decides whether an account is open at local time `local`.
///
/// A schedule exception for that date wins over everything else. Without
/// one, listed closed weekdays close the account, then the regular hours
/// decide, then the manual `is_open` flag.
pub fn is_open_at(
    account: &user::Model,
    exception: Option<&schedule_exception::Model>,
    local: NaiveDateTime,
) -> bool {
    let regular = || {
        within_hours(
            account.opening_time.as_deref(),
            account.closing_time.as_deref(),
            local.time(),
        )
        .unwrap_or(account.is_open)
    };

    if let Some(ex) = exception {
        if ex.is_closed {
            return false;
        }
        return within_hours(
            ex.opening_time.as_deref(),
            ex.closing_time.as_deref(),
            local.time(),
        )
        .unwrap_or_else(regular);
    }

    if is_closed_on(
        account.closed_days_of_week.as_deref(),
        local.weekday().num_days_from_sunday(),
    ) {
        return false;
    }
    regular()
}

pub fn validate_optional_time(value: Option<&str>, field: &str) -> Result<(), ServiceError> {
    match value {
        Some(v) if !v.trim().is_empty() && parse_hhmm(v).is_none() => Err(
            ServiceError::ValidationError(format!("{} must be in HH:MM format", field)),
        ),
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateScheduleExceptionRequest {
    pub date: String,
    #[serde(default)]
    pub is_closed: bool,
    pub opening_time: Option<String>,
    pub closing_time: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct BulkScheduleExceptionRequest {
    pub dates: Vec<String>,
    #[serde(default)]
    pub is_closed: bool,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateScheduleExceptionRequest {
    pub is_closed: Option<bool>,
    pub opening_time: Option<String>,
    pub closing_time: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BulkCreateResult {
    pub created: usize,
    #[schema(value_type = Vec<Object>)]
    pub exceptions: Vec<schedule_exception::Model>,
}

/// CRUD over the caller's own schedule exceptions.
#[derive(Clone)]
pub struct ScheduleService {
    db_pool: Arc<DbPool>,
}

impl ScheduleService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    pub async fn list(&self, user_id: i32) -> Result<Vec<schedule_exception::Model>, ServiceError> {
        Ok(schedule_exception::Entity::find()
            .filter(schedule_exception::Column::UserId.eq(user_id))
            .order_by_asc(schedule_exception::Column::Date)
            .all(&*self.db_pool)
            .await?)
    }

    /// Today's exceptions for the given accounts, keyed by user id.
    pub async fn exceptions_on(
        &self,
        user_ids: &[i32],
        date: NaiveDate,
    ) -> Result<HashMap<i32, schedule_exception::Model>, ServiceError> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = schedule_exception::Entity::find()
            .filter(schedule_exception::Column::UserId.is_in(user_ids.iter().copied()))
            .filter(schedule_exception::Column::Date.eq(date))
            .all(&*self.db_pool)
            .await?;
        Ok(rows.into_iter().map(|r| (r.user_id, r)).collect())
    }

    #[instrument(skip(self, request), fields(date = %request.date))]
    pub async fn create(
        &self,
        user_id: i32,
        request: CreateScheduleExceptionRequest,
    ) -> Result<schedule_exception::Model, ServiceError> {
        let date = parse_date(&request.date)?;
        validate_optional_time(request.opening_time.as_deref(), "opening_time")?;
        validate_optional_time(request.closing_time.as_deref(), "closing_time")?;

        let db = &*self.db_pool;
        let existing = schedule_exception::Entity::find()
            .filter(schedule_exception::Column::UserId.eq(user_id))
            .filter(schedule_exception::Column::Date.eq(date))
            .one(db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(DUPLICATE_EXCEPTION.into()));
        }

        let now = Utc::now();
        let model = schedule_exception::ActiveModel {
            user_id: Set(user_id),
            date: Set(date),
            is_closed: Set(request.is_closed),
            opening_time: Set(request.opening_time),
            closing_time: Set(request.closing_time),
            notes: Set(request.notes),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
        .map_err(|e| ServiceError::from_db_with_conflict(e, DUPLICATE_EXCEPTION))?;

        info!(exception_id = model.id, user_id, "schedule exception created");
        Ok(model)
    }

    /// Creates one exception per date, skipping dates that already have one.
    #[instrument(skip(self, request), fields(count = request.dates.len()))]
    pub async fn bulk_create(
        &self,
        user_id: i32,
        request: BulkScheduleExceptionRequest,
    ) -> Result<BulkCreateResult, ServiceError> {
        let dates = request
            .dates
            .iter()
            .map(|d| parse_date(d))
            .collect::<Result<Vec<_>, _>>()?;

        let txn = self.db_pool.begin().await.map_err(|e| {
            error!(error = %e, "failed to start schedule exception transaction");
            ServiceError::DatabaseError(e)
        })?;

        let existing: Vec<NaiveDate> = schedule_exception::Entity::find()
            .filter(schedule_exception::Column::UserId.eq(user_id))
            .filter(schedule_exception::Column::Date.is_in(dates.iter().copied()))
            .all(&txn)
            .await?
            .into_iter()
            .map(|e| e.date)
            .collect();

        let now = Utc::now();
        let mut created = Vec::new();
        for date in dates {
            if existing.contains(&date) || created.iter().any(|c: &schedule_exception::Model| c.date == date) {
                continue;
            }
            let model = schedule_exception::ActiveModel {
                user_id: Set(user_id),
                date: Set(date),
                is_closed: Set(request.is_closed),
                notes: Set(request.notes.clone()),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(&txn)
            .await;
            match model {
                Ok(model) => created.push(model),
                Err(e) if is_unique_violation(&e) => continue,
                Err(e) => return Err(ServiceError::DatabaseError(e)),
            }
        }

        txn.commit().await.map_err(|e| {
            error!(error = %e, "failed to commit schedule exceptions");
            ServiceError::DatabaseError(e)
        })?;

        Ok(BulkCreateResult {
            created: created.len(),
            exceptions: created,
        })
    }

    async fn find_owned(
        &self,
        user_id: i32,
        id: i32,
    ) -> Result<schedule_exception::Model, ServiceError> {
        schedule_exception::Entity::find_by_id(id)
            .filter(schedule_exception::Column::UserId.eq(user_id))
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound("schedule exception not found".into()))
    }

    pub async fn update(
        &self,
        user_id: i32,
        id: i32,
        request: UpdateScheduleExceptionRequest,
    ) -> Result<schedule_exception::Model, ServiceError> {
        validate_optional_time(request.opening_time.as_deref(), "opening_time")?;
        validate_optional_time(request.closing_time.as_deref(), "closing_time")?;

        let mut active = self.find_owned(user_id, id).await?.into_active_model();
        if let Some(is_closed) = request.is_closed {
            active.is_closed = Set(is_closed);
        }
        if request.opening_time.is_some() {
            active.opening_time = Set(request.opening_time);
        }
        if request.closing_time.is_some() {
            active.closing_time = Set(request.closing_time);
        }
        if request.notes.is_some() {
            active.notes = Set(request.notes);
        }
        active.updated_at = Set(Utc::now());
        Ok(active.update(&*self.db_pool).await?)
    }

    pub async fn delete(&self, user_id: i32, id: i32) -> Result<(), ServiceError> {
        let existing = self.find_owned(user_id, id).await?;
        schedule_exception::Entity::delete_by_id(existing.id)
            .exec(&*self.db_pool)
            .await?;
        info!(exception_id = id, user_id, "schedule exception deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use rstest::rstest;

    fn account(open: Option<&str>, close: Option<&str>, closed_days: Option<&str>, is_open: bool) -> user::Model {
        let now = Utc::now();
        user::Model {
            id: 1,
            email: "s@example.com".into(),
            password_hash: String::new(),
            name: "Supplier".into(),
            phone: "1".into(),
            role: user::Role::Supplier,
            admin_level: None,
            address: None,
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
            opening_time: open.map(String::from),
            closing_time: close.map(String::from),
            closed_days_of_week: closed_days.map(String::from),
            is_open,
            last_login: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    fn exception(is_closed: bool, open: Option<&str>, close: Option<&str>) -> schedule_exception::Model {
        let now = Utc::now();
        schedule_exception::Model {
            id: 1,
            user_id: 1,
            date: NaiveDate::from_ymd_opt(2025, 1, 6).unwrap(),
            is_closed,
            opening_time: open.map(String::from),
            closing_time: close.map(String::from),
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    // 2025-01-06 is a Monday.
    fn monday_at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 6)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn marketplace_clock_is_utc_plus_eight() {
        let utc = Utc.with_ymd_and_hms(2025, 1, 5, 20, 30, 0).unwrap();
        assert_eq!(marketplace_now(utc), monday_at(4, 30));
    }

    #[rstest]
    #[case("08:00", "17:00", 8, 0, true)]
    #[case("08:00", "17:00", 16, 59, true)]
    #[case("08:00", "17:00", 17, 0, false)]
    #[case("08:00", "17:00", 7, 59, false)]
    #[case("22:00", "02:00", 23, 0, true)]
    #[case("22:00", "02:00", 1, 30, true)]
    #[case("22:00", "02:00", 2, 0, false)]
    #[case("22:00", "02:00", 12, 0, false)]
    fn regular_hours_window(
        #[case] open: &str,
        #[case] close: &str,
        #[case] h: u32,
        #[case] m: u32,
        #[case] expected: bool,
    ) {
        let a = account(Some(open), Some(close), None, false);
        assert_eq!(is_open_at(&a, None, monday_at(h, m)), expected);
    }

    #[test]
    fn listed_weekday_closes_the_day() {
        let a = account(Some("08:00"), Some("17:00"), Some("0, 1"), true);
        assert!(!is_open_at(&a, None, monday_at(10, 0)));
        let a = account(Some("08:00"), Some("17:00"), Some("0,x,6"), true);
        assert!(is_open_at(&a, None, monday_at(10, 0)));
    }

    #[test]
    fn missing_hours_fall_back_to_manual_flag() {
        assert!(is_open_at(&account(None, None, None, true), None, monday_at(3, 0)));
        assert!(!is_open_at(&account(Some("bad"), Some("17:00"), None, false), None, monday_at(10, 0)));
    }

    #[test]
    fn exception_overrides_regular_schedule() {
        let a = account(Some("08:00"), Some("17:00"), Some("1"), false);
        assert!(!is_open_at(&a, Some(&exception(true, None, None)), monday_at(10, 0)));
        assert!(is_open_at(&a, Some(&exception(false, Some("09:00"), Some("12:00"))), monday_at(10, 0)));
        assert!(!is_open_at(&a, Some(&exception(false, Some("09:00"), Some("12:00"))), monday_at(13, 0)));
        // Open exception without hours uses the regular hours even on a closed weekday.
        assert!(is_open_at(&a, Some(&exception(false, None, None)), monday_at(10, 0)));
    }

    #[test]
    fn date_and_time_parsing() {
        assert_eq!(
            parse_date("2025-02-30").unwrap_err().to_string(),
            "invalid date format. Use YYYY-MM-DD"
        );
        assert_eq!(
            parse_date("2025-02-03").unwrap(),
            NaiveDate::from_ymd_opt(2025, 2, 3).unwrap()
        );
        assert_eq!(parse_hhmm(" 07:45 "), NaiveTime::from_hms_opt(7, 45, 0));
        assert_eq!(parse_hhmm("25:00"), None);
        assert!(validate_optional_time(Some("7pm"), "opening_time").is_err());
        assert!(validate_optional_time(Some(""), "opening_time").is_ok());
    }
}
