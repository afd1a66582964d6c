//! Check submission rules.
//!
//! Resolves references, enforces the date policy and payload invariants,
//! then hands the write to the record store's upsert.

use chrono::{Datelike, NaiveDate, Weekday};
use sqlx::SqlitePool;

use crate::db::{
    CheckType, CreateDailyCheckRequest, CreateWeeklyCheckRequest, DailyCheck, DatabaseInstance,
    Frequency, NewDailyCheck, NewWeeklyCheck, Role, StoreError, WeeklyCheck,
};

/// Who is submitting, and at what moment
#[derive(Debug, Clone, Copy)]
pub struct Submitter<'a> {
    pub user_id: &'a str,
    pub role: Role,
    pub today: NaiveDate,
}

/// Monday of an ISO week
pub fn iso_week_start(year: i32, week: u32) -> Option<NaiveDate> {
    NaiveDate::from_isoywd_opt(year, week, Weekday::Mon)
}

/// (ISO year, ISO week) containing `date`
pub fn iso_week_of(date: NaiveDate) -> (i32, u32) {
    let week = date.iso_week();
    (week.year(), week.week())
}

fn blank_to_none(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

pub async fn submit_daily(
    db: &SqlitePool,
    req: &CreateDailyCheckRequest,
    submitter: Submitter<'_>,
) -> Result<DailyCheck, StoreError> {
    let date = match blank_to_none(&req.check_date) {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|_| StoreError::validation("check_date", "Date must be in YYYY-MM-DD format"))?,
        None => submitter.today,
    };
    if date > submitter.today {
        return Err(StoreError::validation("check_date", "Checks cannot be recorded for a future date"));
    }
    if submitter.role != Role::Admin && date != submitter.today {
        return Err(StoreError::validation(
            "check_date",
            "Only today's checks can be submitted; past entries are back-filled by an administrator",
        ));
    }

    let database = DatabaseInstance::resolve_active(db, &req.database_id).await?;
    let check_type = CheckType::resolve_active(db, &req.check_type_id).await?;
    if !check_type.runs(Frequency::Daily) {
        return Err(StoreError::validation(
            "check_type_id",
            format!("'{}' is not a daily check", check_type.name),
        ));
    }
    if !check_type.applies_to(database.db_type) {
        return Err(StoreError::validation(
            "check_type_id",
            format!("'{}' does not apply to {} databases", check_type.name, database.db_type),
        ));
    }

    let check_date = date.format("%Y-%m-%d").to_string();
    DailyCheck::upsert(
        db,
        NewDailyCheck {
            database_id: &database.id,
            check_type_id: &check_type.id,
            check_date: &check_date,
            status: req.status,
            value: blank_to_none(&req.value),
            comment: blank_to_none(&req.comment),
            submitted_by: submitter.user_id,
        },
    )
    .await
}

pub async fn submit_weekly(
    db: &SqlitePool,
    req: &CreateWeeklyCheckRequest,
    submitter: Submitter<'_>,
) -> Result<WeeklyCheck, StoreError> {
    let current = iso_week_of(submitter.today);
    let year = req.year.unwrap_or(current.0);
    let week = req.week_number.unwrap_or(current.1);

    let week_start = iso_week_start(year, week)
        .ok_or_else(|| StoreError::validation("week_number", format!("{} has no ISO week {}", year, week)))?;
    if (year, week) > current {
        return Err(StoreError::validation("week_number", "Checks cannot be recorded for a future week"));
    }
    if submitter.role != Role::Admin && (year, week) != current {
        return Err(StoreError::validation(
            "week_number",
            "Only the current week can be submitted; past weeks are back-filled by an administrator",
        ));
    }
    if req.invalid_objects.is_some_and(|n| n < 0) {
        return Err(StoreError::validation("invalid_objects", "Must not be negative"));
    }

    let tablespaces = req
        .tablespaces
        .iter()
        .cloned()
        .map(|ts| ts.normalize())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|message| StoreError::validation("tablespaces", message))?;

    let database = DatabaseInstance::resolve_active(db, &req.database_id).await?;

    let payload = CreateWeeklyCheckRequest {
        tablespaces,
        production_db_size: blank_to_none(&req.production_db_size).map(String::from),
        archive_db_size: blank_to_none(&req.archive_db_size).map(String::from),
        instance_start_date: blank_to_none(&req.instance_start_date).map(String::from),
        comment: blank_to_none(&req.comment).map(String::from),
        ..req.clone()
    };
    let week_start_date = week_start.format("%Y-%m-%d").to_string();

    WeeklyCheck::upsert(
        db,
        NewWeeklyCheck {
            database_id: &database.id,
            week_number: week,
            year,
            week_start_date: &week_start_date,
            submitted_by: submitter.user_id,
            payload: &payload,
        },
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{fixture, Fixture};
    use crate::db::{CheckStatus, TablespaceUsage};
    use std::collections::BTreeMap;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 6).unwrap()
    }

    fn as_user(f: &Fixture) -> Submitter<'_> {
        Submitter {
            user_id: &f.user_id,
            role: Role::User,
            today: today(),
        }
    }

    fn as_admin(f: &Fixture) -> Submitter<'_> {
        Submitter {
            user_id: &f.admin_id,
            role: Role::Admin,
            today: today(),
        }
    }

    fn daily(date: Option<&str>) -> CreateDailyCheckRequest {
        CreateDailyCheckRequest {
            database_id: "TESTDB".into(),
            check_type_id: "listener status".into(),
            check_date: date.map(String::from),
            status: CheckStatus::Warning,
            value: Some("  ".into()),
            comment: None,
        }
    }

    fn weekly(week: Option<u32>) -> CreateWeeklyCheckRequest {
        CreateWeeklyCheckRequest {
            database_id: "testdb".into(),
            week_number: week,
            year: Some(2024),
            status: CheckStatus::Pass,
            production_db_size: None,
            archive_db_size: None,
            invalid_objects: Some(3),
            instance_start_date: None,
            schema_sizes: BTreeMap::new(),
            tablespaces: vec![TablespaceUsage {
                name: "SYSTEM".into(),
                total_gb: 8.0,
                used_gb: 2.0,
                free_gb: None,
                used_percent: None,
            }],
            objects_created: vec![],
            comment: None,
        }
    }

    #[test]
    fn test_iso_week_helpers() {
        assert_eq!(iso_week_of(today()), (2024, 10));
        assert_eq!(iso_week_start(2024, 10), NaiveDate::from_ymd_opt(2024, 3, 4));
        assert_eq!(iso_week_of(NaiveDate::from_ymd_opt(2021, 1, 1).unwrap()), (2020, 53));
        assert!(iso_week_start(2024, 54).is_none());
    }

    #[tokio::test]
    async fn test_daily_defaults_to_today_and_resolves_by_code_and_name() {
        let (db, f) = fixture().await;
        let record = submit_daily(&db, &daily(None), as_user(&f)).await.unwrap();
        assert_eq!(record.check_date, "2024-03-06");
        assert_eq!(record.database_id, f.database_id);
        assert_eq!(record.check_type_id, f.daily_check_type_id);
        assert!(record.value.is_none());
    }

    #[tokio::test]
    async fn test_daily_date_policy() {
        let (db, f) = fixture().await;

        let future = submit_daily(&db, &daily(Some("2024-03-07")), as_admin(&f)).await;
        assert!(matches!(future, Err(StoreError::Validation { field: "check_date", .. })));

        let backfill_by_user = submit_daily(&db, &daily(Some("2024-03-01")), as_user(&f)).await;
        assert!(matches!(backfill_by_user, Err(StoreError::Validation { .. })));

        let backfill_by_admin = submit_daily(&db, &daily(Some("2024-03-01")), as_admin(&f)).await;
        assert!(backfill_by_admin.is_ok());

        let malformed = submit_daily(&db, &daily(Some("03/01/2024")), as_admin(&f)).await;
        assert!(matches!(malformed, Err(StoreError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_daily_rejects_weekly_only_check_type() {
        let (db, f) = fixture().await;
        let req = CreateDailyCheckRequest {
            check_type_id: f.weekly_check_type_id.clone(),
            ..daily(None)
        };
        let err = submit_daily(&db, &req, as_user(&f)).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation { field: "check_type_id", .. }));

        let unknown = CreateDailyCheckRequest {
            database_id: "nosuchdb".into(),
            ..daily(None)
        };
        let err = submit_daily(&db, &unknown, as_user(&f)).await.unwrap_err();
        assert!(matches!(err, StoreError::ForeignKeyViolation("database")));
    }

    #[tokio::test]
    async fn test_weekly_week_policy_and_tablespaces() {
        let (db, f) = fixture().await;

        let record = submit_weekly(&db, &weekly(None), as_user(&f)).await.unwrap();
        assert_eq!((record.year, record.week_number), (2024, 10));
        assert_eq!(record.week_start_date, "2024-03-04");
        assert_eq!(record.tablespaces.0[0].used_percent, Some(25.0));

        let future = submit_weekly(&db, &weekly(Some(11)), as_admin(&f)).await;
        assert!(matches!(future, Err(StoreError::Validation { field: "week_number", .. })));

        let past_by_user = submit_weekly(&db, &weekly(Some(9)), as_user(&f)).await;
        assert!(past_by_user.is_err());
        assert!(submit_weekly(&db, &weekly(Some(9)), as_admin(&f)).await.is_ok());

        let mut broken = weekly(None);
        broken.tablespaces[0].used_gb = 9.0;
        let err = submit_weekly(&db, &broken, as_user(&f)).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation { field: "tablespaces", .. }));
    }
}
