//! Daily check records.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

use super::common::{CheckStatus, VerificationStatus};
use crate::db::error::{is_foreign_key_violation, StoreError};

/// Joined read projection of a daily check
const DAILY_SELECT: &str = r#"
    SELECT dc.*,
           d.database_name AS database_name,
           d.short_code AS database_short_code,
           ct.name AS check_type_name
    FROM daily_checks dc
    JOIN databases d ON d.id = dc.database_id
    JOIN check_types ct ON ct.id = dc.check_type_id
"#;

/// Content columns compared on overwrite. `IS` keeps NULL = NULL true.
const SAME_CONTENT: &str = "daily_checks.status = excluded.status \
     AND daily_checks.value IS excluded.value \
     AND daily_checks.comment IS excluded.comment";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DailyCheck {
    pub id: String,
    pub database_id: String,
    pub database_name: String,
    pub database_short_code: String,
    pub check_type_id: String,
    pub check_type_name: String,
    pub check_date: String,
    pub status: CheckStatus,
    pub value: Option<String>,
    pub comment: Option<String>,
    pub submitted_by: String,
    pub verification_status: VerificationStatus,
    pub verified_by: Option<String>,
    pub verified_at: Option<String>,
    pub verification_comment: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Submission body. `database_id` accepts an id or short code,
/// `check_type_id` an id or name.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateDailyCheckRequest {
    pub database_id: String,
    pub check_type_id: String,
    #[serde(default)]
    pub check_date: Option<String>,
    pub status: CheckStatus,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct DailyCheckQuery {
    pub database_id: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub status: Option<CheckStatus>,
    pub verification_status: Option<VerificationStatus>,
}

/// A daily check write with every reference already resolved
pub struct NewDailyCheck<'a> {
    pub database_id: &'a str,
    pub check_type_id: &'a str,
    pub check_date: &'a str,
    pub status: CheckStatus,
    pub value: Option<&'a str>,
    pub comment: Option<&'a str>,
    pub submitted_by: &'a str,
}

impl DailyCheck {
    pub async fn find_by_id(db: &SqlitePool, id: &str) -> Result<Option<DailyCheck>, sqlx::Error> {
        let sql = format!("{} WHERE dc.id = ?", DAILY_SELECT);
        sqlx::query_as::<_, DailyCheck>(&sql)
            .bind(id)
            .fetch_optional(db)
            .await
    }

    /// Insert or overwrite the record for (database, check type, date).
    ///
    /// A content change resets verification to pending and clears the
    /// verifier fields; an identical re-submission keeps them.
    pub async fn upsert(db: &SqlitePool, new: NewDailyCheck<'_>) -> Result<DailyCheck, StoreError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();

        let sql = format!(
            r#"
            INSERT INTO daily_checks (
                id, database_id, check_type_id, check_date, status, value, comment,
                submitted_by, verification_status, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, 'pending', ?, ?)
            ON CONFLICT (database_id, check_type_id, check_date) DO UPDATE SET
                verification_status = CASE WHEN {same} THEN daily_checks.verification_status ELSE 'pending' END,
                verified_by = CASE WHEN {same} THEN daily_checks.verified_by ELSE NULL END,
                verified_at = CASE WHEN {same} THEN daily_checks.verified_at ELSE NULL END,
                verification_comment = CASE WHEN {same} THEN daily_checks.verification_comment ELSE NULL END,
                status = excluded.status,
                value = excluded.value,
                comment = excluded.comment,
                submitted_by = excluded.submitted_by,
                updated_at = excluded.updated_at
            RETURNING id
            "#,
            same = SAME_CONTENT
        );

        let result = sqlx::query_scalar::<_, String>(&sql)
            .bind(&id)
            .bind(new.database_id)
            .bind(new.check_type_id)
            .bind(new.check_date)
            .bind(new.status)
            .bind(new.value)
            .bind(new.comment)
            .bind(new.submitted_by)
            .bind(&now)
            .bind(&now)
            .fetch_one(db)
            .await;

        let stored_id = match result {
            Ok(stored_id) => stored_id,
            Err(e) if is_foreign_key_violation(&e) => {
                return Err(StoreError::ForeignKeyViolation("database or check type"))
            }
            Err(e) => return Err(e.into()),
        };

        Self::find_by_id(db, &stored_id)
            .await?
            .ok_or(StoreError::NotFound("Daily check"))
    }

    /// Filtered list ordered by date (newest first), database name,
    /// then check-type display order. `database_id` must already be resolved.
    pub async fn list(db: &SqlitePool, query: &DailyCheckQuery) -> Result<Vec<DailyCheck>, sqlx::Error> {
        let mut conditions = Vec::new();
        let mut bindings: Vec<String> = Vec::new();

        if let Some(database_id) = &query.database_id {
            conditions.push("dc.database_id = ?");
            bindings.push(database_id.clone());
        }
        if let Some(start_date) = &query.start_date {
            conditions.push("dc.check_date >= ?");
            bindings.push(start_date.clone());
        }
        if let Some(end_date) = &query.end_date {
            conditions.push("dc.check_date <= ?");
            bindings.push(end_date.clone());
        }
        if let Some(status) = query.status {
            conditions.push("dc.status = ?");
            bindings.push(status.as_str().to_string());
        }
        if let Some(verification_status) = query.verification_status {
            conditions.push("dc.verification_status = ?");
            bindings.push(verification_status.as_str().to_string());
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let sql = format!(
            "{} {} ORDER BY dc.check_date DESC, d.database_name ASC, ct.display_order ASC, ct.name ASC",
            DAILY_SELECT, where_clause
        );
        let mut q = sqlx::query_as::<_, DailyCheck>(&sql);
        for binding in &bindings {
            q = q.bind(binding);
        }
        q.fetch_all(db).await
    }

    /// Statuses of every database's most recent check date. Checks of
    /// deactivated check types are left out.
    pub async fn latest_statuses(
        db: &SqlitePool,
    ) -> Result<Vec<(String, String, CheckStatus)>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT dc.database_id, dc.check_date, dc.status
            FROM daily_checks dc
            JOIN check_types ct ON ct.id = dc.check_type_id AND ct.is_active = 1
            JOIN (
                SELECT c.database_id, MAX(c.check_date) AS latest
                FROM daily_checks c
                JOIN check_types t ON t.id = c.check_type_id AND t.is_active = 1
                GROUP BY c.database_id
            ) l ON l.database_id = dc.database_id AND l.latest = dc.check_date
            "#,
        )
        .fetch_all(db)
        .await
    }

    /// Per-day status counts in an inclusive date range
    pub async fn status_counts_by_day(
        db: &SqlitePool,
        start_date: &str,
        end_date: &str,
        database_id: Option<&str>,
    ) -> Result<Vec<(String, CheckStatus, i64)>, sqlx::Error> {
        let mut sql = String::from(
            "SELECT check_date, status, COUNT(*) FROM daily_checks WHERE check_date >= ? AND check_date <= ?",
        );
        if database_id.is_some() {
            sql.push_str(" AND database_id = ?");
        }
        sql.push_str(" GROUP BY check_date, status");

        let mut q = sqlx::query_as::<_, (String, CheckStatus, i64)>(&sql)
            .bind(start_date)
            .bind(end_date);
        if let Some(database_id) = database_id {
            q = q.bind(database_id);
        }
        q.fetch_all(db).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{fixture, Fixture};
    use crate::db::CheckType;

    fn submission<'a>(f: &'a Fixture, status: CheckStatus, value: Option<&'a str>) -> NewDailyCheck<'a> {
        NewDailyCheck {
            database_id: &f.database_id,
            check_type_id: &f.daily_check_type_id,
            check_date: "2024-03-01",
            status,
            value,
            comment: None,
            submitted_by: &f.user_id,
        }
    }

    #[tokio::test]
    async fn test_upsert_overwrites_instead_of_duplicating() {
        let (db, f) = fixture().await;

        let first = DailyCheck::upsert(&db, submission(&f, CheckStatus::Pass, None)).await.unwrap();
        let second = DailyCheck::upsert(&db, submission(&f, CheckStatus::Fail, Some("down")))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.status, CheckStatus::Fail);
        assert_eq!(second.value.as_deref(), Some("down"));
        assert_eq!(second.database_short_code, "testdb");

        let all = DailyCheck::list(&db, &DailyCheckQuery::default()).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn test_content_change_resets_verification() {
        let (db, f) = fixture().await;
        let record = DailyCheck::upsert(&db, submission(&f, CheckStatus::Pass, None)).await.unwrap();

        sqlx::query(
            "UPDATE daily_checks SET verification_status = 'verified', verified_by = ?, verified_at = 'then' WHERE id = ?",
        )
        .bind(&f.user_id)
        .bind(&record.id)
        .execute(&db)
        .await
        .unwrap();

        let same = DailyCheck::upsert(&db, submission(&f, CheckStatus::Pass, None)).await.unwrap();
        assert_eq!(same.verification_status, VerificationStatus::Verified);
        assert!(same.verified_by.is_some());

        let changed = DailyCheck::upsert(&db, submission(&f, CheckStatus::Warning, None))
            .await
            .unwrap();
        assert_eq!(changed.verification_status, VerificationStatus::Pending);
        assert!(changed.verified_by.is_none());
        assert!(changed.verified_at.is_none());
    }

    #[tokio::test]
    async fn test_list_filters_and_orders() {
        let (db, f) = fixture().await;
        for (date, status) in [
            ("2024-03-01", CheckStatus::Pass),
            ("2024-03-03", CheckStatus::Fail),
            ("2024-03-02", CheckStatus::Pass),
        ] {
            DailyCheck::upsert(
                &db,
                NewDailyCheck {
                    check_date: date,
                    ..submission(&f, status, None)
                },
            )
            .await
            .unwrap();
        }

        let all = DailyCheck::list(&db, &DailyCheckQuery::default()).await.unwrap();
        let dates: Vec<_> = all.iter().map(|c| c.check_date.as_str()).collect();
        assert_eq!(dates, vec!["2024-03-03", "2024-03-02", "2024-03-01"]);

        let passes = DailyCheck::list(
            &db,
            &DailyCheckQuery {
                status: Some(CheckStatus::Pass),
                start_date: Some("2024-03-02".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(passes.len(), 1);
        assert_eq!(passes[0].check_date, "2024-03-02");

        let latest = DailyCheck::latest_statuses(&db).await.unwrap();
        assert_eq!(latest, vec![(f.database_id.clone(), "2024-03-03".to_string(), CheckStatus::Fail)]);
    }

    #[tokio::test]
    async fn test_latest_statuses_skip_deactivated_check_types() {
        let (db, f) = fixture().await;
        DailyCheck::upsert(&db, submission(&f, CheckStatus::Fail, None))
            .await
            .unwrap();
        assert_eq!(DailyCheck::latest_statuses(&db).await.unwrap().len(), 1);

        CheckType::deactivate(&db, &f.daily_check_type_id).await.unwrap();
        assert!(DailyCheck::latest_statuses(&db).await.unwrap().is_empty());

        // The stored record itself is kept
        let all = DailyCheck::list(&db, &DailyCheckQuery::default()).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn test_dangling_reference_is_foreign_key_violation() {
        let (db, f) = fixture().await;
        let err = DailyCheck::upsert(
            &db,
            NewDailyCheck {
                database_id: "missing",
                ..submission(&f, CheckStatus::Pass, None)
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, StoreError::ForeignKeyViolation(_)));
    }
}
