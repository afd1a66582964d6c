//! Weekly check records and their structured payload.

use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{FromRow, SqlitePool};
use std::collections::BTreeMap;

use super::common::{CheckStatus, VerificationStatus};
use crate::db::error::{is_foreign_key_violation, StoreError};

const WEEKLY_SELECT: &str = r#"
    SELECT wc.*,
           d.database_name AS database_name,
           d.short_code AS database_short_code
    FROM weekly_checks wc
    JOIN databases d ON d.id = wc.database_id
"#;

const SAME_CONTENT: &str = "weekly_checks.status = excluded.status \
     AND weekly_checks.production_db_size IS excluded.production_db_size \
     AND weekly_checks.archive_db_size IS excluded.archive_db_size \
     AND weekly_checks.invalid_objects IS excluded.invalid_objects \
     AND weekly_checks.instance_start_date IS excluded.instance_start_date \
     AND weekly_checks.schema_sizes = excluded.schema_sizes \
     AND weekly_checks.tablespaces = excluded.tablespaces \
     AND weekly_checks.objects_created = excluded.objects_created \
     AND weekly_checks.comment IS excluded.comment";

/// Usage of one tablespace as reported in a weekly check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TablespaceUsage {
    pub name: String,
    pub total_gb: f64,
    pub used_gb: f64,
    #[serde(default)]
    pub free_gb: Option<f64>,
    #[serde(default)]
    pub used_percent: Option<f64>,
}

impl TablespaceUsage {
    /// round(used / total * 100), or 0 for an empty tablespace
    pub fn expected_used_percent(&self) -> f64 {
        if self.total_gb == 0.0 {
            0.0
        } else {
            (self.used_gb / self.total_gb * 100.0).round()
        }
    }

    /// Check the write invariants and fill in omitted derived fields.
    pub fn normalize(mut self) -> Result<TablespaceUsage, String> {
        if self.name.trim().is_empty() {
            return Err("tablespace name must not be empty".to_string());
        }
        let values = [Some(self.total_gb), Some(self.used_gb), self.free_gb, self.used_percent];
        if values.iter().flatten().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(format!("{}: sizes must be non-negative numbers", self.name));
        }
        if self.used_gb > self.total_gb {
            return Err(format!("{}: used_gb exceeds total_gb", self.name));
        }

        let expected = self.expected_used_percent();
        match self.used_percent {
            Some(given)
                if given > 100.0
                    || (self.total_gb == 0.0 && given != 0.0)
                    || (given - expected).abs() > 1.0 =>
            {
                return Err(format!(
                    "{}: used_percent {} does not match used/total ({})",
                    self.name, given, expected
                ));
            }
            Some(_) => {}
            None => self.used_percent = Some(expected),
        }
        if self.free_gb.is_none() {
            self.free_gb = Some(self.total_gb - self.used_gb);
        }
        Ok(self)
    }
}

/// An object created in the database during the week
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectCreated {
    pub date: String,
    pub user_name: String,
    pub object_name: String,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WeeklyCheck {
    pub id: String,
    pub database_id: String,
    pub database_name: String,
    pub database_short_code: String,
    pub week_number: i64,
    pub year: i64,
    pub week_start_date: String,
    pub status: CheckStatus,
    pub production_db_size: Option<String>,
    pub archive_db_size: Option<String>,
    pub invalid_objects: Option<i64>,
    pub instance_start_date: Option<String>,
    pub schema_sizes: Json<BTreeMap<String, String>>,
    pub tablespaces: Json<Vec<TablespaceUsage>>,
    pub objects_created: Json<Vec<ObjectCreated>>,
    pub comment: Option<String>,
    pub submitted_by: String,
    pub verification_status: VerificationStatus,
    pub verified_by: Option<String>,
    pub verified_at: Option<String>,
    pub verification_comment: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Submission body. Week and year default to the current ISO week.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateWeeklyCheckRequest {
    pub database_id: String,
    #[serde(default)]
    pub week_number: Option<u32>,
    #[serde(default)]
    pub year: Option<i32>,
    pub status: CheckStatus,
    #[serde(default)]
    pub production_db_size: Option<String>,
    #[serde(default)]
    pub archive_db_size: Option<String>,
    #[serde(default)]
    pub invalid_objects: Option<i64>,
    #[serde(default)]
    pub instance_start_date: Option<String>,
    #[serde(default)]
    pub schema_sizes: BTreeMap<String, String>,
    #[serde(default)]
    pub tablespaces: Vec<TablespaceUsage>,
    #[serde(default)]
    pub objects_created: Vec<ObjectCreated>,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct WeeklyCheckQuery {
    pub database_id: Option<String>,
    pub year: Option<i64>,
    pub week_number: Option<i64>,
    pub verification_status: Option<VerificationStatus>,
}

/// A weekly check write with the database resolved and the payload validated
pub struct NewWeeklyCheck<'a> {
    pub database_id: &'a str,
    pub week_number: u32,
    pub year: i32,
    pub week_start_date: &'a str,
    pub submitted_by: &'a str,
    pub payload: &'a CreateWeeklyCheckRequest,
}

impl WeeklyCheck {
    pub async fn find_by_id(db: &SqlitePool, id: &str) -> Result<Option<WeeklyCheck>, sqlx::Error> {
        let sql = format!("{} WHERE wc.id = ?", WEEKLY_SELECT);
        sqlx::query_as::<_, WeeklyCheck>(&sql)
            .bind(id)
            .fetch_optional(db)
            .await
    }

    /// Insert or overwrite the record for (database, week, year), with the
    /// same verification reset rule as daily checks.
    pub async fn upsert(db: &SqlitePool, new: NewWeeklyCheck<'_>) -> Result<WeeklyCheck, StoreError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();
        let payload = new.payload;
        let schema_sizes = serde_json::to_string(&payload.schema_sizes)?;
        let tablespaces = serde_json::to_string(&payload.tablespaces)?;
        let objects_created = serde_json::to_string(&payload.objects_created)?;

        let sql = format!(
            r#"
            INSERT INTO weekly_checks (
                id, database_id, week_number, year, week_start_date, status,
                production_db_size, archive_db_size, invalid_objects, instance_start_date,
                schema_sizes, tablespaces, objects_created, comment, submitted_by,
                verification_status, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'pending', ?, ?)
            ON CONFLICT (database_id, week_number, year) DO UPDATE SET
                verification_status = CASE WHEN {same} THEN weekly_checks.verification_status ELSE 'pending' END,
                verified_by = CASE WHEN {same} THEN weekly_checks.verified_by ELSE NULL END,
                verified_at = CASE WHEN {same} THEN weekly_checks.verified_at ELSE NULL END,
                verification_comment = CASE WHEN {same} THEN weekly_checks.verification_comment ELSE NULL END,
                status = excluded.status,
                production_db_size = excluded.production_db_size,
                archive_db_size = excluded.archive_db_size,
                invalid_objects = excluded.invalid_objects,
                instance_start_date = excluded.instance_start_date,
                schema_sizes = excluded.schema_sizes,
                tablespaces = excluded.tablespaces,
                objects_created = excluded.objects_created,
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
            .bind(new.week_number)
            .bind(new.year)
            .bind(new.week_start_date)
            .bind(payload.status)
            .bind(&payload.production_db_size)
            .bind(&payload.archive_db_size)
            .bind(payload.invalid_objects)
            .bind(&payload.instance_start_date)
            .bind(&schema_sizes)
            .bind(&tablespaces)
            .bind(&objects_created)
            .bind(&payload.comment)
            .bind(new.submitted_by)
            .bind(&now)
            .bind(&now)
            .fetch_one(db)
            .await;

        let stored_id = match result {
            Ok(stored_id) => stored_id,
            Err(e) if is_foreign_key_violation(&e) => {
                return Err(StoreError::ForeignKeyViolation("database"))
            }
            Err(e) => return Err(e.into()),
        };

        Self::find_by_id(db, &stored_id)
            .await?
            .ok_or(StoreError::NotFound("Weekly check"))
    }

    /// Filtered list ordered by year and week (newest first), then database name
    pub async fn list(db: &SqlitePool, query: &WeeklyCheckQuery) -> Result<Vec<WeeklyCheck>, sqlx::Error> {
        let mut conditions = Vec::new();
        if query.database_id.is_some() {
            conditions.push("wc.database_id = ?");
        }
        if query.year.is_some() {
            conditions.push("wc.year = ?");
        }
        if query.week_number.is_some() {
            conditions.push("wc.week_number = ?");
        }
        if query.verification_status.is_some() {
            conditions.push("wc.verification_status = ?");
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let sql = format!(
            "{} {} ORDER BY wc.year DESC, wc.week_number DESC, d.database_name ASC",
            WEEKLY_SELECT, where_clause
        );
        let mut q = sqlx::query_as::<_, WeeklyCheck>(&sql);
        if let Some(database_id) = &query.database_id {
            q = q.bind(database_id);
        }
        if let Some(year) = query.year {
            q = q.bind(year);
        }
        if let Some(week_number) = query.week_number {
            q = q.bind(week_number);
        }
        if let Some(verification_status) = query.verification_status {
            q = q.bind(verification_status);
        }
        q.fetch_all(db).await
    }

    /// Most recent weekly record for a database
    pub async fn latest_for_database(
        db: &SqlitePool,
        database_id: &str,
    ) -> Result<Option<WeeklyCheck>, sqlx::Error> {
        let sql = format!(
            "{} WHERE wc.database_id = ? ORDER BY wc.year DESC, wc.week_number DESC LIMIT 1",
            WEEKLY_SELECT
        );
        sqlx::query_as::<_, WeeklyCheck>(&sql)
            .bind(database_id)
            .fetch_optional(db)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{fixture, Fixture};

    fn submission<'a>(f: &'a Fixture, payload: &'a CreateWeeklyCheckRequest) -> NewWeeklyCheck<'a> {
        NewWeeklyCheck {
            database_id: &f.database_id,
            week_number: 9,
            year: 2024,
            week_start_date: "2024-02-26",
            submitted_by: &f.user_id,
            payload,
        }
    }

    fn tablespace(total: f64, used: f64, percent: Option<f64>) -> TablespaceUsage {
        TablespaceUsage {
            name: "USERS".into(),
            total_gb: total,
            used_gb: used,
            free_gb: None,
            used_percent: percent,
        }
    }

    fn payload(status: CheckStatus) -> CreateWeeklyCheckRequest {
        CreateWeeklyCheckRequest {
            database_id: "testdb".into(),
            week_number: Some(9),
            year: Some(2024),
            status,
            production_db_size: Some("1.2 TB".into()),
            archive_db_size: None,
            invalid_objects: Some(0),
            instance_start_date: None,
            schema_sizes: BTreeMap::from([("APP".to_string(), "120 GB".to_string())]),
            tablespaces: vec![tablespace(100.0, 40.0, None).normalize().unwrap()],
            objects_created: vec![],
            comment: None,
        }
    }

    #[test]
    fn test_tablespace_percent_is_computed_when_omitted() {
        let ts = tablespace(200.0, 50.0, None).normalize().unwrap();
        assert_eq!(ts.used_percent, Some(25.0));
        assert_eq!(ts.free_gb, Some(150.0));

        let empty = tablespace(0.0, 0.0, None).normalize().unwrap();
        assert_eq!(empty.used_percent, Some(0.0));
    }

    #[test]
    fn test_tablespace_invariants_rejected() {
        assert!(tablespace(10.0, 11.0, None).normalize().is_err());
        assert!(tablespace(100.0, 40.0, Some(45.0)).normalize().is_err());
        assert!(tablespace(100.0, 40.0, Some(41.0)).normalize().is_ok());
        assert!(tablespace(0.0, 0.0, Some(5.0)).normalize().is_err());
        assert!(tablespace(100.0, 40.0, Some(40.4)).normalize().is_ok());
    }

    #[test]
    fn test_empty_tablespace_requires_zero_percent() {
        assert!(tablespace(0.0, 0.0, Some(0.5)).normalize().is_err());
        assert!(tablespace(0.0, 0.0, Some(1.0)).normalize().is_err());
        let empty = tablespace(0.0, 0.0, Some(0.0)).normalize().unwrap();
        assert_eq!(empty.used_percent, Some(0.0));
        assert_eq!(empty.free_gb, Some(0.0));
        assert!(tablespace(-1.0, 0.0, None).normalize().is_err());
    }

    #[tokio::test]
    async fn test_weekly_upsert_per_week_key() {
        let (db, f) = fixture().await;
        let body = payload(CheckStatus::Pass);
        let new = || NewWeeklyCheck {
            database_id: &f.database_id,
            week_number: 9,
            year: 2024,
            week_start_date: "2024-02-26",
            submitted_by: &f.user_id,
            payload: &body,
        };

        let first = WeeklyCheck::upsert(&db, new()).await.unwrap();
        let again = WeeklyCheck::upsert(&db, new()).await.unwrap();
        assert_eq!(first.id, again.id);
        assert_eq!(again.schema_sizes.0.get("APP").map(String::as_str), Some("120 GB"));
        assert_eq!(again.tablespaces.0[0].used_percent, Some(40.0));

        let listed = WeeklyCheck::list(
            &db,
            &WeeklyCheckQuery {
                year: Some(2024),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(listed.len(), 1);

        let latest = WeeklyCheck::latest_for_database(&db, &f.database_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.week_start_date, "2024-02-26");
    }

    #[tokio::test]
    async fn test_weekly_content_change_resets_verification() {
        let (db, f) = fixture().await;
        let body = payload(CheckStatus::Pass);

        let record = WeeklyCheck::upsert(&db, submission(&f, &body)).await.unwrap();
        sqlx::query(
            "UPDATE weekly_checks SET verification_status = 'verified', verified_by = ?, verified_at = 'then' WHERE id = ?",
        )
        .bind(&f.admin_id)
        .bind(&record.id)
        .execute(&db)
        .await
        .unwrap();

        let same = WeeklyCheck::upsert(&db, submission(&f, &body)).await.unwrap();
        assert_eq!(same.id, record.id);
        assert_eq!(same.verification_status, VerificationStatus::Verified);
        assert_eq!(same.verified_by.as_deref(), Some(f.admin_id.as_str()));

        let mut grown = payload(CheckStatus::Pass);
        grown.tablespaces = vec![tablespace(100.0, 90.0, None).normalize().unwrap()];
        let changed = WeeklyCheck::upsert(&db, submission(&f, &grown)).await.unwrap();
        assert_eq!(changed.id, record.id);
        assert_eq!(changed.verification_status, VerificationStatus::Pending);
        assert!(changed.verified_by.is_none());
        assert!(changed.verified_at.is_none());
        assert_eq!(changed.tablespaces.0[0].used_percent, Some(90.0));

        sqlx::query("UPDATE weekly_checks SET verification_status = 'verified' WHERE id = ?")
            .bind(&record.id)
            .execute(&db)
            .await
            .unwrap();
        let warning = payload(CheckStatus::Warning);
        let warned = WeeklyCheck::upsert(&db, submission(&f, &warning)).await.unwrap();
        assert_eq!(warned.verification_status, VerificationStatus::Pending);
        assert_eq!(warned.status, CheckStatus::Warning);
    }
}
