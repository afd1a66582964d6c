//! Check type definitions.

use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{FromRow, SqlitePool};

use super::common::{DatabaseType, Frequency};
use crate::db::error::{is_unique_violation, StoreError};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CheckType {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub database_types: Json<Vec<DatabaseType>>,
    pub is_daily: bool,
    pub is_weekly: bool,
    pub display_order: i64,
    pub is_active: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCheckTypeRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub database_types: Vec<DatabaseType>,
    #[serde(default = "default_true")]
    pub is_daily: bool,
    #[serde(default)]
    pub is_weekly: bool,
    #[serde(default)]
    pub display_order: i64,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CheckTypeQuery {
    pub database_type: Option<DatabaseType>,
    pub frequency: Option<Frequency>,
}

impl CheckType {
    pub fn applies_to(&self, db_type: DatabaseType) -> bool {
        self.database_types.0.contains(&db_type)
    }

    pub fn runs(&self, frequency: Frequency) -> bool {
        match frequency {
            Frequency::Daily => self.is_daily,
            Frequency::Weekly => self.is_weekly,
        }
    }

    /// Active check types ordered by display order, then name
    pub async fn list(db: &SqlitePool, query: &CheckTypeQuery) -> Result<Vec<CheckType>, sqlx::Error> {
        let all = sqlx::query_as::<_, CheckType>(
            "SELECT * FROM check_types WHERE is_active = 1 ORDER BY display_order ASC, name ASC",
        )
        .fetch_all(db)
        .await?;

        Ok(all
            .into_iter()
            .filter(|ct| query.database_type.map_or(true, |t| ct.applies_to(t)))
            .filter(|ct| query.frequency.map_or(true, |f| ct.runs(f)))
            .collect())
    }

    /// Look up a check type by id or name, active or not
    pub async fn resolve(db: &SqlitePool, key: &str) -> Result<Option<CheckType>, sqlx::Error> {
        sqlx::query_as::<_, CheckType>("SELECT * FROM check_types WHERE id = ? OR name = ? LIMIT 1")
            .bind(key)
            .bind(key.trim())
            .fetch_optional(db)
            .await
    }

    pub async fn resolve_active(db: &SqlitePool, key: &str) -> Result<CheckType, StoreError> {
        match Self::resolve(db, key).await? {
            Some(ct) if ct.is_active => Ok(ct),
            _ => Err(StoreError::ForeignKeyViolation("check type")),
        }
    }

    pub async fn create(db: &SqlitePool, req: &CreateCheckTypeRequest) -> Result<CheckType, StoreError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();
        let types = serde_json::to_string(&req.database_types)?;

        let result = sqlx::query_as::<_, CheckType>(
            r#"
            INSERT INTO check_types (id, name, description, database_types, is_daily, is_weekly, display_order, is_active, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, 1, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(req.name.trim())
        .bind(&req.description)
        .bind(&types)
        .bind(req.is_daily)
        .bind(req.is_weekly)
        .bind(req.display_order)
        .bind(&now)
        .fetch_one(db)
        .await;

        match result {
            Ok(ct) => Ok(ct),
            Err(e) if is_unique_violation(&e) => Err(StoreError::validation(
                "name",
                "A check type with this name already exists",
            )),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn deactivate(db: &SqlitePool, key: &str) -> Result<CheckType, StoreError> {
        let ct = Self::resolve(db, key)
            .await?
            .ok_or(StoreError::NotFound("Check type"))?;

        sqlx::query("UPDATE check_types SET is_active = 0 WHERE id = ?")
            .bind(&ct.id)
            .execute(db)
            .await?;

        Ok(CheckType {
            is_active: false,
            ..ct
        })
    }
}
