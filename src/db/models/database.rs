//! Monitored database instances.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

use super::common::DatabaseType;
use crate::db::error::{is_unique_violation, StoreError};

/// A database instance in the monitored fleet
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DatabaseInstance {
    pub id: String,
    pub database_name: String,
    pub short_code: String,
    pub instance_name: String,
    pub ip_address: Option<String>,
    pub host_name: Option<String>,
    pub vcpu: Option<i64>,
    pub ram: Option<String>,
    pub sga: Option<String>,
    pub software_version: Option<String>,
    pub os_version: Option<String>,
    pub db_type: DatabaseType,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Request to register a database instance
#[derive(Debug, Clone, Deserialize)]
pub struct CreateDatabaseRequest {
    pub database_name: String,
    pub short_code: String,
    pub instance_name: String,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub host_name: Option<String>,
    #[serde(default)]
    pub vcpu: Option<i64>,
    #[serde(default)]
    pub ram: Option<String>,
    #[serde(default)]
    pub sga: Option<String>,
    #[serde(default)]
    pub software_version: Option<String>,
    #[serde(default)]
    pub os_version: Option<String>,
    pub db_type: DatabaseType,
}

impl DatabaseInstance {
    /// Active instances ordered by name
    pub async fn list_active(db: &SqlitePool) -> Result<Vec<DatabaseInstance>, sqlx::Error> {
        sqlx::query_as::<_, DatabaseInstance>(
            "SELECT * FROM databases WHERE is_active = 1 ORDER BY database_name ASC, short_code ASC",
        )
        .fetch_all(db)
        .await
    }

    /// Look up an instance by id or short code, active or not
    pub async fn resolve(db: &SqlitePool, key: &str) -> Result<Option<DatabaseInstance>, sqlx::Error> {
        sqlx::query_as::<_, DatabaseInstance>(
            "SELECT * FROM databases WHERE id = ? OR short_code = ? LIMIT 1",
        )
        .bind(key)
        .bind(key.trim())
        .fetch_optional(db)
        .await
    }

    /// Resolve a reference used by a check write. Missing and inactive
    /// instances are both reported as a dangling reference.
    pub async fn resolve_active(db: &SqlitePool, key: &str) -> Result<DatabaseInstance, StoreError> {
        match Self::resolve(db, key).await? {
            Some(instance) if instance.is_active => Ok(instance),
            _ => Err(StoreError::ForeignKeyViolation("database")),
        }
    }

    pub async fn create(
        db: &SqlitePool,
        req: &CreateDatabaseRequest,
    ) -> Result<DatabaseInstance, StoreError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();

        let result = sqlx::query_as::<_, DatabaseInstance>(
            r#"
            INSERT INTO databases (
                id, database_name, short_code, instance_name, ip_address, host_name,
                vcpu, ram, sga, software_version, os_version, db_type, is_active,
                created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(req.database_name.trim())
        .bind(req.short_code.trim().to_lowercase())
        .bind(req.instance_name.trim())
        .bind(&req.ip_address)
        .bind(&req.host_name)
        .bind(req.vcpu)
        .bind(&req.ram)
        .bind(&req.sga)
        .bind(&req.software_version)
        .bind(&req.os_version)
        .bind(req.db_type)
        .bind(&now)
        .bind(&now)
        .fetch_one(db)
        .await;

        match result {
            Ok(instance) => Ok(instance),
            Err(e) if is_unique_violation(&e) => Err(StoreError::validation(
                "short_code",
                "A database with this short code already exists",
            )),
            Err(e) => Err(e.into()),
        }
    }

    /// Soft-deactivate an instance. Its check history is kept.
    pub async fn deactivate(db: &SqlitePool, key: &str) -> Result<DatabaseInstance, StoreError> {
        let instance = Self::resolve(db, key)
            .await?
            .ok_or(StoreError::NotFound("Database"))?;

        sqlx::query("UPDATE databases SET is_active = 0, updated_at = ? WHERE id = ?")
            .bind(chrono::Utc::now().to_rfc3339())
            .bind(&instance.id)
            .execute(db)
            .await?;

        Self::resolve(db, &instance.id)
            .await?
            .ok_or(StoreError::NotFound("Database"))
    }

    pub async fn count_active(db: &SqlitePool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM databases WHERE is_active = 1")
            .fetch_one(db)
            .await
    }
}
