//! User accounts and their approval state.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

use super::common::{ApprovalStatus, Role};
use crate::db::error::{is_unique_violation, StoreError};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name: String,
    pub role: Role,
    pub approval_status: ApprovalStatus,
    pub created_at: String,
    pub updated_at: String,
    pub last_login_at: Option<String>,
}

/// Client-facing projection of a user. Never carries the credential hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub approval_status: ApprovalStatus,
    pub created_at: String,
    pub last_login_at: Option<String>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            role: user.role,
            approval_status: user.approval_status,
            created_at: user.created_at,
            last_login_at: user.last_login_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: String,
    pub user: UserResponse,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserResponse,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: Role,
}

#[derive(Debug, Deserialize, Default)]
pub struct UserListQuery {
    pub approval_status: Option<ApprovalStatus>,
}

/// Fields for a new account row. The email is lower-cased on insert.
pub struct NewUser<'a> {
    pub email: &'a str,
    pub password_hash: &'a str,
    pub name: &'a str,
    pub role: Role,
    pub approval_status: ApprovalStatus,
}

impl User {
    pub async fn find_by_id(db: &SqlitePool, id: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(db)
            .await
    }

    pub async fn find_by_email(db: &SqlitePool, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(email.trim().to_lowercase())
            .fetch_optional(db)
            .await
    }

    pub async fn create(db: &SqlitePool, new: NewUser<'_>) -> Result<User, StoreError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();

        let result = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, password_hash, name, role, approval_status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(new.email.trim().to_lowercase())
        .bind(new.password_hash)
        .bind(new.name.trim())
        .bind(new.role)
        .bind(new.approval_status)
        .bind(&now)
        .bind(&now)
        .fetch_one(db)
        .await;

        match result {
            Ok(user) => Ok(user),
            // The lookup before insert can race; the unique index is authoritative
            Err(e) if is_unique_violation(&e) => Err(StoreError::DuplicateEmail),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn list(
        db: &SqlitePool,
        approval_status: Option<ApprovalStatus>,
    ) -> Result<Vec<User>, sqlx::Error> {
        match approval_status {
            Some(status) => {
                sqlx::query_as::<_, User>(
                    "SELECT * FROM users WHERE approval_status = ? ORDER BY created_at DESC",
                )
                .bind(status)
                .fetch_all(db)
                .await
            }
            None => {
                sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at DESC")
                    .fetch_all(db)
                    .await
            }
        }
    }

    /// Set the approval status only if the current one is in `from`.
    /// Returns whether a row was changed.
    pub async fn set_approval_status(
        db: &SqlitePool,
        id: &str,
        to: ApprovalStatus,
        from: &[ApprovalStatus],
    ) -> Result<bool, sqlx::Error> {
        if from.is_empty() {
            return Ok(false);
        }
        let placeholders = vec!["?"; from.len()].join(", ");
        let sql = format!(
            "UPDATE users SET approval_status = ?, updated_at = ? WHERE id = ? AND approval_status IN ({})",
            placeholders
        );

        let mut query = sqlx::query(&sql)
            .bind(to)
            .bind(chrono::Utc::now().to_rfc3339())
            .bind(id);
        for status in from {
            query = query.bind(*status);
        }

        let result = query.execute(db).await?;
        Ok(result.rows_affected() > 0)
    }

    /// Change the role of an approved user. Returns whether a row was changed.
    pub async fn set_role(db: &SqlitePool, id: &str, role: Role) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET role = ?, updated_at = ? WHERE id = ? AND approval_status = 'approved'",
        )
        .bind(role)
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(id)
        .execute(db)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn touch_last_login(db: &SqlitePool, id: &str) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET last_login_at = ? WHERE id = ?")
            .bind(chrono::Utc::now().to_rfc3339())
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }

    /// Number of approved administrators
    pub async fn count_active_admins(db: &SqlitePool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM users WHERE role = 'admin' AND approval_status = 'approved'",
        )
        .fetch_one(db)
        .await
    }
}
