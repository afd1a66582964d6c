//! Audit log models for tracking user actions.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

/// Audit log entry for tracking user actions
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuditLog {
    pub id: String,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub resource_name: Option<String>,
    pub user_id: Option<String>,
    pub ip_address: Option<String>,
    pub details: Option<String>,
    pub created_at: String,
}

/// Response for listing audit logs with pagination
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogListResponse {
    pub items: Vec<AuditLog>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

/// Query parameters for filtering audit logs
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AuditLogQuery {
    /// Filter by action (e.g., "user.approve")
    pub action: Option<String>,
    /// Filter by resource type (e.g., "user", "daily_check")
    pub resource_type: Option<String>,
    /// Filter by resource ID
    pub resource_id: Option<String>,
    /// Filter by user ID
    pub user_id: Option<String>,
    /// Start date for filtering (ISO 8601)
    pub start_date: Option<String>,
    /// End date for filtering (ISO 8601)
    pub end_date: Option<String>,
    /// Page number (1-indexed, defaults to 1)
    pub page: Option<i64>,
    /// Items per page (defaults to 50, max 100)
    pub per_page: Option<i64>,
}

/// Audit action names
pub mod actions {
    // Auth actions
    pub const AUTH_REGISTER: &str = "auth.register";
    pub const AUTH_LOGIN: &str = "auth.login";
    pub const AUTH_LOGIN_FAILED: &str = "auth.login_failed";

    // User administration
    pub const USER_APPROVE: &str = "user.approve";
    pub const USER_REJECT: &str = "user.reject";
    pub const USER_ROLE_CHANGE: &str = "user.role_change";

    // Inventory
    pub const DATABASE_CREATE: &str = "database.create";
    pub const DATABASE_DEACTIVATE: &str = "database.deactivate";
    pub const CHECK_TYPE_CREATE: &str = "check_type.create";
    pub const CHECK_TYPE_DEACTIVATE: &str = "check_type.deactivate";

    // Check records
    pub const DAILY_CHECK_SUBMIT: &str = "daily_check.submit";
    pub const DAILY_CHECK_VERIFY: &str = "daily_check.verify";
    pub const DAILY_CHECK_REJECT: &str = "daily_check.reject";
    pub const WEEKLY_CHECK_SUBMIT: &str = "weekly_check.submit";
    pub const WEEKLY_CHECK_VERIFY: &str = "weekly_check.verify";
    pub const WEEKLY_CHECK_REJECT: &str = "weekly_check.reject";
}

/// Resource type names
pub mod resource_types {
    pub const USER: &str = "user";
    pub const DATABASE: &str = "database";
    pub const CHECK_TYPE: &str = "check_type";
    pub const DAILY_CHECK: &str = "daily_check";
    pub const WEEKLY_CHECK: &str = "weekly_check";
}

/// Log an audit event to the database
#[allow(clippy::too_many_arguments)]
pub async fn log_audit(
    db: &SqlitePool,
    action: &str,
    resource_type: &str,
    resource_id: Option<&str>,
    resource_name: Option<&str>,
    user_id: Option<&str>,
    ip_address: Option<&str>,
    details: Option<serde_json::Value>,
) -> Result<(), sqlx::Error> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    let details_json = details.map(|d| d.to_string());

    sqlx::query(
        r#"
        INSERT INTO audit_logs (id, action, resource_type, resource_id, resource_name, user_id, ip_address, details, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(action)
    .bind(resource_type)
    .bind(resource_id)
    .bind(resource_name)
    .bind(user_id)
    .bind(ip_address)
    .bind(&details_json)
    .bind(&now)
    .execute(db)
    .await?;

    tracing::debug!(
        action = action,
        resource_type = resource_type,
        resource_id = resource_id,
        user_id = user_id,
        "Audit log recorded"
    );

    Ok(())
}

/// List audit logs with filtering and pagination
pub async fn list_audit_logs(
    db: &SqlitePool,
    query: &AuditLogQuery,
) -> Result<AuditLogListResponse, sqlx::Error> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(50).clamp(1, 100);
    let offset = (page - 1) * per_page;

    // Build dynamic WHERE clause
    let mut conditions = Vec::new();
    let mut bindings: Vec<String> = Vec::new();

    if let Some(action) = &query.action {
        conditions.push("action = ?");
        bindings.push(action.clone());
    }

    if let Some(resource_type) = &query.resource_type {
        conditions.push("resource_type = ?");
        bindings.push(resource_type.clone());
    }

    if let Some(resource_id) = &query.resource_id {
        conditions.push("resource_id = ?");
        bindings.push(resource_id.clone());
    }

    if let Some(user_id) = &query.user_id {
        conditions.push("user_id = ?");
        bindings.push(user_id.clone());
    }

    if let Some(start_date) = &query.start_date {
        conditions.push("created_at >= ?");
        bindings.push(start_date.clone());
    }

    if let Some(end_date) = &query.end_date {
        conditions.push("created_at <= ?");
        bindings.push(end_date.clone());
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    // Build and execute count query
    let count_sql = format!("SELECT COUNT(*) as count FROM audit_logs {}", where_clause);
    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for binding in &bindings {
        count_query = count_query.bind(binding);
    }
    let total = count_query.fetch_one(db).await?;

    // Build and execute main query
    let sql = format!(
        "SELECT * FROM audit_logs {} ORDER BY created_at DESC LIMIT ? OFFSET ?",
        where_clause
    );
    let mut query_builder = sqlx::query_as::<_, AuditLog>(&sql);
    for binding in &bindings {
        query_builder = query_builder.bind(binding);
    }
    query_builder = query_builder.bind(per_page).bind(offset);

    let items = query_builder.fetch_all(db).await?;

    let total_pages = (total as f64 / per_page as f64).ceil() as i64;

    Ok(AuditLogListResponse {
        items,
        total,
        page,
        per_page,
        total_pages,
    })
}
