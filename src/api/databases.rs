//! API handlers for the monitored database fleet

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::db::{actions, resource_types, CreateDatabaseRequest, DatabaseInstance};
use crate::AppState;

use super::audit::{audit_log, ClientIp};
use super::auth::{AdminUser, AuthUser};
use super::error::{ApiError, ValidationErrorBuilder};
use super::extract::AppJson;
use super::validation::{validate_name, validate_short_code, validate_text_len, MAX_NAME_LENGTH};

/// GET /api/databases
pub async fn list_databases(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
) -> Result<Json<Vec<DatabaseInstance>>, ApiError> {
    let databases = DatabaseInstance::list_active(&state.db).await?;
    Ok(Json(databases))
}

/// GET /api/databases/:id (id or short code)
pub async fn get_database(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(key): Path<String>,
) -> Result<Json<DatabaseInstance>, ApiError> {
    let database = DatabaseInstance::resolve(&state.db, &key)
        .await?
        .ok_or_else(|| ApiError::not_found("Database not found"))?;
    Ok(Json(database))
}

/// POST /api/databases
pub async fn create_database(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    ip: ClientIp,
    AppJson(req): AppJson<CreateDatabaseRequest>,
) -> Result<(StatusCode, Json<DatabaseInstance>), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    errors
        .check("database_name", validate_name(&req.database_name))
        .check("short_code", validate_short_code(&req.short_code))
        .check("instance_name", validate_name(&req.instance_name))
        .check("host_name", validate_text_len(req.host_name.as_deref(), MAX_NAME_LENGTH))
        .check("ip_address", validate_text_len(req.ip_address.as_deref(), 64));
    if req.vcpu.is_some_and(|v| v < 0) {
        errors.add("vcpu", "Must not be negative");
    }
    errors.finish()?;

    let database = DatabaseInstance::create(&state.db, &req).await?;
    tracing::info!(short_code = %database.short_code, db_type = %database.db_type, "Database registered");

    audit_log(
        &state,
        actions::DATABASE_CREATE,
        resource_types::DATABASE,
        Some(&database.id),
        Some(&database.short_code),
        Some(&admin.id),
        ip.as_deref(),
        Some(serde_json::json!({ "db_type": database.db_type })),
    )
    .await;

    Ok((StatusCode::CREATED, Json(database)))
}

/// DELETE /api/databases/:id
///
/// Soft deactivation. Recorded checks stay queryable.
pub async fn delete_database(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    ip: ClientIp,
    Path(key): Path<String>,
) -> Result<Json<DatabaseInstance>, ApiError> {
    let database = DatabaseInstance::deactivate(&state.db, &key).await?;
    tracing::info!(short_code = %database.short_code, "Database deactivated");

    audit_log(
        &state,
        actions::DATABASE_DEACTIVATE,
        resource_types::DATABASE,
        Some(&database.id),
        Some(&database.short_code),
        Some(&admin.id),
        ip.as_deref(),
        None,
    )
    .await;

    Ok(Json(database))
}
