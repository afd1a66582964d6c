//! API handlers for check type definitions

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::db::{actions, resource_types, CheckType, CheckTypeQuery, CreateCheckTypeRequest};
use crate::AppState;

use super::audit::{audit_log, ClientIp};
use super::auth::{AdminUser, AuthUser};
use super::error::{ApiError, ValidationErrorBuilder};
use super::extract::{AppJson, AppQuery};
use super::validation::{validate_name, validate_text_len, MAX_COMMENT_LENGTH};

/// GET /api/check-types?database_type=&frequency=
pub async fn list_check_types(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    AppQuery(query): AppQuery<CheckTypeQuery>,
) -> Result<Json<Vec<CheckType>>, ApiError> {
    let check_types = CheckType::list(&state.db, &query).await?;
    Ok(Json(check_types))
}

/// POST /api/check-types
pub async fn create_check_type(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    ip: ClientIp,
    AppJson(req): AppJson<CreateCheckTypeRequest>,
) -> Result<(StatusCode, Json<CheckType>), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    errors
        .check("name", validate_name(&req.name))
        .check("description", validate_text_len(req.description.as_deref(), MAX_COMMENT_LENGTH));
    if req.database_types.is_empty() {
        errors.add("database_types", "At least one database type is required");
    }
    if !req.is_daily && !req.is_weekly {
        errors.add("is_daily", "A check type must run daily, weekly or both");
    }
    errors.finish()?;

    let check_type = CheckType::create(&state.db, &req).await?;
    tracing::info!(name = %check_type.name, "Check type created");

    audit_log(
        &state,
        actions::CHECK_TYPE_CREATE,
        resource_types::CHECK_TYPE,
        Some(&check_type.id),
        Some(&check_type.name),
        Some(&admin.id),
        ip.as_deref(),
        None,
    )
    .await;

    Ok((StatusCode::CREATED, Json(check_type)))
}

/// DELETE /api/check-types/:id (id or name)
pub async fn delete_check_type(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    ip: ClientIp,
    Path(key): Path<String>,
) -> Result<Json<CheckType>, ApiError> {
    let check_type = CheckType::deactivate(&state.db, &key).await?;
    tracing::info!(name = %check_type.name, "Check type deactivated");

    audit_log(
        &state,
        actions::CHECK_TYPE_DEACTIVATE,
        resource_types::CHECK_TYPE,
        Some(&check_type.id),
        Some(&check_type.name),
        Some(&admin.id),
        ip.as_deref(),
        None,
    )
    .await;

    Ok(Json(check_type))
}
