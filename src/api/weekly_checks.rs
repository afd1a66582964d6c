//! API handlers for weekly check records

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::db::{
    actions, resource_types, CreateWeeklyCheckRequest, DatabaseInstance, VerificationStatus,
    WeeklyCheck, WeeklyCheckQuery,
};
use crate::engine::{submit_weekly, CheckKind, Submitter};
use crate::AppState;

use super::audit::{audit_log, ClientIp};
use super::auth::{AdminUser, AuthUser};
use super::error::{ApiError, ValidationErrorBuilder};
use super::extract::{AppJson, AppJsonOrDefault, AppQuery};
use super::metrics;
use super::validation::{validate_text_len, MAX_COMMENT_LENGTH};
use super::verifications::{self, VerificationRequest};

/// Upper bound on list payloads of one weekly record
const MAX_PAYLOAD_ITEMS: usize = 200;

/// GET /api/weekly-checks?database_id&year&week_number&verification_status
pub async fn list_weekly_checks(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    AppQuery(mut query): AppQuery<WeeklyCheckQuery>,
) -> Result<Json<Vec<WeeklyCheck>>, ApiError> {
    if let Some(key) = query.database_id.take() {
        let database = DatabaseInstance::resolve(&state.db, &key)
            .await?
            .ok_or_else(|| ApiError::not_found("Database not found"))?;
        query.database_id = Some(database.id);
    }

    let checks = WeeklyCheck::list(&state.db, &query).await?;
    Ok(Json(checks))
}

/// POST /api/weekly-checks
///
/// Creates or overwrites the record for (database, ISO week, ISO year).
pub async fn create_weekly_check(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ip: ClientIp,
    AppJson(req): AppJson<CreateWeeklyCheckRequest>,
) -> Result<(StatusCode, Json<WeeklyCheck>), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    errors.check("comment", validate_text_len(req.comment.as_deref(), MAX_COMMENT_LENGTH));
    if req.tablespaces.len() > MAX_PAYLOAD_ITEMS
        || req.objects_created.len() > MAX_PAYLOAD_ITEMS
        || req.schema_sizes.len() > MAX_PAYLOAD_ITEMS
    {
        errors.add("payload", format!("At most {} entries per list", MAX_PAYLOAD_ITEMS));
    }
    errors.finish()?;

    let submitter = Submitter {
        user_id: &user.id,
        role: user.role,
        today: chrono::Utc::now().date_naive(),
    };
    let record = submit_weekly(&state.db, &req, submitter).await?;
    metrics::record_submission(CheckKind::Weekly);

    tracing::info!(
        database = %record.database_short_code,
        year = record.year,
        week = record.week_number,
        status = %record.status,
        "Weekly check submitted"
    );

    audit_log(
        &state,
        actions::WEEKLY_CHECK_SUBMIT,
        resource_types::WEEKLY_CHECK,
        Some(&record.id),
        Some(&format!(
            "{} / {}-W{:02}",
            record.database_short_code, record.year, record.week_number
        )),
        Some(&user.id),
        ip.as_deref(),
        Some(serde_json::json!({ "status": record.status })),
    )
    .await;

    Ok((StatusCode::CREATED, Json(record)))
}

/// PUT /api/weekly-checks/:id/verify
pub async fn verify_weekly_check(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    ip: ClientIp,
    Path(id): Path<String>,
    AppJsonOrDefault(req): AppJsonOrDefault<VerificationRequest>,
) -> Result<Json<WeeklyCheck>, ApiError> {
    verifications::apply(&state, &admin, &ip, CheckKind::Weekly, &id, VerificationStatus::Verified, req)
        .await?;
    fetch(&state, &id).await
}

/// PUT /api/weekly-checks/:id/reject
pub async fn reject_weekly_check(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    ip: ClientIp,
    Path(id): Path<String>,
    AppJsonOrDefault(req): AppJsonOrDefault<VerificationRequest>,
) -> Result<Json<WeeklyCheck>, ApiError> {
    verifications::apply(&state, &admin, &ip, CheckKind::Weekly, &id, VerificationStatus::Rejected, req)
        .await?;
    fetch(&state, &id).await
}

async fn fetch(state: &AppState, id: &str) -> Result<Json<WeeklyCheck>, ApiError> {
    let record = WeeklyCheck::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Weekly check not found"))?;
    Ok(Json(record))
}
