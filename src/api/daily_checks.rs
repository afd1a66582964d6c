//! API handlers for daily check records

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::db::{
    actions, resource_types, CreateDailyCheckRequest, DailyCheck, DailyCheckQuery,
    DatabaseInstance, VerificationStatus,
};
use crate::engine::{submit_daily, CheckKind, Submitter};
use crate::AppState;

use super::audit::{audit_log, ClientIp};
use super::auth::{AdminUser, AuthUser};
use super::error::{ApiError, ValidationErrorBuilder};
use super::extract::{AppJson, AppJsonOrDefault, AppQuery};
use super::metrics;
use super::validation::{validate_text_len, MAX_COMMENT_LENGTH};
use super::verifications::{self, VerificationRequest};

/// GET /api/daily-checks?database_id&start_date&end_date&status&verification_status
///
/// `database_id` accepts an id or short code.
pub async fn list_daily_checks(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    AppQuery(mut query): AppQuery<DailyCheckQuery>,
) -> Result<Json<Vec<DailyCheck>>, ApiError> {
    if let Some(key) = query.database_id.take() {
        let database = DatabaseInstance::resolve(&state.db, &key)
            .await?
            .ok_or_else(|| ApiError::not_found("Database not found"))?;
        query.database_id = Some(database.id);
    }

    let checks = DailyCheck::list(&state.db, &query).await?;
    Ok(Json(checks))
}

/// POST /api/daily-checks
///
/// Creates or overwrites the record for (database, check type, date).
pub async fn create_daily_check(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ip: ClientIp,
    AppJson(req): AppJson<CreateDailyCheckRequest>,
) -> Result<(StatusCode, Json<DailyCheck>), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    errors
        .check("value", validate_text_len(req.value.as_deref(), MAX_COMMENT_LENGTH))
        .check("comment", validate_text_len(req.comment.as_deref(), MAX_COMMENT_LENGTH));
    errors.finish()?;

    let submitter = Submitter {
        user_id: &user.id,
        role: user.role,
        today: chrono::Utc::now().date_naive(),
    };
    let record = submit_daily(&state.db, &req, submitter).await?;
    metrics::record_submission(CheckKind::Daily);

    tracing::info!(
        database = %record.database_short_code,
        check_type = %record.check_type_name,
        check_date = %record.check_date,
        status = %record.status,
        "Daily check submitted"
    );

    audit_log(
        &state,
        actions::DAILY_CHECK_SUBMIT,
        resource_types::DAILY_CHECK,
        Some(&record.id),
        Some(&format!(
            "{} / {} / {}",
            record.database_short_code, record.check_type_name, record.check_date
        )),
        Some(&user.id),
        ip.as_deref(),
        Some(serde_json::json!({ "status": record.status })),
    )
    .await;

    Ok((StatusCode::CREATED, Json(record)))
}

/// PUT /api/daily-checks/:id/verify
pub async fn verify_daily_check(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    ip: ClientIp,
    Path(id): Path<String>,
    AppJsonOrDefault(req): AppJsonOrDefault<VerificationRequest>,
) -> Result<Json<DailyCheck>, ApiError> {
    verifications::apply(&state, &admin, &ip, CheckKind::Daily, &id, VerificationStatus::Verified, req)
        .await?;
    fetch(&state, &id).await
}

/// PUT /api/daily-checks/:id/reject
pub async fn reject_daily_check(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    ip: ClientIp,
    Path(id): Path<String>,
    AppJsonOrDefault(req): AppJsonOrDefault<VerificationRequest>,
) -> Result<Json<DailyCheck>, ApiError> {
    verifications::apply(&state, &admin, &ip, CheckKind::Daily, &id, VerificationStatus::Rejected, req)
        .await?;
    fetch(&state, &id).await
}

async fn fetch(state: &AppState, id: &str) -> Result<Json<DailyCheck>, ApiError> {
    let record = DailyCheck::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Daily check not found"))?;
    Ok(Json(record))
}
