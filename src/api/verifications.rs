//! Verification queue and the shared verify/reject flow.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::db::{
    actions, resource_types, DailyCheck, DailyCheckQuery, VerificationStatus, WeeklyCheck,
    WeeklyCheckQuery,
};
use crate::engine::{verification, CheckKind, TransitionOutcome};
use crate::AppState;

use super::audit::{audit_log, ClientIp};
use super::auth::{AdminUser, UserContext};
use super::error::ApiError;
use super::metrics;
use super::validation::{validate_text_len, MAX_COMMENT_LENGTH};

/// Body of a verify or reject request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VerificationRequest {
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PendingVerifications {
    pub daily: Vec<DailyCheck>,
    pub weekly: Vec<WeeklyCheck>,
    pub total: usize,
}

/// GET /api/verifications/pending
pub async fn list_pending(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> Result<Json<PendingVerifications>, ApiError> {
    let daily = DailyCheck::list(
        &state.db,
        &DailyCheckQuery {
            verification_status: Some(VerificationStatus::Pending),
            ..Default::default()
        },
    )
    .await?;
    let weekly = WeeklyCheck::list(
        &state.db,
        &WeeklyCheckQuery {
            verification_status: Some(VerificationStatus::Pending),
            ..Default::default()
        },
    )
    .await?;

    let total = daily.len() + weekly.len();
    Ok(Json(PendingVerifications { daily, weekly, total }))
}

/// Apply a verify or reject to one record, auditing applied transitions
pub(crate) async fn apply(
    state: &AppState,
    admin: &UserContext,
    ip: &ClientIp,
    kind: CheckKind,
    id: &str,
    target: VerificationStatus,
    req: VerificationRequest,
) -> Result<(), ApiError> {
    let comment = req
        .comment
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());
    validate_text_len(comment, MAX_COMMENT_LENGTH)
        .map_err(|e| ApiError::validation_field("comment", e))?;

    let outcome = verification::transition(&state.db, kind, id, target, &admin.id, comment).await?;
    if outcome == TransitionOutcome::Unchanged {
        return Ok(());
    }

    metrics::record_verification(kind, target);
    let (action, resource_type) = match (kind, target) {
        (CheckKind::Daily, VerificationStatus::Rejected) => {
            (actions::DAILY_CHECK_REJECT, resource_types::DAILY_CHECK)
        }
        (CheckKind::Daily, _) => (actions::DAILY_CHECK_VERIFY, resource_types::DAILY_CHECK),
        (CheckKind::Weekly, VerificationStatus::Rejected) => {
            (actions::WEEKLY_CHECK_REJECT, resource_types::WEEKLY_CHECK)
        }
        (CheckKind::Weekly, _) => (actions::WEEKLY_CHECK_VERIFY, resource_types::WEEKLY_CHECK),
    };
    audit_log(
        state,
        action,
        resource_type,
        Some(id),
        None,
        Some(&admin.id),
        ip.as_deref(),
        comment.map(|c| serde_json::json!({ "comment": c })),
    )
    .await;

    Ok(())
}
