//! User administration: approval and roles.

use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use crate::db::{
    actions, resource_types, ApprovalStatus, UpdateRoleRequest, User, UserListQuery, UserResponse,
};
use crate::engine::approval;
use crate::AppState;

use super::audit::{audit_log, ClientIp};
use super::auth::AdminUser;
use super::error::ApiError;
use super::extract::{AppJson, AppQuery};

/// GET /api/users?approval_status=
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    AppQuery(query): AppQuery<UserListQuery>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let users = User::list(&state.db, query.approval_status).await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// PUT /api/users/:id/approve
pub async fn approve_user(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    ip: ClientIp,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>, ApiError> {
    set_approval(&state, &admin.id, &ip, &id, ApprovalStatus::Approved).await
}

/// PUT /api/users/:id/reject
///
/// Also revokes a previously approved account.
pub async fn reject_user(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    ip: ClientIp,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>, ApiError> {
    if admin.id == id {
        return Err(ApiError::validation_field("id", "You cannot reject your own account"));
    }
    set_approval(&state, &admin.id, &ip, &id, ApprovalStatus::Rejected).await
}

async fn set_approval(
    state: &AppState,
    admin_id: &str,
    ip: &ClientIp,
    id: &str,
    target: ApprovalStatus,
) -> Result<Json<UserResponse>, ApiError> {
    let (user, changed) = approval::set_approval(&state.db, id, target).await?;

    if changed {
        let action = match target {
            ApprovalStatus::Approved => actions::USER_APPROVE,
            _ => actions::USER_REJECT,
        };
        audit_log(
            state,
            action,
            resource_types::USER,
            Some(&user.id),
            Some(&user.email),
            Some(admin_id),
            ip.as_deref(),
            None,
        )
        .await;
    }

    Ok(Json(UserResponse::from(user)))
}

/// PUT /api/users/:id/role
pub async fn update_role(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    ip: ClientIp,
    Path(id): Path<String>,
    AppJson(req): AppJson<UpdateRoleRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let (user, changed) = approval::set_role(&state.db, &admin.id, &id, req.role).await?;

    if changed {
        audit_log(
            &state,
            actions::USER_ROLE_CHANGE,
            resource_types::USER,
            Some(&user.id),
            Some(&user.email),
            Some(&admin.id),
            ip.as_deref(),
            Some(serde_json::json!({ "role": req.role })),
        )
        .await;
    }

    Ok(Json(UserResponse::from(user)))
}
