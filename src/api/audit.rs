//! Audit log API endpoints and helpers.

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts, State},
    http::{request::Parts, HeaderMap},
    Json,
};
use std::convert::Infallible;
use std::{net::SocketAddr, sync::Arc};

use crate::db::{list_audit_logs, log_audit, AuditLogListResponse, AuditLogQuery};
use crate::AppState;

use super::auth::AdminUser;
use super::error::ApiError;
use super::extract::AppQuery;

/// Extract client IP address from request headers or connection info.
/// With `trust_proxy_headers`, X-Forwarded-For and X-Real-IP are checked first;
/// otherwise only the connection info counts.
pub fn extract_client_ip(
    headers: &HeaderMap,
    conn_info: Option<&SocketAddr>,
    trust_proxy_headers: bool,
) -> Option<String> {
    if trust_proxy_headers {
        if let Some(ip) = forwarded_ip(headers) {
            return Some(ip);
        }
    }
    conn_info.map(|addr| addr.ip().to_string())
}

fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    // X-Forwarded-For is a comma-separated list, first is client
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|h| h.to_str().ok()) {
        if let Some(first_ip) = forwarded.split(',').next() {
            let ip = first_ip.trim();
            if !ip.is_empty() {
                return Some(ip.to_string());
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip").and_then(|h| h.to_str().ok()) {
        let ip = real_ip.trim();
        if !ip.is_empty() {
            return Some(ip.to_string());
        }
    }

    None
}

/// Caller address recorded in audit entries
#[derive(Debug, Clone, Default)]
pub struct ClientIp(pub Option<String>);

impl ClientIp {
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(ClientIp(extract_client_ip(
            &parts.headers,
            peer.as_ref(),
            state.config.server.trust_proxy_headers,
        )))
    }
}

/// Log an audit event. Failures are logged, never returned to the caller.
#[allow(clippy::too_many_arguments)]
pub async fn audit_log(
    state: &AppState,
    action: &str,
    resource_type: &str,
    resource_id: Option<&str>,
    resource_name: Option<&str>,
    user_id: Option<&str>,
    ip_address: Option<&str>,
    details: Option<serde_json::Value>,
) {
    if let Err(e) = log_audit(
        &state.db,
        action,
        resource_type,
        resource_id,
        resource_name,
        user_id,
        ip_address,
        details,
    )
    .await
    {
        tracing::warn!(
            action = action,
            resource_type = resource_type,
            error = %e,
            "Failed to create audit log entry"
        );
    }
}

/// List audit logs with filtering and pagination
///
/// Query parameters:
/// - action: Filter by action type (e.g., "daily_check.verify")
/// - resource_type: Filter by resource type (e.g., "user", "database")
/// - resource_id: Filter by specific resource ID
/// - user_id: Filter by acting user ID
/// - start_date / end_date: RFC 3339 bounds on created_at
/// - page: Page number (1-indexed, defaults to 1)
/// - per_page: Items per page (defaults to 50, max 100)
pub async fn list_logs(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    AppQuery(query): AppQuery<AuditLogQuery>,
) -> Result<Json<AuditLogListResponse>, ApiError> {
    let result = list_audit_logs(&state.db, &query).await?;
    Ok(Json(result))
}
