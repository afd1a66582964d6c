//! Prometheus metrics endpoint and HTTP request tracking middleware.
//!
//! This module provides:
//! - A `/metrics` endpoint that returns Prometheus-formatted metrics
//! - Middleware for tracking HTTP request counts and durations
//! - Helper functions to record logins, submissions and verifications

use axum::{
    body::Body,
    extract::{MatchedPath, State},
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use std::time::Instant;

use crate::crypto::secrets_match;
use crate::db::VerificationStatus;
use crate::engine::CheckKind;
use crate::AppState;

// Metric names as constants for consistency
pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";
pub const LOGINS_TOTAL: &str = "dbmonitor_logins_total";
pub const CHECK_SUBMISSIONS_TOTAL: &str = "dbmonitor_check_submissions_total";
pub const VERIFICATIONS_TOTAL: &str = "dbmonitor_verifications_total";
pub const DATABASES_ACTIVE: &str = "dbmonitor_databases_active";
pub const PENDING_VERIFICATIONS: &str = "dbmonitor_pending_verifications";

/// Install the Prometheus recorder and return a handle for rendering metrics.
///
/// This should be called once during application startup.
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))?;

    describe_counter!(HTTP_REQUESTS_TOTAL, "Total number of HTTP requests received");
    describe_histogram!(HTTP_REQUEST_DURATION_SECONDS, "HTTP request duration in seconds");
    describe_counter!(LOGINS_TOTAL, "Login attempts by outcome");
    describe_counter!(CHECK_SUBMISSIONS_TOTAL, "Daily and weekly check submissions");
    describe_counter!(VERIFICATIONS_TOTAL, "Applied verification transitions by target status");
    describe_gauge!(DATABASES_ACTIVE, "Number of active monitored databases");
    describe_gauge!(PENDING_VERIFICATIONS, "Check records waiting for verification");

    Ok(handle)
}

/// GET /metrics - Returns Prometheus-formatted metrics.
///
/// Open unless `metrics.token` is configured, in which case the same value
/// must be sent as a bearer token.
pub async fn metrics_endpoint(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    if let Some(expected) = &state.config.metrics.token {
        let provided = headers
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .unwrap_or("");
        if !secrets_match(provided, expected) {
            return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
        }
    }

    update_gauge_metrics(&state).await;

    match state.metrics_handle.as_ref() {
        Some(h) => (StatusCode::OK, h.render()).into_response(),
        None => (StatusCode::NOT_FOUND, "Metrics are disabled").into_response(),
    }
}

/// Refresh gauges from the store before rendering
async fn update_gauge_metrics(state: &AppState) {
    if let Ok(count) = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM databases WHERE is_active = 1")
        .fetch_one(&state.db)
        .await
    {
        gauge!(DATABASES_ACTIVE).set(count as f64);
    }

    if let Ok(count) = sqlx::query_scalar::<_, i64>(
        "SELECT (SELECT COUNT(*) FROM daily_checks WHERE verification_status = 'pending') \
         + (SELECT COUNT(*) FROM weekly_checks WHERE verification_status = 'pending')",
    )
    .fetch_one(&state.db)
    .await
    {
        gauge!(PENDING_VERIFICATIONS).set(count as f64);
    }
}

/// Middleware to track HTTP request metrics.
///
/// Records:
/// - `http_requests_total` counter with method, path, and status labels
/// - `http_request_duration_seconds` histogram with method and path labels
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();

    // Use the matched route template so ids don't explode label cardinality
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|mp| mp.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let method = request.method().to_string();

    let response = next.run(request).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    counter!(HTTP_REQUESTS_TOTAL, "method" => method.clone(), "path" => path.clone(), "status" => status).increment(1);
    histogram!(HTTP_REQUEST_DURATION_SECONDS, "method" => method, "path" => path).record(duration);

    response
}

/// Record a login attempt ("success" or the error code)
pub fn record_login(outcome: &str) {
    counter!(LOGINS_TOTAL, "outcome" => outcome.to_string()).increment(1);
}

/// Record an accepted check submission
pub fn record_submission(kind: CheckKind) {
    counter!(CHECK_SUBMISSIONS_TOTAL, "kind" => kind_label(kind)).increment(1);
}

/// Record an applied verification transition
pub fn record_verification(kind: CheckKind, to: VerificationStatus) {
    counter!(VERIFICATIONS_TOTAL, "kind" => kind_label(kind), "status" => to.as_str()).increment(1);
}

fn kind_label(kind: CheckKind) -> &'static str {
    match kind {
        CheckKind::Daily => "daily",
        CheckKind::Weekly => "weekly",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names() {
        // Prometheus naming conventions
        assert!(HTTP_REQUESTS_TOTAL.ends_with("_total"));
        assert!(LOGINS_TOTAL.ends_with("_total"));
        assert!(CHECK_SUBMISSIONS_TOTAL.ends_with("_total"));
        assert!(VERIFICATIONS_TOTAL.ends_with("_total"));
        assert!(HTTP_REQUEST_DURATION_SECONDS.ends_with("_seconds"));
    }

    #[test]
    fn test_recording_without_recorder_is_a_noop() {
        record_login("success");
        record_submission(CheckKind::Daily);
        record_verification(CheckKind::Weekly, VerificationStatus::Verified);
    }
}
