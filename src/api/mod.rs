mod access;
pub mod audit;
pub mod auth;
mod check_types;
mod daily_checks;
mod dashboard;
mod databases;
pub mod error;
mod extract;
pub mod metrics;
pub mod rate_limit;
mod system;
mod users;
mod validation;
mod verifications;
mod weekly_checks;

#[cfg(test)]
mod tests;

pub use access::authorize;
pub use auth::{authenticate, ensure_admin_user, AdminUser, AuthUser, UserContext};
pub use error::{ApiError, ErrorCode};

use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::AppState;

fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    match origin {
        None => layer.allow_origin(Any),
        Some(origin) => match origin.parse::<HeaderValue>() {
            Ok(value) => layer.allow_origin(value),
            Err(_) => {
                tracing::warn!(origin = origin, "Invalid server.cors_origin, cross-origin requests are disabled");
                layer
            }
        },
    }
}

pub fn create_router(state: Arc<AppState>) -> Router {
    // Public auth routes with their own, stricter rate limit
    let auth_routes = Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_auth,
        ));

    // Gated per handler by the AuthUser / AdminUser extractors
    let api_routes = Router::new()
        .route("/health", get(system::health_check))
        .route("/auth/me", get(auth::me))
        // Users
        .route("/users", get(users::list_users))
        .route("/users/:id/approve", put(users::approve_user))
        .route("/users/:id/reject", put(users::reject_user))
        .route("/users/:id/role", put(users::update_role))
        // Databases
        .route("/databases", get(databases::list_databases))
        .route("/databases", post(databases::create_database))
        .route("/databases/:id", get(databases::get_database))
        .route("/databases/:id", delete(databases::delete_database))
        // Check types
        .route("/check-types", get(check_types::list_check_types))
        .route("/check-types", post(check_types::create_check_type))
        .route("/check-types/:id", delete(check_types::delete_check_type))
        // Daily checks
        .route("/daily-checks", get(daily_checks::list_daily_checks))
        .route("/daily-checks", post(daily_checks::create_daily_check))
        .route("/daily-checks/:id/verify", put(daily_checks::verify_daily_check))
        .route("/daily-checks/:id/reject", put(daily_checks::reject_daily_check))
        // Weekly checks
        .route("/weekly-checks", get(weekly_checks::list_weekly_checks))
        .route("/weekly-checks", post(weekly_checks::create_weekly_check))
        .route("/weekly-checks/:id/verify", put(weekly_checks::verify_weekly_check))
        .route("/weekly-checks/:id/reject", put(weekly_checks::reject_weekly_check))
        // Verification queue
        .route("/verifications/pending", get(verifications::list_pending))
        // Dashboard and reports
        .route("/dashboard/health", get(dashboard::health_overview))
        .route("/dashboard/trends", get(dashboard::trends))
        .route("/dashboard/tablespaces", get(dashboard::tablespaces))
        .route("/dashboard/verification", get(dashboard::verification))
        .route("/reports/daily", get(dashboard::daily_report))
        // Audit trail
        .route("/audit-logs", get(audit::list_logs))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_api,
        ));

    let mut router = Router::new()
        .route("/health", get(system::health_check))
        .merge(auth_routes)
        .nest("/api", api_routes);

    if state.config.metrics.enabled {
        router = router
            .route("/metrics", get(metrics::metrics_endpoint))
            .layer(middleware::from_fn(metrics::metrics_middleware));
    }

    router
        .layer(cors_layer(state.config.server.cors_origin.as_deref()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
