//! End-to-end tests through the full router.

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use crate::config::Config;
use crate::db::{self, init_in_memory};
use crate::engine::CHECK_TEMPLATES;
use crate::AppState;

use super::{create_router, ensure_admin_user};

const ADMIN_EMAIL: &str = "admin@dbmonitor.local";
const ADMIN_PASSWORD: &str = "admin-pass-1";

async fn test_app() -> Router {
    test_app_with(|_| {}).await
}

async fn test_app_with(customize: impl FnOnce(&mut Config)) -> Router {
    let mut config = Config::default();
    config.rate_limit.enabled = false;
    config.metrics.enabled = false;
    config.auth.jwt_secret = Some("0123456789abcdef0123456789abcdef".into());
    config.auth.admin_email = Some(ADMIN_EMAIL.into());
    config.auth.admin_password = Some(ADMIN_PASSWORD.into());

    let pool = init_in_memory().await.unwrap();
    db::seed_check_types(&pool, CHECK_TEMPLATES).await.unwrap();
    db::seed_reference_databases(&pool).await.unwrap();
    customize(&mut config);
    ensure_admin_user(&pool, &config.auth).await.unwrap();

    create_router(Arc::new(AppState::new(config, pool)))
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn login(app: &Router, email: &str, password: &str) -> (StatusCode, Value) {
    send(
        app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": email, "password": password })),
    )
    .await
}

async fn token_for(app: &Router, email: &str, password: &str) -> String {
    let (status, body) = login(app, email, password).await;
    assert_eq!(status, StatusCode::OK, "login failed: {}", body);
    body["token"].as_str().unwrap().to_string()
}

/// Register a user and approve it, returning (user id, token)
async fn approved_user(app: &Router, admin_token: &str, email: &str) -> (String, String) {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({ "email": email, "password": "pw123456", "name": "Operator" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["user"]["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        app,
        Method::PUT,
        &format!("/api/users/{}/approve", id),
        Some(admin_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let token = token_for(app, email, "pw123456").await;
    (id, token)
}

#[tokio::test]
async fn test_liveness_is_public() {
    let app = test_app().await;

    let (status, body) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "connected");

    let (status, _) = send(&app, Method::GET, "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_registration_requires_approval_before_login() {
    let app = test_app().await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({ "email": "a@x.com", "password": "pw123456", "name": "A" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["approval_status"], "pending");
    assert_eq!(body["user"]["role"], "user");
    let user_id = body["user"]["id"].as_str().unwrap().to_string();

    let (status, body) = login(&app, "a@x.com", "pw123456").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "account_not_approved");
    assert_eq!(body["status"], "pending");

    let admin = token_for(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/api/users/{}/approve", user_id),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["approval_status"], "approved");

    let (status, body) = login(&app, "a@x.com", "pw123456").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].as_str().is_some());
}

#[tokio::test]
async fn test_duplicate_registration_and_bad_credentials() {
    let app = test_app().await;

    let register = json!({ "email": "dup@x.com", "password": "pw123456", "name": "Dup" });
    let (status, _) = send(&app, Method::POST, "/api/auth/register", None, Some(register.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = send(&app, Method::POST, "/api/auth/register", None, Some(register)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "duplicate_email");

    let (status, body) = login(&app, ADMIN_EMAIL, "wrong-password-1").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "invalid_credentials");

    let (status, body) = login(&app, "nobody@x.com", "pw123456").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "invalid_credentials");
}

#[tokio::test]
async fn test_registration_validation_errors() {
    let app = test_app().await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({ "email": "not-an-email", "password": "short", "name": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");
    assert!(body["details"]["email"].is_array());
    assert!(body["details"]["password"].is_array());
    assert!(body["details"]["name"].is_array());
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let app = test_app().await;

    let (status, body) = send(&app, Method::GET, "/api/databases", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthorized");

    let (status, _) = send(&app, Method::GET, "/api/databases", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_non_admin_is_forbidden_from_admin_routes() {
    let app = test_app().await;
    let admin = token_for(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    let (_, user) = approved_user(&app, &admin, "op@x.com").await;

    let (status, body) = send(&app, Method::GET, "/api/users", Some(&user), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");

    let (status, _) = send(&app, Method::GET, "/api/audit-logs", Some(&user), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, Method::GET, "/api/databases", Some(&user), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_daily_check_flow() {
    let app = test_app().await;
    let admin = token_for(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    let (_, user) = approved_user(&app, &admin, "a@x.com").await;

    let (status, record) = send(
        &app,
        Method::POST,
        "/api/daily-checks",
        Some(&user),
        Some(json!({
            "database_id": "cprdb",
            "check_type_id": "DB Instance Availability",
            "status": "fail",
            "comment": "Instance down since 02:00"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", record);
    assert_eq!(record["status"], "fail");
    assert_eq!(record["verification_status"], "pending");
    assert_eq!(record["database_short_code"], "cprdb");
    let record_id = record["id"].as_str().unwrap().to_string();

    let (status, list) =
        send(&app, Method::GET, "/api/daily-checks?database_id=cprdb", Some(&user), None).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = list
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|r| r["id"].as_str())
        .collect();
    assert_eq!(ids, vec![record_id.as_str()]);

    let (status, overview) = send(&app, Method::GET, "/api/dashboard/health", Some(&user), None).await;
    assert_eq!(status, StatusCode::OK);
    let cprdb = overview["databases"]
        .as_array()
        .unwrap()
        .iter()
        .find(|d| d["short_code"] == "cprdb")
        .unwrap();
    assert_eq!(cprdb["health"], "critical");
    assert_eq!(cprdb["failed"], 1);

    // Users cannot verify
    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/api/daily-checks/{}/verify", record_id),
        Some(&user),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, pending) =
        send(&app, Method::GET, "/api/verifications/pending", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pending["total"], 1);

    let (status, verified) = send(
        &app,
        Method::PUT,
        &format!("/api/daily-checks/{}/verify", record_id),
        Some(&admin),
        Some(json!({ "comment": "Confirmed with ops" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(verified["verification_status"], "verified");
    assert_eq!(verified["verification_comment"], "Confirmed with ops");

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/api/daily-checks/{}/reject", record_id),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "invalid_transition");
}

#[tokio::test]
async fn test_unknown_references_are_reported() {
    let app = test_app().await;
    let admin = token_for(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let (status, _) =
        send(&app, Method::GET, "/api/daily-checks?database_id=nosuchdb", Some(&admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, Method::GET, "/api/databases/nosuchdb", Some(&admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/daily-checks",
        Some(&admin),
        Some(json!({
            "database_id": "nosuchdb",
            "check_type_id": "DB Instance Availability",
            "status": "pass"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "foreign_key_violation");

    let (status, _) = send(
        &app,
        Method::PUT,
        "/api/weekly-checks/missing/verify",
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_role_and_approval_changes_apply_to_live_tokens() {
    let app = test_app().await;
    let admin = token_for(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    let (user_id, user) = approved_user(&app, &admin, "b@x.com").await;

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/api/users/{}/role", user_id),
        Some(&admin),
        Some(json!({ "role": "admin" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "admin");

    // Same token, new role
    let (status, _) = send(&app, Method::GET, "/api/users", Some(&user), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/api/users/{}/role", user_id),
        Some(&admin),
        Some(json!({ "role": "user" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, Method::GET, "/api/users", Some(&user), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/api/users/{}/reject", user_id),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, Method::GET, "/api/auth/me", Some(&user), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_manages_fleet_and_audit_trail() {
    let app = test_app().await;
    let admin = token_for(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let (status, created) = send(
        &app,
        Method::POST,
        "/api/databases",
        Some(&admin),
        Some(json!({
            "database_name": "Reporting Database",
            "short_code": "rptdb",
            "instance_name": "RPTDB01",
            "db_type": "pilot"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", created);
    assert_eq!(created["short_code"], "rptdb");

    let (status, fetched) = send(&app, Method::GET, "/api/databases/rptdb", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["id"], created["id"]);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/databases",
        Some(&admin),
        Some(json!({
            "database_name": "Reporting Database Copy",
            "short_code": "rptdb",
            "instance_name": "RPTDB02",
            "db_type": "pilot"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");

    let (status, logs) = send(&app, Method::GET, "/api/audit-logs", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    let actions: Vec<&str> = logs["items"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|l| l["action"].as_str())
        .collect();
    assert!(actions.contains(&"database.create"));
    assert!(actions.contains(&"auth.login"));
}

#[tokio::test]
async fn test_dashboard_query_validation() {
    let app = test_app().await;
    let admin = token_for(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let (status, _) = send(&app, Method::GET, "/api/dashboard/trends?days=0", Some(&admin), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, trend) = send(&app, Method::GET, "/api/dashboard/trends?days=7", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(trend.is_array());

    let (status, _) = send(&app, Method::GET, "/api/dashboard/tablespaces", Some(&admin), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) =
        send(&app, Method::GET, "/api/reports/daily?date=yesterday", Some(&admin), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, Method::GET, "/api/reports/daily", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_malformed_verification_body_is_rejected() {
    let app = test_app().await;
    let admin = token_for(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    let (_, user) = approved_user(&app, &admin, "c@x.com").await;

    let (status, record) = send(
        &app,
        Method::POST,
        "/api/daily-checks",
        Some(&user),
        Some(json!({
            "database_id": "cprdb",
            "check_type_id": "DB Instance Availability",
            "status": "pass"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let uri = format!("/api/daily-checks/{}/reject", record["id"].as_str().unwrap());

    let (status, body) = send(&app, Method::PUT, &uri, Some(&admin), Some(json!({ "comment": 42 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");

    // The record was left untouched
    let (_, list) = send(&app, Method::GET, "/api/daily-checks?database_id=cprdb", Some(&user), None).await;
    assert_eq!(list[0]["verification_status"], "pending");

    // No body at all still applies the transition
    let (status, rejected) = send(&app, Method::PUT, &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rejected["verification_status"], "rejected");
}

#[tokio::test]
async fn test_rotating_forwarded_header_does_not_reset_login_budget() {
    let app = test_app_with(|config| {
        config.rate_limit.enabled = true;
        config.rate_limit.auth_requests_per_window = 3;
    })
    .await;

    let mut statuses = Vec::new();
    for i in 0..8 {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-forwarded-for", format!("10.0.0.{}", i))
            .body(Body::from(
                json!({ "email": ADMIN_EMAIL, "password": "wrong-password-1" }).to_string(),
            ))
            .unwrap();
        statuses.push(app.clone().oneshot(request).await.unwrap().status());
    }

    assert!(statuses[..3].iter().all(|s| *s == StatusCode::UNAUTHORIZED));
    assert!(statuses[3..].iter().all(|s| *s == StatusCode::TOO_MANY_REQUESTS));
}
