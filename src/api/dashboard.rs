//! Dashboard read models and the daily report.

use axum::{extract::State, Json};
use chrono::NaiveDate;
use serde::Deserialize;
use std::sync::Arc;

use crate::db::DatabaseInstance;
use crate::engine::health::{
    self, DailyReport, HealthOverview, TablespaceReport, TrendPoint, VerificationSummary,
};
use crate::AppState;

use super::auth::AuthUser;
use super::error::ApiError;
use super::extract::AppQuery;

pub const DEFAULT_TREND_DAYS: u32 = 30;
pub const MAX_TREND_DAYS: u32 = 366;

#[derive(Debug, Deserialize)]
pub struct TrendQuery {
    pub days: Option<u32>,
    pub database_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TablespaceQuery {
    pub database_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub date: Option<String>,
}

async fn resolve_database(state: &AppState, key: &str) -> Result<DatabaseInstance, ApiError> {
    DatabaseInstance::resolve(&state.db, key)
        .await?
        .ok_or_else(|| ApiError::not_found("Database not found"))
}

/// GET /api/dashboard/health
pub async fn health_overview(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
) -> Result<Json<HealthOverview>, ApiError> {
    let overview = health::health_overview(&state.db).await?;
    Ok(Json(overview))
}

/// GET /api/dashboard/trends?days&database_id
pub async fn trends(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    AppQuery(query): AppQuery<TrendQuery>,
) -> Result<Json<Vec<TrendPoint>>, ApiError> {
    let days = query.days.unwrap_or(DEFAULT_TREND_DAYS);
    if days == 0 || days > MAX_TREND_DAYS {
        return Err(ApiError::validation_field(
            "days",
            format!("Must be between 1 and {}", MAX_TREND_DAYS),
        ));
    }

    let database_id = match &query.database_id {
        Some(key) => Some(resolve_database(&state, key).await?.id),
        None => None,
    };

    let today = chrono::Utc::now().date_naive();
    let points = health::trends(&state.db, today, days, database_id.as_deref()).await?;
    Ok(Json(points))
}

/// GET /api/dashboard/tablespaces?database_id
pub async fn tablespaces(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    AppQuery(query): AppQuery<TablespaceQuery>,
) -> Result<Json<TablespaceReport>, ApiError> {
    let key = query
        .database_id
        .ok_or_else(|| ApiError::validation_field("database_id", "database_id is required"))?;
    let instance = resolve_database(&state, &key).await?;
    let report = health::tablespace_report(&state.db, &instance).await?;
    Ok(Json(report))
}

/// GET /api/dashboard/verification
pub async fn verification(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
) -> Result<Json<VerificationSummary>, ApiError> {
    let summary = health::verification_summary(&state.db).await?;
    Ok(Json(summary))
}

/// GET /api/reports/daily?date
pub async fn daily_report(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    AppQuery(query): AppQuery<ReportQuery>,
) -> Result<Json<DailyReport>, ApiError> {
    let date = match query.date.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|_| ApiError::validation_field("date", "Date must be in YYYY-MM-DD format"))?,
        None => chrono::Utc::now().date_naive(),
    };
    let report = health::daily_report(&state.db, date).await?;
    Ok(Json(report))
}
