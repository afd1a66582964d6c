//! Read-side dashboard projections.
//!
//! Everything here is computed from stored check records on demand; nothing
//! is cached between requests.

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::HashMap;

use crate::db::{
    CheckStatus, DailyCheck, DailyCheckQuery, DatabaseInstance, TablespaceUsage,
    VerificationStatus, WeeklyCheck,
};

/// More warnings than this turn a database's health to `warning`
pub const WARNING_THRESHOLD: i64 = 2;

/// Tablespaces at or below this size are left out of the usage view
pub const MIN_TABLESPACE_GB: f64 = 1.0;

pub const MAX_TABLESPACES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Health {
    Healthy,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub passed: i64,
    pub failed: i64,
    pub warnings: i64,
    pub not_checked: i64,
}

impl StatusCounts {
    pub fn tally<I: IntoIterator<Item = CheckStatus>>(statuses: I) -> Self {
        let mut counts = StatusCounts::default();
        for status in statuses {
            counts.add(status, 1);
        }
        counts
    }

    fn add(&mut self, status: CheckStatus, n: i64) {
        match status {
            CheckStatus::Pass => self.passed += n,
            CheckStatus::Fail => self.failed += n,
            CheckStatus::Warning => self.warnings += n,
            CheckStatus::NotChecked => self.not_checked += n,
        }
    }

    pub fn total(&self) -> i64 {
        self.passed + self.failed + self.warnings + self.not_checked
    }
}

/// Critical if anything failed, warning if more than two warnings,
/// healthy otherwise (including no checks at all).
pub fn classify_counts(counts: &StatusCounts) -> Health {
    if counts.failed > 0 {
        Health::Critical
    } else if counts.warnings > WARNING_THRESHOLD {
        Health::Warning
    } else {
        Health::Healthy
    }
}

pub fn classify_health<I: IntoIterator<Item = CheckStatus>>(statuses: I) -> Health {
    classify_counts(&StatusCounts::tally(statuses))
}

#[derive(Debug, Clone, Serialize)]
pub struct DatabaseHealth {
    pub database_id: String,
    pub database_name: String,
    pub short_code: String,
    pub health: Health,
    pub last_checked: Option<String>,
    #[serde(flatten)]
    pub counts: StatusCounts,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct HealthTotals {
    pub healthy: usize,
    pub warning: usize,
    pub critical: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthOverview {
    pub databases: Vec<DatabaseHealth>,
    pub totals: HealthTotals,
}

/// Health of every active database, judged on its latest check date
pub async fn health_overview(db: &SqlitePool) -> Result<HealthOverview, sqlx::Error> {
    let databases = DatabaseInstance::list_active(db).await?;
    let latest = DailyCheck::latest_statuses(db).await?;

    let mut by_database: HashMap<String, (String, Vec<CheckStatus>)> = HashMap::new();
    for (database_id, check_date, status) in latest {
        by_database
            .entry(database_id)
            .or_insert_with(|| (check_date, Vec::new()))
            .1
            .push(status);
    }

    let mut totals = HealthTotals::default();
    let databases = databases
        .into_iter()
        .map(|instance| {
            let (last_checked, statuses) = match by_database.remove(&instance.id) {
                Some((date, statuses)) => (Some(date), statuses),
                None => (None, Vec::new()),
            };
            let counts = StatusCounts::tally(statuses);
            let health = classify_counts(&counts);
            match health {
                Health::Healthy => totals.healthy += 1,
                Health::Warning => totals.warning += 1,
                Health::Critical => totals.critical += 1,
            }
            DatabaseHealth {
                database_id: instance.id,
                database_name: instance.database_name,
                short_code: instance.short_code,
                health,
                last_checked,
                counts,
            }
        })
        .collect();

    Ok(HealthOverview { databases, totals })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrendPoint {
    pub date: String,
    #[serde(flatten)]
    pub counts: StatusCounts,
}

/// One point per day for `days` days ending at `end`, zero-filled
pub fn trend_series(
    end: NaiveDate,
    days: u32,
    rows: &[(String, CheckStatus, i64)],
) -> Vec<TrendPoint> {
    let start = end - Duration::days(i64::from(days.max(1)) - 1);
    let mut points: Vec<TrendPoint> = (0..days.max(1))
        .map(|offset| TrendPoint {
            date: (start + Duration::days(i64::from(offset)))
                .format("%Y-%m-%d")
                .to_string(),
            counts: StatusCounts::default(),
        })
        .collect();

    for (date, status, count) in rows {
        if let Some(point) = points.iter_mut().find(|p| &p.date == date) {
            point.counts.add(*status, *count);
        }
    }
    points
}

pub async fn trends(
    db: &SqlitePool,
    end: NaiveDate,
    days: u32,
    database_id: Option<&str>,
) -> Result<Vec<TrendPoint>, sqlx::Error> {
    let start = end - Duration::days(i64::from(days.max(1)) - 1);
    let rows = DailyCheck::status_counts_by_day(
        db,
        &start.format("%Y-%m-%d").to_string(),
        &end.format("%Y-%m-%d").to_string(),
        database_id,
    )
    .await?;
    Ok(trend_series(end, days, &rows))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TablespacePoint {
    pub name: String,
    pub total_gb: f64,
    pub used_gb: f64,
    pub used_percent: f64,
}

/// Tablespaces larger than 1 GB, first ten, with the percentage recomputed
pub fn tablespace_usage(tablespaces: &[TablespaceUsage]) -> Vec<TablespacePoint> {
    tablespaces
        .iter()
        .filter(|ts| ts.total_gb > MIN_TABLESPACE_GB)
        .take(MAX_TABLESPACES)
        .map(|ts| TablespacePoint {
            name: ts.name.clone(),
            total_gb: ts.total_gb,
            used_gb: ts.used_gb,
            used_percent: ts.expected_used_percent(),
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct TablespaceReport {
    pub database_id: String,
    pub week_number: Option<i64>,
    pub year: Option<i64>,
    pub tablespaces: Vec<TablespacePoint>,
}

pub async fn tablespace_report(
    db: &SqlitePool,
    instance: &DatabaseInstance,
) -> Result<TablespaceReport, sqlx::Error> {
    let latest = WeeklyCheck::latest_for_database(db, &instance.id).await?;
    Ok(match latest {
        Some(check) => TablespaceReport {
            database_id: instance.id.clone(),
            week_number: Some(check.week_number),
            year: Some(check.year),
            tablespaces: tablespace_usage(&check.tablespaces.0),
        },
        None => TablespaceReport {
            database_id: instance.id.clone(),
            week_number: None,
            year: None,
            tablespaces: Vec::new(),
        },
    })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VerificationCounts {
    pub pending: i64,
    pub verified: i64,
    pub rejected: i64,
}

impl VerificationCounts {
    fn from_rows(rows: Vec<(VerificationStatus, i64)>) -> Self {
        let mut counts = VerificationCounts::default();
        for (status, n) in rows {
            match status {
                VerificationStatus::Pending => counts.pending += n,
                VerificationStatus::Verified => counts.verified += n,
                VerificationStatus::Rejected => counts.rejected += n,
            }
        }
        counts
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VerificationSummary {
    pub daily: VerificationCounts,
    pub weekly: VerificationCounts,
    pub total_pending: i64,
}

pub async fn verification_summary(db: &SqlitePool) -> Result<VerificationSummary, sqlx::Error> {
    let daily: Vec<(VerificationStatus, i64)> = sqlx::query_as(
        "SELECT verification_status, COUNT(*) FROM daily_checks GROUP BY verification_status",
    )
    .fetch_all(db)
    .await?;
    let weekly: Vec<(VerificationStatus, i64)> = sqlx::query_as(
        "SELECT verification_status, COUNT(*) FROM weekly_checks GROUP BY verification_status",
    )
    .fetch_all(db)
    .await?;

    let daily = VerificationCounts::from_rows(daily);
    let weekly = VerificationCounts::from_rows(weekly);
    Ok(VerificationSummary {
        total_pending: daily.pending + weekly.pending,
        daily,
        weekly,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct DatabaseReport {
    pub database_id: String,
    pub database_name: String,
    pub short_code: String,
    pub health: Health,
    #[serde(flatten)]
    pub counts: StatusCounts,
    pub checks: Vec<DailyCheck>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyReport {
    pub date: String,
    pub databases: Vec<DatabaseReport>,
}

/// Every active database with its checks on `date`
pub async fn daily_report(db: &SqlitePool, date: NaiveDate) -> Result<DailyReport, sqlx::Error> {
    let date = date.format("%Y-%m-%d").to_string();
    let databases = DatabaseInstance::list_active(db).await?;
    let checks = DailyCheck::list(
        db,
        &DailyCheckQuery {
            start_date: Some(date.clone()),
            end_date: Some(date.clone()),
            ..Default::default()
        },
    )
    .await?;

    let mut by_database: HashMap<String, Vec<DailyCheck>> = HashMap::new();
    for check in checks {
        by_database.entry(check.database_id.clone()).or_default().push(check);
    }

    let databases = databases
        .into_iter()
        .map(|instance| {
            let checks = by_database.remove(&instance.id).unwrap_or_default();
            let counts = StatusCounts::tally(checks.iter().map(|c| c.status));
            DatabaseReport {
                database_id: instance.id,
                database_name: instance.database_name,
                short_code: instance.short_code,
                health: classify_counts(&counts),
                counts,
                checks,
            }
        })
        .collect();

    Ok(DailyReport { date, databases })
}

#[cfg(test)]
mod tests {
    use super::*;
    use CheckStatus::*;

    #[test]
    fn test_classification_vectors() {
        assert_eq!(classify_health([Fail, Pass, Pass]), Health::Critical);
        assert_eq!(classify_health([Warning, Warning, Warning, Pass]), Health::Warning);
        assert_eq!(classify_health([Warning, Warning, Pass]), Health::Healthy);
        assert_eq!(classify_health([Pass, Pass]), Health::Healthy);
        assert_eq!(classify_health([]), Health::Healthy);
    }

    #[test]
    fn test_classification_is_order_independent() {
        assert_eq!(
            classify_health([Pass, Warning, Fail]),
            classify_health([Fail, Warning, Pass])
        );
        assert_eq!(classify_health([Warning, Fail, Warning, Warning]), Health::Critical);
    }

    #[test]
    fn test_trend_series_zero_fills() {
        let end = NaiveDate::from_ymd_opt(2024, 3, 3).unwrap();
        let rows = vec![
            ("2024-03-01".to_string(), Pass, 4),
            ("2024-03-03".to_string(), Fail, 1),
            ("2024-03-03".to_string(), Warning, 2),
            ("2024-02-01".to_string(), Pass, 9),
        ];
        let series = trend_series(end, 3, &rows);

        assert_eq!(series.len(), 3);
        assert_eq!(series[0].date, "2024-03-01");
        assert_eq!(series[0].counts.passed, 4);
        assert_eq!(series[1].counts.total(), 0);
        assert_eq!(series[2].counts.failed, 1);
        assert_eq!(series[2].counts.warnings, 2);
    }

    #[test]
    fn test_tablespace_usage_filters_and_limits() {
        let mut tablespaces: Vec<TablespaceUsage> = (0..12)
            .map(|i| TablespaceUsage {
                name: format!("TS{}", i),
                total_gb: 10.0,
                used_gb: 3.33,
                free_gb: None,
                used_percent: Some(99.0),
            })
            .collect();
        tablespaces.insert(
            0,
            TablespaceUsage {
                name: "TINY".into(),
                total_gb: 0.5,
                used_gb: 0.1,
                free_gb: None,
                used_percent: None,
            },
        );

        let points = tablespace_usage(&tablespaces);
        assert_eq!(points.len(), MAX_TABLESPACES);
        assert_eq!(points[0].name, "TS0");
        assert_eq!(points[0].used_percent, 33.0);
    }
}
