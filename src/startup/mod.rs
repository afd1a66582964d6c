//! Startup self-checks module
//!
//! This module performs system verification before the server starts accepting requests.
//! Checks include:
//! - Database connectivity and schema
//! - Check catalogue consistency
//! - Signing secret strength and administrator presence
//! - Data directory writability

use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::crypto::MIN_SECRET_LENGTH;
use crate::db::{self, User};
use crate::engine::{validate_catalog, CHECK_TEMPLATES};
use crate::DbPool;

/// Result of a single startup check
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    /// Name of the check
    pub name: String,
    /// Whether the check passed
    pub passed: bool,
    /// Whether this check is critical (failure should abort startup)
    pub critical: bool,
    /// Human-readable message describing the result
    pub message: String,
    /// Additional details (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl CheckResult {
    pub fn pass(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            critical: false,
            message: message.into(),
            details: None,
        }
    }

    pub fn fail(name: impl Into<String>, message: impl Into<String>, critical: bool) -> Self {
        Self {
            name: name.into(),
            passed: false,
            critical,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Aggregated startup check results
#[derive(Debug, Clone, Serialize)]
pub struct StartupCheckReport {
    pub checks: Vec<CheckResult>,
    pub all_critical_passed: bool,
    pub all_passed: bool,
    pub summary: String,
}

impl StartupCheckReport {
    pub fn new(checks: Vec<CheckResult>) -> Self {
        let all_critical_passed = checks.iter().filter(|c| c.critical).all(|c| c.passed);
        let all_passed = checks.iter().all(|c| c.passed);

        let failed_critical = checks.iter().filter(|c| c.critical && !c.passed).count();
        let failed_non_critical = checks.iter().filter(|c| !c.critical && !c.passed).count();
        let total = checks.len();
        let passed = checks.iter().filter(|c| c.passed).count();

        let summary = if all_passed {
            format!("All {} startup checks passed", total)
        } else if all_critical_passed {
            format!(
                "{}/{} checks passed ({} non-critical warnings)",
                passed, total, failed_non_critical
            )
        } else {
            format!(
                "{}/{} checks passed ({} critical failures)",
                passed, total, failed_critical
            )
        };

        Self {
            checks,
            all_critical_passed,
            all_passed,
            summary,
        }
    }

    /// Names of the failed critical checks
    pub fn critical_failures(&self) -> Vec<&str> {
        self.checks
            .iter()
            .filter(|c| c.critical && !c.passed)
            .map(|c| c.name.as_str())
            .collect()
    }
}

/// Run all startup self-checks
pub async fn run_startup_checks(config: &Config, db: &DbPool) -> StartupCheckReport {
    info!("Running startup self-checks...");

    let checks = vec![
        check_database_connectivity(db).await,
        check_database_schema(db).await,
        check_catalog(),
        check_jwt_secret(config),
        check_admin_present(db).await,
        check_directory_writability(config),
    ];

    let report = StartupCheckReport::new(checks);

    for check in &report.checks {
        if check.passed {
            info!(
                check = %check.name,
                message = %check.message,
                "Startup check PASSED"
            );
        } else if check.critical {
            error!(
                check = %check.name,
                message = %check.message,
                details = ?check.details,
                "Startup check FAILED (CRITICAL)"
            );
        } else {
            warn!(
                check = %check.name,
                message = %check.message,
                details = ?check.details,
                "Startup check FAILED (non-critical)"
            );
        }
    }

    info!(
        summary = %report.summary,
        all_passed = report.all_passed,
        all_critical_passed = report.all_critical_passed,
        "Startup checks completed"
    );

    report
}

async fn check_database_connectivity(db: &DbPool) -> CheckResult {
    match sqlx::query("SELECT 1").fetch_one(db).await {
        Ok(_) => CheckResult::pass("database_connectivity", "Database connection successful"),
        Err(e) => CheckResult::fail("database_connectivity", "Failed to connect to database", true)
            .with_details(e.to_string()),
    }
}

async fn check_database_schema(db: &DbPool) -> CheckResult {
    match db::missing_tables(db).await {
        Ok(missing) if missing.is_empty() => CheckResult::pass(
            "database_schema",
            format!("Database schema valid ({} tables)", db::REQUIRED_TABLES.len()),
        ),
        Ok(missing) => CheckResult::fail("database_schema", "Missing essential database tables", true)
            .with_details(format!("Missing: {}", missing.join(", "))),
        Err(e) => CheckResult::fail("database_schema", "Failed to query database schema", true)
            .with_details(e.to_string()),
    }
}

/// Every category needs one template with a non-empty daily list
fn check_catalog() -> CheckResult {
    match validate_catalog(CHECK_TEMPLATES) {
        Ok(()) => CheckResult::pass(
            "check_catalog",
            format!("Check catalogue valid ({} categories)", CHECK_TEMPLATES.len()),
        ),
        Err(e) => CheckResult::fail("check_catalog", "Check catalogue is inconsistent", true)
            .with_details(e.to_string()),
    }
}

fn check_jwt_secret(config: &Config) -> CheckResult {
    match config.auth.jwt_secret.as_deref() {
        None | Some("") => CheckResult::fail(
            "jwt_secret",
            "No signing secret configured, sessions end on restart",
            false,
        )
        .with_details("Set auth.jwt_secret or DBMON_JWT_SECRET"),
        Some(secret) if secret.len() < MIN_SECRET_LENGTH => CheckResult::fail(
            "jwt_secret",
            "Signing secret is shorter than recommended",
            false,
        )
        .with_details(format!(
            "{} characters, at least {} recommended",
            secret.len(),
            MIN_SECRET_LENGTH
        )),
        Some(_) => CheckResult::pass("jwt_secret", "Signing secret configured"),
    }
}

async fn check_admin_present(db: &DbPool) -> CheckResult {
    match User::count_active_admins(db).await {
        Ok(0) => CheckResult::fail(
            "admin_present",
            "No approved administrator, new accounts cannot be approved",
            false,
        )
        .with_details("Set auth.admin_email and auth.admin_password to bootstrap one"),
        Ok(count) => CheckResult::pass(
            "admin_present",
            format!("{} approved administrator(s)", count),
        ),
        Err(e) => CheckResult::fail("admin_present", "Failed to count administrators", false)
            .with_details(e.to_string()),
    }
}

fn check_directory_writability(config: &Config) -> CheckResult {
    let data_dir = &config.server.data_dir;
    let test_file = data_dir.join(".dbmonitor_write_test");

    match std::fs::write(&test_file, "test") {
        Ok(_) => {
            let _ = std::fs::remove_file(&test_file);
            CheckResult::pass("directory_writability", "Data directory is writable")
                .with_details(format!("Path: {}", data_dir.display()))
        }
        Err(e) => CheckResult::fail("directory_writability", "Data directory is not writable", true)
            .with_details(format!("{}: {}", data_dir.display(), e)),
    }
}
