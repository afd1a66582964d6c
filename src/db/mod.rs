mod error;
mod models;
mod seeders;

pub use error::{is_foreign_key_violation, is_unique_violation, StoreError};
pub use models::*;
pub use seeders::{seed_check_types, seed_reference_databases};

use anyhow::Result;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
    SqlitePool,
};
use std::path::Path;
use std::str::FromStr;
use tracing::info;

pub type DbPool = SqlitePool;

/// Tables every running instance must have
pub const REQUIRED_TABLES: [&str; 6] = [
    "users",
    "databases",
    "check_types",
    "daily_checks",
    "weekly_checks",
    "audit_logs",
];

/// Drop `--` comment lines so a `;` inside a comment never splits a statement
fn strip_sql_comments(sql: &str) -> String {
    sql.lines()
        .filter(|line| !line.trim_start().starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Execute a SQL migration file, properly handling comments
async fn execute_sql(pool: &SqlitePool, sql: &str) -> Result<()> {
    for statement in strip_sql_comments(sql).split(';') {
        let trimmed = statement.trim();
        if !trimmed.is_empty() {
            sqlx::query(trimmed).execute(pool).await?;
        }
    }
    Ok(())
}

pub async fn init(data_dir: &Path) -> Result<DbPool> {
    std::fs::create_dir_all(data_dir)?;
    let db_path = data_dir.join("dbmonitor.db");

    info!("Initializing database at {}", db_path.display());

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    info!("Database initialized successfully");
    Ok(pool)
}

/// Single-connection in-memory database with the schema applied.
/// Every connection to `:memory:` is its own database, so the pool never
/// opens a second one.
pub async fn init_in_memory() -> Result<DbPool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;
    Ok(pool)
}

async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    info!("Running database migrations...");

    // Migration 001: Initial schema
    let has_users_table: Option<(String,)> = sqlx::query_as(
        "SELECT name FROM sqlite_master WHERE type='table' AND name='users'"
    )
    .fetch_optional(pool)
    .await?;
    let has_audit_table: Option<(String,)> = sqlx::query_as(
        "SELECT name FROM sqlite_master WHERE type='table' AND name='audit_logs'"
    )
    .fetch_optional(pool)
    .await?;
    if has_users_table.is_none() || has_audit_table.is_none() {
        execute_sql(pool, include_str!("../../migrations/001_initial.sql")).await?;
    }

    info!("Migrations complete");
    Ok(())
}

/// Names of required tables missing from the schema
pub async fn missing_tables(pool: &SqlitePool) -> Result<Vec<&'static str>, sqlx::Error> {
    let present: Vec<(String,)> =
        sqlx::query_as("SELECT name FROM sqlite_master WHERE type='table'")
            .fetch_all(pool)
            .await?;
    Ok(REQUIRED_TABLES
        .into_iter()
        .filter(|t| !present.iter().any(|(name,)| name == t))
        .collect())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Ids of the rows created by [`fixture`]
    pub struct Fixture {
        pub admin_id: String,
        pub user_id: String,
        pub database_id: String,
        pub daily_check_type_id: String,
        pub weekly_check_type_id: String,
    }

    /// In-memory store with one approved admin, one approved user, one
    /// primary database `testdb` and a daily and weekly check type.
    pub async fn fixture() -> (DbPool, Fixture) {
        let db = init_in_memory().await.unwrap();

        let mut ids = Vec::new();
        for (email, role) in [("admin@x.com", Role::Admin), ("user@x.com", Role::User)] {
            let user = User::create(
                &db,
                NewUser {
                    email,
                    password_hash: "unused",
                    name: "Fixture",
                    role,
                    approval_status: ApprovalStatus::Approved,
                },
            )
            .await
            .unwrap();
            ids.push(user.id);
        }

        let database = DatabaseInstance::create(
            &db,
            &CreateDatabaseRequest {
                database_name: "Test Database".into(),
                short_code: "testdb".into(),
                instance_name: "TESTDB01".into(),
                ip_address: None,
                host_name: None,
                vcpu: None,
                ram: None,
                sga: None,
                software_version: None,
                os_version: None,
                db_type: DatabaseType::Primary,
            },
        )
        .await
        .unwrap();

        let mut check_type_ids = Vec::new();
        for (name, weekly) in [("Listener Status", false), ("Tablespace Usage", true)] {
            let ct = CheckType::create(
                &db,
                &CreateCheckTypeRequest {
                    name: name.into(),
                    description: None,
                    database_types: vec![DatabaseType::Primary],
                    is_daily: !weekly,
                    is_weekly: weekly,
                    display_order: 1,
                },
            )
            .await
            .unwrap();
            check_type_ids.push(ct.id);
        }

        let fixture = Fixture {
            admin_id: ids[0].clone(),
            user_id: ids[1].clone(),
            database_id: database.id,
            daily_check_type_id: check_type_ids[0].clone(),
            weekly_check_type_id: check_type_ids[1].clone(),
        };
        (db, fixture)
    }
}
