//! Database seeders for built-in reference data
//!
//! Check types are derived from the check catalogue and the monitored fleet
//! starts with the reference database instances. Both only run against
//! empty tables, so admin edits are never overwritten.

use anyhow::Result;
use sqlx::SqlitePool;
use tracing::info;

use crate::engine::catalog::{seed_definitions, CategoryTemplate};

/// Seed check types from the catalogue when the table is empty
pub async fn seed_check_types(pool: &SqlitePool, templates: &[CategoryTemplate]) -> Result<usize> {
    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM check_types")
        .fetch_one(pool)
        .await?;
    if existing > 0 {
        return Ok(0);
    }

    info!("Seeding check types from catalogue...");

    let definitions = seed_definitions(templates);
    let now = chrono::Utc::now().to_rfc3339();
    let mut tx = pool.begin().await?;
    for def in &definitions {
        sqlx::query(
            r#"
            INSERT INTO check_types (id, name, description, database_types, is_daily, is_weekly, display_order, is_active, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, 1, ?)
            "#,
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(def.name)
        .bind(def.description)
        .bind(serde_json::to_string(&def.database_types)?)
        .bind(def.is_daily)
        .bind(def.is_weekly)
        .bind(def.display_order)
        .bind(&now)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    info!("Seeded {} check types", definitions.len());
    Ok(definitions.len())
}

/// Seed the reference fleet when no database instance exists yet
pub async fn seed_reference_databases(pool: &SqlitePool) -> Result<usize> {
    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM databases")
        .fetch_one(pool)
        .await?;
    if existing > 0 {
        return Ok(0);
    }

    info!("Seeding reference database instances...");

    const OS: &str = "Oracle Enterprise Linux Release 8.9 (64-bit)";
    const ORACLE_19C: &str = "Oracle 19c 19.23.0.0 - 64 bit";

    // Format: (database_name, short_code, instance_name, host_name, vcpu, ram, sga, software_version, db_type)
    let instances: Vec<(&str, &str, &str, &str, i64, &str, Option<&str>, &str, &str)> = vec![
        ("Control Pro-Database (2-Node RAC)", "cprdb", "CPRDB01", "dpcckvmcprdb01", 24, "158 GB", Some("76 GB"), ORACLE_19C, "primary"),
        ("Control Pro-Database (2-Node RAC)", "cprdb2", "CPRDB02", "dpcckvmcprdb02", 24, "158 GB", Some("76 GB"), ORACLE_19C, "primary"),
        ("Standby-Database (2-Node RAC)", "cpsdb", "CPSDB01", "dpcckvmcpsdb01", 24, "128 GB", Some("21 GB"), ORACLE_19C, "standby"),
        ("Archive-Database (2-Node RAC)", "cpadb", "CPADB01", "dpcckvmcpadb01", 24, "158 GB", Some("20 GB"), ORACLE_19C, "archive"),
        ("GIS-Database (2-Node RAC)", "cpgdb", "CPGDB01", "dpcckvmcpgdb01", 24, "128 GB", None, ORACLE_19C, "gis"),
        ("Oracle Enterprise Manager", "oemdb", "CPEMDB01", "dpcckvmcpemdb01", 16, "158 GB", Some("7.5 GB"), "13c - 64 bit", "oem"),
        ("Audit Vault Server", "avs", "AVSERVER01", "dpcckvmavs01", 16, "64 GB", None, "Audit Vault 20.3", "audit_vault"),
        ("Database Firewall", "dbfw", "DBFW01", "dpcckvmdbfw01", 8, "32 GB", None, "Database Firewall 12.2", "firewall"),
    ];

    let count = instances.len();
    let now = chrono::Utc::now().to_rfc3339();
    let mut tx = pool.begin().await?;
    for (name, short_code, instance, host, vcpu, ram, sga, version, db_type) in instances {
        sqlx::query(
            r#"
            INSERT INTO databases
            (id, database_name, short_code, instance_name, host_name, vcpu, ram, sga, software_version, os_version, db_type, is_active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?)
            "#,
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(name)
        .bind(short_code)
        .bind(instance)
        .bind(host)
        .bind(vcpu)
        .bind(ram)
        .bind(sga)
        .bind(version)
        .bind(OS)
        .bind(db_type)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    info!("Seeded {} reference database instances", count);
    Ok(count)
}
