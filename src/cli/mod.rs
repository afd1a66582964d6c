//! CLI module for the dbmonitor command-line interface.
//!
//! Without a subcommand the binary starts the server. Subcommands:
//! - `serve` - Start the server
//! - `status` - Show server liveness and, with a token, fleet health
//! - `check-config` - Validate configuration file
//! - `catalog` - Print the reference check catalogue

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use reqwest::Client;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::Config;
use crate::engine::{validate_catalog, CHECK_TEMPLATES};

/// CLI arguments structure
#[derive(Parser, Debug)]
#[command(name = "dbmonitor")]
#[command(author, version, about = "Database health check tracking with admin verification", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "dbmonitor.toml")]
    pub config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Override the listen host
    #[arg(long)]
    pub host: Option<String>,

    /// Override the listen port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Override the data directory
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Skip startup self-checks (for development only)
    #[arg(long)]
    pub skip_checks: bool,

    /// API URL to connect to
    #[arg(long, env = "DBMON_API_URL", default_value = "http://localhost:3001")]
    pub api_url: String,

    /// Session token for authenticated requests
    #[arg(long, env = "DBMON_TOKEN")]
    pub token: Option<String>,

    /// Subcommand to run (if none, starts the server)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the server (default)
    Serve,

    /// Show server status
    Status,

    /// Validate configuration file
    CheckConfig,

    /// Print the reference check catalogue
    Catalog,
}

impl Cli {
    /// Whether this invocation starts the server
    pub fn is_serve(&self) -> bool {
        matches!(self.command, None | Some(Commands::Serve))
    }

    /// Load the config file, then apply `DBMON_*` variables, then flags
    pub fn load_config(&self) -> Result<Config> {
        let mut config = Config::load(&self.config)?;
        config.apply_env_overrides()?;
        self.apply_overrides(&mut config);
        Ok(config)
    }

    fn apply_overrides(&self, config: &mut Config) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(data_dir) = &self.data_dir {
            config.server.data_dir = data_dir.clone();
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
    }
}

// ============================================================================
// API Response Types
// ============================================================================

/// Liveness payload from /health
#[derive(Debug, Deserialize)]
pub struct LivenessStatus {
    pub status: String,
    pub database: String,
    pub timestamp: String,
}

/// Fleet health from /api/dashboard/health
#[derive(Debug, Deserialize)]
pub struct FleetHealth {
    pub databases: Vec<FleetDatabase>,
    pub totals: FleetTotals,
}

#[derive(Debug, Deserialize)]
pub struct FleetDatabase {
    pub short_code: String,
    pub database_name: String,
    pub health: String,
    pub last_checked: Option<String>,
    pub failed: i64,
    pub warnings: i64,
}

#[derive(Debug, Deserialize)]
pub struct FleetTotals {
    pub healthy: usize,
    pub warning: usize,
    pub critical: usize,
}

// ============================================================================
// CLI Command Implementations
// ============================================================================

/// Create an HTTP client with optional auth token
fn create_client(token: Option<&str>) -> Result<Client> {
    let mut headers = reqwest::header::HeaderMap::new();
    if let Some(token) = token {
        headers.insert(
            reqwest::header::AUTHORIZATION,
            format!("Bearer {}", token)
                .parse()
                .context("Invalid token format")?,
        );
    }

    Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(30))
        .build()
        .context("Failed to create HTTP client")
}

/// Run a CLI command
pub async fn run_command(cli: &Cli) -> Result<()> {
    match &cli.command {
        Some(Commands::Status) => cmd_status(cli).await,
        Some(Commands::CheckConfig) => cmd_config_check(cli),
        Some(Commands::Catalog) => cmd_catalog(),
        // Serving is handled in main.rs
        Some(Commands::Serve) | None => Ok(()),
    }
}

/// Display server status
async fn cmd_status(cli: &Cli) -> Result<()> {
    let client = create_client(cli.token.as_deref())?;
    let base_url = cli.api_url.trim_end_matches('/');

    println!("Connecting to {}...", base_url);

    let response = client
        .get(format!("{}/health", base_url))
        .send()
        .await
        .context("Failed to connect to server. Is dbmonitor running?")?;

    let status = response.status();
    let liveness: LivenessStatus = response
        .json()
        .await
        .context("Failed to parse health response")?;

    println!();
    println!("=== dbmonitor Server Status ===");
    println!();
    println!("Server:     {} {}", icon(liveness.status == "ok"), liveness.status);
    println!("Database:   {} {}", icon(liveness.database == "connected"), liveness.database);
    println!("Checked at: {}", liveness.timestamp);

    if !status.is_success() {
        anyhow::bail!("Server reported unhealthy ({})", status);
    }

    if cli.token.is_none() {
        println!();
        println!("Set --token or DBMON_TOKEN to include fleet health.");
        return Ok(());
    }

    let response = client
        .get(format!("{}/api/dashboard/health", base_url))
        .send()
        .await
        .context("Failed to fetch fleet health")?;

    if response.status() == reqwest::StatusCode::UNAUTHORIZED {
        anyhow::bail!("Token rejected. Log in again to obtain a fresh one.");
    }
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("Server returned error {}: {}", status, body);
    }

    let fleet: FleetHealth = response
        .json()
        .await
        .context("Failed to parse fleet health")?;

    println!();
    println!(
        "Fleet:      {} healthy, {} warning, {} critical",
        fleet.totals.healthy, fleet.totals.warning, fleet.totals.critical
    );
    println!();
    println!(
        "  {:<10} {:<30} {:<9} {:>6} {:>6}  LAST CHECKED",
        "CODE", "NAME", "HEALTH", "FAIL", "WARN"
    );
    for db in &fleet.databases {
        println!(
            "  {:<10} {:<30} {:<9} {:>6} {:>6}  {}",
            truncate(&db.short_code, 10),
            truncate(&db.database_name, 30),
            db.health,
            db.failed,
            db.warnings,
            db.last_checked.as_deref().unwrap_or("-")
        );
    }

    Ok(())
}

fn icon(ok: bool) -> &'static str {
    if ok {
        "[OK]"
    } else {
        "[!!]"
    }
}

/// Validate the configuration file and print a summary
fn cmd_config_check(cli: &Cli) -> Result<()> {
    let config_path = &cli.config;

    println!("Checking configuration file: {}", config_path.display());
    println!();

    if !config_path.exists() {
        println!("[!!] Configuration file not found: {}", config_path.display());
        println!();
        println!("Defaults and DBMON_* environment variables will be used when starting the server.");
        return Ok(());
    }

    let config = match cli.load_config() {
        Ok(config) => config,
        Err(e) => {
            println!("[!!] Configuration is invalid!");
            println!();
            println!("Error: {:#}", e);
            anyhow::bail!("Invalid configuration");
        }
    };

    println!("[OK] Configuration file is valid!");
    println!();
    println!("=== Configuration Summary ===");
    println!();
    println!("Server:");
    println!("  Host:         {}", config.server.host);
    println!("  Port:         {}", config.server.port);
    println!("  Data Dir:     {}", config.server.data_dir.display());
    println!(
        "  CORS Origin:  {}",
        config.server.cors_origin.as_deref().unwrap_or("any")
    );
    println!();
    println!("Auth:");
    println!("  Token TTL:    {}h", config.auth.token_ttl_hours);
    println!(
        "  Bootstrap:    {}",
        config.auth.admin_email.as_deref().unwrap_or("none")
    );
    println!();
    println!("Features:");
    println!("  Rate Limiting: {}", enabled(config.rate_limit.enabled));
    println!("  Metrics:       {}", enabled(config.metrics.enabled));
    println!("  Seed Data:     {}", enabled(config.seed.reference_data));
    println!();

    let mut warnings = Vec::new();
    if config.auth.jwt_secret.is_none() {
        warnings.push("No jwt_secret set - sessions will not survive a restart");
    }
    if config.auth.admin_email.is_some() != config.auth.admin_password.is_some() {
        warnings.push("admin_email and admin_password must be set together");
    }
    if config.metrics.enabled && config.metrics.token.is_none() {
        warnings.push("Metrics are enabled without a token - /metrics is public");
    }

    if !warnings.is_empty() {
        println!("Warnings:");
        for warning in warnings {
            println!("  [!] {}", warning);
        }
        println!();
    }

    Ok(())
}

fn enabled(flag: bool) -> &'static str {
    if flag {
        "Enabled"
    } else {
        "Disabled"
    }
}

/// Print every category with its database types and templates
fn cmd_catalog() -> Result<()> {
    validate_catalog(CHECK_TEMPLATES).context("Check catalogue is inconsistent")?;

    for template in CHECK_TEMPLATES {
        let types: Vec<String> = template
            .category
            .database_types()
            .iter()
            .map(|t| t.to_string())
            .collect();
        println!("{} ({})", template.category, types.join(", "));
        println!("  Daily:");
        for (i, name) in template.daily.iter().enumerate() {
            println!("    {:>2}. {}", i + 1, name);
        }
        if !template.weekly.is_empty() {
            println!("  Weekly:");
            for (i, name) in template.weekly.iter().enumerate() {
                println!("    {:>2}. {}", i + 1, name);
            }
        }
        println!();
    }

    Ok(())
}

/// Truncate a string to max length with ellipsis
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
