use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Prefix of every environment override
pub const ENV_PREFIX: &str = "DBMON_";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub seed: SeedConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Allowed browser origin. Any origin is allowed when unset.
    #[serde(default)]
    pub cors_origin: Option<String>,
    /// Take the client address from `X-Forwarded-For` / `X-Real-IP`.
    /// Only enable behind a reverse proxy that overwrites those headers.
    #[serde(default)]
    pub trust_proxy_headers: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            data_dir: default_data_dir(),
            cors_origin: None,
            trust_proxy_headers: false,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3001
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

#[derive(Clone, Deserialize)]
pub struct AuthConfig {
    /// HS256 signing secret. A random one is generated at startup when unset,
    /// which invalidates every token on restart.
    #[serde(default)]
    pub jwt_secret: Option<String>,
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: u64,
    /// Bootstrap administrator, created approved if the email is unknown
    #[serde(default)]
    pub admin_email: Option<String>,
    #[serde(default)]
    pub admin_password: Option<String>,
    #[serde(default = "default_admin_name")]
    pub admin_name: String,
}

// Secrets stay out of logs
impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "<redacted>"))
            .field("token_ttl_hours", &self.token_ttl_hours)
            .field("admin_email", &self.admin_email)
            .field("admin_password", &self.admin_password.as_ref().map(|_| "<redacted>"))
            .field("admin_name", &self.admin_name)
            .finish()
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            token_ttl_hours: default_token_ttl_hours(),
            admin_email: None,
            admin_password: None,
            admin_name: default_admin_name(),
        }
    }
}

fn default_token_ttl_hours() -> u64 {
    24
}

fn default_admin_name() -> String {
    "Administrator".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Fixed-window request limits per client IP
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,
    #[serde(default = "default_api_requests")]
    pub api_requests_per_window: u32,
    #[serde(default = "default_auth_requests")]
    pub auth_requests_per_window: u32,
    /// Seconds between sweeps of expired entries
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_seconds: default_window_seconds(),
            api_requests_per_window: default_api_requests(),
            auth_requests_per_window: default_auth_requests(),
            cleanup_interval: default_cleanup_interval(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_window_seconds() -> u64 {
    15 * 60
}

fn default_api_requests() -> u32 {
    100
}

fn default_auth_requests() -> u32 {
    20
}

fn default_cleanup_interval() -> u64 {
    300
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedConfig {
    /// Seed the catalogue check types and the reference fleet into empty tables
    #[serde(default = "default_true")]
    pub reference_data: bool,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            reference_data: true,
        }
    }
}

#[derive(Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Bearer token required to scrape `/metrics`. Open when unset.
    #[serde(default)]
    pub token: Option<String>,
}

impl std::fmt::Debug for MetricsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsConfig")
            .field("enabled", &self.enabled)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            token: None,
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| anyhow::anyhow!("{}", e))
        .with_context(|| format!("Invalid value for {}{}: {:?}", ENV_PREFIX, key, raw))
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| "Failed to parse configuration file")?;
            Ok(config)
        } else {
            info!("No config file found, using defaults");
            Ok(Config::default())
        }
    }

    /// Apply `DBMON_*` overrides from the process environment
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_env_overrides_from(|key| std::env::var(format!("{}{}", ENV_PREFIX, key)).ok())
    }

    /// Apply overrides from `lookup`, keyed without the `DBMON_` prefix
    pub fn apply_env_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("HOST") {
            self.server.host = v;
        }
        if let Some(v) = lookup("PORT") {
            self.server.port = parse_env("PORT", &v)?;
        }
        if let Some(v) = lookup("DATA_DIR") {
            self.server.data_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("CORS_ORIGIN") {
            self.server.cors_origin = Some(v);
        }
        if let Some(v) = lookup("TRUST_PROXY_HEADERS") {
            self.server.trust_proxy_headers = parse_env("TRUST_PROXY_HEADERS", &v)?;
        }
        if let Some(v) = lookup("JWT_SECRET") {
            self.auth.jwt_secret = Some(v);
        }
        if let Some(v) = lookup("TOKEN_TTL_HOURS") {
            self.auth.token_ttl_hours = parse_env("TOKEN_TTL_HOURS", &v)?;
        }
        if let Some(v) = lookup("ADMIN_EMAIL") {
            self.auth.admin_email = Some(v);
        }
        if let Some(v) = lookup("ADMIN_PASSWORD") {
            self.auth.admin_password = Some(v);
        }
        if let Some(v) = lookup("ADMIN_NAME") {
            self.auth.admin_name = v;
        }
        if let Some(v) = lookup("LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Some(v) = lookup("RATE_LIMIT_ENABLED") {
            self.rate_limit.enabled = parse_env("RATE_LIMIT_ENABLED", &v)?;
        }
        if let Some(v) = lookup("SEED_REFERENCE_DATA") {
            self.seed.reference_data = parse_env("SEED_REFERENCE_DATA", &v)?;
        }
        if let Some(v) = lookup("METRICS_ENABLED") {
            self.metrics.enabled = parse_env("METRICS_ENABLED", &v)?;
        }
        if let Some(v) = lookup("METRICS_TOKEN") {
            self.metrics.token = Some(v);
        }
        Ok(())
    }

    pub fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            logging: LoggingConfig::default(),
            rate_limit: RateLimitConfig::default(),
            seed: SeedConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}
