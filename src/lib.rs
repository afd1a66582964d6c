pub mod api;
pub mod cli;
pub mod config;
pub mod crypto;
pub mod db;
pub mod engine;
pub mod startup;

pub use db::DbPool;

use config::Config;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

use crate::api::rate_limit::RateLimiter;
use crate::crypto::SessionKeys;

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub sessions: SessionKeys,
    pub rate_limiter: Arc<RateLimiter>,
    pub metrics_handle: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(config: Config, db: DbPool) -> Self {
        let secret = match config.auth.jwt_secret.as_deref() {
            Some(secret) if !secret.is_empty() => secret.to_string(),
            _ => {
                tracing::warn!(
                    "No auth.jwt_secret configured, using a random secret. Sessions will not survive a restart."
                );
                crypto::generate_secret()
            }
        };
        let sessions = SessionKeys::new(&secret, config.auth.token_ttl_hours);
        let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));
        Self {
            config,
            db,
            sessions,
            rate_limiter,
            metrics_handle: None,
        }
    }

    /// Set the Prometheus metrics handle
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }
}
