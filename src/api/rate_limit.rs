//! Rate limiting middleware using a fixed window per client IP.
//!
//! Each (IP, tier) pair gets a request budget that is refilled when its
//! window elapses. Auth endpoints have their own, smaller budget.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::RateLimitConfig;
use crate::AppState;

use super::error::ApiError;

/// Rate limit tier for different endpoint types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateLimitTier {
    /// General API endpoints (100 req / 15 min default)
    Api,
    /// Register and login (20 req / 15 min default)
    Auth,
}

/// Entry in the rate limit tracker
#[derive(Debug, Clone)]
struct RateLimitEntry {
    /// Requests left in the current window
    remaining: u32,
    /// Start of the current window
    window_start: Instant,
}

/// Thread-safe rate limiter using dashmap
#[derive(Debug)]
pub struct RateLimiter {
    /// Map of (IP, Tier) -> RateLimitEntry
    entries: DashMap<(IpAddr, RateLimitTier), RateLimitEntry>,
    config: RateLimitConfig,
    window_duration: Duration,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            entries: DashMap::new(),
            window_duration: Duration::from_secs(config.window_seconds.max(1)),
            config,
        }
    }

    /// Count a request against the caller's budget.
    /// Returns the budget left if allowed, Err(retry_after_seconds) if limited.
    pub fn check_rate_limit(&self, ip: IpAddr, tier: RateLimitTier) -> Result<RateLimitInfo, u64> {
        self.check_at(ip, tier, Instant::now())
    }

    fn check_at(&self, ip: IpAddr, tier: RateLimitTier, now: Instant) -> Result<RateLimitInfo, u64> {
        if !self.config.enabled {
            return Ok(RateLimitInfo {
                remaining: u32::MAX,
                limit: u32::MAX,
                reset_after: 0,
            });
        }

        let limit = self.limit_for(tier);
        let mut entry = self.entries.entry((ip, tier)).or_insert_with(|| RateLimitEntry {
            remaining: limit,
            window_start: now,
        });

        if now.duration_since(entry.window_start) >= self.window_duration {
            entry.remaining = limit;
            entry.window_start = now;
        }

        let elapsed = now.duration_since(entry.window_start);
        let reset_after = self.window_duration.saturating_sub(elapsed).as_secs().max(1);

        if entry.remaining == 0 {
            return Err(reset_after);
        }
        entry.remaining -= 1;
        Ok(RateLimitInfo {
            remaining: entry.remaining,
            limit,
            reset_after,
        })
    }

    pub fn limit_for(&self, tier: RateLimitTier) -> u32 {
        match tier {
            RateLimitTier::Api => self.config.api_requests_per_window,
            RateLimitTier::Auth => self.config.auth_requests_per_window,
        }
    }

    /// Drop entries whose window ended, to bound memory
    pub fn cleanup_expired(&self) {
        let now = Instant::now();
        self.entries
            .retain(|_, entry| now.duration_since(entry.window_start) < self.window_duration);
    }

    /// Number of tracked entries (for monitoring)
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

/// Information about rate limit status
#[derive(Debug, Clone)]
pub struct RateLimitInfo {
    /// Remaining requests in the current window
    pub remaining: u32,
    /// Maximum requests per window
    pub limit: u32,
    /// Seconds until the window resets
    pub reset_after: u64,
}

/// Limiter key: the socket peer, or trusted proxy headers, else localhost
fn client_ip(request: &Request<Body>, trust_proxy_headers: bool) -> IpAddr {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    super::audit::extract_client_ip(request.headers(), peer.as_ref(), trust_proxy_headers)
        .and_then(|ip| ip.parse::<IpAddr>().ok())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

fn set_limit_headers(headers: &mut HeaderMap, limit: u32, remaining: u32, reset_after: u64) {
    headers.insert("X-RateLimit-Limit", HeaderValue::from(limit));
    headers.insert("X-RateLimit-Remaining", HeaderValue::from(remaining));
    headers.insert("X-RateLimit-Reset", HeaderValue::from(reset_after));
}

/// Rate limiting middleware for general API endpoints
pub async fn rate_limit_api(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    rate_limit_with_tier(state, request, next, RateLimitTier::Api).await
}

/// Rate limiting middleware for auth endpoints
pub async fn rate_limit_auth(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    rate_limit_with_tier(state, request, next, RateLimitTier::Auth).await
}

async fn rate_limit_with_tier(
    state: Arc<AppState>,
    request: Request<Body>,
    next: Next,
    tier: RateLimitTier,
) -> Response {
    if !state.config.rate_limit.enabled {
        return next.run(request).await;
    }

    let ip = client_ip(&request, state.config.server.trust_proxy_headers);

    match state.rate_limiter.check_rate_limit(ip, tier) {
        Ok(info) => {
            let mut response = next.run(request).await;
            set_limit_headers(response.headers_mut(), info.limit, info.remaining, info.reset_after);
            response
        }
        Err(retry_after) => {
            tracing::warn!(ip = %ip, tier = ?tier, "Rate limit exceeded");
            let mut response = ApiError::rate_limited(format!(
                "Too many requests. Try again in {} seconds.",
                retry_after
            ))
            .into_response();
            let headers = response.headers_mut();
            set_limit_headers(headers, state.rate_limiter.limit_for(tier), 0, retry_after);
            headers.insert("Retry-After", HeaderValue::from(retry_after));
            response
        }
    }
}

/// Spawn a background task to periodically clean up expired rate limit entries
pub fn spawn_cleanup_task(rate_limiter: Arc<RateLimiter>, cleanup_interval_secs: u64) {
    tokio::spawn(async move {
        let interval = Duration::from_secs(cleanup_interval_secs.max(1));
        loop {
            tokio::time::sleep(interval).await;
            rate_limiter.cleanup_expired();
            tracing::debug!(
                "Rate limiter cleanup complete, {} entries remaining",
                rate_limiter.entry_count()
            );
        }
    });
}
