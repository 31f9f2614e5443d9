//! Per-client rate limiting for the verification endpoints.
//!
//! This is a coarse, process-local guard in front of the per-student OTP
//! limits, which stay authoritative because they live in the store.

#![allow(missing_docs)]

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use ballot_common::AppError;
use tokio::sync::RwLock;

/// Rate limit configuration.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum requests per window.
    pub max_requests: u32,
    /// Time window duration in seconds.
    pub window_secs: u64,
}

impl RateLimitConfig {
    /// Create a new rate limit config.
    pub const fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            max_requests,
            window_secs,
        }
    }
}

/// Default rate limits.
pub mod limits {
    use super::RateLimitConfig;

    /// Verification steps, per client address.
    pub const VERIFICATION: RateLimitConfig = RateLimitConfig::new(10, 60);
}

#[derive(Debug, Clone)]
struct WindowState {
    count: u32,
    window_start: Instant,
}

impl WindowState {
    fn new(now: Instant) -> Self {
        Self {
            count: 0,
            window_start: now,
        }
    }
}

/// Fixed-window rate limiter keyed by an arbitrary string.
#[derive(Clone, Default)]
pub struct ApiRateLimiter {
    states: Arc<RwLock<HashMap<String, WindowState>>>,
}

impl ApiRateLimiter {
    /// Create a new rate limiter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if a request is allowed and record it.
    pub async fn check(&self, key: &str, config: &RateLimitConfig) -> RateLimitResult {
        self.check_at(key, config, Instant::now()).await
    }

    async fn check_at(&self, key: &str, config: &RateLimitConfig, now: Instant) -> RateLimitResult {
        let mut states = self.states.write().await;
        let window = Duration::from_secs(config.window_secs);

        let state = states
            .entry(key.to_string())
            .or_insert_with(|| WindowState::new(now));

        if now.duration_since(state.window_start) >= window {
            state.count = 0;
            state.window_start = now;
        }

        let reset = window
            .saturating_sub(now.duration_since(state.window_start))
            .as_secs()
            .max(1);

        if state.count >= config.max_requests {
            return RateLimitResult::Limited { retry_after: reset };
        }

        state.count += 1;
        RateLimitResult::Allowed {
            remaining: config.max_requests.saturating_sub(state.count),
            reset,
        }
    }

    /// Drop keys whose window ended long ago.
    pub async fn cleanup(&self, max_window_secs: u64) {
        let mut states = self.states.write().await;
        let now = Instant::now();
        let max_window = Duration::from_secs(max_window_secs * 2);

        states.retain(|_, state| now.duration_since(state.window_start) < max_window);
    }

    /// Get the number of tracked keys.
    pub async fn key_count(&self) -> usize {
        self.states.read().await.len()
    }
}

/// Rate limit check result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitResult {
    Allowed { remaining: u32, reset: u64 },
    Limited { retry_after: u64 },
}

/// Rate limiter state for middleware.
#[derive(Clone, Default)]
pub struct RateLimiterState {
    /// Per-address limiter for the verification routes.
    pub verification: ApiRateLimiter,
}

impl RateLimiterState {
    /// Create a new rate limiter state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Periodic maintenance.
    pub async fn cleanup(&self) {
        self.verification
            .cleanup(limits::VERIFICATION.window_secs)
            .await;
    }
}

/// Client address from proxy headers, falling back to the peer address.
fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<IpAddr> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse::<IpAddr>().ok());
    if forwarded.is_some() {
        return forwarded;
    }

    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<IpAddr>().ok());
    if real_ip.is_some() {
        return real_ip;
    }

    peer.map(|addr| addr.ip())
}

/// Rate limiting middleware for the verification routes.
pub async fn verification_rate_limit(
    State(limiter): State<RateLimiterState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let key = client_ip(req.headers(), peer)
        .map_or_else(|| "unknown".to_string(), |ip| format!("ip:{ip}"));

    match limiter
        .verification
        .check(&key, &limits::VERIFICATION)
        .await
    {
        RateLimitResult::Allowed { remaining, reset } => {
            let mut response = next.run(req).await;
            let headers = response.headers_mut();
            headers.insert("X-RateLimit-Limit", limits::VERIFICATION.max_requests.into());
            headers.insert("X-RateLimit-Remaining", remaining.into());
            headers.insert("X-RateLimit-Reset", reset.into());
            Ok(response)
        }
        RateLimitResult::Limited { retry_after } => {
            tracing::warn!(client = %key, retry_after, "Verification rate limit hit");
            Err(AppError::RateLimited {
                message: format!("Too many requests. Please wait {retry_after} seconds."),
                retry_after: Some(retry_after),
            })
        }
    }
}
