//! Per-path rate limiting for the browser-facing routes
//!
//! Fixed windows counted per (path prefix, client address) in a DashMap.
//! Requests without a known peer address share one bucket per prefix.

use axum::{
    extract::{ConnectInfo, Request},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

#[derive(Clone)]
pub struct RateLimitConfig {
    /// Maximum requests allowed within the window.
    pub max_requests: u32,
    pub window: Duration,
}

/// Expired buckets are swept once the map grows past this many entries
const SWEEP_THRESHOLD: usize = 1024;

type BucketKey = (String, Option<IpAddr>);

/// Shared limiter state (clone-friendly via Arc).
#[derive(Clone)]
pub struct RateLimiter {
    /// (path prefix, client) → (window_start, request_count).
    buckets: Arc<DashMap<BucketKey, (Instant, u32)>>,
    rules: Arc<Vec<(String, RateLimitConfig)>>,
}

impl RateLimiter {
    pub fn new(rules: Vec<(String, RateLimitConfig)>) -> Self {
        Self {
            buckets: Arc::new(DashMap::new()),
            rules: Arc::new(rules),
        }
    }

    /// `true` if the client's request is within limits. The first matching
    /// prefix wins.
    pub fn check(&self, path: &str, client: Option<IpAddr>) -> bool {
        let Some((prefix, config)) = self.rules.iter().find(|(p, _)| path.starts_with(p.as_str()))
        else {
            return true;
        };

        if self.buckets.len() > SWEEP_THRESHOLD {
            self.sweep();
        }

        let mut entry = self
            .buckets
            .entry((prefix.clone(), client))
            .or_insert_with(|| (Instant::now(), 0));
        let (window_start, count) = entry.value_mut();

        if window_start.elapsed() >= config.window {
            *window_start = Instant::now();
            *count = 1;
            return true;
        }

        if *count >= config.max_requests {
            return false;
        }

        *count += 1;
        true
    }

    fn sweep(&self) {
        let rules = &self.rules;
        self.buckets.retain(|(prefix, _), (window_start, _)| {
            rules
                .iter()
                .find(|(p, _)| p == prefix)
                .is_some_and(|(_, config)| window_start.elapsed() < config.window)
        });
    }
}

pub async fn rate_limit_middleware(request: Request, next: Next) -> Response {
    let limiter = request.extensions().get::<RateLimiter>().cloned();

    if let Some(limiter) = limiter {
        let path = request.uri().path();
        let client = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        if !limiter.check(path, client) {
            warn!(path, client = ?client, "[Broker] Rate limit exceeded");
            return (
                StatusCode::TOO_MANY_REQUESTS,
                "Rate limit exceeded. Please try again later.",
            )
                .into_response();
        }
    }

    next.run(request).await
}

/// Limits for the dashboard sign-on routes
pub fn default_dashboard_rate_limiter() -> RateLimiter {
    RateLimiter::new(vec![
        (
            "/dashboard/".to_string(),
            RateLimitConfig {
                max_requests: 30,
                window: Duration::from_secs(60),
            },
        ),
        (
            "/sso_dashboard".to_string(),
            RateLimitConfig {
                max_requests: 30,
                window: Duration::from_secs(60),
            },
        ),
    ])
}
