//! Rate limiting middleware for the API
//!
//! Per-client token buckets with exempt paths and IPs.

use axum::{
    Json,
    extract::{ConnectInfo, Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::{
    collections::HashMap,
    net::{IpAddr, SocketAddr},
    sync::Arc,
    time::Instant,
};
use tokio::sync::Mutex;

use crate::config::RateLimitConfig;
use crate::error::ApiError;

/// Simple token bucket rate limiter
struct TokenBucket {
    /// Available tokens
    tokens: f64,
    /// Last refill time
    last_refill: Instant,
    /// Tokens per second
    rate: f64,
    /// Maximum burst size
    capacity: u32,
}

impl TokenBucket {
    fn new(rate: f64, capacity: u32) -> Self {
        Self {
            tokens: capacity as f64,
            last_refill: Instant::now(),
            rate,
            capacity,
        }
    }

    /// Take one token, or return the whole seconds until one is available
    fn try_consume(&mut self) -> Option<u64> {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate).min(self.capacity as f64);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            None
        } else {
            let wait_secs = ((1.0 - self.tokens) / self.rate).ceil() as u64;
            Some(wait_secs.max(1))
        }
    }
}

/// Rate limiter with per-IP tracking
pub struct RateLimiter {
    buckets: Mutex<HashMap<IpAddr, TokenBucket>>,
    config: RateLimitConfig,
}

impl RateLimiter {
    /// Create a new rate limiter from configuration
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            config,
        }
    }

    fn is_path_exempt(&self, path: &str) -> bool {
        self.config
            .exempt_paths
            .iter()
            .any(|exempt| path == exempt || path.starts_with(exempt))
    }

    /// Seconds the client has to wait, or `None` if the request may pass
    pub async fn check(&self, path: &str, addr: SocketAddr) -> Option<u64> {
        if self.is_path_exempt(path) || self.config.exempt_ips.contains(&addr.ip()) {
            return None;
        }

        let mut buckets = self.buckets.lock().await;
        buckets
            .entry(addr.ip())
            .or_insert_with(|| {
                TokenBucket::new(
                    self.config.requests_per_second as f64,
                    self.config.burst_size,
                )
            })
            .try_consume()
    }
}

/// Rate limiting middleware function
///
/// Needs the router to be served with `into_make_service_with_connect_info`.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request,
    next: Next,
) -> Response {
    let Some(retry_after) = limiter.check(req.uri().path(), addr).await else {
        return next.run(req).await;
    };

    tracing::debug!(client = %addr.ip(), retry_after, "API request rate limited");
    let body = ApiError::with_details(
        "rate_limited",
        "Too many requests",
        json!({ "retry_after_seconds": retry_after }),
    );
    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
    response
}
