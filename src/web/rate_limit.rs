//! Fixed-window request limiting per client address.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tokio::sync::Mutex;
use tracing::warn;

use super::error::ApiError;

pub const LIMIT_EXCEEDED: &str = "Too many requests from this IP, please try again later.";

const RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("ratelimit-limit");
const RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("ratelimit-remaining");
const RATELIMIT_RESET: HeaderName = HeaderName::from_static("ratelimit-reset");

/// Expired windows are swept once the table holds this many keys.
const SWEEP_THRESHOLD: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub window: Duration,
    pub max_requests: u32,
}

impl RateLimitPolicy {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_after: Duration,
}

#[derive(Debug)]
struct Window {
    started: Instant,
    count: u32,
}

/// Counts requests per key inside fixed windows.
#[derive(Debug)]
pub struct RateLimiter {
    policy: RateLimitPolicy,
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self {
            policy,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub async fn check(&self, key: &str) -> Decision {
        self.check_at(key, Instant::now()).await
    }

    async fn check_at(&self, key: &str, now: Instant) -> Decision {
        let window_len = self.policy.window;
        let mut windows = self.windows.lock().await;
        if windows.len() >= SWEEP_THRESHOLD {
            windows.retain(|_, window| now.duration_since(window.started) < window_len);
        }

        let window = windows.entry(key.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(window.started) >= window_len {
            window.started = now;
            window.count = 0;
        }
        window.count = window.count.saturating_add(1);

        Decision {
            allowed: window.count <= self.policy.max_requests,
            limit: self.policy.max_requests,
            remaining: self.policy.max_requests.saturating_sub(window.count),
            reset_after: window_len.saturating_sub(now.duration_since(window.started)),
        }
    }
}

/// Peer address when the server was started with connect info, else the first
/// `X-Forwarded-For` hop.
pub fn client_key(request: &Request) -> String {
    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| "unknown".to_string())
}

fn write_headers(headers: &mut HeaderMap, decision: &Decision) {
    let reset_secs = decision.reset_after.as_secs_f64().ceil() as u64;
    headers.insert(RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(RATELIMIT_RESET, HeaderValue::from(reset_secs));
}

/// Middleware for `axum::middleware::from_fn_with_state`.
pub async fn limit_requests(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let key = client_key(&request);
    let decision = limiter.check(&key).await;

    let mut response = if decision.allowed {
        next.run(request).await
    } else {
        warn!(client = %key, limit = decision.limit, "rate limit exceeded");
        ApiError::RateLimited(LIMIT_EXCEEDED.to_string()).into_response()
    };
    write_headers(response.headers_mut(), &decision);
    response
}
