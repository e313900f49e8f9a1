//! Fixed-window request rate limiting keyed by client IP.
//!
//! The limiter is an injected service with an explicit lifecycle: construct
//! it, let the background sweeper expire stale counters, and shut the
//! sweeper down on exit. Per-path policies override the default window, which
//! is how the login endpoint gets its tighter budget.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub requests_per_window: u32,
    pub window: Duration,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub default_policy: RateLimitPolicy,
    /// Longest-prefix match against the request path.
    pub path_policies: Vec<(String, RateLimitPolicy)>,
    pub sweep_interval: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            default_policy: RateLimitPolicy {
                requests_per_window: 100,
                window: Duration::from_secs(60),
            },
            path_policies: Vec::new(),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
struct WindowEntry {
    count: u32,
    window_start: Instant,
}

#[derive(Debug)]
pub struct Decision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub retry_after: Duration,
}

pub struct RateLimiter {
    config: RateLimitConfig,
    entries: DashMap<String, WindowEntry>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            entries: DashMap::new(),
        }
    }

    fn policy_for(&self, path: &str) -> RateLimitPolicy {
        self.config
            .path_policies
            .iter()
            .filter(|(prefix, _)| path.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, policy)| *policy)
            .unwrap_or(self.config.default_policy)
    }

    /// Records one request and decides whether it is within budget.
    pub fn check(&self, client_key: &str, path: &str) -> Decision {
        let policy = self.policy_for(path);
        // One counter per (client, policy window) so the login budget does
        // not drain the general budget.
        let key = format!("{client_key}:{}:{}", policy.requests_per_window, path_bucket(path));
        let now = Instant::now();

        let mut entry = self.entries.entry(key).or_insert_with(|| WindowEntry {
            count: 0,
            window_start: now,
        });

        if now.duration_since(entry.window_start) >= policy.window {
            entry.count = 0;
            entry.window_start = now;
        }
        entry.count += 1;

        let allowed = entry.count <= policy.requests_per_window;
        let remaining = policy.requests_per_window.saturating_sub(entry.count);
        let elapsed = now.duration_since(entry.window_start);
        let retry_after = policy.window.saturating_sub(elapsed);

        Decision {
            allowed,
            limit: policy.requests_per_window,
            remaining,
            retry_after,
        }
    }

    /// Drops counters whose window has fully elapsed. Called by the sweeper
    /// on a fixed interval; safe to call at any time.
    pub fn sweep(&self) {
        let now = Instant::now();
        let max_window = self
            .config
            .path_policies
            .iter()
            .map(|(_, p)| p.window)
            .chain(std::iter::once(self.config.default_policy.window))
            .max()
            .unwrap_or(Duration::from_secs(60));

        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now.duration_since(entry.window_start) < max_window);
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(removed, "rate limiter sweep expired counters");
        }
    }

    pub fn tracked_keys(&self) -> usize {
        self.entries.len()
    }
}

/// Handle for the background sweeper task.
pub struct SweeperHandle {
    task: tokio::task::JoinHandle<()>,
}

impl SweeperHandle {
    pub fn shutdown(self) {
        self.task.abort();
    }
}

/// Spawns the periodic sweep for a shared limiter.
pub fn spawn_sweeper(limiter: Arc<RateLimiter>) -> SweeperHandle {
    let interval = limiter.config.sweep_interval;
    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            limiter.sweep();
        }
    });
    SweeperHandle { task }
}

fn path_bucket(path: &str) -> &str {
    // Counters are bucketed per top-level path segment rather than full
    // path, so /api/v1/orders and /api/v1/orders/7 share one window.
    let trimmed = path.trim_start_matches('/');
    let mut segments = trimmed.splitn(3, '/');
    match (segments.next(), segments.next()) {
        (Some(_), Some(second)) => second,
        (Some(first), None) => first,
        _ => "",
    }
}

fn client_key(request: &Request) -> String {
    if let Some(forwarded) = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
    {
        let trimmed = forwarded.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let key = client_key(&request);
    let path = request.uri().path().to_string();
    let decision = limiter.check(&key, &path);

    if !decision.allowed {
        warn!(client = %key, path = %path, "rate limit exceeded");
        let mut response = crate::errors::ServiceError::RateLimitExceeded.into_response();
        let headers = response.headers_mut();
        headers.insert(
            "retry-after",
            numeric_header(decision.retry_after.as_secs().max(1)),
        );
        headers.insert("x-ratelimit-limit", numeric_header(decision.limit));
        headers.insert("x-ratelimit-remaining", numeric_header(0u32));
        return response;
    }

    let mut response = next.run(request).await;
    if response.status() != StatusCode::TOO_MANY_REQUESTS {
        let headers = response.headers_mut();
        headers.insert("x-ratelimit-limit", numeric_header(decision.limit));
        headers.insert("x-ratelimit-remaining", numeric_header(decision.remaining));
    }
    response
}

fn numeric_header<T: ToString>(n: T) -> HeaderValue {
    HeaderValue::from_str(&n.to_string()).unwrap_or_else(|_| HeaderValue::from_static("0"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(limit: u32, window: Duration) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            default_policy: RateLimitPolicy {
                requests_per_window: limit,
                window,
            },
            path_policies: vec![(
                "/auth/login".to_string(),
                RateLimitPolicy {
                    requests_per_window: 2,
                    window,
                },
            )],
            sweep_interval: Duration::from_secs(60),
        })
    }

    #[test]
    fn allows_up_to_the_limit_then_rejects() {
        let rl = limiter(3, Duration::from_secs(60));
        for _ in 0..3 {
            assert!(rl.check("10.0.0.1", "/api/v1/orders").allowed);
        }
        let decision = rl.check("10.0.0.1", "/api/v1/orders");
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);
    }

    #[test]
    fn login_path_uses_the_tighter_policy() {
        let rl = limiter(100, Duration::from_secs(60));
        assert!(rl.check("10.0.0.2", "/auth/login").allowed);
        assert!(rl.check("10.0.0.2", "/auth/login").allowed);
        assert!(!rl.check("10.0.0.2", "/auth/login").allowed);
        // the general budget for the same client is untouched
        assert!(rl.check("10.0.0.2", "/api/v1/orders").allowed);
    }

    #[test]
    fn clients_are_isolated() {
        let rl = limiter(1, Duration::from_secs(60));
        assert!(rl.check("10.0.0.3", "/api/v1/orders").allowed);
        assert!(!rl.check("10.0.0.3", "/api/v1/orders").allowed);
        assert!(rl.check("10.0.0.4", "/api/v1/orders").allowed);
    }

    #[test]
    fn window_expiry_resets_the_counter() {
        let rl = limiter(1, Duration::from_millis(20));
        assert!(rl.check("10.0.0.5", "/api/v1/orders").allowed);
        assert!(!rl.check("10.0.0.5", "/api/v1/orders").allowed);
        std::thread::sleep(Duration::from_millis(25));
        assert!(rl.check("10.0.0.5", "/api/v1/orders").allowed);
    }

    #[test]
    fn sweep_drops_expired_counters() {
        let rl = limiter(1, Duration::from_millis(10));
        rl.check("10.0.0.6", "/api/v1/orders");
        rl.check("10.0.0.7", "/api/v1/products");
        assert_eq!(rl.tracked_keys(), 2);
        std::thread::sleep(Duration::from_millis(15));
        rl.sweep();
        assert_eq!(rl.tracked_keys(), 0);
    }
}
