//! Per-client rate limiting.
//!
//! Each client owns a token bucket holding `max_requests` tokens that refills
//! over `window_secs`. Clients are keyed by `x-real-ip`, then the first entry
//! of `x-forwarded-for`, then the peer address, then `127.0.0.1`.
//!
//! The allow list applies to the connecting peer only; an address taken from
//! a forwarding header is always limited. At most `max_tracked_clients`
//! buckets are kept: idle buckets go first, then the least recently used.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;

use crate::config::RateLimitConfig;
use crate::error::{DomainError, Failure};
use crate::observability::metrics;

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

const FALLBACK_CLIENT: &str = "127.0.0.1";

/// A simple token bucket rate limiter.
#[derive(Debug, Clone, Copy)]
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_update: now,
        }
    }

    fn refill(&mut self, capacity: f64, refill_rate: f64, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_update).as_secs_f64();
        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;
    }

    fn try_acquire(&mut self, capacity: f64, refill_rate: f64, now: Instant) -> bool {
        self.refill(capacity, refill_rate, now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Time until one token is available again.
    fn wait_time(&self, refill_rate: f64) -> Duration {
        let missing = (1.0 - self.tokens).max(0.0);
        Duration::from_secs_f64(missing / refill_rate)
    }
}

/// Outcome of one rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Client is on the allow list.
    Exempt,
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

/// Identity a request is limited under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientKey {
    /// Taken from `x-real-ip` / `x-forwarded-for`.
    Forwarded(String),
    /// The connecting peer (or the local fallback).
    Peer(String),
}

impl ClientKey {
    pub fn as_str(&self) -> &str {
        match self {
            ClientKey::Forwarded(key) | ClientKey::Peer(key) => key,
        }
    }
}

/// Shared limiter state.
#[derive(Debug)]
pub struct RateLimiter {
    buckets: DashMap<String, TokenBucket>,
    config: RateLimitConfig,
    capacity: f64,
    refill_rate: f64,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let capacity = f64::from(config.max_requests.max(1));
        let refill_rate = capacity / config.window_secs.max(1) as f64;
        Self {
            buckets: DashMap::new(),
            config,
            capacity,
            refill_rate,
        }
    }

    pub fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }

    pub fn check(&self, client: &ClientKey) -> Decision {
        self.check_at(client, Instant::now())
    }

    fn check_at(&self, client: &ClientKey, now: Instant) -> Decision {
        if self.is_exempt(client) {
            return Decision::Exempt;
        }

        let key = client.as_str();
        if !self.buckets.contains_key(key) {
            self.make_room(now);
        }

        let mut bucket = self
            .buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(self.capacity, now));

        if bucket.try_acquire(self.capacity, self.refill_rate, now) {
            Decision::Allowed {
                remaining: bucket.tokens.floor() as u32,
            }
        } else {
            Decision::Limited {
                retry_after: bucket.wait_time(self.refill_rate),
            }
        }
    }

    fn is_exempt(&self, client: &ClientKey) -> bool {
        let ClientKey::Peer(key) = client else {
            return false;
        };
        key.parse::<IpAddr>()
            .map(|ip| self.config.allow_list.contains(&ip))
            .unwrap_or(false)
    }

    /// Keep the map below `max_tracked_clients` before a new client is added.
    fn make_room(&self, now: Instant) {
        let cap = self.config.max_tracked_clients.max(1);
        if self.buckets.len() < cap {
            return;
        }

        self.evict_idle(now);
        if self.buckets.len() >= cap {
            let excess = self.buckets.len() + 1 - cap;
            self.evict_stalest(excess.max(cap / 10));
        }
    }

    /// Drop buckets that have refilled completely, i.e. idle clients.
    fn evict_idle(&self, now: Instant) {
        let (capacity, refill_rate) = (self.capacity, self.refill_rate);
        self.buckets.retain(|_, bucket| {
            let mut refilled = *bucket;
            refilled.refill(capacity, refill_rate, now);
            refilled.tokens < capacity
        });
        tracing::debug!(remaining = self.buckets.len(), "Evicted idle rate limit entries");
    }

    /// Drop the `count` least recently used buckets.
    fn evict_stalest(&self, count: usize) {
        let mut entries: Vec<(Instant, String)> = self
            .buckets
            .iter()
            .map(|entry| (entry.value().last_update, entry.key().clone()))
            .collect();
        entries.sort_unstable();
        for (_, key) in entries.into_iter().take(count) {
            self.buckets.remove(&key);
        }
        tracing::debug!(
            evicted = count,
            remaining = self.buckets.len(),
            "Evicted least recently used rate limit entries"
        );
    }

/// Human-readable window, e.g. `1 minute` or `30 seconds`.
    pub fn window_description(&self) -> String {
        describe_window(self.config.window_secs)
    }
}

fn describe_window(secs: u64) -> String {
    let (amount, unit) = if secs % 3600 == 0 {
        (secs / 3600, "hour")
    } else if secs % 60 == 0 {
        (secs / 60, "minute")
    } else {
        (secs, "second")
    };
    if amount == 1 {
        format!("1 {unit}")
    } else {
        format!("{amount} {unit}s")
    }
}

/// Resolve the rate limit key for a request.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> ClientKey {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };

    if let Some(forwarded) = header("x-real-ip").or_else(|| header("x-forwarded-for")) {
        return ClientKey::Forwarded(forwarded);
    }
    let peer = peer
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| FALLBACK_CLIENT.to_string());
    ClientKey::Peer(peer)
}

/// Middleware enforcing the per-client limit.
pub async fn enforce_rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = client_key(request.headers(), peer);
    let limit = HeaderValue::from(limiter.config.max_requests);

    match limiter.check(&client) {
        Decision::Exempt => next.run(request).await,
        Decision::Allowed { remaining } => {
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            headers.insert(X_RATELIMIT_LIMIT, limit);
            headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(remaining));
            response
        }
        Decision::Limited { retry_after } => {
            tracing::warn!(client = client.as_str(), "Rate limit exceeded");
            metrics::record_rate_limited("rps_limit");

            let message = format!(
                "Rate limit exceeded. Max {} requests per {}",
                limiter.config.max_requests,
                limiter.window_description()
            );
            let retry_secs = retry_after.as_secs_f64().ceil().max(1.0) as u64;

            let mut response = Failure::from(DomainError::too_many_requests(message)).into_response();
            let headers = response.headers_mut();
            headers.insert(X_RATELIMIT_LIMIT, limit);
            headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(0u32));
            headers.insert(X_RATELIMIT_RESET, HeaderValue::from(retry_secs));
            headers.insert(axum::http::header::RETRY_AFTER, HeaderValue::from(retry_secs));
            response
        }
    }
}
