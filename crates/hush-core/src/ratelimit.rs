//! Request rate limiting.
//!
//! A per-origin token bucket, independent of the defense engine's failure
//! accounting: the defense engine punishes wrong passphrases, this module
//! bounds request *volume* regardless of outcome, so an attacker cannot even
//! exercise the expensive verification path at speed.
//!
//! Time is injected by the caller, like everywhere else in this crate.

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

/// Token bucket parameters.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    /// Sustained refill rate.
    pub requests_per_minute: u32,
    /// Bucket capacity; the burst an idle origin may spend at once.
    pub burst_size: u32,
}

impl RateLimitConfig {
    /// The strict profile for the authentication surface.
    pub fn auth_default() -> Self {
        Self { requests_per_minute: 10, burst_size: 3 }
    }
}

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Per-origin token bucket limiter.
///
/// Not internally synchronized; the runtime wraps it in a lock the same way
/// it wraps the defense engine.
pub struct RateLimiter {
    config: RateLimitConfig,
    buckets: HashMap<String, Bucket>,
}

impl RateLimiter {
    /// Create a limiter with the given parameters.
    pub fn new(config: RateLimitConfig) -> Self {
        Self { config, buckets: HashMap::new() }
    }

    /// Record a request from an origin and decide whether to admit it.
    ///
    /// A new origin starts with a full bucket. Tokens replenish continuously
    /// at the configured rate up to `burst_size`; each admitted request
    /// spends one. Denied requests spend nothing, so a throttled origin
    /// recovers at exactly the refill rate.
    pub fn allow(&mut self, origin: &str, now: Instant) -> bool {
        let capacity = f64::from(self.config.burst_size);
        let per_second = f64::from(self.config.requests_per_minute) / 60.0;

        let bucket = self
            .buckets
            .entry(origin.to_string())
            .or_insert(Bucket { tokens: capacity, last_refill: now });

        let elapsed = now.saturating_duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * per_second).min(capacity);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Drop buckets idle longer than `max_age` (periodic housekeeping; an
    /// idle bucket is full anyway, so forgetting it changes no decision).
    pub fn sweep_idle(&mut self, max_age: Duration, now: Instant) {
        self.buckets.retain(|_, b| now.saturating_duration_since(b.last_refill) <= max_age);
    }

    /// Number of origins currently tracked.
    pub fn tracked_origins(&self) -> usize {
        self.buckets.len()
    }
}
