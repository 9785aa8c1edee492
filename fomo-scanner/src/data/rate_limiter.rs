//! Token bucket rate limiter for outbound API calls.
//!
//! The CoinGecko pro plan allows a fixed number of calls per minute across
//! all endpoints; page fetches and per-candidate lookups share one bucket.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// A token bucket holding up to one second of burst.
#[derive(Debug)]
pub struct RateLimiter {
    name: String,
    capacity: f64,
    /// Tokens regained per second
    refill_per_sec: f64,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    /// Create a limiter allowing `requests_per_minute` sustained calls.
    pub fn new(name: impl Into<String>, requests_per_minute: u32) -> Self {
        let rpm = requests_per_minute.max(1) as f64;
        let capacity = (rpm / 60.0).ceil().max(1.0);

        Self {
            name: name.into(),
            capacity,
            refill_per_sec: rpm / 60.0,
            bucket: Mutex::new(Bucket {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Take a token if one is available, otherwise report how long until one is.
    fn take_or_wait_time(&self) -> Option<Duration> {
        let mut bucket = self.bucket.lock().unwrap_or_else(|e| e.into_inner());

        let now = Instant::now();
        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            None
        } else {
            let missing = 1.0 - bucket.tokens;
            Some(Duration::from_secs_f64(missing / self.refill_per_sec))
        }
    }

    /// Try to take a token without waiting.
    pub fn try_acquire(&self) -> bool {
        self.take_or_wait_time().is_none()
    }

    /// Wait until a token is available and take it.
    pub async fn acquire(&self) {
        while let Some(wait) = self.take_or_wait_time() {
            let wait = wait.clamp(Duration::from_millis(5), Duration::from_secs(1));
            debug!(
                limiter = %self.name,
                wait_ms = wait.as_millis() as u64,
                "Rate limited, waiting for token"
            );
            tokio::time::sleep(wait).await;
        }
    }

    /// Tokens currently in the bucket, without refilling.
    pub fn available_tokens(&self) -> f64 {
        self.bucket.lock().map(|b| b.tokens).unwrap_or(0.0)
    }

    pub fn capacity(&self) -> u32 {
        self.capacity as u32
    }
}

/// Shared rate limiter handle.
pub type SharedRateLimiter = Arc<RateLimiter>;

/// Create a shared rate limiter.
pub fn shared_limiter(name: impl Into<String>, requests_per_minute: u32) -> SharedRateLimiter {
    Arc::new(RateLimiter::new(name, requests_per_minute))
}
