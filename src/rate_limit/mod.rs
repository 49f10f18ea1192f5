//! Token-bucket rate limiter shared by every concurrent fetch.
//!
//! Refills continuously at the configured rate up to a capacity of
//! `max(rate, 1)` tokens. A throttle signal from the server opens a cooldown
//! window during which no permit is granted, and drains part of the bucket.
//! After a forced deficit wait the bucket snaps back to full.

mod bucket;

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use bucket::BucketState;

/// Slowest supported rate. Keeps a deficit wait within a representable duration.
pub const MIN_REQUESTS_PER_SECOND: f64 = 0.01;

#[derive(Debug, Error, PartialEq)]
pub enum RateLimitError {
    #[error("requests per second must be finite and at least 0.01, got {0}")]
    InvalidRate(f64),
}

/// Shared token bucket. Cloning shares the same bucket.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    rate: f64,
    capacity: f64,
    state: Arc<Mutex<BucketState>>,
}

impl RateLimiter {
    pub fn new(requests_per_second: f64) -> Result<Self, RateLimitError> {
        if !(requests_per_second.is_finite() && requests_per_second >= MIN_REQUESTS_PER_SECOND) {
            return Err(RateLimitError::InvalidRate(requests_per_second));
        }
        let capacity = requests_per_second.max(1.0);
        Ok(Self {
            rate: requests_per_second,
            capacity,
            state: Arc::new(Mutex::new(BucketState::full(capacity))),
        })
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Wait for a permit. Called before every network attempt.
    pub async fn acquire(&self) {
        loop {
            let mut state = self.state.lock().await;
            let now = Instant::now();

            if let Some(remaining) = state.cooldown_remaining(now) {
                drop(state);
                debug!("Rate limiter cooling down for {:?}", remaining);
                tokio::time::sleep(remaining).await;
                continue;
            }

            state.refill(now, self.rate, self.capacity);

            let wait = state.deficit_wait(self.rate);
            if wait > Duration::ZERO {
                // Held across the sleep so deficit waiters queue behind each other.
                tokio::time::sleep(wait).await;
                state.tokens = self.capacity;
                state.last_refill = Instant::now();
            }

            state.tokens -= 1.0;
            return;
        }
    }

    /// Record a server throttle signal (HTTP 429).
    pub async fn record_throttle_signal(&self, backoff: Duration) {
        let mut state = self.state.lock().await;
        state.throttle(Instant::now(), backoff, self.rate);
        warn!(
            "Throttle signal received, pausing requests for {:.1}s",
            backoff.as_secs_f64()
        );
    }

    /// Tokens currently in the bucket, without refilling.
    pub async fn available(&self) -> f64 {
        self.state.lock().await.tokens
    }

    /// Refill to capacity and clear any cooldown.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        *state = BucketState::full(self.capacity);
    }
}
