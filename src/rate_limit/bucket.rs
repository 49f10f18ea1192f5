//! Token bucket state.

use std::time::Duration;

use tokio::time::Instant;

/// Mutable bucket fields, guarded by the limiter's mutex.
#[derive(Debug, Clone)]
pub(crate) struct BucketState {
    /// Available tokens, never above capacity and never negative.
    pub tokens: f64,
    pub last_refill: Instant,
    /// Acquisitions are suspended until this instant.
    pub cooldown_until: Option<Instant>,
}

impl BucketState {
    pub fn full(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_refill: Instant::now(),
            cooldown_until: None,
        }
    }

    /// Remaining cooldown at `now`, if any.
    pub fn cooldown_remaining(&self, now: Instant) -> Option<Duration> {
        self.cooldown_until
            .filter(|until| *until > now)
            .map(|until| until - now)
    }

    /// Add tokens for the time elapsed since the last refill.
    pub fn refill(&mut self, now: Instant, rate: f64, capacity: f64) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * rate).min(capacity);
        self.last_refill = now;
    }

    /// Time until one whole token is available at `rate`.
    pub fn deficit_wait(&self, rate: f64) -> Duration {
        if self.tokens >= 1.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64((1.0 - self.tokens) / rate)
        }
    }

    /// Extend the cooldown (never shorten it) and drain half a second of tokens.
    pub fn throttle(&mut self, now: Instant, backoff: Duration, rate: f64) {
        let until = now + backoff;
        self.cooldown_until = Some(match self.cooldown_until {
            Some(existing) if existing > until => existing,
            _ => until,
        });
        self.tokens = (self.tokens - rate * 0.5).max(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_refill_is_capped() {
        let mut state = BucketState::full(5.0);
        state.tokens = 0.0;
        tokio::time::advance(Duration::from_secs(10)).await;
        state.refill(Instant::now(), 5.0, 5.0);
        assert_eq!(state.tokens, 5.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_keeps_longer_cooldown() {
        let mut state = BucketState::full(4.0);
        let now = Instant::now();
        state.throttle(now, Duration::from_secs(30), 4.0);
        state.throttle(now, Duration::from_secs(5), 4.0);
        assert_eq!(state.cooldown_remaining(now), Some(Duration::from_secs(30)));
        assert_eq!(state.tokens, 0.0);
    }

    #[test]
    fn test_deficit_wait() {
        let mut state = BucketState::full(2.0);
        assert_eq!(state.deficit_wait(2.0), Duration::ZERO);
        state.tokens = 0.5;
        assert_eq!(state.deficit_wait(2.0), Duration::from_millis(250));
    }
}
