//! Run-wide counters.

use std::time::{Duration, Instant};

use super::ScrapeOutcome;

/// Counters for one run. Mutated only by the coordinator.
#[derive(Debug, Clone)]
pub struct RunStats {
    /// Terminal outcomes produced.
    pub total: u64,
    pub succeeded: u64,
    /// Pages that parsed but had no reputation.
    pub not_found: u64,
    pub failed: u64,
    /// 429 responses seen (one record can contribute several).
    pub rate_limited: u64,
    /// Input lines rejected by the reader.
    pub skipped_invalid: u64,
    started: Instant,
}

impl Default for RunStats {
    fn default() -> Self {
        Self::new()
    }
}

impl RunStats {
    pub fn new() -> Self {
        Self {
            total: 0,
            succeeded: 0,
            not_found: 0,
            failed: 0,
            rate_limited: 0,
            skipped_invalid: 0,
            started: Instant::now(),
        }
    }

    /// Count one terminal outcome; bumps exactly one of succeeded/not_found/failed.
    pub fn record(&mut self, outcome: &ScrapeOutcome, throttle_events: u32) {
        self.total += 1;
        self.rate_limited += u64::from(throttle_events);
        match outcome {
            ScrapeOutcome::Success(_) => self.succeeded += 1,
            ScrapeOutcome::NotFound(_) => self.not_found += 1,
            _ => self.failed += 1,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Processed records per second since the run started.
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed().as_secs_f64();
        if secs > 0.0 {
            self.total as f64 / secs
        } else {
            0.0
        }
    }

    /// Percentage of processed records that succeeded.
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.succeeded as f64 / self.total as f64 * 100.0
        }
    }
}
