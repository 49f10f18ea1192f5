//! Batch coordinator.
//!
//! Records are processed in fixed-size batches, strictly one batch after
//! another. Within a batch every lookup runs concurrently (bounded by the
//! worker's gate) and results are buffered in completion order. The buffer
//! is flushed once it reaches the batch size, and always before returning,
//! including after cancellation.

use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use indicatif::ProgressBar;
use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::worker::{FetchWorker, LookupReport};
use super::HEALTH_CHECK_NUMBER;
use crate::models::{PhoneNumber, RunStats};
use crate::storage::{flush_logged, CsvOutput, ResultsBuffer};

/// Batching, probing and pacing between batches.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Records per batch, also the flush threshold.
    pub batch_size: usize,
    /// Probe the endpoint every this many processed records. 0 disables.
    pub health_check_interval: u64,
    pub health_check_timeout: Duration,
    /// Pause after a failed probe.
    pub health_check_pause: Duration,
    /// Bounds of the random pause between batches.
    pub inter_batch_delay: (Duration, Duration),
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            health_check_interval: 500,
            health_check_timeout: Duration::from_secs(10),
            health_check_pause: Duration::from_secs(10),
            inter_batch_delay: (Duration::from_millis(500), Duration::from_millis(1500)),
        }
    }
}

/// State owned by the coordinator for the length of a run.
#[derive(Debug, Default)]
pub struct RunContext {
    pub stats: RunStats,
    pub buffer: ResultsBuffer,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&mut self, report: LookupReport) {
        self.stats
            .record(&report.result.outcome, report.throttle_events);
        self.buffer.push(report.result);
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Cancelled,
}

pub struct Coordinator {
    worker: FetchWorker,
    output: CsvOutput,
    config: CoordinatorConfig,
    cancel: CancellationToken,
    progress: ProgressBar,
}

impl Coordinator {
    pub fn new(
        worker: FetchWorker,
        output: CsvOutput,
        config: CoordinatorConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            worker,
            output,
            config,
            cancel,
            progress: ProgressBar::hidden(),
        }
    }

    /// Report progress on this bar.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Process every number. Returns once all are done or the run is cancelled;
    /// the buffer has been flushed in both cases unless the final write failed.
    pub async fn run(&self, numbers: &[PhoneNumber], ctx: &mut RunContext) -> RunOutcome {
        let total = numbers.len();
        let batch_size = self.config.batch_size.max(1);
        let batch_count = total.div_ceil(batch_size);
        self.progress.set_length(total as u64);

        let mut outcome = RunOutcome::Completed;
        for (index, batch) in numbers.chunks(batch_size).enumerate() {
            if self.cancel.is_cancelled() {
                outcome = RunOutcome::Cancelled;
                break;
            }

            debug!(
                "Starting batch {}/{} ({} records)",
                index + 1,
                batch_count,
                batch.len()
            );
            let processed_before = ctx.stats.total;
            if !self.run_batch(batch, ctx).await {
                outcome = RunOutcome::Cancelled;
                break;
            }

            if ctx.buffer.len() >= batch_size {
                flush_logged(&mut ctx.buffer, &self.output);
            }

            self.report_progress(ctx, total);

            if self.health_check_due(processed_before, ctx.stats.total) {
                match self.probe().await {
                    None => {
                        outcome = RunOutcome::Cancelled;
                        break;
                    }
                    Some(true) => {}
                    Some(false) => {
                        warn!(
                            "Health check failed, pausing {:?}",
                            self.config.health_check_pause
                        );
                        if !self.pause(self.config.health_check_pause).await {
                            outcome = RunOutcome::Cancelled;
                            break;
                        }
                    }
                }
            }

            if index + 1 < batch_count && !self.pause(self.inter_batch_delay()).await {
                outcome = RunOutcome::Cancelled;
                break;
            }
        }

        if outcome == RunOutcome::Cancelled {
            warn!("Run cancelled, saving {} buffered results", ctx.buffer.len());
        }
        flush_logged(&mut ctx.buffer, &self.output);
        self.progress.finish_and_clear();
        outcome
    }

    /// Run one batch to completion. Returns false if cancelled mid-batch.
    async fn run_batch(&self, batch: &[PhoneNumber], ctx: &mut RunContext) -> bool {
        let mut pending: FuturesUnordered<_> =
            batch.iter().map(|phone| self.worker.lookup(phone)).collect();

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    warn!("Abandoning {} in-flight lookups", pending.len());
                    return false;
                }
                next = pending.next() => match next {
                    Some(report) => {
                        ctx.record(report);
                        self.progress.inc(1);
                    }
                    None => return true,
                },
            }
        }
    }

    fn report_progress(&self, ctx: &RunContext, total: usize) {
        let processed = ctx.stats.total;
        let percent = if total == 0 {
            100.0
        } else {
            processed as f64 / total as f64 * 100.0
        };
        info!(
            "Progress: {}/{} ({:.1}%) - {:.1} records/min",
            processed,
            total,
            percent,
            ctx.stats.throughput() * 60.0
        );
    }

    /// Whether processing crossed a multiple of the probe interval.
    fn health_check_due(&self, before: u64, after: u64) -> bool {
        let interval = self.config.health_check_interval;
        interval > 0 && after / interval > before / interval
    }

    /// Health check raced against cancellation. `None` when cancelled first.
    async fn probe(&self) -> Option<bool> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            healthy = self.health_check() => Some(healthy),
        }
    }

    /// Probe the endpoint with a known number. True when it answers 200.
    async fn health_check(&self) -> bool {
        let Some(phone) = PhoneNumber::normalize(HEALTH_CHECK_NUMBER) else {
            return true;
        };
        let url = self.worker.endpoint().url_for(&phone);
        let identity = self.worker.fresh_identity();

        match self
            .worker
            .transport()
            .get(&url, &identity, self.config.health_check_timeout)
            .await
        {
            Ok(response) if response.status == 200 => {
                debug!("Health check passed");
                true
            }
            Ok(response) => {
                warn!("Health check returned HTTP {}", response.status);
                false
            }
            Err(e) => {
                warn!("Health check failed: {}", e);
                false
            }
        }
    }

    fn inter_batch_delay(&self) -> Duration {
        let (low, high) = self.config.inter_batch_delay;
        if high <= low {
            return low;
        }
        rand::rng().random_range(low..=high)
    }

    /// Sleep unless cancelled first. Returns false on cancellation.
    async fn pause(&self, duration: Duration) -> bool {
        if duration.is_zero() {
            return !self.cancel.is_cancelled();
        }
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }
}
