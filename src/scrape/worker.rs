//! Fetch worker: one record's request and retry cycle.
//!
//! Each attempt resolves to an [`Attempt`]. The loop in [`FetchWorker::lookup`]
//! turns those into exactly one terminal [`ScrapeOutcome`] per record.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use url::Url;

use super::extract::FieldExtractor;
use super::LookupEndpoint;
use crate::http_client::{IdentityGenerator, RequestIdentity, Transport, TransportResponse};
use crate::models::{BlockReason, LookupResult, PhoneNumber, RetryReason, ScrapeOutcome};
use crate::rate_limit::RateLimiter;

/// Lowercase substrings that mark a 200 response as a block page.
pub const BLOCK_INDICATORS: &[&str] = &[
    "captcha",
    "access denied",
    "cloudflare",
    "security check",
    "robot",
    "blocked",
    "please verify",
    "unusual traffic",
];

/// Upper bound on the exponential part of a throttle wait.
const MAX_THROTTLE_BASE_SECS: f64 = 60.0;

/// Per-record request behaviour.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Total timeout for one request.
    pub timeout: Duration,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Bodies shorter than this are treated as empty.
    pub min_body_bytes: usize,
    /// Probability of a short pause before the first attempt.
    pub human_delay_chance: f64,
    /// New identity after a 429.
    pub rotate_user_agents: bool,
    /// New identity on every retry.
    pub rotate_headers: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            max_retries: 2,
            min_body_bytes: 1000,
            human_delay_chance: 0.2,
            rotate_user_agents: true,
            rotate_headers: true,
        }
    }
}

/// Result of a single attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Attempt {
    Terminal(ScrapeOutcome),
    /// Server asked us to slow down; wait this long, then try again.
    Throttled { wait: Duration },
    Retry(RetryReason),
}

/// Terminal result of a lookup plus the throttle events it ran into.
#[derive(Debug, Clone)]
pub struct LookupReport {
    pub result: LookupResult,
    pub throttle_events: u32,
}

/// Performs lookups under the shared concurrency gate and rate limiter.
pub struct FetchWorker {
    transport: Arc<dyn Transport>,
    limiter: RateLimiter,
    gate: Arc<Semaphore>,
    identities: IdentityGenerator,
    extractor: Arc<FieldExtractor>,
    endpoint: LookupEndpoint,
    config: WorkerConfig,
}

impl FetchWorker {
    pub fn new(
        transport: Arc<dyn Transport>,
        limiter: RateLimiter,
        gate: Arc<Semaphore>,
        identities: IdentityGenerator,
        extractor: Arc<FieldExtractor>,
        endpoint: LookupEndpoint,
        config: WorkerConfig,
    ) -> Self {
        Self {
            transport,
            limiter,
            gate,
            identities,
            extractor,
            endpoint,
            config,
        }
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn endpoint(&self) -> &LookupEndpoint {
        &self.endpoint
    }

    pub fn fresh_identity(&self) -> RequestIdentity {
        self.identities.generate(&mut rand::rng())
    }

    /// Look up one number. Always returns a terminal outcome.
    pub async fn lookup(&self, phone: &PhoneNumber) -> LookupReport {
        let mut throttle_events = 0;
        let outcome = match self.gate.acquire().await {
            Ok(_permit) => self.run_attempts(phone, &mut throttle_events).await,
            Err(_) => {
                error!("Concurrency gate closed before {} could run", phone);
                ScrapeOutcome::ExhaustedRetries { last: None }
            }
        };

        LookupReport {
            result: LookupResult::new(phone.clone(), outcome),
            throttle_events,
        }
    }

    async fn run_attempts(&self, phone: &PhoneNumber, throttle_events: &mut u32) -> ScrapeOutcome {
        let url = self.endpoint.url_for(phone);
        let attempts = self.config.max_retries.saturating_add(1);
        let mut identity = self.fresh_identity();
        let mut last = None;

        for attempt in 0..attempts {
            self.limiter.acquire().await;

            if attempt == 0 {
                if let Some(delay) = self.human_delay() {
                    tokio::time::sleep(delay).await;
                }
            } else if self.config.rotate_headers {
                identity = self.fresh_identity();
            }

            match self.attempt(phone, &url, &identity, attempt, attempts).await {
                Attempt::Terminal(outcome) => return outcome,
                Attempt::Throttled { wait } => {
                    *throttle_events += 1;
                    self.limiter.record_throttle_signal(wait).await;
                    tokio::time::sleep(wait).await;
                    if self.config.rotate_user_agents {
                        identity = self.fresh_identity();
                    }
                    last = Some(RetryReason::Throttled);
                }
                Attempt::Retry(reason) => {
                    last = Some(reason);
                    if attempt + 1 < attempts {
                        tokio::time::sleep(retry_delay(attempt)).await;
                    }
                }
            }
        }

        error!("All retries failed for {}", phone);
        ScrapeOutcome::ExhaustedRetries { last }
    }

    async fn attempt(
        &self,
        phone: &PhoneNumber,
        url: &Url,
        identity: &RequestIdentity,
        attempt: u32,
        attempts: u32,
    ) -> Attempt {
        debug!(
            "Requesting {} as {} (attempt {}/{})",
            phone,
            identity.family,
            attempt + 1,
            attempts
        );

        match self.transport.get(url, identity, self.config.timeout).await {
            Ok(response) => self.classify(phone, &response, attempt),
            Err(e) if e.kind.is_retryable() => {
                warn!(
                    "{} for {} (attempt {}/{}): {}",
                    e.kind,
                    phone,
                    attempt + 1,
                    attempts,
                    e.message
                );
                Attempt::Retry(RetryReason::Network(e.kind))
            }
            Err(e) => {
                error!("Request for {} failed: {}", phone, e);
                Attempt::Terminal(ScrapeOutcome::NetworkError(e.kind))
            }
        }
    }

    /// Classify a response by status and body.
    pub fn classify(&self, phone: &PhoneNumber, response: &TransportResponse, attempt: u32) -> Attempt {
        match response.status {
            403 => {
                warn!("Blocked (403) for {}", phone);
                Attempt::Terminal(ScrapeOutcome::Blocked(BlockReason::Forbidden))
            }
            429 => {
                let wait = throttle_wait(attempt);
                warn!(
                    "Rate limited (429) for {}, waiting {:.1}s",
                    phone,
                    wait.as_secs_f64()
                );
                Attempt::Throttled { wait }
            }
            200 => Attempt::Terminal(self.inspect_body(phone, &response.body)),
            status @ 400..=499 => {
                warn!("HTTP {} for {}", status, phone);
                Attempt::Terminal(ScrapeOutcome::HttpStatus(status))
            }
            status => {
                warn!("HTTP {} for {}, will retry", status, phone);
                Attempt::Retry(RetryReason::Status(status))
            }
        }
    }

    fn inspect_body(&self, phone: &PhoneNumber, body: &str) -> ScrapeOutcome {
        if let Some(indicator) = find_block_indicator(body) {
            warn!("Block page for {} ({})", phone, indicator);
            return ScrapeOutcome::Blocked(BlockReason::Challenge(indicator.to_string()));
        }

        if body.len() < self.config.min_body_bytes {
            warn!("Response too short for {} ({} bytes)", phone, body.len());
            return ScrapeOutcome::EmptyResponse { bytes: body.len() };
        }

        let outcome = self.extractor.extract(body);
        match &outcome {
            ScrapeOutcome::Success(fields) => info!("{}: {}", phone, fields.reputation),
            ScrapeOutcome::NotFound(_) => info!("{}: no data found", phone),
            ScrapeOutcome::ParseError(reason) => warn!("Could not parse page for {}: {}", phone, reason),
            _ => {}
        }
        outcome
    }

    fn human_delay(&self) -> Option<Duration> {
        let mut rng = rand::rng();
        rng.random_bool(self.config.human_delay_chance.clamp(0.0, 1.0))
            .then(|| Duration::from_millis(rng.random_range(100..=500)))
    }
}

/// First block indicator found in the body, case-insensitively.
pub fn find_block_indicator(body: &str) -> Option<&'static str> {
    let lower = body.to_lowercase();
    BLOCK_INDICATORS
        .iter()
        .copied()
        .find(|indicator| lower.contains(indicator))
}

/// Wait after a 429: `min(2^(attempt+1), 60)` seconds with 0.5x-1.5x jitter.
pub fn throttle_wait(attempt: u32) -> Duration {
    let base = 2f64.powi(attempt.min(16) as i32 + 1).min(MAX_THROTTLE_BASE_SECS);
    let jitter = rand::rng().random_range(0.5..=1.5);
    Duration::from_secs_f64(base * jitter)
}

/// Pause before the next attempt: uniform 1-4 seconds scaled by attempt number.
pub fn retry_delay(attempt: u32) -> Duration {
    let secs = rand::rng().random_range(1.0..=4.0) * f64::from(attempt + 1);
    Duration::from_secs_f64(secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::TransportError;
    use crate::models::NetworkErrorKind;
    use crate::scrape::extract::FieldSelectors;
    use crate::scrape::test_support::{ok, page, status, ScriptedTransport};
    use tokio::time::Instant;

    fn worker(transport: Arc<ScriptedTransport>) -> FetchWorker {
        worker_with(
            transport,
            WorkerConfig {
                human_delay_chance: 0.0,
                ..Default::default()
            },
        )
    }

    fn worker_with(transport: Arc<ScriptedTransport>, config: WorkerConfig) -> FetchWorker {
        FetchWorker::new(
            transport,
            RateLimiter::new(1000.0).unwrap(),
            Arc::new(Semaphore::new(4)),
            IdentityGenerator::default(),
            Arc::new(FieldExtractor::new(&FieldSelectors::default()).unwrap()),
            LookupEndpoint::parse(crate::scrape::DEFAULT_LOOKUP_URL).unwrap(),
            config,
        )
    }

    fn rotation(max_retries: u32, rotate_user_agents: bool, rotate_headers: bool) -> WorkerConfig {
        WorkerConfig {
            max_retries,
            human_delay_chance: 0.0,
            rotate_user_agents,
            rotate_headers,
            ..Default::default()
        }
    }

    fn all_same(identities: &[RequestIdentity]) -> bool {
        identities.windows(2).all(|pair| pair[0] == pair[1])
    }

    fn phone() -> PhoneNumber {
        PhoneNumber::normalize("5551234567").unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_first_attempt() {
        let transport = ScriptedTransport::new(vec![ok(page(
            r#"<div id="userReputation"><h3>Scam Likely</h3></div>"#,
        ))]);
        let report = worker(transport.clone()).lookup(&phone()).await;
        assert_eq!(report.result.to_row().reputation, "Scam Likely");
        assert_eq!(report.throttle_events, 0);
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_forbidden_is_terminal() {
        let transport = ScriptedTransport::new(vec![status(403)]);
        let report = worker(transport.clone()).lookup(&phone()).await;
        assert_eq!(
            report.result.outcome,
            ScrapeOutcome::Blocked(BlockReason::Forbidden)
        );
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_error_is_not_retried() {
        let transport = ScriptedTransport::new(vec![status(404)]);
        let report = worker(transport.clone()).lookup(&phone()).await;
        assert_eq!(report.result.outcome, ScrapeOutcome::HttpStatus(404));
        assert_eq!(report.result.to_row().reputation, "HTTP 404");
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_then_success() {
        let transport = ScriptedTransport::new(vec![
            status(429),
            ok(page(r#"<div id="userReputation"><h3>Positive</h3></div>"#)),
        ]);
        let start = Instant::now();
        let report = worker(transport.clone()).lookup(&phone()).await;
        assert!(report.result.outcome.is_success());
        assert_eq!(report.throttle_events, 1);
        assert_eq!(transport.calls(), 2);
        // 2s base with at least 0.5x jitter, and the limiter honours the cooldown.
        assert!(start.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_errors_exhaust_retries() {
        let transport = ScriptedTransport::new(vec![status(502)]);
        let report = worker(transport.clone()).lookup(&phone()).await;
        assert_eq!(
            report.result.outcome,
            ScrapeOutcome::ExhaustedRetries {
                last: Some(RetryReason::Status(502))
            }
        );
        assert_eq!(report.result.to_row().reputation, "Error");
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_delays_scale_with_attempt() {
        let transport = ScriptedTransport::new(vec![status(500)]);
        let start = Instant::now();
        worker(transport).lookup(&phone()).await;
        // Delays after attempts 1 and 2 only: [1,4]*1 + [1,4]*2.
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(3), "{:?}", elapsed);
        assert!(elapsed <= Duration::from_secs(13), "{:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_retried() {
        let transport = ScriptedTransport::new(vec![
            Err(TransportError::new(NetworkErrorKind::Timeout, "timed out")),
            ok(page(r#"<div id="userReputation"><h3>Neutral</h3></div>"#)),
        ]);
        let report = worker(transport.clone()).lookup(&phone()).await;
        assert!(report.result.outcome.is_success());
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_network_error_is_terminal() {
        let transport = ScriptedTransport::new(vec![Err(TransportError::new(
            NetworkErrorKind::Redirect,
            "too many redirects",
        ))]);
        let report = worker(transport.clone()).lookup(&phone()).await;
        assert_eq!(
            report.result.outcome,
            ScrapeOutcome::NetworkError(NetworkErrorKind::Redirect)
        );
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_block_page_detected_case_insensitively() {
        let transport = ScriptedTransport::new(vec![ok(page("<h1>Please complete the CAPTCHA</h1>"))]);
        let report = worker(transport).lookup(&phone()).await;
        assert_eq!(
            report.result.outcome,
            ScrapeOutcome::Blocked(BlockReason::Challenge("captcha".to_string()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_body_is_empty_response() {
        let transport = ScriptedTransport::new(vec![ok("<html></html>".to_string())]);
        let report = worker(transport.clone()).lookup(&phone()).await;
        assert_eq!(
            report.result.outcome,
            ScrapeOutcome::EmptyResponse { bytes: 13 }
        );
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_page_without_reputation_is_not_found() {
        let transport = ScriptedTransport::new(vec![ok(page("<h1>Unknown caller</h1>"))]);
        let report = worker(transport).lookup(&phone()).await;
        assert!(matches!(report.result.outcome, ScrapeOutcome::NotFound(_)));
        assert!(!report.result.outcome.is_failure());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_get_fresh_identities() {
        let transport = ScriptedTransport::new(vec![status(500)]);
        worker_with(transport.clone(), rotation(6, false, true))
            .lookup(&phone())
            .await;
        let identities = transport.identities();
        assert_eq!(identities.len(), 7);
        assert!(!all_same(&identities));
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_gets_fresh_identity() {
        let transport = ScriptedTransport::new(vec![status(429)]);
        worker_with(transport.clone(), rotation(6, true, false))
            .lookup(&phone())
            .await;
        let identities = transport.identities();
        assert_eq!(identities.len(), 7);
        assert!(!all_same(&identities));
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_error_keeps_identity_without_header_rotation() {
        let transport = ScriptedTransport::new(vec![status(500)]);
        worker_with(transport.clone(), rotation(6, true, false))
            .lookup(&phone())
            .await;
        let identities = transport.identities();
        assert_eq!(identities.len(), 7);
        assert!(all_same(&identities));
    }

    #[tokio::test(start_paused = true)]
    async fn test_identity_fixed_when_rotation_disabled() {
        let transport = ScriptedTransport::new(vec![status(429), status(429), status(500)]);
        worker_with(transport.clone(), rotation(6, false, false))
            .lookup(&phone())
            .await;
        let identities = transport.identities();
        assert_eq!(identities.len(), 7);
        assert!(all_same(&identities));
    }

    #[tokio::test(start_paused = true)]
    async fn test_human_delay_before_first_attempt() {
        let transport = ScriptedTransport::new(vec![ok(page(
            r#"<div id="userReputation"><h3>Positive</h3></div>"#,
        ))]);
        let config = WorkerConfig {
            human_delay_chance: 1.0,
            ..Default::default()
        };
        let start = Instant::now();
        let report = worker_with(transport, config).lookup(&phone()).await;
        let elapsed = start.elapsed();
        assert!(report.result.outcome.is_success());
        assert!(elapsed >= Duration::from_millis(100), "{:?}", elapsed);
        assert!(elapsed <= Duration::from_millis(500), "{:?}", elapsed);
    }

    #[test]
    fn test_throttle_wait_bounds() {
        for attempt in 0..10 {
            let base = 2f64.powi(attempt as i32 + 1).min(60.0);
            let wait = throttle_wait(attempt).as_secs_f64();
            assert!(wait >= base * 0.5 - 1e-9 && wait <= base * 1.5 + 1e-9);
        }
        assert!(throttle_wait(40).as_secs_f64() <= 90.0 + 1e-9);
    }

    #[test]
    fn test_find_block_indicator() {
        assert_eq!(find_block_indicator("Access Denied by policy"), Some("access denied"));
        assert_eq!(find_block_indicator("<p>Lookup results for RoboKiller</p>"), None);
    }
}
