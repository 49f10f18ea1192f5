//! Per-record lookup outcomes and their flat output shape.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use super::PhoneNumber;

/// Marker written to `reputation` when no selector matched.
pub const NOT_FOUND_MARKER: &str = "Not Found";
/// Marker written to `reputation` when the body could not be treated as markup.
pub const PARSE_ERROR_MARKER: &str = "Parse Error";

/// Fields extracted from a lookup page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScrapedFields {
    pub reputation: String,
    pub user_reports: String,
    pub total_calls: String,
    pub last_call: String,
}

/// Kind of transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkErrorKind {
    Timeout,
    Connect,
    Request,
    Body,
    Redirect,
    Builder,
    Other,
}

impl NetworkErrorKind {
    /// Whether a failure of this kind is worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::Connect | Self::Request | Self::Body
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Connect => "connection failed",
            Self::Request => "request failed",
            Self::Body => "body read failed",
            Self::Redirect => "redirect error",
            Self::Builder => "invalid request",
            Self::Other => "network error",
        }
    }
}

impl fmt::Display for NetworkErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an attempt did not produce a terminal outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryReason {
    /// A retryable transport failure.
    Network(NetworkErrorKind),
    /// A non-4xx, non-200 status.
    Status(u16),
    /// Server signalled throttling (429).
    Throttled,
}

impl fmt::Display for RetryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(kind) => write!(f, "{}", kind),
            Self::Status(code) => write!(f, "HTTP {}", code),
            Self::Throttled => f.write_str("rate limited"),
        }
    }
}

/// Why a lookup was classified as blocked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockReason {
    /// HTTP 403.
    Forbidden,
    /// A 200 response whose body contained a block indicator.
    Challenge(String),
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Forbidden => f.write_str("HTTP 403"),
            Self::Challenge(indicator) => write!(f, "block page ({})", indicator),
        }
    }
}

/// Terminal result of looking up one phone number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrapeOutcome {
    /// Page parsed and the reputation field matched.
    Success(ScrapedFields),
    /// Page parsed but no reputation was found; other fields may still be set.
    NotFound(ScrapedFields),
    /// Body was not usable markup.
    ParseError(String),
    Blocked(BlockReason),
    /// Body shorter than the plausibility threshold.
    EmptyResponse { bytes: usize },
    /// Unretried client error.
    HttpStatus(u16),
    /// Non-retryable transport failure.
    NetworkError(NetworkErrorKind),
    ExhaustedRetries { last: Option<RetryReason> },
}

impl ScrapeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Whether this outcome counts against the failure counter.
    pub fn is_failure(&self) -> bool {
        !matches!(self, Self::Success(_) | Self::NotFound(_))
    }

    /// Value written to the `reputation` column.
    pub fn reputation_marker(&self) -> String {
        match self {
            Self::Success(fields) => fields.reputation.clone(),
            Self::NotFound(_) => NOT_FOUND_MARKER.to_string(),
            Self::ParseError(_) => PARSE_ERROR_MARKER.to_string(),
            Self::Blocked(_) => "Blocked".to_string(),
            Self::EmptyResponse { .. } => "Empty Response".to_string(),
            Self::HttpStatus(code) => format!("HTTP {}", code),
            Self::NetworkError(_) => "Network Error".to_string(),
            Self::ExhaustedRetries { .. } => "Error".to_string(),
        }
    }
}

/// A terminal outcome bound to the number it belongs to.
#[derive(Debug, Clone)]
pub struct LookupResult {
    pub phone: PhoneNumber,
    pub outcome: ScrapeOutcome,
    pub scraped_at: DateTime<Utc>,
}

impl LookupResult {
    pub fn new(phone: PhoneNumber, outcome: ScrapeOutcome) -> Self {
        Self {
            phone,
            outcome,
            scraped_at: Utc::now(),
        }
    }

    /// Flatten into the output row shape.
    pub fn to_row(&self) -> OutputRow {
        let fields = match &self.outcome {
            ScrapeOutcome::Success(fields) | ScrapeOutcome::NotFound(fields) => fields.clone(),
            _ => ScrapedFields::default(),
        };
        OutputRow {
            phone_number: self.phone.to_string(),
            reputation: self.outcome.reputation_marker(),
            user_reports: fields.user_reports,
            total_calls: fields.total_calls,
            last_call: fields.last_call,
            scraped_at: self.scraped_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

/// One row of the output file, in column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputRow {
    pub phone_number: String,
    pub reputation: String,
    pub user_reports: String,
    pub total_calls: String,
    pub last_call: String,
    pub scraped_at: String,
}
