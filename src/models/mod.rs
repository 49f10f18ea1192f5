//! Data models for didrep.

mod outcome;
mod phone;
mod stats;

pub use outcome::{
    BlockReason, LookupResult, NetworkErrorKind, OutputRow, RetryReason, ScrapeOutcome,
    ScrapedFields, NOT_FOUND_MARKER, PARSE_ERROR_MARKER,
};
pub use phone::{clean_digits, PhoneNumber, PHONE_DIGITS};
pub use stats::RunStats;
