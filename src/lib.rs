//! didrep - concurrent phone number reputation lookups.
//!
//! Reads a list of phone numbers, looks each one up against a reputation
//! endpoint under a shared rate limit and concurrency cap, extracts the
//! reputation fields from the returned page and appends the results to a
//! CSV file in batches.

pub mod config;
pub mod http_client;
pub mod input;
pub mod models;
pub mod rate_limit;
pub mod scrape;
pub mod storage;
