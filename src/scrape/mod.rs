//! Lookup pipeline: batch coordinator, fetch worker and field extraction.

pub mod coordinator;
pub mod extract;
pub mod worker;

#[cfg(test)]
pub(crate) mod test_support;

pub use coordinator::{Coordinator, CoordinatorConfig, RunContext, RunOutcome};
pub use extract::{ExtractError, FieldExtractor, FieldSelectors};
pub use worker::{Attempt, FetchWorker, LookupReport, WorkerConfig};

use url::Url;

use crate::models::PhoneNumber;

/// Default lookup endpoint.
pub const DEFAULT_LOOKUP_URL: &str = "https://lookup.robokiller.com/search";

/// Query parameter carrying the number.
pub const LOOKUP_QUERY_PARAM: &str = "q";

/// Known-valid number used by the liveness probe.
pub const HEALTH_CHECK_NUMBER: &str = "5551234567";

/// Lookup endpoint that turns a number into a request URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupEndpoint {
    base: Url,
}

impl LookupEndpoint {
    pub fn new(base: Url) -> Self {
        Self { base }
    }

    pub fn parse(base: &str) -> Result<Self, url::ParseError> {
        Url::parse(base).map(Self::new)
    }

    /// Request URL for a number. Existing query pairs on the base are kept.
    pub fn url_for(&self, phone: &PhoneNumber) -> Url {
        let mut url = self.base.clone();
        url.query_pairs_mut()
            .append_pair(LOOKUP_QUERY_PARAM, phone.as_str());
        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_lookup_url() {
        let phone = PhoneNumber::normalize("(555) 123-4567").unwrap();
        let endpoint = LookupEndpoint::parse(DEFAULT_LOOKUP_URL).unwrap();
        assert_eq!(
            endpoint.url_for(&phone).as_str(),
            "https://lookup.robokiller.com/search?q=5551234567"
        );
    }

    #[test]
    fn test_existing_query_is_preserved() {
        let endpoint = LookupEndpoint::parse("http://127.0.0.1:8080/search?lang=en").unwrap();
        let phone = PhoneNumber::normalize("5557654321").unwrap();
        assert_eq!(
            endpoint.url_for(&phone).as_str(),
            "http://127.0.0.1:8080/search?lang=en&q=5557654321"
        );
    }
}
