//! Fully resolved run settings and their validation.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use url::Url;

use super::ConfigError;
use crate::http_client::IdentityGenerator;
use crate::rate_limit::MIN_REQUESTS_PER_SECOND;
use crate::scrape::{
    CoordinatorConfig, FieldExtractor, FieldSelectors, LookupEndpoint, WorkerConfig,
    DEFAULT_LOOKUP_URL,
};

/// Request rate above which blocking becomes likely.
const HIGH_RATE_WARNING: f64 = 10.0;
/// Batch size below which per-batch overhead dominates.
const SMALL_BATCH_WARNING: usize = 10;

/// Upper bound on retries after the first attempt.
const MAX_RETRIES: u32 = 20;

const PROXY_SCHEMES: &[&str] = &["http", "https", "socks5", "socks5h"];

/// Run settings after defaults, config file, environment and flags are merged.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Settings {
    pub input_file: PathBuf,
    pub output_file: PathBuf,
    pub concurrent_requests: usize,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub requests_per_second: f64,
    pub batch_size: usize,
    /// Idle connections kept per host. reqwest has no total cap; the
    /// concurrency gate bounds how many connections are open at once.
    pub connection_limit: usize,
    pub use_compression: bool,
    pub lookup_url: String,
    pub rotate_user_agents: bool,
    pub rotate_headers: bool,
    pub header_shuffle_chance: f64,
    pub referer_chance: f64,
    pub use_proxy: bool,
    pub proxy_list: Vec<String>,
    /// Probe every N processed records; 0 disables.
    pub health_check_interval: u64,
    pub health_check_pause_secs: u64,
    pub human_delay_chance: f64,
    pub min_body_bytes: usize,
    /// Inclusive bounds of the pause between batches.
    pub inter_batch_delay_ms: [u64; 2],
    pub selectors: FieldSelectors,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            input_file: PathBuf::from("numbers.csv"),
            output_file: PathBuf::from("results.csv"),
            concurrent_requests: 30,
            timeout_secs: 15,
            max_retries: 2,
            requests_per_second: 5.0,
            batch_size: 100,
            connection_limit: 100,
            use_compression: true,
            lookup_url: DEFAULT_LOOKUP_URL.to_string(),
            rotate_user_agents: true,
            rotate_headers: true,
            header_shuffle_chance: 0.3,
            referer_chance: 0.5,
            use_proxy: false,
            proxy_list: Vec::new(),
            health_check_interval: 500,
            health_check_pause_secs: 10,
            human_delay_chance: 0.2,
            min_body_bytes: 1000,
            inter_batch_delay_ms: [500, 1500],
            selectors: FieldSelectors::default(),
        }
    }
}

/// A setting that is legal but probably a mistake.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigWarning {
    /// More requests in flight than idle connections kept, so some are reopened.
    ConcurrencyAboveConnectionLimit { concurrency: usize, limit: usize },
    HighRequestRate(f64),
    SmallBatchSize(usize),
    EmptyProxyList,
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConcurrencyAboveConnectionLimit { concurrency, limit } => write!(
                f,
                "concurrent_requests ({}) > connection_limit ({}): connections above the idle pool are reopened per request",
                concurrency, limit
            ),
            Self::HighRequestRate(rate) => {
                write!(f, "High request rate ({}/sec) may cause blocking", rate)
            }
            Self::SmallBatchSize(size) => {
                write!(f, "Small batch_size ({}) may impact performance", size)
            }
            Self::EmptyProxyList => f.write_str("Proxy enabled but proxy_list is empty"),
        }
    }
}

fn invalid(key: &'static str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key,
        message: message.into(),
    }
}

fn check_probability(key: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(key, format!("must be between 0 and 1, got {}", value)))
    }
}

impl Settings {
    /// Check the settings. Hard errors abort; warnings are returned for logging.
    pub fn validate(&self) -> Result<Vec<ConfigWarning>, ConfigError> {
        if !(self.requests_per_second.is_finite()
            && self.requests_per_second >= MIN_REQUESTS_PER_SECOND)
        {
            return Err(invalid(
                "requests_per_second",
                format!(
                    "must be at least {}, got {}",
                    MIN_REQUESTS_PER_SECOND, self.requests_per_second
                ),
            ));
        }
        if self.max_retries > MAX_RETRIES {
            return Err(invalid(
                "max_retries",
                format!("must be at most {}, got {}", MAX_RETRIES, self.max_retries),
            ));
        }
        if self.batch_size == 0 {
            return Err(invalid("batch_size", "must be at least 1"));
        }
        if self.concurrent_requests == 0 {
            return Err(invalid("concurrent_requests", "must be at least 1"));
        }
        check_probability("header_shuffle_chance", self.header_shuffle_chance)?;
        check_probability("referer_chance", self.referer_chance)?;
        check_probability("human_delay_chance", self.human_delay_chance)?;

        self.lookup_endpoint()?;
        if self.use_proxy {
            for proxy in &self.proxy_list {
                validate_proxy(proxy)?;
            }
        }
        FieldExtractor::new(&self.selectors)?;

        let mut warnings = Vec::new();
        if self.concurrent_requests > self.connection_limit {
            warnings.push(ConfigWarning::ConcurrencyAboveConnectionLimit {
                concurrency: self.concurrent_requests,
                limit: self.connection_limit,
            });
        }
        if self.requests_per_second > HIGH_RATE_WARNING {
            warnings.push(ConfigWarning::HighRequestRate(self.requests_per_second));
        }
        if self.batch_size < SMALL_BATCH_WARNING {
            warnings.push(ConfigWarning::SmallBatchSize(self.batch_size));
        }
        if self.use_proxy && self.proxy_list.is_empty() {
            warnings.push(ConfigWarning::EmptyProxyList);
        }
        Ok(warnings)
    }

    pub fn lookup_endpoint(&self) -> Result<LookupEndpoint, ConfigError> {
        LookupEndpoint::parse(&self.lookup_url).map_err(|source| ConfigError::InvalidUrl {
            url: self.lookup_url.clone(),
            source,
        })
    }

    /// Proxies to route through; empty unless proxying is enabled.
    pub fn active_proxies(&self) -> Vec<String> {
        if self.use_proxy {
            self.proxy_list.clone()
        } else {
            Vec::new()
        }
    }

    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            timeout: Duration::from_secs(self.timeout_secs),
            max_retries: self.max_retries,
            min_body_bytes: self.min_body_bytes,
            human_delay_chance: self.human_delay_chance,
            rotate_user_agents: self.rotate_user_agents,
            rotate_headers: self.rotate_headers,
        }
    }

    pub fn coordinator_config(&self) -> CoordinatorConfig {
        let [low, high] = self.inter_batch_delay_ms;
        CoordinatorConfig {
            batch_size: self.batch_size,
            health_check_interval: self.health_check_interval,
            health_check_pause: Duration::from_secs(self.health_check_pause_secs),
            inter_batch_delay: (
                Duration::from_millis(low.min(high)),
                Duration::from_millis(low.max(high)),
            ),
            ..Default::default()
        }
    }

    pub fn identity_generator(&self) -> IdentityGenerator {
        IdentityGenerator::new(self.referer_chance, self.header_shuffle_chance)
    }
}

fn validate_proxy(proxy: &str) -> Result<(), ConfigError> {
    let url = Url::parse(proxy).map_err(|e| ConfigError::InvalidProxy {
        url: proxy.to_string(),
        reason: e.to_string(),
    })?;
    if !PROXY_SCHEMES.contains(&url.scheme()) {
        return Err(ConfigError::InvalidProxy {
            url: proxy.to_string(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate_cleanly() {
        assert!(Settings::default().validate().unwrap().is_empty());
    }

    #[test]
    fn test_warnings() {
        let settings = Settings {
            concurrent_requests: 200,
            requests_per_second: 20.0,
            batch_size: 5,
            use_proxy: true,
            ..Default::default()
        };
        let warnings = settings.validate().unwrap();
        assert_eq!(
            warnings,
            vec![
                ConfigWarning::ConcurrencyAboveConnectionLimit {
                    concurrency: 200,
                    limit: 100
                },
                ConfigWarning::HighRequestRate(20.0),
                ConfigWarning::SmallBatchSize(5),
                ConfigWarning::EmptyProxyList,
            ]
        );
        assert_eq!(
            warnings[0].to_string(),
            "concurrent_requests (200) > connection_limit (100): connections above the idle pool are reopened per request"
        );
    }

    #[test]
    fn test_hard_errors() {
        let cases = [
            Settings {
                requests_per_second: 0.0,
                ..Default::default()
            },
            Settings {
                requests_per_second: 1e-300,
                ..Default::default()
            },
            Settings {
                max_retries: u32::MAX,
                ..Default::default()
            },
            Settings {
                batch_size: 0,
                ..Default::default()
            },
            Settings {
                concurrent_requests: 0,
                ..Default::default()
            },
            Settings {
                referer_chance: 1.5,
                ..Default::default()
            },
            Settings {
                lookup_url: "not a url".to_string(),
                ..Default::default()
            },
            Settings {
                use_proxy: true,
                proxy_list: vec!["ftp://proxy:21".to_string()],
                ..Default::default()
            },
        ];
        for settings in cases {
            assert!(settings.validate().is_err(), "{:?}", settings);
        }
    }

    #[test]
    fn test_invalid_selector_is_a_hard_error() {
        let mut settings = Settings::default();
        settings.selectors.reputation = vec!["div[[".to_string()];
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::InvalidSelector(_))
        ));
    }

    #[test]
    fn test_proxies_ignored_unless_enabled() {
        let settings = Settings {
            proxy_list: vec!["http://127.0.0.1:3128".to_string()],
            ..Default::default()
        };
        assert!(settings.active_proxies().is_empty());
        let settings = Settings {
            use_proxy: true,
            ..settings
        };
        assert_eq!(settings.active_proxies().len(), 1);
    }

    #[test]
    fn test_reversed_delay_bounds_are_ordered() {
        let settings = Settings {
            inter_batch_delay_ms: [2000, 100],
            ..Default::default()
        };
        let config = settings.coordinator_config();
        assert_eq!(
            config.inter_batch_delay,
            (Duration::from_millis(100), Duration::from_millis(2000))
        );
    }
}
