//! Configuration management using the prefer crate for discovery.
//!
//! Resolution order, later wins: built-in defaults, config file, environment
//! variables, command-line flags. The last two are handled by the CLI; this
//! module covers the file layer and the resolved [`Settings`].

mod settings;

pub use settings::{ConfigWarning, Settings};

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::scrape::{ExtractError, FieldSelectors};

/// Name used for config file discovery (`didrep.toml`, `didrep.yaml`, ...).
pub const CONFIG_NAME: &str = "didrep";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse {format} config '{}': {message}", path.display())]
    Parse {
        path: PathBuf,
        format: &'static str,
        message: String,
    },
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: &'static str, message: String },
    #[error("Invalid lookup URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("Invalid proxy '{url}': {reason}")]
    InvalidProxy { url: String, reason: String },
    #[error(transparent)]
    InvalidSelector(#[from] ExtractError),
}

/// Config file contents. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrent_requests: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests_per_second: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
    /// Idle pooled connections per host (not a cap on open connections).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_limit: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_compression: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookup_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotate_user_agents: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotate_headers: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_shuffle_chance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referer_chance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_proxy: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_list: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_check_interval: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_check_pause_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub human_delay_chance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_body_bytes: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inter_batch_delay_ms: Option<[u64; 2]>,
    /// Per-field selector chains; fields left out keep the built-in chain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selectors: Option<FieldSelectors>,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Discover a config file in the standard locations.
    ///
    /// A missing file yields the defaults. A discovered file that fails to
    /// parse is reported and ignored.
    pub async fn load() -> Self {
        match prefer::load(CONFIG_NAME).await {
            Ok(pref_config) => {
                if let Some(path) = pref_config.source_path() {
                    match Self::load_from_path(path).await {
                        Ok(config) => config,
                        Err(e) => {
                            tracing::warn!("Ignoring config file: {}", e);
                            Self::default()
                        }
                    }
                } else {
                    Self::default()
                }
            }
            Err(_) => {
                tracing::debug!("No {} config file found, using defaults", CONFIG_NAME);
                Self::default()
            }
        }
    }

    /// Load an explicit path, or discover one when `None`.
    pub async fn load_or_discover(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load_from_path(path).await,
            None => Ok(Self::load().await),
        }
    }

    /// Load configuration from a specific file path.
    /// The format follows the extension: toml, yaml/yml, otherwise JSON.
    pub async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        let parse_error = |format: &'static str, message: String| ConfigError::Parse {
            path: path.to_path_buf(),
            format,
            message,
        };

        let mut config: Config = match ext {
            "toml" => toml::from_str(&contents).map_err(|e| parse_error("TOML", e.to_string()))?,
            "yaml" | "yml" => {
                serde_yaml::from_str(&contents).map_err(|e| parse_error("YAML", e.to_string()))?
            }
            _ => serde_json::from_str(&contents).map_err(|e| parse_error("JSON", e.to_string()))?,
        };

        tracing::debug!("Loaded config from {}", path.display());
        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Directory relative paths resolve against: the config file's, else the CWD.
    pub fn base_dir(&self) -> PathBuf {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }

    /// Expand `~` and resolve relative paths against `base_dir`.
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Overlay every value present in the file onto `settings`.
    pub fn apply_to_settings(&self, settings: &mut Settings) {
        let base_dir = self.base_dir();
        if let Some(ref input) = self.input_file {
            settings.input_file = self.resolve_path(input, &base_dir);
        }
        if let Some(ref output) = self.output_file {
            settings.output_file = self.resolve_path(output, &base_dir);
        }
        if let Some(value) = self.concurrent_requests {
            settings.concurrent_requests = value;
        }
        if let Some(value) = self.timeout_secs {
            settings.timeout_secs = value;
        }
        if let Some(value) = self.max_retries {
            settings.max_retries = value;
        }
        if let Some(value) = self.requests_per_second {
            settings.requests_per_second = value;
        }
        if let Some(value) = self.batch_size {
            settings.batch_size = value;
        }
        if let Some(value) = self.connection_limit {
            settings.connection_limit = value;
        }
        if let Some(value) = self.use_compression {
            settings.use_compression = value;
        }
        if let Some(ref value) = self.lookup_url {
            settings.lookup_url = value.clone();
        }
        if let Some(value) = self.rotate_user_agents {
            settings.rotate_user_agents = value;
        }
        if let Some(value) = self.rotate_headers {
            settings.rotate_headers = value;
        }
        if let Some(value) = self.header_shuffle_chance {
            settings.header_shuffle_chance = value;
        }
        if let Some(value) = self.referer_chance {
            settings.referer_chance = value;
        }
        if let Some(value) = self.use_proxy {
            settings.use_proxy = value;
        }
        if let Some(ref value) = self.proxy_list {
            settings.proxy_list = value.clone();
        }
        if let Some(value) = self.health_check_interval {
            settings.health_check_interval = value;
        }
        if let Some(value) = self.health_check_pause_secs {
            settings.health_check_pause_secs = value;
        }
        if let Some(value) = self.human_delay_chance {
            settings.human_delay_chance = value;
        }
        if let Some(value) = self.min_body_bytes {
            settings.min_body_bytes = value;
        }
        if let Some(value) = self.inter_batch_delay_ms {
            settings.inter_batch_delay_ms = value;
        }
        if let Some(ref value) = self.selectors {
            settings.selectors = value.clone();
        }
    }

    /// Defaults with this file applied.
    pub fn to_settings(&self) -> Settings {
        let mut settings = Settings::default();
        self.apply_to_settings(&mut settings);
        settings
    }
}
