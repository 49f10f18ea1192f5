//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod check_config;
mod scrape;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use didrep::config::{Config, Settings};

#[derive(Parser)]
#[command(name = "didrep")]
#[command(about = "Concurrent phone number reputation lookups")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true, env = "DIDREP_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(flatten)]
    overrides: SettingsArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Print the resolved settings and any configuration warnings
    CheckConfig,
}

/// Flags that override the config file. Each also reads an environment variable.
#[derive(Args, Debug, Default)]
struct SettingsArgs {
    /// Input file with one phone number per line
    #[arg(short, long, global = true, env = "DIDREP_INPUT")]
    input: Option<PathBuf>,

    /// Output CSV file (appended to)
    #[arg(short, long, global = true, env = "DIDREP_OUTPUT")]
    output: Option<PathBuf>,

    /// Maximum simultaneous requests
    #[arg(long, global = true, env = "DIDREP_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Requests per second
    #[arg(long, global = true, env = "DIDREP_RPS")]
    rps: Option<f64>,

    /// Records per batch and flush threshold
    #[arg(long, global = true, env = "DIDREP_BATCH_SIZE")]
    batch_size: Option<usize>,

    /// Per-request timeout in seconds
    #[arg(long, global = true, env = "DIDREP_TIMEOUT")]
    timeout: Option<u64>,

    /// Retries after the first attempt
    #[arg(long, global = true, env = "DIDREP_MAX_RETRIES")]
    max_retries: Option<u32>,

    /// Lookup endpoint; the number is sent as the `q` query parameter
    #[arg(long, global = true, env = "DIDREP_LOOKUP_URL")]
    lookup_url: Option<String>,

    /// Comma-separated proxy URLs (enables proxying)
    #[arg(long, global = true, env = "DIDREP_PROXIES", value_delimiter = ',')]
    proxies: Vec<String>,

    /// Probe the endpoint every N records (0 disables)
    #[arg(long, global = true, env = "DIDREP_HEALTH_CHECK_INTERVAL")]
    health_check_interval: Option<u64>,

    /// Do not negotiate compressed responses
    #[arg(long, global = true, env = "DIDREP_NO_COMPRESSION")]
    no_compression: bool,
}

impl SettingsArgs {
    fn apply(&self, settings: &mut Settings) {
        if let Some(ref input) = self.input {
            settings.input_file = input.clone();
        }
        if let Some(ref output) = self.output {
            settings.output_file = output.clone();
        }
        if let Some(value) = self.concurrency {
            settings.concurrent_requests = value;
        }
        if let Some(value) = self.rps {
            settings.requests_per_second = value;
        }
        if let Some(value) = self.batch_size {
            settings.batch_size = value;
        }
        if let Some(value) = self.timeout {
            settings.timeout_secs = value;
        }
        if let Some(value) = self.max_retries {
            settings.max_retries = value;
        }
        if let Some(ref value) = self.lookup_url {
            settings.lookup_url = value.clone();
        }
        if !self.proxies.is_empty() {
            settings.use_proxy = true;
            settings.proxy_list = self.proxies.clone();
        }
        if let Some(value) = self.health_check_interval {
            settings.health_check_interval = value;
        }
        if self.no_compression {
            settings.use_compression = false;
        }
    }
}

/// Parse arguments, resolve settings and run the selected command.
/// Returns the process exit code.
pub async fn run() -> anyhow::Result<i32> {
    let cli = Cli::parse();

    let config = Config::load_or_discover(cli.config.as_deref()).await?;
    let mut settings = config.to_settings();
    cli.overrides.apply(&mut settings);

    match cli.command {
        Some(Commands::CheckConfig) => check_config::cmd_check_config(&settings, &config),
        None => scrape::cmd_scrape(&settings).await,
    }
}
