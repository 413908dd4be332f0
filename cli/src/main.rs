//! IFCB exporter CLI
//!
//! Runs the Prometheus exporter for the datasets of an IFCB dashboard.
//!
//! # Usage
//!
//! ```bash
//! ifcb-exporter --base-url https://ifcb.caloos.org/api
//! ifcb-exporter --base-url https://ifcb.caloos.org/api --dataset mvco,santa-cruz-wharf
//! ifcb-exporter --base-url https://ifcb.caloos.org/api once
//! ```

#![deny(unsafe_code)]

use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use exporter::config::{
    Config, DEFAULT_HOST, DEFAULT_INTERVAL_SECS, DEFAULT_LOOKBACK_BINS, DEFAULT_PORT,
    DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_SHUTDOWN_GRACE_SECS, DEFAULT_THRESHOLD_SECS,
};
use tracing_subscriber::EnvFilter;

/// IFCB exporter - Prometheus metrics for IFCB dashboard datasets
#[derive(Debug, Parser)]
#[command(name = "ifcb-exporter")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Base URL of the IFCB dashboard API
    #[arg(short, long, env = "IFCB_EXPORTER_BASE_URL")]
    base_url: String,

    /// Address to bind the metrics endpoint to
    #[arg(long, env = "IFCB_EXPORTER_HOST", default_value = DEFAULT_HOST)]
    host: String,

    /// Port of the metrics endpoint
    #[arg(short, long, env = "IFCB_EXPORTER_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Seconds between collection cycles
    #[arg(short, long, env = "IFCB_EXPORTER_INTERVAL", default_value_t = DEFAULT_INTERVAL_SECS)]
    interval: u64,

    /// Maximum lag of the latest bin, in seconds, for a dataset to be up to date
    #[arg(long, env = "IFCB_EXPORTER_THRESHOLD", default_value_t = DEFAULT_THRESHOLD_SECS)]
    threshold: u64,

    /// Number of most recent bins scanned per dataset
    #[arg(long, env = "IFCB_EXPORTER_LOOKBACK_BINS", default_value_t = DEFAULT_LOOKBACK_BINS)]
    lookback_bins: usize,

    /// Datasets to poll; all datasets served by the API when omitted
    #[arg(short, long = "dataset", env = "IFCB_EXPORTER_DATASETS", value_delimiter = ',')]
    datasets: Vec<String>,

    /// Timeout of each API request, in seconds
    #[arg(long, env = "IFCB_EXPORTER_REQUEST_TIMEOUT", default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS)]
    request_timeout: u64,

    /// Seconds an in-flight cycle may continue after shutdown is requested
    #[arg(long, env = "IFCB_EXPORTER_SHUTDOWN_GRACE", default_value_t = DEFAULT_SHUTDOWN_GRACE_SECS)]
    shutdown_grace: u64,

    /// Re-discover datasets every N cycles (only when no dataset is given)
    #[arg(long, env = "IFCB_EXPORTER_REDISCOVER_EVERY")]
    rediscover_every: Option<u32>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, env = "IFCB_EXPORTER_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, env = "IFCB_EXPORTER_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the exporter until interrupted (default)
    Serve,
    /// Run one collection cycle and print the metrics
    Once,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

impl Cli {
    fn config(&self) -> Config {
        let mut config = Config::new(self.base_url.clone()).with_datasets(self.datasets.clone());
        config.host.clone_from(&self.host);
        config.port = self.port;
        config.interval_secs = self.interval;
        config.threshold_secs = self.threshold;
        config.lookback_bins = self.lookback_bins;
        config.request_timeout_secs = self.request_timeout;
        config.shutdown_grace_secs = self.shutdown_grace;
        config.rediscover_every = self.rediscover_every;
        config
    }
}

fn init_tracing(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => subscriber.init(),
        LogFormat::Json => subscriber.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_format);
    let config = cli.config();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => exporter::run_with_config(config).await,
        Commands::Once => {
            let (report, body) = exporter::collect_once(&config).await?;
            print!("{body}");
            if !report.failed.is_empty() {
                for failure in &report.failed {
                    tracing::error!(
                        dataset = %failure.dataset,
                        kind = %failure.kind,
                        error = %failure.message,
                        "Dataset collection failed"
                    );
                }
                bail!(
                    "{} of {} datasets failed",
                    report.failed.len(),
                    report.attempted()
                );
            }
            Ok(())
        }
    }
}
