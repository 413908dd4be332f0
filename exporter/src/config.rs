//! Exporter configuration module.
//!
//! Holds every setting of the exporter, with defaults taken from the
//! long-standing behaviour of the IFCB exporter, and validates them before
//! the first collection cycle.

use shared::client::{parse_base_url, ApiError};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use validator::Validate;

/// Default bind address.
pub const DEFAULT_HOST: &str = "0.0.0.0";
/// Default port of the metrics endpoint.
pub const DEFAULT_PORT: u16 = 8000;
/// Default seconds between collection cycles.
pub const DEFAULT_INTERVAL_SECS: u64 = 900;
/// Default staleness threshold (24 hours).
pub const DEFAULT_THRESHOLD_SECS: u64 = 24 * 60 * 60;
/// Default number of recent bins scanned per dataset.
pub const DEFAULT_LOOKBACK_BINS: usize = 1000;
/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
/// Default grace period for an in-flight cycle at shutdown.
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 10;

/// Errors detected while validating the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A field is out of range or malformed.
    #[error("Invalid configuration: {0}")]
    Invalid(#[from] validator::ValidationErrors),

    /// The API base URL is not usable.
    #[error(transparent)]
    BaseUrl(#[from] ApiError),

    /// The host and port do not form a socket address.
    #[error("Invalid listen address '{0}'")]
    ListenAddress(String),

    /// A configured dataset name is blank.
    #[error("Dataset names cannot be empty")]
    EmptyDataset,
}

/// Exporter configuration.
#[derive(Debug, Clone, PartialEq, Eq, Validate)]
pub struct Config {
    /// The host address to bind the metrics endpoint to.
    pub host: String,

    /// The port of the metrics endpoint.
    pub port: u16,

    /// Base URL of the IFCB dashboard API (e.g. `https://ifcb.caloos.org/api`).
    #[validate(url(message = "base URL must be an absolute URL"))]
    pub base_url: String,

    /// Seconds between the start of two collection cycles.
    #[validate(range(min = 1, message = "poll interval must be at least one second"))]
    pub interval_secs: u64,

    /// Maximum lag of the latest bin, in seconds, for a dataset to count as up to date.
    pub threshold_secs: u64,

    /// Number of most recent bins scanned per dataset.
    #[validate(range(min = 1, message = "lookback must cover at least one bin"))]
    pub lookback_bins: usize,

    /// Datasets to poll. Empty means "discover from the API".
    pub datasets: Vec<String>,

    /// Timeout of each API request, in seconds.
    #[validate(range(min = 1, message = "request timeout must be at least one second"))]
    pub request_timeout_secs: u64,

    /// How long an in-flight cycle may run after shutdown is requested.
    pub shutdown_grace_secs: u64,

    /// Re-run dataset discovery every N cycles. `None` disables re-discovery.
    #[validate(range(min = 1, message = "re-discovery period must be at least one cycle"))]
    pub rediscover_every: Option<u32>,
}

impl Config {
    /// Creates a configuration for `base_url` with default values everywhere else.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            base_url: base_url.into(),
            interval_secs: DEFAULT_INTERVAL_SECS,
            threshold_secs: DEFAULT_THRESHOLD_SECS,
            lookback_bins: DEFAULT_LOOKBACK_BINS,
            datasets: Vec::new(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            shutdown_grace_secs: DEFAULT_SHUTDOWN_GRACE_SECS,
            rediscover_every: None,
        }
    }

    /// Sets the explicit dataset list, trimming names and dropping duplicates.
    #[must_use]
    pub fn with_datasets<I, S>(mut self, datasets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names: Vec<String> = Vec::new();
        for name in datasets {
            let name = name.into().trim().to_string();
            if !names.contains(&name) {
                names.push(name);
            }
        }
        self.datasets = names;
        self
    }

    /// Validates every setting.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A numeric setting is out of range
    /// - The base URL is not an absolute http(s) URL
    /// - The host and port do not form a socket address
    /// - A configured dataset name is blank
    pub fn validate_config(&self) -> Result<(), ConfigError> {
        self.validate()?;
        parse_base_url(&self.base_url)?;
        self.socket_addr()?;
        if self.datasets.iter().any(|name| name.trim().is_empty()) {
            return Err(ConfigError::EmptyDataset);
        }
        Ok(())
    }

    /// Returns the socket address for binding.
    ///
    /// # Errors
    ///
    /// Returns an error if the host and port combination cannot be parsed.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse().map_err(|_| ConfigError::ListenAddress(addr))
    }

    /// Returns the poll interval.
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Returns the per-request timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Returns the shutdown grace period.
    #[must_use]
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Config {
        Config::new("https://ifcb.caloos.org/api")
    }

    #[test]
    fn test_config_default_values() {
        let config = valid();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8000);
        assert_eq!(config.interval(), Duration::from_secs(900));
        assert_eq!(config.threshold_secs, 86_400);
        assert_eq!(config.lookback_bins, 1000);
        assert!(config.datasets.is_empty());
        assert!(config.rediscover_every.is_none());
        assert!(config.validate_config().is_ok());
    }

    #[test]
    fn test_config_socket_addr() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 3000,
            ..valid()
        };
        let addr = config.socket_addr().unwrap();
        assert_eq!(addr.to_string(), "127.0.0.1:3000");
    }

    #[test]
    fn test_invalid_host_is_rejected() {
        let config = Config {
            host: "not a host".to_string(),
            ..valid()
        };
        assert!(matches!(
            config.validate_config(),
            Err(ConfigError::ListenAddress(_))
        ));
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let config = Config::new("ifcb.caloos.org/api");
        assert!(matches!(config.validate_config(), Err(ConfigError::Invalid(_))));

        let config = Config::new("ftp://ifcb.caloos.org/api");
        assert!(matches!(config.validate_config(), Err(ConfigError::BaseUrl(_))));
    }

    #[test]
    fn test_zero_values_are_rejected() {
        for config in [
            Config {
                interval_secs: 0,
                ..valid()
            },
            Config {
                lookback_bins: 0,
                ..valid()
            },
            Config {
                request_timeout_secs: 0,
                ..valid()
            },
            Config {
                rediscover_every: Some(0),
                ..valid()
            },
        ] {
            assert!(matches!(config.validate_config(), Err(ConfigError::Invalid(_))));
        }
    }

    #[test]
    fn test_zero_threshold_is_allowed() {
        let config = Config {
            threshold_secs: 0,
            ..valid()
        };
        assert!(config.validate_config().is_ok());
    }

    #[test]
    fn test_with_datasets_normalizes() {
        let config = valid().with_datasets(["mvco", " del-mar ", "mvco"]);
        assert_eq!(config.datasets, vec!["mvco".to_string(), "del-mar".to_string()]);
    }

    #[test]
    fn test_blank_dataset_is_rejected() {
        let config = valid().with_datasets(["mvco", "  "]);
        assert!(matches!(
            config.validate_config(),
            Err(ConfigError::EmptyDataset)
        ));
    }
}
