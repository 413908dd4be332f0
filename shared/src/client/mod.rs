//! IFCB dashboard API client.
//!
//! The `InstrumentApi` trait is the boundary between the collection loop and
//! the remote API; `IfcbClient` is its HTTP implementation. The client never
//! retries: every tick of the collection loop already retries every dataset.

mod http;

pub use http::{parse_base_url, IfcbClient, IfcbClientBuilder};

use async_trait::async_trait;
use thiserror::Error;

use crate::error::ErrorKind;
use crate::models::Bin;

/// Errors that can occur while talking to the dashboard API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The configured base URL is not usable.
    #[error("Invalid base URL '{url}': {reason}")]
    InvalidBaseUrl {
        /// The rejected URL.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    /// The request did not complete within the timeout.
    #[error("Request to {url} timed out")]
    Timeout {
        /// The requested URL.
        url: String,
    },

    /// The request failed before a response was received.
    #[error("Request to {url} failed: {source}")]
    Transport {
        /// The requested URL.
        url: String,
        /// The underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// The API answered with a non-success status code.
    #[error("Request to {url} returned HTTP {status}")]
    Status {
        /// The requested URL.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The response body is not the expected JSON document.
    #[error("Malformed response from {url}: {source}")]
    Malformed {
        /// The requested URL.
        url: String,
        /// The parse error.
        #[source]
        source: serde_json::Error,
    },
}

impl ApiError {
    /// Classifies the error as a transport or a response failure.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidBaseUrl { .. }
            | Self::Build(_)
            | Self::Timeout { .. }
            | Self::Transport { .. } => ErrorKind::Transport,
            Self::Status { .. } | Self::Malformed { .. } => ErrorKind::Response,
        }
    }
}

/// Read access to the instrument data API.
#[async_trait]
pub trait InstrumentApi: Send + Sync {
    /// Lists the identifiers of every dataset the API serves, sorted and
    /// without duplicates.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, non-success status or an
    /// unparseable body.
    async fn list_datasets(&self) -> Result<Vec<String>, ApiError>;

    /// Lists the bins of `dataset`, most recent first, keeping at most
    /// `lookback` bins when set. An empty list is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, non-success status or an
    /// unparseable body.
    async fn list_bins(&self, dataset: &str, lookback: Option<usize>)
        -> Result<Vec<Bin>, ApiError>;
}
