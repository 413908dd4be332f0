use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use super::{ApiError, InstrumentApi};
use crate::models::Bin;

const DATASETS_ENDPOINT: &str = "filter_options";
const BINS_ENDPOINT: &str = "list_bins";

#[derive(Debug, Deserialize)]
struct FilterOptionsResponse {
    #[serde(default)]
    dataset_options: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct BinListResponse {
    data: Vec<Bin>,
}

/// HTTP client for the IFCB dashboard API.
#[derive(Debug, Clone)]
pub struct IfcbClient {
    http: ReqwestClient,
    base_url: Url,
}

impl IfcbClient {
    /// Start building a client for the API rooted at `base_url`
    /// (e.g. `https://ifcb.caloos.org/api`).
    pub fn builder(base_url: impl Into<String>) -> IfcbClientBuilder {
        IfcbClientBuilder::new(base_url)
    }

    /// Convenience constructor with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the HTTP client cannot
    /// be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        Self::builder(base_url).build()
    }

    /// The normalized base URL (always ending in `/`).
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path)
            .map_err(|err| ApiError::InvalidBaseUrl {
                url: self.base_url.to_string(),
                reason: err.to_string(),
            })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
        debug!(%url, "requesting IFCB API");

        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|err| transport_error(&url, err))?;

        let status = response.status();
        debug!(%url, %status, "received IFCB API response");
        if !status.is_success() {
            return Err(ApiError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|err| transport_error(&url, err))?;

        serde_json::from_slice(&body).map_err(|source| ApiError::Malformed {
            url: url.to_string(),
            source,
        })
    }
}

#[async_trait]
impl InstrumentApi for IfcbClient {
    async fn list_datasets(&self) -> Result<Vec<String>, ApiError> {
        let url = self.endpoint(DATASETS_ENDPOINT)?;
        let response: FilterOptionsResponse = self.get_json(url).await?;

        let mut datasets: Vec<String> = response
            .dataset_options
            .into_iter()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();
        datasets.sort();
        datasets.dedup();
        Ok(datasets)
    }

    async fn list_bins(
        &self,
        dataset: &str,
        lookback: Option<usize>,
    ) -> Result<Vec<Bin>, ApiError> {
        let mut url = self.endpoint(BINS_ENDPOINT)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("dataset", dataset);
            if let Some(limit) = lookback {
                query.append_pair("limit", &limit.to_string());
            }
        }

        let response: BinListResponse = self.get_json(url).await?;
        let mut bins = response.data;

        // Most recent first; bins without a sample time sort last.
        bins.sort_by(|a, b| b.sample_time.cmp(&a.sample_time));
        if let Some(limit) = lookback {
            bins.truncate(limit);
        }

        debug!(dataset, bins = bins.len(), "fetched bins");
        Ok(bins)
    }
}

/// Builder for [`IfcbClient`].
#[derive(Debug)]
pub struct IfcbClientBuilder {
    base_url: String,
    timeout: Duration,
    user_agent: String,
}

impl IfcbClientBuilder {
    fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(30),
            user_agent: format!("ifcb-exporter/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Per-request timeout covering connect, send and body download.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Overrides the `User-Agent` header.
    #[must_use]
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    /// Validates the base URL and builds the client.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the HTTP client cannot
    /// be built.
    pub fn build(self) -> Result<IfcbClient, ApiError> {
        let base_url = parse_base_url(&self.base_url)?;
        let http = ReqwestClient::builder()
            .timeout(self.timeout)
            .user_agent(self.user_agent)
            .build()
            .map_err(ApiError::Build)?;

        Ok(IfcbClient { http, base_url })
    }
}

/// Parses and normalizes a base URL so that endpoint paths join below it.
///
/// # Errors
///
/// Returns an error if the URL does not parse, is not http(s), or cannot
/// serve as a base.
pub fn parse_base_url(raw: &str) -> Result<Url, ApiError> {
    let invalid = |reason: String| ApiError::InvalidBaseUrl {
        url: raw.to_string(),
        reason,
    };

    let mut url = Url::parse(raw.trim()).map_err(|err| invalid(err.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if url.cannot_be_a_base() || url.host_str().is_none() {
        return Err(invalid("URL has no host".to_string()));
    }

    url.set_query(None);
    url.set_fragment(None);
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn transport_error(url: &Url, err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::Timeout {
            url: url.to_string(),
        }
    } else {
        ApiError::Transport {
            url: url.to_string(),
            source: err,
        }
    }
}
