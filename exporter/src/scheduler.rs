//! Collection scheduler.
//!
//! Drives the fixed-interval loop: every tick fetches the bins of each
//! dataset concurrently, derives the metrics once all fetches are done and
//! publishes each successful dataset into the registry. A failing dataset
//! keeps its previous snapshot and never affects the others.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use shared::client::{ApiError, InstrumentApi};
use shared::derive::{derive_metrics, DerivationError};
use shared::models::{Bin, DatasetMetrics};
use shared::storage::MetricRegistry;
use shared::ErrorKind;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::metrics::ExporterMetrics;

/// Phase of a collection cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    /// Waiting for the next tick.
    Idle,
    /// Fetching bins from the API.
    Fetching,
    /// Deriving metrics from the fetched bins.
    Aggregating,
    /// Writing snapshots into the registry.
    Publishing,
}

/// A dataset-scoped collection failure.
#[derive(Debug, Error)]
pub enum CollectError {
    /// The API request failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The fetch did not finish within the collection timeout.
    #[error("Fetching bins timed out after {0:?}")]
    Timeout(Duration),

    /// The bins could not be turned into metrics.
    #[error(transparent)]
    Derivation(#[from] DerivationError),
}

impl CollectError {
    /// Classifies the failure.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Api(e) => e.kind(),
            Self::Timeout(_) => ErrorKind::Transport,
            Self::Derivation(_) => ErrorKind::Derivation,
        }
    }
}

/// Fatal errors while resolving the dataset set at startup.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Discovery was needed but the API call failed.
    #[error("Dataset discovery failed: {0}")]
    Discovery(#[from] ApiError),

    /// No dataset was configured and the API reported none.
    #[error("No datasets configured and none discovered from the API")]
    NoDatasets,
}

/// How the dataset set was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetSource {
    /// Given explicitly in the configuration.
    Configured,
    /// Discovered from the API.
    Discovered,
}

/// Resolves the datasets to poll: the configured list, or every dataset the
/// API serves when none is configured.
///
/// # Errors
///
/// Returns an error if discovery is needed and fails or yields no dataset.
pub async fn resolve_datasets(
    api: &dyn InstrumentApi,
    configured: &[String],
) -> Result<(Vec<String>, DatasetSource), ResolveError> {
    if !configured.is_empty() {
        return Ok((configured.to_vec(), DatasetSource::Configured));
    }

    let discovered = api.list_datasets().await?;
    if discovered.is_empty() {
        return Err(ResolveError::NoDatasets);
    }
    tracing::info!(count = discovered.len(), "Discovered datasets from API");
    Ok((discovered, DatasetSource::Discovered))
}

/// A dataset that failed during a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetFailure {
    /// The dataset identifier.
    pub dataset: String,
    /// The failure category.
    pub kind: ErrorKind,
    /// Human-readable error.
    pub message: String,
}

/// Outcome of one collection cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// When the cycle started.
    pub started_at: DateTime<Utc>,
    /// Wall-clock duration of the cycle.
    pub duration: Duration,
    /// Datasets whose snapshot was replaced.
    pub succeeded: Vec<String>,
    /// Datasets that kept their previous snapshot.
    pub failed: Vec<DatasetFailure>,
}

impl CycleReport {
    /// Number of datasets processed.
    #[must_use]
    pub fn attempted(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}

/// Scheduler timing and derivation settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerSettings {
    /// Time between cycle starts.
    pub interval: Duration,
    /// Staleness threshold in seconds.
    pub threshold_secs: u64,
    /// Bins requested per dataset.
    pub lookback_bins: Option<usize>,
    /// Upper bound of one dataset fetch.
    pub fetch_timeout: Duration,
    /// How long an in-flight cycle may continue after cancellation.
    pub shutdown_grace: Duration,
    /// Re-discover datasets every N cycles (discovered sets only).
    pub rediscover_every: Option<u32>,
}

impl From<&Config> for SchedulerSettings {
    fn from(config: &Config) -> Self {
        Self {
            interval: config.interval(),
            threshold_secs: config.threshold_secs,
            lookback_bins: Some(config.lookback_bins),
            // Slightly above the HTTP timeout so the client reports its own error first.
            fetch_timeout: config.request_timeout() + Duration::from_secs(1),
            shutdown_grace: config.shutdown_grace(),
            rediscover_every: config.rediscover_every,
        }
    }
}

/// The collection loop.
pub struct Scheduler {
    api: Arc<dyn InstrumentApi>,
    registry: Arc<dyn MetricRegistry>,
    metrics: Arc<ExporterMetrics>,
    settings: SchedulerSettings,
    datasets: Vec<String>,
    source: DatasetSource,
}

impl Scheduler {
    /// Creates a scheduler for an already resolved dataset set.
    pub fn new(
        api: Arc<dyn InstrumentApi>,
        registry: Arc<dyn MetricRegistry>,
        metrics: Arc<ExporterMetrics>,
        settings: SchedulerSettings,
        datasets: Vec<String>,
        source: DatasetSource,
    ) -> Self {
        metrics.set_datasets_configured(datasets.len());
        Self {
            api,
            registry,
            metrics,
            settings,
            datasets,
            source,
        }
    }

    /// The datasets polled each cycle.
    #[must_use]
    pub fn datasets(&self) -> &[String] {
        &self.datasets
    }

    /// Runs the loop until `cancel` fires.
    ///
    /// The first cycle starts immediately. A cycle that overruns the interval
    /// delays the next tick instead of overlapping with it. On cancellation an
    /// in-flight cycle gets the configured grace period and is then dropped;
    /// each publish is a single registry swap, so dropping never leaves a
    /// half-written dataset.
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut ticker = interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut completed: u64 = 0;

        tracing::info!(
            datasets = self.datasets.len(),
            interval_secs = self.settings.interval.as_secs(),
            "Collection loop started"
        );

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if self.rediscovery_due(completed) {
                let grace = self.settings.shutdown_grace;
                let rediscovery = self.rediscover();
                tokio::pin!(rediscovery);

                let interrupted = tokio::select! {
                    biased;
                    () = &mut rediscovery => false,
                    () = cancel.cancelled() => {
                        if timeout(grace, &mut rediscovery).await.is_err() {
                            tracing::warn!("Abandoning in-flight dataset re-discovery");
                        }
                        true
                    }
                };
                if interrupted {
                    break;
                }
            }

            let cycle = self.run_cycle();
            tokio::pin!(cycle);

            tokio::select! {
                biased;
                report = &mut cycle => log_report(&report),
                () = cancel.cancelled() => {
                    tracing::info!(
                        grace_secs = self.settings.shutdown_grace.as_secs(),
                        "Shutdown requested during collection cycle"
                    );
                    match timeout(self.settings.shutdown_grace, &mut cycle).await {
                        Ok(report) => log_report(&report),
                        Err(_) => tracing::warn!("Abandoning in-flight collection cycle"),
                    }
                    break;
                }
            }

            completed += 1;
            tracing::debug!(phase = ?CyclePhase::Idle, "Waiting for next tick");
        }

        tracing::info!(cycles = completed, "Collection loop stopped");
    }

    /// Runs one full cycle over every dataset.
    pub async fn run_cycle(&self) -> CycleReport {
        let started_at = Utc::now();
        let clock = Instant::now();

        tracing::debug!(phase = ?CyclePhase::Fetching, datasets = self.datasets.len(), "Collection cycle started");
        let fetched = join_all(
            self.datasets
                .iter()
                .map(|dataset| async move { (dataset, self.fetch(dataset).await) }),
        )
        .await;

        tracing::debug!(phase = ?CyclePhase::Aggregating, "Deriving metrics");
        let now = Utc::now();
        let derived: Vec<(&String, Result<DatasetMetrics, CollectError>)> = fetched
            .into_iter()
            .map(|(dataset, bins)| {
                let metrics = bins.and_then(|bins| {
                    derive_metrics(&bins, now, self.settings.threshold_secs)
                        .map_err(CollectError::from)
                });
                (dataset, metrics)
            })
            .collect();

        tracing::debug!(phase = ?CyclePhase::Publishing, "Publishing metrics");
        let mut succeeded = Vec::new();
        let mut failed = Vec::new();
        for (dataset, result) in derived {
            match result {
                Ok(metrics) => {
                    let up_to_date = metrics.is_up_to_date;
                    match self.registry.publish(dataset, metrics) {
                        Ok(()) => {
                            self.metrics.record_success(dataset, now);
                            if !up_to_date {
                                tracing::warn!(dataset = %dataset, "Dataset is not up to date");
                            }
                            succeeded.push(dataset.clone());
                        }
                        Err(e) => {
                            tracing::error!(dataset = %dataset, error = %e, "Failed to publish metrics");
                            self.metrics.record_failure(dataset, ErrorKind::Registry);
                            failed.push(DatasetFailure {
                                dataset: dataset.clone(),
                                kind: ErrorKind::Registry,
                                message: e.to_string(),
                            });
                        }
                    }
                }
                Err(e) => {
                    let kind = e.kind();
                    tracing::warn!(
                        dataset = %dataset,
                        kind = %kind,
                        error = %e,
                        "Failed to collect dataset, keeping previous values"
                    );
                    self.metrics.record_failure(dataset, kind);
                    failed.push(DatasetFailure {
                        dataset: dataset.clone(),
                        kind,
                        message: e.to_string(),
                    });
                }
            }
        }

        let duration = clock.elapsed();
        self.metrics.record_cycle(started_at, duration);

        CycleReport {
            started_at,
            duration,
            succeeded,
            failed,
        }
    }

    async fn fetch(&self, dataset: &str) -> Result<Vec<Bin>, CollectError> {
        let request = self.api.list_bins(dataset, self.settings.lookback_bins);
        match timeout(self.settings.fetch_timeout, request).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(CollectError::Timeout(self.settings.fetch_timeout)),
        }
    }

    fn rediscovery_due(&self, completed: u64) -> bool {
        match (self.source, self.settings.rediscover_every) {
            (DatasetSource::Discovered, Some(every)) if every > 0 => {
                completed > 0 && completed % u64::from(every) == 0
            }
            _ => false,
        }
    }

    /// Re-runs discovery and reconciles the dataset set with the registry.
    ///
    /// A failed or empty discovery keeps the current set.
    pub async fn rediscover(&mut self) {
        let discovered = match self.api.list_datasets().await {
            Ok(datasets) if !datasets.is_empty() => datasets,
            Ok(_) => {
                tracing::warn!("Re-discovery returned no datasets, keeping current set");
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Re-discovery failed, keeping current set");
                return;
            }
        };

        if discovered == self.datasets {
            return;
        }

        let added: Vec<&String> = discovered
            .iter()
            .filter(|d| !self.datasets.contains(d))
            .collect();
        if !added.is_empty() {
            tracing::info!(datasets = ?added, "New datasets discovered");
        }

        // Vanished datasets lose their self-metrics even if they never published.
        let vanished: Vec<&String> = self
            .datasets
            .iter()
            .filter(|d| !discovered.contains(d))
            .collect();
        for dataset in &vanished {
            self.metrics.forget_dataset(dataset);
        }
        if !vanished.is_empty() {
            tracing::info!(datasets = ?vanished, "Datasets no longer served by the API");
        }

        match self.registry.retain(&discovered) {
            Ok(removed) => {
                for dataset in &removed {
                    self.metrics.forget_dataset(dataset);
                }
                if !removed.is_empty() {
                    tracing::info!(datasets = ?removed, "Removed stale datasets from the registry");
                }
            }
            Err(e) => tracing::error!(error = %e, "Failed to remove stale datasets"),
        }

        self.metrics.set_datasets_configured(discovered.len());
        self.datasets = discovered;
    }
}

fn log_report(report: &CycleReport) {
    tracing::info!(
        attempted = report.attempted(),
        succeeded = report.succeeded.len(),
        failed = report.failed.len(),
        duration_ms = u64::try_from(report.duration.as_millis()).unwrap_or(u64::MAX),
        "Collection cycle complete"
    );
}
