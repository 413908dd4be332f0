//! Operational metrics of the exporter itself.
//!
//! These live in their own `prometheus::Registry` owned by the exporter
//! state rather than in process globals, so every test gets a fresh set.

use chrono::{DateTime, Utc};
use prometheus::proto::MetricFamily;
use prometheus::{Gauge, GaugeVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use shared::ErrorKind;
use std::time::Duration;

const FAILURE_KINDS: [ErrorKind; 4] = [
    ErrorKind::Transport,
    ErrorKind::Response,
    ErrorKind::Derivation,
    ErrorKind::Registry,
];

/// Counters and gauges describing the collection loop.
#[derive(Debug, Clone)]
pub struct ExporterMetrics {
    registry: Registry,
    cycles_total: IntCounter,
    last_cycle_duration: Gauge,
    last_cycle_timestamp: Gauge,
    datasets_configured: IntGauge,
    dataset_failures: IntCounterVec,
    last_success: GaugeVec,
}

impl ExporterMetrics {
    /// Creates and registers every exporter metric.
    ///
    /// # Errors
    ///
    /// Returns an error if a metric cannot be created or registered.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let cycles_total = IntCounter::new(
            "ifcb_exporter_cycles_total",
            "Number of completed collection cycles",
        )?;
        let last_cycle_duration = Gauge::new(
            "ifcb_exporter_last_cycle_duration_seconds",
            "Duration of the last collection cycle in seconds",
        )?;
        let last_cycle_timestamp = Gauge::new(
            "ifcb_exporter_last_cycle_timestamp",
            "Unix timestamp at which the last collection cycle started",
        )?;
        let datasets_configured = IntGauge::new(
            "ifcb_exporter_datasets_configured",
            "Number of datasets polled each cycle",
        )?;
        let dataset_failures = IntCounterVec::new(
            Opts::new(
                "ifcb_exporter_dataset_failures_total",
                "Failed dataset collections by failure kind",
            ),
            &["dataset", "kind"],
        )?;
        let last_success = GaugeVec::new(
            Opts::new(
                "ifcb_exporter_last_success_timestamp",
                "Unix timestamp of the last successful collection per dataset",
            ),
            &["dataset"],
        )?;

        registry.register(Box::new(cycles_total.clone()))?;
        registry.register(Box::new(last_cycle_duration.clone()))?;
        registry.register(Box::new(last_cycle_timestamp.clone()))?;
        registry.register(Box::new(datasets_configured.clone()))?;
        registry.register(Box::new(dataset_failures.clone()))?;
        registry.register(Box::new(last_success.clone()))?;

        Ok(Self {
            registry,
            cycles_total,
            last_cycle_duration,
            last_cycle_timestamp,
            datasets_configured,
            dataset_failures,
            last_success,
        })
    }

    /// Records a finished cycle.
    #[allow(clippy::cast_precision_loss)]
    pub fn record_cycle(&self, started_at: DateTime<Utc>, duration: Duration) {
        self.cycles_total.inc();
        self.last_cycle_duration.set(duration.as_secs_f64());
        self.last_cycle_timestamp.set(started_at.timestamp() as f64);
    }

    /// Records a successful collection for `dataset`.
    #[allow(clippy::cast_precision_loss)]
    pub fn record_success(&self, dataset: &str, at: DateTime<Utc>) {
        self.last_success
            .with_label_values(&[dataset])
            .set(at.timestamp() as f64);
    }

    /// Records a failed collection for `dataset`.
    pub fn record_failure(&self, dataset: &str, kind: ErrorKind) {
        self.dataset_failures
            .with_label_values(&[dataset, kind.as_str()])
            .inc();
    }

    /// Sets the number of polled datasets.
    pub fn set_datasets_configured(&self, count: usize) {
        self.datasets_configured
            .set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    /// Drops the per-dataset series of a dataset that is no longer polled.
    pub fn forget_dataset(&self, dataset: &str) {
        // Removal only fails when the series was never created.
        self.last_success.remove_label_values(&[dataset]).ok();
        for kind in FAILURE_KINDS {
            self.dataset_failures
                .remove_label_values(&[dataset, kind.as_str()])
                .ok();
        }
    }

    /// Number of completed cycles.
    #[must_use]
    pub fn cycles(&self) -> u64 {
        self.cycles_total.get()
    }

    /// Number of recorded failures of `kind` for `dataset`.
    #[must_use]
    pub fn failures(&self, dataset: &str, kind: ErrorKind) -> u64 {
        self.dataset_failures
            .with_label_values(&[dataset, kind.as_str()])
            .get()
    }

    /// Gathers every exporter metric family.
    #[must_use]
    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }
}
