//! Derived metric sets.
//!
//! A [`DatasetMetrics`] holds every published value for one dataset. "No data"
//! is always encoded with the sentinels [`NO_TIMESTAMP`] and [`NO_LAG`] so
//! that each dataset exposes the same metric names on every scrape.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::bin::{Artifact, SampleStat};

/// Prefix shared by every published metric name.
pub const METRIC_PREFIX: &str = "ifcb";

/// Timestamp sentinel meaning "never observed".
pub const NO_TIMESTAMP: i64 = 0;

/// Lag sentinel meaning "never observed".
pub const NO_LAG: i64 = -1;

/// Latest known value of one metric, with the time it was observed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    /// The observed value, or `None` if the metric has never been seen.
    pub value: Option<f64>,
    /// Unix timestamp of the observation, or [`NO_TIMESTAMP`].
    pub timestamp: i64,
}

impl MetricPoint {
    /// The "no observation" point.
    pub const UNSET: Self = Self {
        value: None,
        timestamp: NO_TIMESTAMP,
    };

    /// Creates a point observed at `timestamp`.
    #[must_use]
    pub fn observed(value: f64, timestamp: i64) -> Self {
        Self {
            value: Some(value),
            timestamp,
        }
    }

    /// Returns true if the point carries a real observation.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.value.is_some()
    }
}

impl Default for MetricPoint {
    fn default() -> Self {
        Self::UNSET
    }
}

/// Lag of an observation relative to "now", and whether it is within a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LagResult {
    /// Seconds since the observation, or [`NO_LAG`] without one.
    pub lag_seconds: i64,
    /// True if an observation exists and its lag does not exceed the threshold.
    pub up_to_date: bool,
}

impl LagResult {
    /// Computes the lag of `timestamp` at `now` against `threshold_secs`.
    ///
    /// Timestamps at or below zero count as missing. Timestamps in the future
    /// yield a lag of zero, never a negative value that could be mistaken for
    /// the sentinel.
    ///
    /// # Examples
    ///
    /// ```
    /// use shared::models::{LagResult, NO_LAG};
    ///
    /// let lag = LagResult::compute(Some(900), 1_000, 100);
    /// assert_eq!(lag.lag_seconds, 100);
    /// assert!(lag.up_to_date);
    ///
    /// let missing = LagResult::compute(None, 1_000, 100);
    /// assert_eq!(missing.lag_seconds, NO_LAG);
    /// assert!(!missing.up_to_date);
    /// ```
    #[must_use]
    pub fn compute(timestamp: Option<i64>, now: i64, threshold_secs: i64) -> Self {
        match timestamp.filter(|ts| *ts > NO_TIMESTAMP) {
            Some(ts) => {
                let lag_seconds = now.saturating_sub(ts).max(0);
                Self {
                    lag_seconds,
                    up_to_date: lag_seconds <= threshold_secs,
                }
            }
            None => Self {
                lag_seconds: NO_LAG,
                up_to_date: false,
            },
        }
    }
}

/// Latest occurrence of one artifact for a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactMetrics {
    /// Unix timestamp of the latest artifact, or [`NO_TIMESTAMP`].
    pub timestamp: i64,
    /// Seconds since the latest artifact, or [`NO_LAG`].
    pub lag_seconds: i64,
}

impl ArtifactMetrics {
    /// Artifact never observed.
    pub const NONE: Self = Self {
        timestamp: NO_TIMESTAMP,
        lag_seconds: NO_LAG,
    };
}

impl Default for ArtifactMetrics {
    fn default() -> Self {
        Self::NONE
    }
}

/// A single named gauge value ready for exposition.
#[derive(Debug, Clone, PartialEq)]
pub struct GaugeSample {
    /// Full metric name, including [`METRIC_PREFIX`].
    pub name: String,
    /// Help text.
    pub help: String,
    /// Value to expose; `None` leaves the gauge unset for the dataset.
    pub value: Option<f64>,
}

impl GaugeSample {
    fn new(name: String, help: String, value: Option<f64>) -> Self {
        Self { name, help, value }
    }
}

/// Every derived metric for one dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetrics {
    /// Unix timestamp of the latest bin, or [`NO_TIMESTAMP`].
    pub latest_bin_timestamp: i64,
    /// Whether the latest bin is within the staleness threshold.
    pub is_up_to_date: bool,
    /// Latest occurrence of each artifact.
    pub artifacts: BTreeMap<Artifact, ArtifactMetrics>,
    /// Latest value of each sample statistic.
    pub samples: BTreeMap<SampleStat, MetricPoint>,
}

impl DatasetMetrics {
    /// The metric set of a dataset without any bins.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            latest_bin_timestamp: NO_TIMESTAMP,
            is_up_to_date: false,
            artifacts: Artifact::ALL
                .into_iter()
                .map(|a| (a, ArtifactMetrics::NONE))
                .collect(),
            samples: SampleStat::ALL
                .into_iter()
                .map(|s| (s, MetricPoint::UNSET))
                .collect(),
        }
    }

    /// Returns the metrics of one artifact.
    #[must_use]
    pub fn artifact(&self, artifact: Artifact) -> ArtifactMetrics {
        self.artifacts
            .get(&artifact)
            .copied()
            .unwrap_or(ArtifactMetrics::NONE)
    }

    /// Returns the latest point of one sample statistic.
    #[must_use]
    pub fn sample(&self, stat: SampleStat) -> MetricPoint {
        self.samples
            .get(&stat)
            .copied()
            .unwrap_or(MetricPoint::UNSET)
    }

    /// Flattens the set into named gauges.
    ///
    /// The result always contains every metric name; only `_value` gauges of
    /// statistics that were never observed carry `None`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn gauges(&self) -> Vec<GaugeSample> {
        let mut gauges = Vec::with_capacity(2 + 2 * Artifact::ALL.len() + 2 * SampleStat::ALL.len());

        gauges.push(GaugeSample::new(
            format!("{METRIC_PREFIX}_latest_bin_timestamp"),
            "Last bin date for dataset (Unix timestamp), or 0 if none exist".to_string(),
            Some(self.latest_bin_timestamp as f64),
        ));
        gauges.push(GaugeSample::new(
            format!("{METRIC_PREFIX}_is_dataset_up_to_date"),
            "Indicates if the dataset is lagging (0) or up-to-date (1)".to_string(),
            Some(if self.is_up_to_date { 1.0 } else { 0.0 }),
        ));

        for artifact in Artifact::ALL {
            let metrics = self.artifact(artifact);
            let label = artifact.as_str().replace('_', " ");
            gauges.push(GaugeSample::new(
                format!("{METRIC_PREFIX}_latest_{artifact}_timestamp"),
                format!("Last date {label} exist for dataset (Unix timestamp), or 0 if none exist"),
                Some(metrics.timestamp as f64),
            ));
            gauges.push(GaugeSample::new(
                format!("{METRIC_PREFIX}_latest_{artifact}_lag_seconds"),
                format!("Seconds since the latest {label} for dataset, or -1 if none exist"),
                Some(metrics.lag_seconds as f64),
            ));
        }

        for stat in SampleStat::ALL {
            let point = self.sample(stat);
            gauges.push(GaugeSample::new(
                format!("{METRIC_PREFIX}_{stat}_value"),
                format!("Latest {stat} in {}", stat.unit()),
                point.value,
            ));
            gauges.push(GaugeSample::new(
                format!("{METRIC_PREFIX}_{stat}_timestamp"),
                format!("Timestamp of latest {stat} value, or 0 if none exist"),
                Some(point.timestamp as f64),
            ));
        }

        gauges
    }
}

impl Default for DatasetMetrics {
    fn default() -> Self {
        Self::empty()
    }
}
