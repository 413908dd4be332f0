//! Metric derivation.
//!
//! Turns the bins of one dataset into its [`DatasetMetrics`]. Derivation is a
//! pure function of the bins, the current time and the staleness threshold.
//!
//! Bins are expected most-recent-first, but nothing here trusts that order:
//! the latest bin is the one with the greatest sample time and the latest
//! artifact is the greatest artifact timestamp, so duplicated or shuffled
//! input never moves a metric backwards.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{
    Artifact, ArtifactMetrics, Bin, DatasetMetrics, LagResult, MetricPoint, SampleStat,
    NO_TIMESTAMP,
};

/// Errors raised when a well-formed response carries unusable bins.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DerivationError {
    /// A required field is missing from a bin.
    #[error("Bin '{pid}' is missing required field '{field}'")]
    MissingField {
        /// Identifier of the offending bin.
        pid: String,
        /// Name of the missing field.
        field: &'static str,
    },

    /// A timestamp field is not a positive Unix time.
    #[error("Bin '{pid}' has invalid {field} {value}")]
    InvalidTimestamp {
        /// Identifier of the offending bin.
        pid: String,
        /// Name of the field.
        field: &'static str,
        /// The rejected value.
        value: i64,
    },
}

/// Derives every published metric for one dataset.
///
/// # Arguments
///
/// * `bins` - The dataset's bins within the lookback window
/// * `now` - Reference time for lag computation
/// * `threshold_secs` - Maximum lag of the latest bin for the dataset to be up to date
///
/// # Errors
///
/// Returns an error if a bin lacks its sample time or carries a timestamp at
/// or before the Unix epoch.
pub fn derive_metrics(
    bins: &[Bin],
    now: DateTime<Utc>,
    threshold_secs: u64,
) -> Result<DatasetMetrics, DerivationError> {
    let sample_times = bins
        .iter()
        .map(checked_sample_time)
        .collect::<Result<Vec<_>, _>>()?;

    let Some(latest_index) = latest_index(&sample_times) else {
        return Ok(DatasetMetrics::empty());
    };

    let now = now.timestamp();
    let threshold = i64::try_from(threshold_secs).unwrap_or(i64::MAX);
    let latest_bin = &bins[latest_index];
    let latest_bin_timestamp = sample_times[latest_index];

    let mut metrics = DatasetMetrics::empty();
    metrics.latest_bin_timestamp = latest_bin_timestamp;
    metrics.is_up_to_date = LagResult::compute(Some(latest_bin_timestamp), now, threshold).up_to_date;

    for artifact in Artifact::ALL {
        if let Some(timestamp) = latest_artifact_timestamp(bins, artifact)? {
            let lag = LagResult::compute(Some(timestamp), now, threshold);
            metrics.artifacts.insert(
                artifact,
                ArtifactMetrics {
                    timestamp,
                    lag_seconds: lag.lag_seconds,
                },
            );
        }
    }

    for stat in SampleStat::ALL {
        let point = latest_bin
            .stat(stat)
            .map_or(MetricPoint::UNSET, |value| {
                MetricPoint::observed(value, latest_bin_timestamp)
            });
        metrics.samples.insert(stat, point);
    }

    Ok(metrics)
}

fn checked_sample_time(bin: &Bin) -> Result<i64, DerivationError> {
    let sample_time = bin.sample_time.ok_or_else(|| DerivationError::MissingField {
        pid: bin.pid.clone(),
        field: "sample_time",
    })?;
    positive(bin, "sample_time", sample_time.as_secs())
}

fn positive(bin: &Bin, field: &'static str, value: i64) -> Result<i64, DerivationError> {
    if value > NO_TIMESTAMP {
        Ok(value)
    } else {
        Err(DerivationError::InvalidTimestamp {
            pid: bin.pid.clone(),
            field,
            value,
        })
    }
}

/// Index of the greatest timestamp; the earliest position wins ties.
fn latest_index(timestamps: &[i64]) -> Option<usize> {
    timestamps
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, i64)>, (i, &ts)| match best {
            Some((_, best_ts)) if best_ts >= ts => best,
            _ => Some((i, ts)),
        })
        .map(|(i, _)| i)
}

fn latest_artifact_timestamp(
    bins: &[Bin],
    artifact: Artifact,
) -> Result<Option<i64>, DerivationError> {
    let mut latest: Option<i64> = None;
    for bin in bins {
        if let Some(ts) = bin.artifact_timestamp(artifact) {
            let ts = positive(bin, artifact.timestamp_field(), ts.as_secs())?;
            latest = Some(latest.map_or(ts, |current| current.max(ts)));
        }
    }
    Ok(latest)
}
