//! Prometheus text encoding of the registry.
//!
//! Each scrape builds a fresh set of gauge vectors from the registry
//! snapshots. Since every snapshot is an immutable `Arc`, one dataset's
//! series always come from the same collection cycle.

use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};
use shared::models::DatasetMetrics;
use shared::storage::{MetricRegistry, RegistryError};
use thiserror::Error;

use super::ExporterMetrics;

/// Content type of the Prometheus text exposition format.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

const DATASET_LABEL: &str = "dataset";

/// Errors that can occur while rendering the metrics page.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The registry could not be read.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A metric could not be built or encoded.
    #[error("Failed to encode metrics: {0}")]
    Prometheus(#[from] prometheus::Error),

    /// The encoder produced invalid UTF-8.
    #[error("Encoded metrics are not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Renders every dataset metric and every exporter metric as Prometheus text.
///
/// # Errors
///
/// Returns an error if the registry cannot be read or encoding fails.
pub fn encode_metrics(
    registry: &dyn MetricRegistry,
    exporter: &ExporterMetrics,
) -> Result<String, EncodeError> {
    let snapshots = registry.snapshot_all()?;

    let scrape = Registry::new();
    let mut families: Vec<GaugeVec> = Vec::new();
    for gauge in DatasetMetrics::empty().gauges() {
        let family = GaugeVec::new(Opts::new(gauge.name, gauge.help), &[DATASET_LABEL])?;
        scrape.register(Box::new(family.clone()))?;
        families.push(family);
    }

    for snapshot in &snapshots {
        for (family, gauge) in families.iter().zip(snapshot.metrics.gauges()) {
            if let Some(value) = gauge.value {
                family
                    .with_label_values(&[snapshot.dataset.as_str()])
                    .set(value);
            }
        }
    }

    let mut metric_families = scrape.gather();
    metric_families.extend(exporter.gather());

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
