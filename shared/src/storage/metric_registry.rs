//! Metric registry trait and implementations.
//!
//! Provides the `MetricRegistry` trait for holding the latest derived metrics
//! of each dataset and an `InMemoryMetricRegistry` implementation.
//!
//! The unit of atomicity is the dataset: a publish replaces the dataset's
//! whole snapshot in one write, so a reader never sees values of two
//! different cycles for the same dataset.

use crate::models::DatasetMetrics;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;

/// Errors that can occur during registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Failed to acquire lock on the registry.
    #[error("Failed to acquire lock on metric registry")]
    LockError,
}

/// The published metrics of one dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSnapshot {
    /// The dataset identifier.
    pub dataset: String,
    /// The derived metrics.
    pub metrics: DatasetMetrics,
    /// When the snapshot was published.
    pub published_at: DateTime<Utc>,
}

/// Trait for the latest-value metric store.
///
/// Implementations must be thread-safe: the collection loop writes while
/// request handlers read.
pub trait MetricRegistry: Send + Sync {
    /// Replaces every metric of `dataset` with `metrics`.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be written.
    fn publish(&self, dataset: &str, metrics: DatasetMetrics) -> Result<(), RegistryError>;

    /// Removes a dataset. Returns true if it was present.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be written.
    fn remove(&self, dataset: &str) -> Result<bool, RegistryError>;

    /// Removes every dataset not in `keep`. Returns the removed identifiers.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be written.
    fn retain(&self, keep: &[String]) -> Result<Vec<String>, RegistryError>;

    /// Returns the snapshot of one dataset, if it was ever published.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be read.
    fn snapshot(&self, dataset: &str) -> Result<Option<Arc<DatasetSnapshot>>, RegistryError>;

    /// Returns every snapshot, ordered by dataset identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be read.
    fn snapshot_all(&self) -> Result<Vec<Arc<DatasetSnapshot>>, RegistryError>;

    /// Returns the number of published datasets.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be read.
    fn len(&self) -> Result<usize, RegistryError>;

    /// Returns true if no dataset was published yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be read.
    fn is_empty(&self) -> Result<bool, RegistryError> {
        Ok(self.len()? == 0)
    }
}

/// In-memory registry keyed by dataset identifier.
///
/// Snapshots are stored behind `Arc` so readers clone pointers under the read
/// lock and render outside of it.
#[derive(Debug, Default)]
pub struct InMemoryMetricRegistry {
    datasets: RwLock<BTreeMap<String, Arc<DatasetSnapshot>>>,
}

impl InMemoryMetricRegistry {
    /// Creates a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new registry wrapped in an Arc.
    #[must_use]
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl MetricRegistry for InMemoryMetricRegistry {
    fn publish(&self, dataset: &str, metrics: DatasetMetrics) -> Result<(), RegistryError> {
        let snapshot = Arc::new(DatasetSnapshot {
            dataset: dataset.to_string(),
            metrics,
            published_at: Utc::now(),
        });
        let mut datasets = self
            .datasets
            .write()
            .map_err(|_| RegistryError::LockError)?;
        datasets.insert(dataset.to_string(), snapshot);
        Ok(())
    }

    fn remove(&self, dataset: &str) -> Result<bool, RegistryError> {
        let mut datasets = self
            .datasets
            .write()
            .map_err(|_| RegistryError::LockError)?;
        Ok(datasets.remove(dataset).is_some())
    }

    fn retain(&self, keep: &[String]) -> Result<Vec<String>, RegistryError> {
        let mut datasets = self
            .datasets
            .write()
            .map_err(|_| RegistryError::LockError)?;
        let removed: Vec<String> = datasets
            .keys()
            .filter(|name| !keep.contains(*name))
            .cloned()
            .collect();
        for name in &removed {
            datasets.remove(name);
        }
        Ok(removed)
    }

    fn snapshot(&self, dataset: &str) -> Result<Option<Arc<DatasetSnapshot>>, RegistryError> {
        let datasets = self
            .datasets
            .read()
            .map_err(|_| RegistryError::LockError)?;
        Ok(datasets.get(dataset).cloned())
    }

    fn snapshot_all(&self) -> Result<Vec<Arc<DatasetSnapshot>>, RegistryError> {
        let datasets = self
            .datasets
            .read()
            .map_err(|_| RegistryError::LockError)?;
        Ok(datasets.values().cloned().collect())
    }

    fn len(&self) -> Result<usize, RegistryError> {
        let datasets = self
            .datasets
            .read()
            .map_err(|_| RegistryError::LockError)?;
        Ok(datasets.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Artifact, ArtifactMetrics, MetricPoint, SampleStat};
    use std::thread;

    #[allow(clippy::cast_precision_loss)]
    fn metrics_at(ts: i64) -> DatasetMetrics {
        let mut metrics = DatasetMetrics::empty();
        metrics.latest_bin_timestamp = ts;
        metrics.is_up_to_date = true;
        metrics.artifacts.insert(
            Artifact::Blobs,
            ArtifactMetrics {
                timestamp: ts,
                lag_seconds: 0,
            },
        );
        for stat in SampleStat::ALL {
            metrics
                .samples
                .insert(stat, MetricPoint::observed(ts as f64, ts));
        }
        metrics
    }

    #[test]
    fn test_new_registry_is_empty() {
        let registry = InMemoryMetricRegistry::new();
        assert!(registry.is_empty().unwrap());
        assert!(registry.snapshot("x").unwrap().is_none());
        assert!(registry.snapshot_all().unwrap().is_empty());
    }

    #[test]
    fn test_publish_and_read() {
        let registry = InMemoryMetricRegistry::new();
        registry.publish("x", metrics_at(100)).unwrap();

        let snapshot = registry.snapshot("x").unwrap().unwrap();
        assert_eq!(snapshot.dataset, "x");
        assert_eq!(snapshot.metrics, metrics_at(100));
        assert_eq!(registry.len().unwrap(), 1);
    }

    #[test]
    fn test_publish_overwrites_previous_values() {
        let registry = InMemoryMetricRegistry::new();
        registry.publish("x", metrics_at(100)).unwrap();
        registry.publish("x", metrics_at(200)).unwrap();

        let snapshot = registry.snapshot("x").unwrap().unwrap();
        assert_eq!(snapshot.metrics.latest_bin_timestamp, 200);
        assert_eq!(registry.len().unwrap(), 1);
    }

    #[test]
    fn test_publish_does_not_touch_other_datasets() {
        let registry = InMemoryMetricRegistry::new();
        registry.publish("a", metrics_at(100)).unwrap();
        registry.publish("b", metrics_at(100)).unwrap();
        registry.publish("a", metrics_at(300)).unwrap();

        assert_eq!(
            registry.snapshot("b").unwrap().unwrap().metrics.latest_bin_timestamp,
            100
        );
    }

    #[test]
    fn test_snapshot_all_is_sorted() {
        let registry = InMemoryMetricRegistry::new();
        registry.publish("zeta", metrics_at(1)).unwrap();
        registry.publish("alpha", metrics_at(2)).unwrap();

        let names: Vec<String> = registry
            .snapshot_all()
            .unwrap()
            .iter()
            .map(|s| s.dataset.clone())
            .collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_remove_and_retain() {
        let registry = InMemoryMetricRegistry::new();
        for name in ["a", "b", "c"] {
            registry.publish(name, metrics_at(1)).unwrap();
        }

        assert!(registry.remove("a").unwrap());
        assert!(!registry.remove("a").unwrap());

        let removed = registry.retain(&["c".to_string()]).unwrap();
        assert_eq!(removed, vec!["b".to_string()]);
        assert_eq!(registry.len().unwrap(), 1);
        assert!(registry.snapshot("c").unwrap().is_some());
    }

    #[test]
    fn test_concurrent_readers_never_see_mixed_snapshots() {
        let registry = InMemoryMetricRegistry::new_shared();
        registry.publish("x", metrics_at(1)).unwrap();

        let writer = {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                for ts in 2..500 {
                    registry.publish("x", metrics_at(ts)).unwrap();
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    for _ in 0..500 {
                        let snapshot = registry.snapshot("x").unwrap().unwrap();
                        let ts = snapshot.metrics.latest_bin_timestamp;
                        assert_eq!(snapshot.metrics.artifact(Artifact::Blobs).timestamp, ts);
                        for stat in SampleStat::ALL {
                            assert_eq!(snapshot.metrics.sample(stat).timestamp, ts);
                        }
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
    }

    #[test]
    fn test_registry_as_trait_object() {
        let registry: Arc<dyn MetricRegistry> = InMemoryMetricRegistry::new_shared();
        registry.publish("x", DatasetMetrics::empty()).unwrap();
        assert!(!registry.is_empty().unwrap());
    }
}
