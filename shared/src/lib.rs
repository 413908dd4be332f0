//! IFCB Exporter Shared Library
//!
//! This crate contains the types and building blocks used by the IFCB
//! Prometheus exporter: the instrument data model, the dashboard API client,
//! the metric derivation rules and the metric registry.
//!
//! # Modules
//!
//! - [`models`] - Bins, artifacts, sample statistics and derived metric sets
//! - [`client`] - HTTP client for the IFCB dashboard API
//! - [`derive`] - Pure derivation of per-dataset metrics from bins
//! - [`storage`] - Registry holding the latest metrics per dataset
//!
//! # Example
//!
//! ```
//! use chrono::{TimeZone, Utc};
//! use shared::derive::derive_metrics;
//! use shared::models::{Artifact, Bin, SampleStat};
//!
//! let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
//! let bins = vec![
//!     Bin::new("D20231114T221320_IFCB104", 1_699_999_900)
//!         .with_artifact(Artifact::Blobs, 1_699_999_950)
//!         .with_stat(SampleStat::Size, 500_000.0),
//! ];
//!
//! let metrics = derive_metrics(&bins, now, 86_400).unwrap();
//! assert!(metrics.is_up_to_date);
//! assert_eq!(metrics.artifact(Artifact::Blobs).lag_seconds, 50);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod client;
pub mod derive;
pub mod error;
pub mod models;
pub mod storage;

pub use error::ErrorKind;

/// Re-export common dependencies for convenience.
pub use chrono;
pub use serde;
pub use serde_json;
