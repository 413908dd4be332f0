//! Bin data model.
//!
//! A bin is one acquisition unit of an Imaging FlowCytobot. The dashboard API
//! reports each bin with its sample time, the derived products (artifacts)
//! that exist for it and a set of scalar sample statistics.

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A Unix timestamp in whole seconds.
///
/// On the wire this is accepted either as a number of seconds or as an
/// ISO-8601 / RFC 3339 string (`2024-05-01T12:00:00Z`). Strings without an
/// offset are interpreted as UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawTimestamp", into = "i64")]
pub struct UnixTime(i64);

impl UnixTime {
    /// Creates a timestamp from seconds since the Unix epoch.
    #[must_use]
    pub const fn from_secs(secs: i64) -> Self {
        Self(secs)
    }

    /// Returns the number of seconds since the Unix epoch.
    #[must_use]
    pub const fn as_secs(self) -> i64 {
        self.0
    }

    /// Parses a textual timestamp.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem if the text is not a recognised
    /// timestamp format.
    pub fn parse(text: &str) -> Result<Self, String> {
        let text = text.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
            return Ok(Self(dt.timestamp()));
        }
        for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
                return Ok(Self(naive.and_utc().timestamp()));
            }
        }
        Err(format!("unrecognised timestamp '{text}'"))
    }
}

impl From<UnixTime> for i64 {
    fn from(ts: UnixTime) -> Self {
        ts.0
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Seconds(i64),
    Fractional(f64),
    Text(String),
}

impl TryFrom<RawTimestamp> for UnixTime {
    type Error = String;

    fn try_from(raw: RawTimestamp) -> Result<Self, Self::Error> {
        match raw {
            RawTimestamp::Seconds(secs) => Ok(Self(secs)),
            RawTimestamp::Fractional(secs) if secs.is_finite() => {
                // Truncation to whole seconds is the intended resolution.
                #[allow(clippy::cast_possible_truncation)]
                let whole = secs.trunc() as i64;
                Ok(Self(whole))
            }
            RawTimestamp::Fractional(secs) => Err(format!("non-finite timestamp {secs}")),
            RawTimestamp::Text(text) => Self::parse(&text),
        }
    }
}

/// A derived data product attached to a bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Artifact {
    /// Segmented blob images.
    Blobs,
    /// Extracted morphological features.
    Features,
    /// Classifier output scores.
    ClassScores,
}

impl Artifact {
    /// All artifacts, in exposition order.
    pub const ALL: [Self; 3] = [Self::Blobs, Self::Features, Self::ClassScores];

    /// Returns the snake_case name used in metric names and on the wire.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Blobs => "blobs",
            Self::Features => "features",
            Self::ClassScores => "class_scores",
        }
    }

    /// Returns the dotted path of this artifact's timestamp field, for error messages.
    #[must_use]
    pub fn timestamp_field(self) -> &'static str {
        match self {
            Self::Blobs => "blobs.timestamp",
            Self::Features => "features.timestamp",
            Self::ClassScores => "class_scores.timestamp",
        }
    }
}

impl std::fmt::Display for Artifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire record for one artifact of a bin.
///
/// The artifact counts as present when `timestamp` is set, even if the
/// payload is empty.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ArtifactRecord {
    /// When the artifact was produced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<UnixTime>,
    /// Payload size in bytes, if reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// Scalar statistics reported for every bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleStat {
    /// Raw data size.
    Size,
    /// Instrument temperature.
    Temperature,
    /// Instrument humidity.
    Humidity,
    /// Total run time of the acquisition.
    RunTime,
    /// Time the camera was able to trigger.
    LookTime,
    /// Volume analyzed.
    MlAnalyzed,
    /// ROI concentration.
    Concentration,
    /// Number of triggers.
    NTriggers,
    /// Number of images.
    NImages,
}

impl SampleStat {
    /// All statistics, in exposition order.
    pub const ALL: [Self; 9] = [
        Self::Size,
        Self::Temperature,
        Self::Humidity,
        Self::RunTime,
        Self::LookTime,
        Self::MlAnalyzed,
        Self::Concentration,
        Self::NTriggers,
        Self::NImages,
    ];

    /// Returns the snake_case name used in metric names and on the wire.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Size => "size",
            Self::Temperature => "temperature",
            Self::Humidity => "humidity",
            Self::RunTime => "run_time",
            Self::LookTime => "look_time",
            Self::MlAnalyzed => "ml_analyzed",
            Self::Concentration => "concentration",
            Self::NTriggers => "n_triggers",
            Self::NImages => "n_images",
        }
    }

    /// Returns the human-readable unit of the statistic.
    #[must_use]
    pub fn unit(self) -> &'static str {
        match self {
            Self::Size => "Bytes",
            Self::Temperature => "Degrees C",
            Self::Humidity => "Percentage",
            Self::RunTime | Self::LookTime => "Seconds",
            Self::MlAnalyzed => "Milliliters",
            Self::Concentration => "ROIs / ml",
            Self::NTriggers | Self::NImages => "Count",
        }
    }
}

impl std::fmt::Display for SampleStat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The scalar statistics of one bin. Missing fields stay `None`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct SampleStats {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub look_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ml_analyzed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concentration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_triggers: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_images: Option<f64>,
}

impl SampleStats {
    /// Returns the value of one statistic.
    #[must_use]
    pub fn get(&self, stat: SampleStat) -> Option<f64> {
        *self.slot(stat)
    }

    /// Sets the value of one statistic.
    pub fn set(&mut self, stat: SampleStat, value: Option<f64>) {
        *self.slot_mut(stat) = value;
    }

    fn slot(&self, stat: SampleStat) -> &Option<f64> {
        match stat {
            SampleStat::Size => &self.size,
            SampleStat::Temperature => &self.temperature,
            SampleStat::Humidity => &self.humidity,
            SampleStat::RunTime => &self.run_time,
            SampleStat::LookTime => &self.look_time,
            SampleStat::MlAnalyzed => &self.ml_analyzed,
            SampleStat::Concentration => &self.concentration,
            SampleStat::NTriggers => &self.n_triggers,
            SampleStat::NImages => &self.n_images,
        }
    }

    fn slot_mut(&mut self, stat: SampleStat) -> &mut Option<f64> {
        match stat {
            SampleStat::Size => &mut self.size,
            SampleStat::Temperature => &mut self.temperature,
            SampleStat::Humidity => &mut self.humidity,
            SampleStat::RunTime => &mut self.run_time,
            SampleStat::LookTime => &mut self.look_time,
            SampleStat::MlAnalyzed => &mut self.ml_analyzed,
            SampleStat::Concentration => &mut self.concentration,
            SampleStat::NTriggers => &mut self.n_triggers,
            SampleStat::NImages => &mut self.n_images,
        }
    }
}

/// One bin as reported by the dashboard API.
///
/// # Example
///
/// ```
/// use shared::models::{Artifact, Bin, SampleStat};
///
/// let bin = Bin::new("D20240501T120000_IFCB104", 1_714_564_800)
///     .with_artifact(Artifact::Features, 1_714_565_000)
///     .with_stat(SampleStat::Temperature, 18.5);
///
/// assert!(bin.has_artifact(Artifact::Features));
/// assert!(!bin.has_artifact(Artifact::Blobs));
/// assert_eq!(bin.stat(SampleStat::Temperature), Some(18.5));
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Bin {
    /// Bin identifier (e.g. `D20240501T120000_IFCB104`).
    #[serde(default)]
    pub pid: String,

    /// When the sample was taken.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_time: Option<UnixTime>,

    /// Blob product, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blobs: Option<ArtifactRecord>,

    /// Features product, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<ArtifactRecord>,

    /// Class scores product, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_scores: Option<ArtifactRecord>,

    /// Scalar sample statistics.
    #[serde(flatten)]
    pub stats: SampleStats,
}

impl Bin {
    /// Creates a bin with the given identifier and sample time (Unix seconds).
    #[must_use]
    pub fn new(pid: impl Into<String>, sample_time: i64) -> Self {
        Self {
            pid: pid.into(),
            sample_time: Some(UnixTime::from_secs(sample_time)),
            ..Self::default()
        }
    }

    /// Attaches an artifact produced at `timestamp` (Unix seconds).
    #[must_use]
    pub fn with_artifact(mut self, artifact: Artifact, timestamp: i64) -> Self {
        *self.artifact_slot(artifact) = Some(ArtifactRecord {
            timestamp: Some(UnixTime::from_secs(timestamp)),
            size: None,
        });
        self
    }

    /// Sets one sample statistic.
    #[must_use]
    pub fn with_stat(mut self, stat: SampleStat, value: f64) -> Self {
        self.stats.set(stat, Some(value));
        self
    }

    /// Returns the wire record of an artifact, if the API reported one.
    #[must_use]
    pub fn artifact(&self, artifact: Artifact) -> Option<&ArtifactRecord> {
        match artifact {
            Artifact::Blobs => self.blobs.as_ref(),
            Artifact::Features => self.features.as_ref(),
            Artifact::ClassScores => self.class_scores.as_ref(),
        }
    }

    /// Returns the artifact's timestamp; `None` means the artifact is absent.
    #[must_use]
    pub fn artifact_timestamp(&self, artifact: Artifact) -> Option<UnixTime> {
        self.artifact(artifact).and_then(|record| record.timestamp)
    }

    /// Returns true if the bin carries the artifact.
    #[must_use]
    pub fn has_artifact(&self, artifact: Artifact) -> bool {
        self.artifact_timestamp(artifact).is_some()
    }

    /// Returns the value of one sample statistic.
    #[must_use]
    pub fn stat(&self, stat: SampleStat) -> Option<f64> {
        self.stats.get(stat)
    }

    fn artifact_slot(&mut self, artifact: Artifact) -> &mut Option<ArtifactRecord> {
        match artifact {
            Artifact::Blobs => &mut self.blobs,
            Artifact::Features => &mut self.features,
            Artifact::ClassScores => &mut self.class_scores,
        }
    }
}
