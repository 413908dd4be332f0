//! Failure classification shared by the client, the derivation and the scheduler.

use serde::{Deserialize, Serialize};

/// Coarse category of a per-dataset collection failure.
///
/// Used as the `kind` label on the failure counter and in log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// The API could not be reached (connection failure or timeout).
    Transport,
    /// The API answered with a non-success status or an unparseable body.
    Response,
    /// The response parsed but lacked required fields or carried invalid values.
    Derivation,
    /// The derived metrics could not be stored.
    Registry,
}

impl ErrorKind {
    /// Returns the label value for this kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::Response => "response",
            Self::Derivation => "derivation",
            Self::Registry => "registry",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
