//! Build status values.
//!
//! `success`, `failure`, `canceled` and `unknown` are terminal. Every other
//! value, including ones this client has never seen, is treated as active.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Status of a single build attempt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BuildStatus {
    Queued,
    SentToBuilder,
    Started,
    Restarted,
    Success,
    Failure,
    Canceled,
    Unknown,
    /// A status string this client does not recognize.
    Other(String),
}

impl BuildStatus {
    pub fn as_str(&self) -> &str {
        match self {
            BuildStatus::Queued => "queued",
            BuildStatus::SentToBuilder => "sentToBuilder",
            BuildStatus::Started => "started",
            BuildStatus::Restarted => "restarted",
            BuildStatus::Success => "success",
            BuildStatus::Failure => "failure",
            BuildStatus::Canceled => "canceled",
            BuildStatus::Unknown => "unknown",
            BuildStatus::Other(s) => s,
        }
    }

    /// No further transition is expected from a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BuildStatus::Success | BuildStatus::Failure | BuildStatus::Canceled | BuildStatus::Unknown
        )
    }

    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    pub fn is_success(&self) -> bool {
        matches!(self, BuildStatus::Success)
    }
}

impl From<&str> for BuildStatus {
    fn from(value: &str) -> Self {
        match value {
            "queued" => BuildStatus::Queued,
            "sentToBuilder" => BuildStatus::SentToBuilder,
            "started" => BuildStatus::Started,
            "restarted" => BuildStatus::Restarted,
            "success" => BuildStatus::Success,
            "failure" => BuildStatus::Failure,
            "canceled" => BuildStatus::Canceled,
            "unknown" => BuildStatus::Unknown,
            other => BuildStatus::Other(other.to_string()),
        }
    }
}

impl From<String> for BuildStatus {
    fn from(value: String) -> Self {
        BuildStatus::from(value.as_str())
    }
}

impl From<BuildStatus> for String {
    fn from(value: BuildStatus) -> Self {
        value.as_str().to_string()
    }
}

impl FromStr for BuildStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(BuildStatus::from(s))
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
