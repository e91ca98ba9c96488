//! Cloud Build Protocol Types
//!
//! Defines the JSON shapes exchanged with the Cloud Build REST API and the
//! resource paths they live under.

pub mod build;
pub mod paths;
pub mod platform;
pub mod status;
pub mod target;

pub use build::{Artifact, ArtifactFile, Build, BuildAttempt, BuildKey, Link, LinkMeta, Links};
pub use platform::{Platform, UnknownPlatform};
pub use status::BuildStatus;
pub use target::{BuildTarget, BuildTargetSettings, ScmSettings};

/// Target identifier the API accepts in place of a concrete target id.
pub const ALL_TARGETS: &str = "_all";

/// Body of a non-2xx API response.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ErrorMessage {
    /// Server-provided error description.
    #[serde(default)]
    pub error: String,
}
