//! Build records as returned by the build endpoints.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::status::BuildStatus;

/// Identity of a build: (target id, build number).
///
/// Stable across polls of the same build.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BuildKey {
    pub target_id: String,
    pub number: u64,
}

impl fmt::Display for BuildKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} #{}", self.target_id, self.number)
    }
}

/// One build attempt of a build target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Build {
    /// Sequential build number, unique per target
    #[serde(rename = "build")]
    pub number: u64,

    /// Target records spell this `buildtargetid`; both casings occur
    #[serde(rename = "buildTargetId", alias = "buildtargetid")]
    pub target_id: String,

    #[serde(rename = "buildTargetName", default, skip_serializing_if = "Option::is_none")]
    pub target_name: Option<String>,

    #[serde(rename = "buildGUID", default, skip_serializing_if = "Option::is_none")]
    pub guid: Option<String>,

    #[serde(rename = "buildStatus")]
    pub status: BuildStatus,

    #[serde(default)]
    pub platform: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished: Option<DateTime<Utc>>,

    /// Seconds spent building
    #[serde(rename = "buildTimeInSeconds", default)]
    pub build_time_seconds: f64,

    /// Seconds from queueing to completion
    #[serde(rename = "totalTimeInSeconds", default)]
    pub total_time_seconds: f64,

    #[serde(rename = "scmBranch", default, skip_serializing_if = "Option::is_none")]
    pub scm_branch: Option<String>,

    /// Source revision the build was made from; absent for builds that never checked out
    #[serde(rename = "lastBuiltRevision", default, skip_serializing_if = "Option::is_none")]
    pub last_built_revision: Option<String>,

    #[serde(rename = "unityVersion", default, skip_serializing_if = "Option::is_none")]
    pub unity_version: Option<String>,

    #[serde(default)]
    pub links: Links,
}

impl Build {
    pub fn key(&self) -> BuildKey {
        BuildKey {
            target_id: self.target_id.clone(),
            number: self.number,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Primary download link, if the build produced one.
    pub fn download_link(&self) -> Option<&Link> {
        self.links.download_primary.as_ref()
    }
}

/// Links attached to a build.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Links {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<Artifact>,

    #[serde(rename = "self", default, skip_serializing_if = "Option::is_none")]
    pub self_link: Option<Link>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<Link>,

    #[serde(rename = "auditlog", default, skip_serializing_if = "Option::is_none")]
    pub audit_log: Option<Link>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_primary: Option<Link>,
}

/// A hyperlink with optional metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Link {
    #[serde(default)]
    pub method: String,

    pub href: String,

    #[serde(default)]
    pub meta: LinkMeta,
}

impl Link {
    /// Declared content type of the linked resource (e.g. "ZIP", "APK").
    pub fn content_type(&self) -> Option<&str> {
        self.meta.content_type.as_deref()
    }
}

/// Link metadata. Only `type` is interpreted; other keys are carried through.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkMeta {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<ArtifactFile>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactFile {
    pub filename: String,
    pub href: String,
    #[serde(default)]
    pub size: u64,
}

/// Result entry of a start-build request.
///
/// The service reports per-target failures inline instead of failing the
/// whole request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildAttempt {
    #[serde(flatten)]
    pub build: Build,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BuildAttempt {
    pub fn is_error(&self) -> bool {
        self.error.as_deref().map(|e| !e.is_empty()).unwrap_or(false)
    }
}
