//! Build target records.

use serde::{Deserialize, Serialize};

use crate::build::Build;

/// A configured build pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildTarget {
    #[serde(rename = "buildtargetid", alias = "buildTargetId")]
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub platform: String,

    #[serde(default)]
    pub enabled: bool,

    /// Most recent build(s), present when the listing asked for them
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub builds: Vec<Build>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<BuildTargetSettings>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildTargetSettings {
    #[serde(rename = "autoBuild", default)]
    pub auto_build: bool,

    #[serde(rename = "executablename", default)]
    pub executable_name: String,

    #[serde(default)]
    pub scm: ScmSettings,

    /// Unity version, with `_` separators as the service reports it
    #[serde(rename = "unityVersion", default)]
    pub unity_version: String,
}

impl BuildTargetSettings {
    /// Unity version with dotted separators.
    pub fn display_unity_version(&self) -> String {
        self.unity_version.replace('_', ".")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScmSettings {
    #[serde(default)]
    pub branch: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subdirectory: Option<String>,

    #[serde(rename = "type", default)]
    pub scm_type: String,
}
