//! Build platforms and the short aliases accepted on the command line.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Canonical platform names understood by the build service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Ios,
    Android,
    Webgl,
    StandaloneOsxIntel,
    StandaloneOsxIntel64,
    StandaloneOsxUniversal,
    StandaloneWindows,
    StandaloneWindows64,
    StandaloneLinux,
    StandaloneLinux64,
    StandaloneLinuxUniversal,
}

/// Every canonical platform, in the order the service documents them.
pub const ALL_PLATFORMS: &[Platform] = &[
    Platform::Ios,
    Platform::Android,
    Platform::Webgl,
    Platform::StandaloneOsxIntel,
    Platform::StandaloneOsxIntel64,
    Platform::StandaloneOsxUniversal,
    Platform::StandaloneWindows,
    Platform::StandaloneWindows64,
    Platform::StandaloneLinux,
    Platform::StandaloneLinux64,
    Platform::StandaloneLinuxUniversal,
];

/// Shorthand aliases (alias, canonical platform).
const ALIASES: &[(&str, Platform)] = &[
    ("osx", Platform::StandaloneOsxUniversal),
    ("win", Platform::StandaloneWindows),
    ("win64", Platform::StandaloneWindows64),
    ("linux", Platform::StandaloneLinuxUniversal),
];

/// Returned when a platform name or alias is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("No such platform: {0}")]
pub struct UnknownPlatform(pub String);

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Ios => "ios",
            Platform::Android => "android",
            Platform::Webgl => "webgl",
            Platform::StandaloneOsxIntel => "standaloneosxintel",
            Platform::StandaloneOsxIntel64 => "standaloneosxintel64",
            Platform::StandaloneOsxUniversal => "standaloneosxuniversal",
            Platform::StandaloneWindows => "standalonewindows",
            Platform::StandaloneWindows64 => "standalonewindows64",
            Platform::StandaloneLinux => "standalonelinux",
            Platform::StandaloneLinux64 => "standalonelinux64",
            Platform::StandaloneLinuxUniversal => "standalonelinuxuniversal",
        }
    }

    /// Resolve a canonical name or a shorthand alias.
    pub fn resolve(name: &str) -> Result<Platform, UnknownPlatform> {
        if let Some((_, platform)) = ALIASES.iter().find(|(alias, _)| *alias == name) {
            return Ok(*platform);
        }
        ALL_PLATFORMS
            .iter()
            .find(|p| p.as_str() == name)
            .copied()
            .ok_or_else(|| UnknownPlatform(name.to_string()))
    }
}

impl FromStr for Platform {
    type Err = UnknownPlatform;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Platform::resolve(s)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
