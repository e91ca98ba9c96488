//! Unity project settings discovery (layer 3)
//!
//! `ProjectSettings/ProjectSettings.asset` is Unity-flavoured YAML: it starts
//! with `%YAML`/`%TAG` directives and marks documents with `--- !u!NNN &N`.
//! Those lines are dropped before parsing.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::effective::ConfigError;

/// Settings file location relative to a Unity project root
pub const PROJECT_SETTINGS_PATH: &str = "ProjectSettings/ProjectSettings.asset";

/// Cloud identifiers found in a Unity project
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectSettings {
    pub org_id: Option<String>,
    pub project_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AssetFile {
    #[serde(rename = "PlayerSettings", default)]
    player_settings: PlayerSettings,
}

#[derive(Debug, Default, Deserialize)]
struct PlayerSettings {
    #[serde(rename = "organizationId", default)]
    organization_id: Option<String>,
    #[serde(rename = "cloudProjectId", default)]
    cloud_project_id: Option<String>,
}

impl ProjectSettings {
    pub fn parse(path: &Path, text: &str) -> Result<Self, ConfigError> {
        let stripped: String = text
            .lines()
            .filter(|line| !line.starts_with('%') && !line.starts_with("--- "))
            .collect::<Vec<_>>()
            .join("\n");

        let asset: AssetFile = serde_yaml::from_str(&stripped).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        Ok(Self {
            org_id: non_empty(asset.player_settings.organization_id),
            project_id: non_empty(asset.player_settings.cloud_project_id),
        })
    }
}

/// Nearest `ProjectSettings/ProjectSettings.asset` at or above `start`.
///
/// Stops at the first candidate that exists; a directory in its place ends
/// the search with nothing found.
pub fn find_project_settings(start: &Path) -> Option<PathBuf> {
    for dir in start.ancestors() {
        let candidate = dir.join(PROJECT_SETTINGS_PATH);
        if candidate.exists() {
            return candidate.is_file().then_some(candidate);
        }
    }
    None
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const ASSET: &str = "%YAML 1.1\n%TAG !u! tag:unity3d.com,2011:\n--- !u!129 &1\nPlayerSettings:\n  m_ObjectHideFlags: 0\n  productName: Game\n  organizationId: acme-org\n  cloudProjectId: 1234-abcd\n  someList:\n  - 1\n  - 2\n";

    #[test]
    fn test_parse_unity_asset() {
        let settings = ProjectSettings::parse(Path::new("x"), ASSET).unwrap();
        assert_eq!(settings.org_id.as_deref(), Some("acme-org"));
        assert_eq!(settings.project_id.as_deref(), Some("1234-abcd"));
    }

    #[test]
    fn test_blank_ids_are_absent() {
        let text = "--- !u!129 &1\nPlayerSettings:\n  organizationId: \n  cloudProjectId: ''\n";
        let settings = ProjectSettings::parse(Path::new("x"), text).unwrap();
        assert_eq!(settings, ProjectSettings::default());
    }

    #[test]
    fn test_find_walks_up() {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("ProjectSettings")).unwrap();
        fs::write(root.path().join(PROJECT_SETTINGS_PATH), ASSET).unwrap();
        let nested = root.path().join("Assets/Scripts");
        fs::create_dir_all(&nested).unwrap();

        assert_eq!(
            find_project_settings(&nested),
            Some(root.path().join(PROJECT_SETTINGS_PATH))
        );
    }

    #[test]
    fn test_directory_in_place_of_file() {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join(PROJECT_SETTINGS_PATH)).unwrap();
        assert_eq!(find_project_settings(root.path()), None);
    }
}
