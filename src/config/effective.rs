//! Resolved client context with provenance
//!
//! Layers, lowest precedence first: built-in defaults, host config file
//! (TOML), Unity project settings, CLI flags and environment.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::host::HttpTransportConfig;
use crate::monitor::MonitorConfig;

use super::defaults::BuiltinDefaults;
use super::project::{find_project_settings, ProjectSettings};

/// Host config location under the home directory
pub const HOST_CONFIG_PATH: &str = ".config/ucb/config.toml";

const REDACTED: &str = "[REDACTED]";

/// Origin of a configuration source
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOrigin {
    Builtin,
    Host,
    Project,
    Cli,
}

/// A contributing config source with provenance
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConfigSource {
    pub origin: ConfigOrigin,

    /// File path (None for builtin/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// SHA-256 digest of raw file bytes (None for builtin/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

impl ConfigSource {
    fn file(origin: ConfigOrigin, path: &Path, bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self {
            origin,
            path: Some(path.to_string_lossy().to_string()),
            digest: Some(hex::encode(hasher.finalize())),
        }
    }

    fn inline(origin: ConfigOrigin) -> Self {
        Self {
            origin,
            path: None,
            digest: None,
        }
    }
}

/// Host config file contents; every key is optional
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostConfig {
    pub api_key: Option<String>,
    pub org_id: Option<String>,
    pub project_id: Option<String>,
    pub api_base_url: Option<String>,
    pub poll_interval_seconds: Option<u64>,
    pub http_timeout_seconds: Option<u64>,
    pub connect_timeout_seconds: Option<u64>,
}

/// Values supplied on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct ContextOverrides {
    pub api_key: Option<String>,
    pub org_id: Option<String>,
    pub project_id: Option<String>,
    /// Explicit host config file; must exist when given
    pub config_path: Option<PathBuf>,
    /// Skip the default host config file
    pub ignore_host_config: bool,
    /// Where to start looking for Unity project settings (default: cwd)
    pub project_root: Option<PathBuf>,
}

/// Everything needed to talk to one Cloud Build project
#[derive(Clone)]
pub struct CloudBuildContext {
    pub api_base_url: String,
    pub org_id: String,
    pub project_id: String,
    api_key: String,
    pub poll_interval: Duration,
    pub http_timeout: Duration,
    pub connect_timeout: Duration,
    /// Contributing sources in precedence order
    pub sources: Vec<ConfigSource>,
}

impl fmt::Debug for CloudBuildContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudBuildContext")
            .field("api_base_url", &self.api_base_url)
            .field("org_id", &self.org_id)
            .field("project_id", &self.project_id)
            .field("api_key", &REDACTED)
            .field("poll_interval", &self.poll_interval)
            .field("http_timeout", &self.http_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("sources", &self.sources)
            .finish()
    }
}

#[derive(Default)]
struct Layered {
    api_key: Option<String>,
    org_id: Option<String>,
    project_id: Option<String>,
}

impl Layered {
    fn apply(&mut self, api_key: Option<String>, org_id: Option<String>, project_id: Option<String>) {
        if let Some(v) = non_empty(api_key) {
            self.api_key = Some(v);
        }
        if let Some(v) = non_empty(org_id) {
            self.org_id = Some(v);
        }
        if let Some(v) = non_empty(project_id) {
            self.project_id = Some(v);
        }
    }
}

impl CloudBuildContext {
    pub fn resolve(overrides: ContextOverrides) -> Result<Self, ConfigError> {
        let defaults = BuiltinDefaults::default();
        let mut sources = vec![ConfigSource::inline(ConfigOrigin::Builtin)];
        let mut ids = Layered::default();

        let mut api_base_url = defaults.api_base_url;
        let mut poll_interval_seconds = defaults.poll_interval_seconds;
        let mut http_timeout_seconds = defaults.http_timeout_seconds;
        let mut connect_timeout_seconds = defaults.connect_timeout_seconds;

        // Layer 2: host config
        if let Some((host, source)) = load_host_config(&overrides)? {
            ids.apply(host.api_key, host.org_id, host.project_id);
            if let Some(url) = non_empty(host.api_base_url) {
                api_base_url = url;
            }
            poll_interval_seconds = host.poll_interval_seconds.unwrap_or(poll_interval_seconds);
            http_timeout_seconds = host.http_timeout_seconds.unwrap_or(http_timeout_seconds);
            connect_timeout_seconds = host.connect_timeout_seconds.unwrap_or(connect_timeout_seconds);
            sources.push(source);
        }

        // Layer 3: Unity project settings
        let project_root = match &overrides.project_root {
            Some(root) => Some(root.clone()),
            None => std::env::current_dir().ok(),
        };
        if let Some((project, source)) = project_root.as_deref().and_then(load_project_settings) {
            ids.apply(None, project.org_id, project.project_id);
            sources.push(source);
        }

        // Layer 4: CLI / environment
        if overrides.api_key.is_some() || overrides.org_id.is_some() || overrides.project_id.is_some() {
            ids.apply(overrides.api_key, overrides.org_id, overrides.project_id);
            sources.push(ConfigSource::inline(ConfigOrigin::Cli));
        }

        validate_seconds("poll_interval_seconds", poll_interval_seconds, 3600)?;
        validate_seconds("http_timeout_seconds", http_timeout_seconds, 3600)?;
        validate_seconds("connect_timeout_seconds", connect_timeout_seconds, 300)?;

        let context = Self {
            api_key: ids.api_key.ok_or(ConfigError::Missing("api-key"))?,
            org_id: ids.org_id.ok_or(ConfigError::Missing("org-id"))?,
            project_id: ids.project_id.ok_or(ConfigError::Missing("project-id"))?,
            api_base_url,
            poll_interval: Duration::from_secs(poll_interval_seconds),
            http_timeout: Duration::from_secs(http_timeout_seconds),
            connect_timeout: Duration::from_secs(connect_timeout_seconds),
            sources,
        };
        debug!(?context, "resolved context");
        Ok(context)
    }

    pub fn transport_config(&self) -> HttpTransportConfig {
        HttpTransportConfig {
            base_url: self.api_base_url.clone(),
            org_id: self.org_id.clone(),
            project_id: self.project_id.clone(),
            api_key: self.api_key.clone(),
            timeout: self.http_timeout,
        }
    }

    pub fn monitor_config(&self, abort_on_fail: bool) -> MonitorConfig {
        MonitorConfig {
            poll_interval: self.poll_interval,
            abort_on_fail,
        }
    }

    /// Effective values for display; the API key is never included
    pub fn to_redacted_value(&self) -> Value {
        json!({
            "api_base_url": self.api_base_url,
            "org_id": self.org_id,
            "project_id": self.project_id,
            "api_key": REDACTED,
            "poll_interval_seconds": self.poll_interval.as_secs(),
            "http_timeout_seconds": self.http_timeout.as_secs(),
            "connect_timeout_seconds": self.connect_timeout.as_secs(),
            "sources": self.sources,
        })
    }
}

fn default_host_config_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(HOST_CONFIG_PATH))
}

fn load_host_config(overrides: &ContextOverrides) -> Result<Option<(HostConfig, ConfigSource)>, ConfigError> {
    let (path, required) = match &overrides.config_path {
        Some(path) => (path.clone(), true),
        None if overrides.ignore_host_config => return Ok(None),
        None => match default_host_config_path() {
            Some(path) => (path, false),
            None => return Ok(None),
        },
    };

    if !required && !path.exists() {
        return Ok(None);
    }

    let bytes = fs::read(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    let contents = String::from_utf8(bytes.clone()).map_err(|e| ConfigError::Parse {
        path: path.clone(),
        message: format!("Invalid UTF-8: {}", e),
    })?;
    let host: HostConfig = toml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.clone(),
        message: e.to_string(),
    })?;

    debug!(path = %path.display(), "loaded host config");
    Ok(Some((host, ConfigSource::file(ConfigOrigin::Host, &path, &bytes))))
}

/// Unreadable or malformed project settings are skipped, not fatal
fn load_project_settings(start: &Path) -> Option<(ProjectSettings, ConfigSource)> {
    let path = find_project_settings(start)?;
    let bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cannot read project settings");
            return None;
        }
    };

    match ProjectSettings::parse(&path, &String::from_utf8_lossy(&bytes)) {
        Ok(settings) => {
            debug!(path = %path.display(), "discovered Unity settings");
            Some((settings, ConfigSource::file(ConfigOrigin::Project, &path, &bytes)))
        }
        Err(e) => {
            warn!(error = %e, "ignoring project settings");
            None
        }
    }
}

fn validate_seconds(name: &str, value: u64, max: u64) -> Result<(), ConfigError> {
    if value == 0 || value > max {
        return Err(ConfigError::Invalid(format!("{} must be in (0, {}]", name, max)));
    }
    Ok(())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Missing {0}")]
    Missing(&'static str),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn isolated(dir: &TempDir) -> ContextOverrides {
        ContextOverrides {
            ignore_host_config: true,
            project_root: Some(dir.path().to_path_buf()),
            ..Default::default()
        }
    }

    fn with_ids(dir: &TempDir) -> ContextOverrides {
        ContextOverrides {
            api_key: Some("k".to_string()),
            org_id: Some("org".to_string()),
            project_id: Some("proj".to_string()),
            ..isolated(dir)
        }
    }

    #[test]
    fn test_cli_only() {
        let dir = TempDir::new().unwrap();
        let context = CloudBuildContext::resolve(with_ids(&dir)).unwrap();
        assert_eq!(context.org_id, "org");
        assert_eq!(context.poll_interval, Duration::from_secs(5));
        assert_eq!(
            context.sources.iter().map(|s| s.origin).collect::<Vec<_>>(),
            vec![ConfigOrigin::Builtin, ConfigOrigin::Cli]
        );
    }

    #[test]
    fn test_missing_api_key() {
        let dir = TempDir::new().unwrap();
        let overrides = ContextOverrides {
            api_key: None,
            ..with_ids(&dir)
        };
        let err = CloudBuildContext::resolve(overrides).unwrap_err();
        assert_eq!(err.to_string(), "Missing api-key");
    }

    #[test]
    fn test_host_file_layer_with_digest() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "api_key = \"from-file\"\norg_id = \"file-org\"\npoll_interval_seconds = 2\n").unwrap();

        let overrides = ContextOverrides {
            api_key: None,
            org_id: None,
            config_path: Some(path.clone()),
            ..with_ids(&dir)
        };
        let context = CloudBuildContext::resolve(overrides).unwrap();
        assert_eq!(context.transport_config().api_key, "from-file");
        assert_eq!(context.org_id, "file-org");
        assert_eq!(context.project_id, "proj");
        assert_eq!(context.poll_interval, Duration::from_secs(2));

        let host = &context.sources[1];
        assert_eq!(host.origin, ConfigOrigin::Host);
        assert_eq!(host.digest.as_ref().map(String::len), Some(64));
    }

    #[test]
    fn test_explicit_config_must_exist() {
        let dir = TempDir::new().unwrap();
        let overrides = ContextOverrides {
            config_path: Some(dir.path().join("nope.toml")),
            ..with_ids(&dir)
        };
        assert!(matches!(
            CloudBuildContext::resolve(overrides),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn test_unknown_host_key_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "apikey = \"typo\"\n").unwrap();
        let overrides = ContextOverrides {
            config_path: Some(path),
            ..with_ids(&dir)
        };
        assert!(matches!(
            CloudBuildContext::resolve(overrides),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_project_settings_fill_ids_below_cli() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("ProjectSettings")).unwrap();
        fs::write(
            dir.path().join("ProjectSettings/ProjectSettings.asset"),
            "%YAML 1.1\n--- !u!129 &1\nPlayerSettings:\n  organizationId: unity-org\n  cloudProjectId: unity-proj\n",
        )
        .unwrap();

        let overrides = ContextOverrides {
            api_key: Some("k".to_string()),
            org_id: Some("cli-org".to_string()),
            ..isolated(&dir)
        };
        let context = CloudBuildContext::resolve(overrides).unwrap();
        assert_eq!(context.org_id, "cli-org");
        assert_eq!(context.project_id, "unity-proj");
        assert!(context.sources.iter().any(|s| s.origin == ConfigOrigin::Project));
    }

    #[test]
    fn test_zero_poll_interval_invalid() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "poll_interval_seconds = 0\n").unwrap();
        let overrides = ContextOverrides {
            config_path: Some(path),
            ..with_ids(&dir)
        };
        let err = CloudBuildContext::resolve(overrides).unwrap_err();
        assert!(err.to_string().contains("poll_interval_seconds"));
    }

    #[test]
    fn test_key_never_shown() {
        let dir = TempDir::new().unwrap();
        let overrides = ContextOverrides {
            api_key: Some("super-secret".to_string()),
            ..with_ids(&dir)
        };
        let context = CloudBuildContext::resolve(overrides).unwrap();
        assert!(!format!("{:?}", context).contains("super-secret"));
        assert!(!context.to_redacted_value().to_string().contains("super-secret"));
    }
}
