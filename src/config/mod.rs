//! Configuration layering
//!
//! Resolves the client context from 4 layers:
//! 1. Built-in defaults
//! 2. Host/user config (~/.config/ucb/config.toml or --config)
//! 3. Unity project settings (ProjectSettings/ProjectSettings.asset)
//! 4. CLI flags and environment

mod defaults;
mod effective;
mod project;

pub use defaults::{BuiltinDefaults, DEFAULT_API_BASE_URL};
pub use effective::{
    CloudBuildContext, ConfigError, ConfigOrigin, ConfigSource, ContextOverrides, HostConfig, HOST_CONFIG_PATH,
};
pub use project::{find_project_settings, ProjectSettings, PROJECT_SETTINGS_PATH};
