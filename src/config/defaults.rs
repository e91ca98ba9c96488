//! Built-in defaults (layer 1)

use serde::{Deserialize, Serialize};

/// Public Cloud Build API root
pub const DEFAULT_API_BASE_URL: &str = "https://build-api.cloud.unity3d.com/api/v1";

/// Built-in default configuration values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuiltinDefaults {
    pub api_base_url: String,

    /// Delay between monitor ticks (default: 5)
    pub poll_interval_seconds: u64,

    /// Whole-request timeout for API calls (default: 60)
    pub http_timeout_seconds: u64,

    /// Connection setup timeout, also used for artifact downloads (default: 30)
    pub connect_timeout_seconds: u64,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            poll_interval_seconds: 5,
            http_timeout_seconds: 60,
            connect_timeout_seconds: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let defaults = BuiltinDefaults::default();
        assert_eq!(defaults.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(defaults.poll_interval_seconds, 5);
        assert_eq!(defaults.http_timeout_seconds, 60);
        assert_eq!(defaults.connect_timeout_seconds, 30);
    }
}
