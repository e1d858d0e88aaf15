use serde::{Deserialize, Serialize};

use crate::common::http::{DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_READ_TIMEOUT_SECS};
use crate::refresh::DEFAULT_REFRESH_INTERVAL;
use crate::resolver::DEFAULT_RESOLVER_TIMEOUT_SECS;

/// Tunables for the refresh proxy and its HTTP collaborators.
///
/// Every field has a default, so a partial (or empty) TOML document is a
/// valid configuration.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RefreshConfig {
    /// How long a token key is trusted before a fetch forces re-resolution,
    /// in milliseconds.
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,
    /// Budget for one resolver round trip, separate from the transport's
    /// own timeout.
    #[serde(default = "default_resolver_timeout_secs")]
    pub resolver_timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,
    /// User agent for segment fetches. `None` uses the built-in default.
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub allow_cross_protocol_redirects: bool,
}

fn default_refresh_interval_ms() -> u64 {
    DEFAULT_REFRESH_INTERVAL.as_millis() as u64
}

fn default_resolver_timeout_secs() -> u64 {
    DEFAULT_RESOLVER_TIMEOUT_SECS
}

fn default_connect_timeout_secs() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

fn default_read_timeout_secs() -> u64 {
    DEFAULT_READ_TIMEOUT_SECS
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: default_refresh_interval_ms(),
            resolver_timeout_secs: default_resolver_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            read_timeout_secs: default_read_timeout_secs(),
            user_agent: None,
            allow_cross_protocol_redirects: false,
        }
    }
}

impl RefreshConfig {
    /// Parse a TOML document. Missing keys fall back to their defaults.
    pub fn from_toml(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RefreshConfig::default();
        assert_eq!(config.refresh_interval_ms, 50_000);
        assert_eq!(config.resolver_timeout_secs, 10);
        assert_eq!(config.connect_timeout_secs, 8);
        assert_eq!(config.read_timeout_secs, 8);
        assert_eq!(config.user_agent, None);
        assert!(!config.allow_cross_protocol_redirects);
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = RefreshConfig::from_toml("").expect("empty document should parse");
        assert_eq!(config.refresh_interval_ms, 50_000);
        assert_eq!(config.resolver_timeout_secs, 10);
    }

    #[test]
    fn test_partial_toml_overrides() {
        let config = RefreshConfig::from_toml(
            r#"
            refresh_interval_ms = 20000
            user_agent = "test-player/1.0"
            "#,
        )
        .expect("document should parse");

        assert_eq!(config.refresh_interval_ms, 20_000);
        assert_eq!(config.user_agent.as_deref(), Some("test-player/1.0"));
        // Untouched keys keep their defaults.
        assert_eq!(config.connect_timeout_secs, 8);
        assert!(!config.allow_cross_protocol_redirects);
    }

    #[test]
    fn test_invalid_toml_is_rejected() {
        assert!(RefreshConfig::from_toml("refresh_interval_ms = \"soon\"").is_err());
    }
}
