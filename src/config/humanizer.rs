//! Humanizer service configuration

use secrecy::Secret;
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Rewrite service applied to drafted replies. Disabled means passthrough.
#[derive(Debug, Deserialize)]
pub struct HumanizerConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Base URL exposing `/submit` and `/status`
    pub endpoint: Option<String>,

    pub api_key: Option<Secret<String>>,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_max_polls")]
    pub max_polls: u32,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl HumanizerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.enabled {
            return Ok(());
        }
        let endpoint = self
            .endpoint
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .ok_or(ValidationError::MissingRequired("RAPPORT__HUMANIZER__ENDPOINT"))?;
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            return Err(ValidationError::InvalidHumanizerEndpoint);
        }
        if self.max_polls == 0 {
            return Err(ValidationError::InvalidMaxPolls);
        }
        if self.timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout("humanizer.timeout_secs"));
        }
        Ok(())
    }
}

impl Default for HumanizerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            api_key: None,
            poll_interval_secs: default_poll_interval(),
            max_polls: default_max_polls(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_poll_interval() -> u64 {
    1
}

fn default_max_polls() -> u32 {
    30
}

fn default_timeout() -> u64 {
    60
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled(endpoint: &str) -> HumanizerConfig {
        HumanizerConfig {
            enabled: true,
            endpoint: Some(endpoint.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_disabled_is_always_valid() {
        assert!(HumanizerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_enabled_requires_endpoint() {
        let config = HumanizerConfig {
            enabled: true,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ValidationError::MissingRequired("RAPPORT__HUMANIZER__ENDPOINT"))
        );
    }

    #[test]
    fn test_endpoint_must_be_http() {
        assert_eq!(
            enabled("ftp://rewrite.local").validate(),
            Err(ValidationError::InvalidHumanizerEndpoint)
        );
        assert!(enabled("https://rewrite.local").validate().is_ok());
    }

    #[test]
    fn test_zero_polls_rejected() {
        let config = HumanizerConfig {
            max_polls: 0,
            ..enabled("http://localhost:9000")
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidMaxPolls));
    }
}
