//! Completion service configuration

use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Completion service configuration
#[derive(Debug, Deserialize)]
pub struct AiConfig {
    /// Which provider backs the completion port
    #[serde(default)]
    pub provider: AiProvider,

    /// OpenAI API key
    pub openai_api_key: Option<Secret<String>>,

    /// Chat completion model
    #[serde(default = "default_model")]
    pub model: String,

    /// API base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries on failure
    #[serde(default = "default_retries")]
    pub max_retries: u32,
}

/// AI provider type
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    #[default]
    OpenAI,
    /// Canned replies; for local runs without an API key.
    Mock,
}

impl AiConfig {
    /// Get timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Check if OpenAI is configured
    pub fn has_openai(&self) -> bool {
        self.openai_api_key
            .as_ref()
            .is_some_and(|k| !k.expose_secret().trim().is_empty())
    }

    /// Validate AI configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.provider == AiProvider::OpenAI && !self.has_openai() {
            return Err(ValidationError::MissingRequired("RAPPORT__AI__OPENAI_API_KEY"));
        }
        if self.timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout("ai.timeout_secs"));
        }
        Ok(())
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: AiProvider::default(),
            openai_api_key: None,
            model: default_model(),
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
            max_retries: default_retries(),
        }
    }
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_timeout() -> u64 {
    60
}

fn default_retries() -> u32 {
    3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ai_config_defaults() {
        let config = AiConfig::default();
        assert_eq!(config.provider, AiProvider::OpenAI);
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.timeout(), Duration::from_secs(60));
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn test_openai_requires_key() {
        let config = AiConfig::default();
        assert_eq!(
            config.validate(),
            Err(ValidationError::MissingRequired("RAPPORT__AI__OPENAI_API_KEY"))
        );

        let blank = AiConfig {
            openai_api_key: Some(Secret::new("  ".to_string())),
            ..Default::default()
        };
        assert!(!blank.has_openai());
    }

    #[test]
    fn test_mock_needs_no_key() {
        let config = AiConfig {
            provider: AiProvider::Mock,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = AiConfig {
            openai_api_key: Some(Secret::new("sk-xxx".to_string())),
            timeout_secs: 0,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ValidationError::InvalidTimeout("ai.timeout_secs"))
        );
    }
}
