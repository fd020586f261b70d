//! OpenAI Provider - Implementation of AIProvider for OpenAI's chat completions API.
//!
//! # Configuration
//!
//! ```ignore
//! let config = OpenAIConfig::new(api_key)
//!     .with_model("gpt-4o-mini")
//!     .with_base_url("https://api.openai.com/v1");
//!
//! let provider = OpenAIProvider::new(config);
//! ```
//!
//! Transient failures (rate limits, 5xx, network errors, timeouts) are retried
//! with exponential backoff up to `max_retries` times.

use async_trait::async_trait;
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;

use crate::ports::{
    AIError, AIProvider, CompletionRequest, CompletionResponse, FinishReason, MessageRole,
    ProviderInfo, TokenUsage,
};

/// Configuration for the OpenAI provider.
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    api_key: Secret<String>,
    /// Model to use (e.g., "gpt-4o-mini", "gpt-3.5-turbo").
    pub model: String,
    /// Base URL for the API (default: https://api.openai.com/v1).
    pub base_url: String,
    /// Request timeout.
    pub timeout: Duration,
    /// Maximum retries on transient failures.
    pub max_retries: u32,
}

impl OpenAIConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::from_secret(Secret::new(api_key.into()))
    }

    /// Creates a configuration from an already-wrapped key.
    pub fn from_secret(api_key: Secret<String>) -> Self {
        Self {
            api_key,
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            timeout: Duration::from_secs(60),
            max_retries: 3,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }
}

/// OpenAI API provider implementation.
pub struct OpenAIProvider {
    config: OpenAIConfig,
    client: Client,
}

impl OpenAIProvider {
    pub fn new(config: OpenAIConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "failed to build configured HTTP client, using defaults");
                Client::new()
            });

        Self { config, client }
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url)
    }

    /// Converts our request to OpenAI's format.
    fn to_openai_request(&self, request: &CompletionRequest) -> OpenAIRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);

        if let Some(ref prompt) = request.system_prompt {
            messages.push(OpenAIMessage {
                role: "system".to_string(),
                content: prompt.clone(),
            });
        }

        for msg in &request.messages {
            messages.push(OpenAIMessage {
                role: match msg.role {
                    MessageRole::System => "system",
                    MessageRole::User => "user",
                    MessageRole::Assistant => "assistant",
                }
                .to_string(),
                content: msg.content.clone(),
            });
        }

        OpenAIRequest {
            model: self.config.model.clone(),
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        }
    }

    async fn send_request(&self, request: &CompletionRequest) -> Result<Response, AIError> {
        let openai_request = self.to_openai_request(request);

        self.client
            .post(self.completions_url())
            .header("Authorization", format!("Bearer {}", self.config.api_key()))
            .header("Content-Type", "application/json")
            .json(&openai_request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AIError::timeout(self.config.timeout.as_secs() as u32)
                } else if e.is_connect() {
                    AIError::network(format!("Connection failed: {}", e))
                } else {
                    AIError::network(e.to_string())
                }
            })
    }

    /// Maps non-success statuses onto `AIError`.
    async fn handle_response_status(&self, response: Response) -> Result<Response, AIError> {
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        let error_body = response.text().await.unwrap_or_default();

        match status.as_u16() {
            401 => Err(AIError::AuthenticationFailed),
            429 => Err(AIError::rate_limited(Self::parse_retry_after(&error_body))),
            400 => {
                if error_body.contains("maximum context length")
                    || error_body.contains("context_length_exceeded")
                {
                    Err(AIError::context_too_long(0, 0))
                } else {
                    Err(AIError::InvalidRequest(error_body))
                }
            }
            500..=599 => Err(AIError::unavailable(format!(
                "Server error {}: {}",
                status, error_body
            ))),
            _ => Err(AIError::network(format!(
                "Unexpected status {}: {}",
                status, error_body
            ))),
        }
    }

    /// Reads "try again in Ns" from an error body, defaulting to 30 seconds.
    fn parse_retry_after(error_body: &str) -> u32 {
        const MARKER: &str = "try again in ";
        serde_json::from_str::<serde_json::Value>(error_body)
            .ok()
            .and_then(|parsed| {
                let message = parsed.get("error")?.get("message")?.as_str()?.to_string();
                let rest = &message[message.find(MARKER)? + MARKER.len()..];
                let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
                digits.parse::<u32>().ok()
            })
            .unwrap_or(30)
    }

    async fn parse_response(&self, response: Response) -> Result<CompletionResponse, AIError> {
        let response = self.handle_response_status(response).await?;

        let openai_response: OpenAIResponse = response
            .json()
            .await
            .map_err(|e| AIError::parse(format!("Failed to parse response: {}", e)))?;

        let choice = openai_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AIError::parse("No choices in response"))?;

        let finish_reason = match choice.finish_reason.as_deref() {
            Some("length") => FinishReason::Length,
            Some("content_filter") => FinishReason::ContentFilter,
            _ => FinishReason::Stop,
        };

        let usage = openai_response
            .usage
            .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();

        Ok(CompletionResponse {
            content: choice.message.content,
            usage,
            model: openai_response.model,
            finish_reason,
        })
    }
}

#[async_trait]
impl AIProvider for OpenAIProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, AIError> {
        let mut retry_count = 0;

        loop {
            let result = match self.send_request(&request).await {
                Ok(response) => self.parse_response(response).await,
                Err(err) => Err(err),
            };

            match result {
                Ok(completion) => return Ok(completion),
                Err(err) if !err.is_retryable() || retry_count >= self.config.max_retries => {
                    return Err(err)
                }
                Err(err) => {
                    tracing::warn!(
                        purpose = request.metadata.purpose.as_str(),
                        attempt = retry_count + 1,
                        error = %err,
                        "completion failed, retrying"
                    );
                }
            }

            // Exponential backoff: 1s, 2s, 4s, ...
            sleep(Duration::from_secs(1 << retry_count.min(6))).await;
            retry_count += 1;
        }
    }

    fn estimate_tokens(&self, text: &str) -> u32 {
        // GPT models use ~4 characters per token on average
        (text.len() / 4).max(1) as u32
    }

    fn provider_info(&self) -> ProviderInfo {
        let max_context = match self.config.model.as_str() {
            m if m.starts_with("gpt-4o") || m.starts_with("gpt-4-turbo") => 128000,
            m if m.starts_with("gpt-4") => 8192,
            m if m.contains("16k") => 16384,
            m if m.starts_with("gpt-3.5") => 4096,
            _ => 128000,
        };

        ProviderInfo::new("openai", &self.config.model, max_context)
    }
}

// ----- OpenAI API Types -----

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    model: String,
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::UserId;
    use crate::ports::{RequestMetadata, RequestPurpose};

    #[test]
    fn config_builder_works() {
        let config = OpenAIConfig::new("test-key")
            .with_model("gpt-4o")
            .with_base_url("https://custom.api.com/")
            .with_timeout(Duration::from_secs(30))
            .with_max_retries(5);

        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.base_url, "https://custom.api.com");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.api_key(), "test-key");
    }

    #[test]
    fn request_puts_system_prompt_first() {
        let provider = OpenAIProvider::new(OpenAIConfig::new("test"));
        let metadata = RequestMetadata::new(
            UserId::new("u").unwrap(),
            RequestPurpose::Categorization,
            "t",
        );
        let request = CompletionRequest::new(metadata)
            .with_system_prompt("Return JSON only")
            .with_message(MessageRole::User, "Categorize this")
            .with_max_tokens(500);

        let body = serde_json::to_value(provider.to_openai_request(&request)).unwrap();
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Categorize this");
        assert_eq!(body["max_tokens"], 500);
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn provider_info_by_model() {
        let provider = OpenAIProvider::new(OpenAIConfig::new("test").with_model("gpt-3.5-turbo"));
        let info = provider.provider_info();
        assert_eq!(info.name, "openai");
        assert_eq!(info.max_context_tokens, 4096);
    }

    #[test]
    fn estimate_tokens_approximates() {
        let provider = OpenAIProvider::new(OpenAIConfig::new("test"));
        assert_eq!(provider.estimate_tokens("Hi"), 1);
        assert_eq!(provider.estimate_tokens("Hello, world!"), 3);
    }

    #[test]
    fn parse_retry_after_from_message() {
        let error =
            r#"{"error":{"message":"Rate limit exceeded. Please try again in 20 seconds."}}"#;
        assert_eq!(OpenAIProvider::parse_retry_after(error), 20);
    }

    #[test]
    fn parse_retry_after_default() {
        let error = r#"{"error":{"message":"Something went wrong"}}"#;
        assert_eq!(OpenAIProvider::parse_retry_after(error), 30);
        assert_eq!(OpenAIProvider::parse_retry_after("not json"), 30);
    }
}
