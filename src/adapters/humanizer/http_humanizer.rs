//! HTTP humanizer - submits a draft and polls until the rewrite is ready.
//!
//! # Protocol
//!
//! 1. `POST {endpoint}/submit` with `{content, readability, purpose, strength}`.
//!    The reply carries either a `job_id` or, for immediate results,
//!    `status: "success"` with `output`.
//! 2. `GET {endpoint}/status?job_id=...` until `status` is `completed`/`success`
//!    (text in `output` or `result.output`) or `failed`/`error`.
//!
//! The key travels in the `api-key` header.

use async_trait::async_trait;
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;

use crate::ports::{Humanizer, HumanizerError};

/// Connection settings for `HttpHumanizer`.
#[derive(Debug, Clone)]
pub struct HttpHumanizerConfig {
    api_key: Option<Secret<String>>,
    pub endpoint: String,
    pub poll_interval: Duration,
    pub max_polls: u32,
    pub request_timeout: Duration,
}

impl HttpHumanizerConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            api_key: None,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            poll_interval: Duration::from_secs(1),
            max_polls: 30,
            request_timeout: Duration::from_secs(60),
        }
    }

    pub fn with_api_key(mut self, key: Secret<String>) -> Self {
        self.api_key = Some(key);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_polls(mut self, max_polls: u32) -> Self {
        self.max_polls = max_polls;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

pub struct HttpHumanizer {
    config: HttpHumanizerConfig,
    client: Client,
}

impl HttpHumanizer {
    pub fn new(config: HttpHumanizerConfig) -> Self {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "failed to build configured HTTP client, using defaults");
                Client::new()
            });
        Self { config, client }
    }

    fn api_key(&self) -> Result<&str, HumanizerError> {
        self.config
            .api_key
            .as_ref()
            .map(|k| k.expose_secret().as_str())
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| HumanizerError::NotConfigured("api key missing".to_string()))
    }

    async fn submit(&self, api_key: &str, text: &str) -> Result<SubmitOutcome, HumanizerError> {
        let body = SubmitRequest {
            content: text,
            readability: "High School",
            purpose: "General Writing",
            strength: "More Human",
        };
        let response = self
            .client
            .post(format!("{}/submit", self.config.endpoint))
            .header("api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let reply: JobReply = Self::checked(response)
            .await?
            .json()
            .await
            .map_err(|e| HumanizerError::Parse(e.to_string()))?;
        SubmitOutcome::from_reply(reply)
    }

    async fn poll(&self, api_key: &str, job_id: &str) -> Result<String, HumanizerError> {
        for _ in 0..self.config.max_polls {
            let response = self
                .client
                .get(format!("{}/status", self.config.endpoint))
                .query(&[("job_id", job_id)])
                .header("api-key", api_key)
                .send()
                .await
                .map_err(|e| self.map_transport_error(e))?;

            // Non-success statuses while polling count as "not yet".
            if response.status().is_success() {
                let reply: JobReply = response
                    .json()
                    .await
                    .map_err(|e| HumanizerError::Parse(e.to_string()))?;
                match reply.poll_state() {
                    PollState::Done(text) => return Ok(text),
                    PollState::Failed => {
                        return Err(HumanizerError::Status {
                            status: 200,
                            message: format!("job {job_id} failed"),
                        })
                    }
                    PollState::Pending => {}
                }
            }
            sleep(self.config.poll_interval).await;
        }
        Err(HumanizerError::NotReady {
            polls: self.config.max_polls,
        })
    }

    async fn checked(response: Response) -> Result<Response, HumanizerError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(HumanizerError::Status {
            status: status.as_u16(),
            message,
        })
    }

    fn map_transport_error(&self, e: reqwest::Error) -> HumanizerError {
        if e.is_timeout() {
            HumanizerError::Timeout {
                timeout_secs: self.config.request_timeout.as_secs(),
            }
        } else {
            HumanizerError::Network(e.to_string())
        }
    }
}

#[async_trait]
impl Humanizer for HttpHumanizer {
    async fn humanize(&self, text: &str) -> Result<String, HumanizerError> {
        let api_key = self.api_key()?;
        let output = match self.submit(api_key, text).await? {
            SubmitOutcome::Immediate(output) => output,
            SubmitOutcome::Job(job_id) => self.poll(api_key, &job_id).await?,
        };
        if output.trim().is_empty() {
            return Err(HumanizerError::Parse("empty output".to_string()));
        }
        Ok(output)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

#[derive(Debug, Serialize)]
struct SubmitRequest<'a> {
    content: &'a str,
    readability: &'a str,
    purpose: &'a str,
    strength: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct JobReply {
    #[serde(default)]
    job_id: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    output: Option<String>,
    #[serde(default)]
    result: Option<JobResult>,
}

#[derive(Debug, Default, Deserialize)]
struct JobResult {
    #[serde(default)]
    output: Option<String>,
}

#[derive(Debug, PartialEq)]
enum SubmitOutcome {
    Job(String),
    Immediate(String),
}

impl SubmitOutcome {
    fn from_reply(reply: JobReply) -> Result<Self, HumanizerError> {
        if let Some(job_id) = reply.job_id {
            return Ok(SubmitOutcome::Job(job_id));
        }
        match (reply.status.as_deref(), reply.output) {
            (Some("success"), Some(output)) => Ok(SubmitOutcome::Immediate(output)),
            _ => Err(HumanizerError::Parse(
                "submit reply has neither job_id nor output".to_string(),
            )),
        }
    }
}

#[derive(Debug, PartialEq)]
enum PollState {
    Pending,
    Done(String),
    Failed,
}

impl JobReply {
    fn poll_state(self) -> PollState {
        match self.status.as_deref().unwrap_or("pending") {
            "completed" | "success" => self
                .output
                .or_else(|| self.result.and_then(|r| r.output))
                .map(PollState::Done)
                .unwrap_or(PollState::Pending),
            "failed" | "error" => PollState::Failed,
            _ => PollState::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(json: &str) -> JobReply {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn config_trims_trailing_slash() {
        let config = HttpHumanizerConfig::new("https://humanizer.test/")
            .with_max_polls(5)
            .with_poll_interval(Duration::from_millis(200));
        assert_eq!(config.endpoint, "https://humanizer.test");
        assert_eq!(config.max_polls, 5);
    }

    #[tokio::test]
    async fn missing_key_is_not_configured() {
        let humanizer = HttpHumanizer::new(HttpHumanizerConfig::new("http://127.0.0.1:9"));
        let err = humanizer.humanize("hello").await.unwrap_err();
        assert!(matches!(err, HumanizerError::NotConfigured(_)));
    }

    #[tokio::test]
    async fn blank_key_is_not_configured() {
        let humanizer = HttpHumanizer::new(
            HttpHumanizerConfig::new("http://127.0.0.1:9").with_api_key(Secret::new("  ".into())),
        );
        assert!(matches!(
            humanizer.humanize("hello").await,
            Err(HumanizerError::NotConfigured(_))
        ));
    }

    #[test]
    fn submit_reply_with_job_id() {
        let outcome = SubmitOutcome::from_reply(reply(r#"{"job_id":"abc"}"#)).unwrap();
        assert_eq!(outcome, SubmitOutcome::Job("abc".to_string()));
    }

    #[test]
    fn submit_reply_with_immediate_output() {
        let outcome =
            SubmitOutcome::from_reply(reply(r#"{"status":"success","output":"hey you"}"#)).unwrap();
        assert_eq!(outcome, SubmitOutcome::Immediate("hey you".to_string()));
        assert!(SubmitOutcome::from_reply(reply(r#"{"status":"queued"}"#)).is_err());
    }

    #[test]
    fn poll_state_reads_nested_output() {
        assert_eq!(
            reply(r#"{"status":"completed","result":{"output":"rewritten"}}"#).poll_state(),
            PollState::Done("rewritten".to_string())
        );
        assert_eq!(reply(r#"{"status":"error"}"#).poll_state(), PollState::Failed);
        assert_eq!(reply("{}").poll_state(), PollState::Pending);
    }
}
