//! Mock AI Provider for testing.
//!
//! Provides a configurable mock implementation of the AIProvider port,
//! allowing tests and database-less runs to work without a real completion
//! service.
//!
//! # Features
//!
//! - Queued responses, consumed in order
//! - Sticky responses per request purpose
//! - Simulated delays for timeout testing
//! - Error injection for resilience testing
//! - Call tracking for verification
//!
//! # Example
//!
//! ```ignore
//! let provider = MockAIProvider::new()
//!     .with_response("Hello, I'm the assistant!")
//!     .with_delay(Duration::from_millis(100));
//!
//! let response = provider.complete(request).await?;
//! assert_eq!(response.content, "Hello, I'm the assistant!");
//! ```

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::sleep;

use crate::ports::{
    AIError, AIProvider, CompletionRequest, CompletionResponse, FinishReason, ProviderInfo,
    RequestPurpose, TokenUsage,
};

const DEFAULT_CONTENT: &str = "Mock response";

/// Mock AI provider.
///
/// Configurable to return specific responses, simulate delays, or inject errors.
#[derive(Debug, Clone)]
pub struct MockAIProvider {
    /// Pre-configured responses (consumed in order).
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
    /// Responses returned for every request of a purpose, ahead of the queue.
    by_purpose: Arc<Mutex<HashMap<RequestPurpose, MockResponse>>>,
    info: ProviderInfo,
    /// Simulated latency per request.
    delay: Duration,
    /// Call history for verification.
    calls: Arc<Mutex<Vec<CompletionRequest>>>,
}

/// A configured mock response.
#[derive(Debug, Clone)]
pub enum MockResponse {
    Success {
        content: String,
        usage: TokenUsage,
        finish_reason: FinishReason,
    },
    Error(MockError),
}

impl MockResponse {
    fn success(content: impl Into<String>) -> Self {
        MockResponse::Success {
            content: content.into(),
            usage: TokenUsage::new(10, 20),
            finish_reason: FinishReason::Stop,
        }
    }
}

/// Mock error types for testing error handling.
#[derive(Debug, Clone)]
pub enum MockError {
    RateLimited { retry_after_secs: u32 },
    ContextTooLong { tokens: u32, max: u32 },
    ContentFiltered { reason: String },
    Unavailable { message: String },
    AuthenticationFailed,
    Network { message: String },
    Timeout { timeout_secs: u32 },
}

impl From<MockError> for AIError {
    fn from(err: MockError) -> Self {
        match err {
            MockError::RateLimited { retry_after_secs } => AIError::rate_limited(retry_after_secs),
            MockError::ContextTooLong { tokens, max } => AIError::context_too_long(tokens, max),
            MockError::ContentFiltered { reason } => AIError::content_filtered(reason),
            MockError::Unavailable { message } => AIError::unavailable(message),
            MockError::AuthenticationFailed => AIError::AuthenticationFailed,
            MockError::Network { message } => AIError::network(message),
            MockError::Timeout { timeout_secs } => AIError::timeout(timeout_secs),
        }
    }
}

/// Poisoning only means another test thread panicked; the data is still usable.
fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Default for MockAIProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAIProvider {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::new())),
            by_purpose: Arc::new(Mutex::new(HashMap::new())),
            info: ProviderInfo::new("mock", "mock-model-1", 128000),
            delay: Duration::ZERO,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Adds a successful response to the queue.
    pub fn with_response(self, content: impl Into<String>) -> Self {
        self.with_response_full(content, TokenUsage::new(10, 20), FinishReason::Stop)
    }

    /// Adds a successful response with full configuration.
    pub fn with_response_full(
        self,
        content: impl Into<String>,
        usage: TokenUsage,
        finish_reason: FinishReason,
    ) -> Self {
        locked(&self.responses).push_back(MockResponse::Success {
            content: content.into(),
            usage,
            finish_reason,
        });
        self
    }

    /// Adds an error response to the queue.
    pub fn with_error(self, error: MockError) -> Self {
        locked(&self.responses).push_back(MockResponse::Error(error));
        self
    }

    /// Answers every request of `purpose` with `content`.
    pub fn with_purpose_response(self, purpose: RequestPurpose, content: impl Into<String>) -> Self {
        locked(&self.by_purpose).insert(purpose, MockResponse::success(content));
        self
    }

    /// Fails every request of `purpose` with `error`.
    pub fn with_purpose_error(self, purpose: RequestPurpose, error: MockError) -> Self {
        locked(&self.by_purpose).insert(purpose, MockResponse::Error(error));
        self
    }

    /// Sets simulated latency per request.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_provider_info(mut self, info: ProviderInfo) -> Self {
        self.info = info;
        self
    }

    /// Returns the number of calls made to this provider.
    pub fn call_count(&self) -> usize {
        locked(&self.calls).len()
    }

    /// Number of calls made for one purpose.
    pub fn call_count_for(&self, purpose: RequestPurpose) -> usize {
        locked(&self.calls)
            .iter()
            .filter(|c| c.metadata.purpose == purpose)
            .count()
    }

    /// Returns all recorded calls.
    pub fn get_calls(&self) -> Vec<CompletionRequest> {
        locked(&self.calls).clone()
    }

    pub fn clear_calls(&self) {
        locked(&self.calls).clear();
    }

    fn next_response(&self, purpose: RequestPurpose) -> MockResponse {
        if let Some(response) = locked(&self.by_purpose).get(&purpose) {
            return response.clone();
        }
        locked(&self.responses)
            .pop_front()
            .unwrap_or_else(|| MockResponse::success(DEFAULT_CONTENT))
    }
}

#[async_trait]
impl AIProvider for MockAIProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, AIError> {
        let purpose = request.metadata.purpose;
        locked(&self.calls).push(request);

        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }

        match self.next_response(purpose) {
            MockResponse::Success {
                content,
                usage,
                finish_reason,
            } => Ok(CompletionResponse {
                content,
                usage,
                model: self.info.model.clone(),
                finish_reason,
            }),
            MockResponse::Error(err) => Err(err.into()),
        }
    }

    fn estimate_tokens(&self, text: &str) -> u32 {
        // Rough approximation: ~4 characters per token
        (text.len() / 4).max(1) as u32
    }

    fn provider_info(&self) -> ProviderInfo {
        self.info.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::UserId;
    use crate::ports::{MessageRole, RequestMetadata};

    fn test_request(purpose: RequestPurpose) -> CompletionRequest {
        let metadata =
            RequestMetadata::new(UserId::new("test-user").unwrap(), purpose, "trace-123");
        CompletionRequest::new(metadata).with_message(MessageRole::User, "Hello")
    }

    fn reply_request() -> CompletionRequest {
        test_request(RequestPurpose::ReplyDraft)
    }

    #[tokio::test]
    async fn mock_provider_returns_configured_response() {
        let provider = MockAIProvider::new().with_response("Hello from mock!");

        let response = provider.complete(reply_request()).await.unwrap();

        assert_eq!(response.content, "Hello from mock!");
        assert_eq!(response.model, "mock-model-1");
        assert_eq!(response.finish_reason, FinishReason::Stop);
    }

    #[tokio::test]
    async fn mock_provider_returns_responses_in_order_then_default() {
        let provider = MockAIProvider::new().with_response("First").with_response("Second");

        let r1 = provider.complete(reply_request()).await.unwrap();
        let r2 = provider.complete(reply_request()).await.unwrap();
        let r3 = provider.complete(reply_request()).await.unwrap();

        assert_eq!(r1.content, "First");
        assert_eq!(r2.content, "Second");
        assert_eq!(r3.content, "Mock response");
    }

    #[tokio::test]
    async fn mock_provider_returns_configured_error() {
        let provider =
            MockAIProvider::new().with_error(MockError::RateLimited { retry_after_secs: 30 });

        let err = provider.complete(reply_request()).await.unwrap_err();

        assert!(err.is_retryable());
        assert!(matches!(err, AIError::RateLimited { retry_after_secs: 30 }));
    }

    #[tokio::test]
    async fn purpose_responses_take_precedence_and_persist() {
        let provider = MockAIProvider::new()
            .with_response("queued")
            .with_purpose_response(RequestPurpose::CategorySelection, r#"["dating"]"#);

        for _ in 0..2 {
            let r = provider
                .complete(test_request(RequestPurpose::CategorySelection))
                .await
                .unwrap();
            assert_eq!(r.content, r#"["dating"]"#);
        }
        let r = provider.complete(reply_request()).await.unwrap();
        assert_eq!(r.content, "queued");
    }

    #[tokio::test]
    async fn mock_provider_tracks_calls() {
        let provider = MockAIProvider::new();

        assert_eq!(provider.call_count(), 0);
        provider.complete(reply_request()).await.unwrap();
        provider.complete(test_request(RequestPurpose::Summary)).await.unwrap();
        assert_eq!(provider.call_count(), 2);
        assert_eq!(provider.call_count_for(RequestPurpose::Summary), 1);

        provider.clear_calls();
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn mock_provider_simulates_latency() {
        let provider = MockAIProvider::new().with_delay(Duration::from_secs(5));
        let started = tokio::time::Instant::now();
        provider.complete(reply_request()).await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(5));
    }
}
