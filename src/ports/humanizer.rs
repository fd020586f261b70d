//! Humanizer port - rewrites drafted replies so they read less machine-written.
//!
//! Callers always fall back to the original text when humanization fails.

use async_trait::async_trait;
use thiserror::Error;

#[async_trait]
pub trait Humanizer: Send + Sync {
    async fn humanize(&self, text: &str) -> Result<String, HumanizerError>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HumanizerError {
    #[error("humanizer is not configured: {0}")]
    NotConfigured(String),

    #[error("humanizer returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("humanizer response could not be parsed: {0}")]
    Parse(String),

    #[error("humanized text not ready after {polls} polls")]
    NotReady { polls: u32 },

    #[error("humanizer timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },
}

impl HumanizerError {
    pub fn is_retryable(&self) -> bool {
        match self {
            HumanizerError::Network(_)
            | HumanizerError::NotReady { .. }
            | HumanizerError::Timeout { .. } => true,
            HumanizerError::Status { status, .. } => *status == 429 || *status >= 500,
            HumanizerError::NotConfigured(_) | HumanizerError::Parse(_) => false,
        }
    }
}
