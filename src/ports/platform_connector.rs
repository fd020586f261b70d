//! Platform connector port - sending and receiving messages on a chat platform.
//!
//! Core logic depends only on this trait; wire protocols live in adapters.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::conversation::{Message, PlatformKind};

/// Result of a send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendReceipt {
    pub delivered: bool,
    pub platform_message_id: Option<String>,
}

impl SendReceipt {
    pub fn delivered(platform_message_id: impl Into<String>) -> Self {
        Self {
            delivered: true,
            platform_message_id: Some(platform_message_id.into()),
        }
    }

    pub fn undelivered() -> Self {
        Self {
            delivered: false,
            platform_message_id: None,
        }
    }
}

#[async_trait]
pub trait PlatformConnector: Send + Sync {
    fn kind(&self) -> PlatformKind;

    /// Sends `text` to the conversation identified by `target`.
    async fn send(&self, target: &str, text: &str) -> Result<SendReceipt, PlatformError>;

    /// Counterpart messages received since the previous poll.
    async fn poll_new_messages(&self, target: &str) -> Result<Vec<Message>, PlatformError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformError {
    #[error("no connector registered for {0}")]
    NotRegistered(PlatformKind),

    #[error("{0} is not supported")]
    Unsupported(PlatformKind),

    #[error("unknown target: {0}")]
    UnknownTarget(String),

    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("platform call timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },
}

impl PlatformError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PlatformError::SendFailed(_) | PlatformError::Network(_) | PlatformError::Timeout { .. }
        )
    }
}
