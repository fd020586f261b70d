//! Conversation summarizer port.

use async_trait::async_trait;
use thiserror::Error;

use super::AIError;
use crate::domain::conversation::{ConversationGoal, ConversationSummary, Message, QuizQuestion};

#[async_trait]
pub trait ConversationSummarizer: Send + Sync {
    /// Summarizes a finished conversation and extracts key personal details.
    async fn summarize(
        &self,
        goal: &ConversationGoal,
        messages: &[Message],
    ) -> Result<ConversationSummary, SummarizerError>;

    /// Recall questions about the counterpart, built from a summary.
    async fn generate_quiz(
        &self,
        goal: &ConversationGoal,
        summary: &ConversationSummary,
        count: usize,
    ) -> Result<Vec<QuizQuestion>, SummarizerError>;
}

#[derive(Debug, Error)]
pub enum SummarizerError {
    #[error("completion failed: {0}")]
    Completion(#[from] AIError),

    #[error("nothing to summarize")]
    EmptyConversation,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summarizer_is_object_safe() {
        fn _accepts_dyn(_s: &dyn ConversationSummarizer) {}
    }
}
