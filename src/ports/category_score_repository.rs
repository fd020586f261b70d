//! Category score repository port.
//!
//! Scores are unique per (conversation, category). Writes are upserts and
//! scores are never deleted.

use async_trait::async_trait;

use super::RepositoryError;
use crate::domain::conversation::CategoryScore;
use crate::domain::foundation::{ConversationId, Timestamp};

/// A conversation together with its scores for the requested categories.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryMatch {
    pub conversation_id: ConversationId,
    pub scores: Vec<CategoryScore>,
}

impl CategoryMatch {
    pub fn max_relevance(&self) -> f64 {
        self.scores.iter().map(|s| s.relevance).fold(0.0, f64::max)
    }

    pub fn max_success(&self) -> f64 {
        self.scores.iter().map(|s| s.success).fold(0.0, f64::max)
    }
}

#[async_trait]
pub trait CategoryScoreRepository: Send + Sync {
    /// Every score stored for a conversation.
    async fn find_for_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<CategoryScore>, RepositoryError>;

    /// Most recent `categorized_at` over the conversation's scores.
    async fn last_categorized_at(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<Timestamp>, RepositoryError>;

    /// Insert new scores and update existing ones, keyed by (conversation, category).
    async fn upsert_many(&self, scores: &[CategoryScore]) -> Result<(), RepositoryError>;

    /// Conversations scored in ANY of the given categories.
    ///
    /// Each match carries only the scores for the requested categories.
    async fn find_by_categories(
        &self,
        categories: &[String],
    ) -> Result<Vec<CategoryMatch>, RepositoryError>;
}
