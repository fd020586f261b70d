//! Conversation state repository port.
//!
//! The store is the source of truth for goal runtime state; the manager's
//! in-memory registry is rebuilt from `find_active` on startup.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::RepositoryError;
use crate::domain::analysis::DisinterestReport;
use crate::domain::conversation::{ConversationState, ConversationSummary};
use crate::domain::foundation::{ConversationId, GoalId, Timestamp};

/// One high-disinterest detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisinterestLogEntry {
    pub goal_id: GoalId,
    pub conversation_id: ConversationId,
    pub report: DisinterestReport,
    pub recorded_at: Timestamp,
}

impl DisinterestLogEntry {
    pub fn new(goal_id: GoalId, conversation_id: ConversationId, report: DisinterestReport) -> Self {
        Self {
            goal_id,
            conversation_id,
            report,
            recorded_at: Timestamp::now(),
        }
    }
}

#[async_trait]
pub trait ConversationStateRepository: Send + Sync {
    /// Insert or replace the state of a goal.
    async fn save_state(&self, state: &ConversationState) -> Result<(), RepositoryError>;

    async fn load_state(&self, goal_id: &GoalId)
        -> Result<Option<ConversationState>, RepositoryError>;

    /// Every state that is not closed.
    async fn find_active(&self) -> Result<Vec<ConversationState>, RepositoryError>;

    async fn record_disinterest(&self, entry: &DisinterestLogEntry) -> Result<(), RepositoryError>;

    /// Disinterest log for one goal, oldest first.
    async fn disinterest_log(
        &self,
        goal_id: &GoalId,
    ) -> Result<Vec<DisinterestLogEntry>, RepositoryError>;

    async fn save_summary(
        &self,
        goal_id: &GoalId,
        summary: &ConversationSummary,
    ) -> Result<(), RepositoryError>;

    async fn find_summary(
        &self,
        goal_id: &GoalId,
    ) -> Result<Option<ConversationSummary>, RepositoryError>;
}
