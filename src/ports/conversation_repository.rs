//! Conversation repository port.
//!
//! Stores platform conversations with their full message history.
//!
//! # Design
//!
//! - **Owner-scoped**: every conversation belongs to one account
//! - **Append-only messages**: messages are added, never edited or removed
//! - **Idempotent appends**: a message id already stored is skipped

use async_trait::async_trait;

use super::RepositoryError;
use crate::domain::conversation::{Conversation, Message};
use crate::domain::foundation::{ConversationId, UserId};

#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// Insert or replace a conversation, including its messages.
    async fn save(&self, conversation: &Conversation) -> Result<(), RepositoryError>;

    /// Append messages to an existing conversation.
    ///
    /// Returns how many were new.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the conversation doesn't exist
    async fn append_messages(
        &self,
        conversation_id: &ConversationId,
        messages: &[Message],
    ) -> Result<usize, RepositoryError>;

    /// Find a conversation by its ID, with all messages in time order.
    async fn find_by_id(&self, id: &ConversationId)
        -> Result<Option<Conversation>, RepositoryError>;

    /// Find several conversations. Missing ids are skipped.
    async fn find_by_ids(&self, ids: &[ConversationId])
        -> Result<Vec<Conversation>, RepositoryError>;

    /// All conversations owned by an account.
    async fn find_by_owner(&self, owner: &UserId) -> Result<Vec<Conversation>, RepositoryError>;
}
