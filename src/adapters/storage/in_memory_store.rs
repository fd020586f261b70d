//! In-Memory Store
//!
//! Implements every repository port over `Arc<RwLock<HashMap>>`.
//! Clones share the same data.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::conversation::{CategoryScore, Conversation, ConversationState, ConversationSummary, Message};
use crate::domain::foundation::{ConversationId, GoalId, Timestamp, UserId};
use crate::ports::{
    CategoryMatch, CategoryScoreRepository, ConversationRepository, ConversationStateRepository,
    DisinterestLogEntry, RepositoryError,
};

type ScoreKey = (ConversationId, String);

#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    conversations: Arc<RwLock<HashMap<ConversationId, Conversation>>>,
    scores: Arc<RwLock<BTreeMap<ScoreKey, CategoryScore>>>,
    states: Arc<RwLock<HashMap<GoalId, ConversationState>>>,
    disinterest: Arc<RwLock<Vec<DisinterestLogEntry>>>,
    summaries: Arc<RwLock<HashMap<GoalId, ConversationSummary>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all stored data (useful for tests)
    pub async fn clear(&self) {
        self.conversations.write().await.clear();
        self.scores.write().await.clear();
        self.states.write().await.clear();
        self.disinterest.write().await.clear();
        self.summaries.write().await.clear();
    }

    pub async fn conversation_count(&self) -> usize {
        self.conversations.read().await.len()
    }

    pub async fn score_count(&self) -> usize {
        self.scores.read().await.len()
    }
}

#[async_trait]
impl ConversationRepository for InMemoryStore {
    async fn save(&self, conversation: &Conversation) -> Result<(), RepositoryError> {
        self.conversations
            .write()
            .await
            .insert(conversation.id(), conversation.clone());
        Ok(())
    }

    async fn append_messages(
        &self,
        conversation_id: &ConversationId,
        messages: &[Message],
    ) -> Result<usize, RepositoryError> {
        let mut conversations = self.conversations.write().await;
        let conversation = conversations
            .get_mut(conversation_id)
            .ok_or_else(|| RepositoryError::not_found("Conversation", conversation_id))?;
        Ok(messages
            .iter()
            .filter(|m| conversation.append((*m).clone()))
            .count())
    }

    async fn find_by_id(
        &self,
        id: &ConversationId,
    ) -> Result<Option<Conversation>, RepositoryError> {
        Ok(self.conversations.read().await.get(id).cloned())
    }

    async fn find_by_ids(
        &self,
        ids: &[ConversationId],
    ) -> Result<Vec<Conversation>, RepositoryError> {
        let conversations = self.conversations.read().await;
        Ok(ids.iter().filter_map(|id| conversations.get(id).cloned()).collect())
    }

    async fn find_by_owner(&self, owner: &UserId) -> Result<Vec<Conversation>, RepositoryError> {
        let mut found: Vec<Conversation> = self
            .conversations
            .read()
            .await
            .values()
            .filter(|c| c.owner() == owner)
            .cloned()
            .collect();
        found.sort_by_key(|c| c.id());
        Ok(found)
    }
}

#[async_trait]
impl CategoryScoreRepository for InMemoryStore {
    async fn find_for_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<CategoryScore>, RepositoryError> {
        Ok(self
            .scores
            .read()
            .await
            .values()
            .filter(|s| s.conversation_id == *conversation_id)
            .cloned()
            .collect())
    }

    async fn last_categorized_at(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<Timestamp>, RepositoryError> {
        Ok(self
            .scores
            .read()
            .await
            .values()
            .filter(|s| s.conversation_id == *conversation_id)
            .map(|s| s.categorized_at)
            .max())
    }

    async fn upsert_many(&self, scores: &[CategoryScore]) -> Result<(), RepositoryError> {
        let mut stored = self.scores.write().await;
        for score in scores {
            stored.insert(
                (score.conversation_id, score.category.clone()),
                score.clone(),
            );
        }
        Ok(())
    }

    async fn find_by_categories(
        &self,
        categories: &[String],
    ) -> Result<Vec<CategoryMatch>, RepositoryError> {
        let mut grouped: BTreeMap<ConversationId, Vec<CategoryScore>> = BTreeMap::new();
        for score in self.scores.read().await.values() {
            if categories.iter().any(|c| *c == score.category) {
                grouped
                    .entry(score.conversation_id)
                    .or_default()
                    .push(score.clone());
            }
        }
        Ok(grouped
            .into_iter()
            .map(|(conversation_id, scores)| CategoryMatch {
                conversation_id,
                scores,
            })
            .collect())
    }
}

#[async_trait]
impl ConversationStateRepository for InMemoryStore {
    async fn save_state(&self, state: &ConversationState) -> Result<(), RepositoryError> {
        self.states
            .write()
            .await
            .insert(state.goal.id, state.clone());
        Ok(())
    }

    async fn load_state(
        &self,
        goal_id: &GoalId,
    ) -> Result<Option<ConversationState>, RepositoryError> {
        Ok(self.states.read().await.get(goal_id).cloned())
    }

    async fn find_active(&self) -> Result<Vec<ConversationState>, RepositoryError> {
        let mut active: Vec<ConversationState> = self
            .states
            .read()
            .await
            .values()
            .filter(|s| s.is_open())
            .cloned()
            .collect();
        active.sort_by_key(|s| s.created_at);
        Ok(active)
    }

    async fn record_disinterest(&self, entry: &DisinterestLogEntry) -> Result<(), RepositoryError> {
        self.disinterest.write().await.push(entry.clone());
        Ok(())
    }

    async fn disinterest_log(
        &self,
        goal_id: &GoalId,
    ) -> Result<Vec<DisinterestLogEntry>, RepositoryError> {
        Ok(self
            .disinterest
            .read()
            .await
            .iter()
            .filter(|e| e.goal_id == *goal_id)
            .cloned()
            .collect())
    }

    async fn save_summary(
        &self,
        goal_id: &GoalId,
        summary: &ConversationSummary,
    ) -> Result<(), RepositoryError> {
        self.summaries
            .write()
            .await
            .insert(*goal_id, summary.clone());
        Ok(())
    }

    async fn find_summary(
        &self,
        goal_id: &GoalId,
    ) -> Result<Option<ConversationSummary>, RepositoryError> {
        Ok(self.summaries.read().await.get(goal_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::conversation::{ConversationGoal, GoalType, PlatformKind};

    fn owner() -> UserId {
        UserId::new("owner-1").unwrap()
    }

    fn conversation() -> Conversation {
        Conversation::new(owner(), PlatformKind::Telegram, "dialog-42", "Sam").unwrap()
    }

    #[tokio::test]
    async fn append_messages_skips_known_ids() {
        let store = InMemoryStore::new();
        let conv = conversation();
        store.save(&conv).await.unwrap();

        let msg = Message::from_counterpart("hi", Timestamp::from_unix_secs(10));
        let added = store
            .append_messages(&conv.id(), &[msg.clone(), msg])
            .await
            .unwrap();

        assert_eq!(added, 1);
        let loaded = store.find_by_id(&conv.id()).await.unwrap().unwrap();
        assert_eq!(loaded.len(), 1);
    }

    #[tokio::test]
    async fn append_to_missing_conversation_is_not_found() {
        let store = InMemoryStore::new();
        let result = store.append_messages(&ConversationId::new(), &[]).await;
        assert!(matches!(result, Err(RepositoryError::NotFound { .. })));
    }

    #[tokio::test]
    async fn upsert_replaces_same_category() {
        let store = InMemoryStore::new();
        let id = ConversationId::new();
        store
            .upsert_many(&[CategoryScore::new(id, "dating", 0.2, 0.2)])
            .await
            .unwrap();
        store
            .upsert_many(&[
                CategoryScore::new(id, "dating", 0.9, 0.8),
                CategoryScore::new(id, "romance", 0.5, 0.5),
            ])
            .await
            .unwrap();

        let scores = store.find_for_conversation(&id).await.unwrap();
        assert_eq!(scores.len(), 2);
        let dating = scores.iter().find(|s| s.category == "dating").unwrap();
        assert_eq!(dating.relevance, 0.9);
    }

    #[tokio::test]
    async fn find_by_categories_is_an_or_query() {
        let store = InMemoryStore::new();
        let a = ConversationId::new();
        let b = ConversationId::new();
        let c = ConversationId::new();
        store
            .upsert_many(&[
                CategoryScore::new(a, "dating", 0.9, 0.9),
                CategoryScore::new(a, "food", 0.5, 0.5),
                CategoryScore::new(b, "romance", 0.4, 0.1),
                CategoryScore::new(c, "business", 0.8, 0.8),
            ])
            .await
            .unwrap();

        let matches = store
            .find_by_categories(&["dating".to_string(), "romance".to_string()])
            .await
            .unwrap();

        assert_eq!(matches.len(), 2);
        let a_match = matches.iter().find(|m| m.conversation_id == a).unwrap();
        assert_eq!(a_match.scores.len(), 1);
    }

    #[tokio::test]
    async fn last_categorized_at_is_the_latest() {
        let store = InMemoryStore::new();
        let id = ConversationId::new();
        store
            .upsert_many(&[
                CategoryScore::new(id, "a", 0.5, 0.5).categorized_at(Timestamp::from_unix_secs(100)),
                CategoryScore::new(id, "b", 0.5, 0.5).categorized_at(Timestamp::from_unix_secs(300)),
            ])
            .await
            .unwrap();
        assert_eq!(
            store.last_categorized_at(&id).await.unwrap(),
            Some(Timestamp::from_unix_secs(300))
        );
        assert_eq!(store.last_categorized_at(&ConversationId::new()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn find_active_excludes_closed_states() {
        let store = InMemoryStore::new();
        let goal = ConversationGoal::new(owner(), ConversationId::new(), GoalType::new("dating"), "coffee")
            .unwrap();
        let mut open = ConversationState::new(goal.clone(), Vec::new());
        open.activate(vec![], Default::default()).unwrap();

        let other_goal =
            ConversationGoal::new(owner(), ConversationId::new(), GoalType::new("dating"), "drinks")
                .unwrap();
        let mut closed = ConversationState::new(other_goal, Vec::new());
        closed.activate(vec![], Default::default()).unwrap();
        closed.close().unwrap();

        store.save_state(&open).await.unwrap();
        store.save_state(&closed).await.unwrap();

        let active = store.find_active().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].goal.id, goal.id);
    }
}
