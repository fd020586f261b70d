//! Smart chat selection - picks historical conversations for a prompt.
//!
//! Candidates are conversations scored against any requested category.
//! When they do not fit the token budget, the selector tightens the match
//! (at least 2 of the categories, then 3, ...) and finally falls back to a
//! greedy pick by rank. Conversations are included whole or not at all.

use std::sync::Arc;

use crate::domain::conversation::{CategoryScore, Conversation, Message};
use crate::domain::foundation::UserId;
use crate::ports::{CategoryScoreRepository, ConversationRepository, RepositoryError};

pub const DEFAULT_TOKEN_BUDGET: usize = 8000;
pub const DEFAULT_MAX_CHATS: usize = 50;

/// Fixed formatting overhead per conversation, in tokens.
const PER_CHAT_OVERHEAD_TOKENS: usize = 50;

/// Rough token estimate: a token per 4 characters plus formatting overhead.
pub fn estimate_tokens(messages: &[Message]) -> usize {
    let chars: usize = messages.iter().map(|m| m.text.chars().count()).sum();
    chars / 4 + PER_CHAT_OVERHEAD_TOKENS
}

/// A historical conversation chosen as prompt material.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedConversation {
    pub conversation: Conversation,
    /// Scores for the requested categories only.
    pub scores: Vec<CategoryScore>,
    pub estimated_tokens: usize,
}

impl SelectedConversation {
    pub fn max_relevance(&self) -> f64 {
        self.scores.iter().map(|s| s.relevance).fold(0.0, f64::max)
    }

    pub fn max_success(&self) -> f64 {
        self.scores.iter().map(|s| s.success).fold(0.0, f64::max)
    }

    /// Number of distinct requested categories this conversation matched.
    pub fn matched_categories(&self) -> usize {
        let mut names: Vec<&str> = self.scores.iter().map(|s| s.category.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        names.len()
    }
}

pub struct SmartChatSelector {
    conversations: Arc<dyn ConversationRepository>,
    scores: Arc<dyn CategoryScoreRepository>,
}

impl SmartChatSelector {
    pub fn new(
        conversations: Arc<dyn ConversationRepository>,
        scores: Arc<dyn CategoryScoreRepository>,
    ) -> Self {
        Self {
            conversations,
            scores,
        }
    }

    /// Owner's conversations matching `categories`, ranked by (relevance,
    /// success) and trimmed to `max_chats` and `token_budget`.
    pub async fn select(
        &self,
        owner: &UserId,
        categories: &[String],
        max_chats: usize,
        token_budget: usize,
    ) -> Result<Vec<SelectedConversation>, RepositoryError> {
        if categories.is_empty() || max_chats == 0 {
            return Ok(Vec::new());
        }
        let candidates = self.candidates(owner, categories).await?;
        Ok(fit_to_budget(candidates, categories.len(), max_chats, token_budget))
    }

    async fn candidates(
        &self,
        owner: &UserId,
        categories: &[String],
    ) -> Result<Vec<SelectedConversation>, RepositoryError> {
        let matches = self.scores.find_by_categories(categories).await?;
        let ids: Vec<_> = matches.iter().map(|m| m.conversation_id).collect();
        let conversations = self.conversations.find_by_ids(&ids).await?;

        let mut candidates: Vec<SelectedConversation> = matches
            .into_iter()
            .filter_map(|m| {
                let conversation = conversations
                    .iter()
                    .find(|c| c.id() == m.conversation_id && c.owner() == owner)?
                    .clone();
                Some(SelectedConversation {
                    estimated_tokens: estimate_tokens(conversation.messages()),
                    conversation,
                    scores: m.scores,
                })
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.max_relevance()
                .total_cmp(&a.max_relevance())
                .then_with(|| b.max_success().total_cmp(&a.max_success()))
        });
        Ok(candidates)
    }
}

fn total_tokens(selection: &[SelectedConversation]) -> usize {
    selection.iter().map(|s| s.estimated_tokens).sum()
}

fn fits(selection: &[SelectedConversation], max_chats: usize, token_budget: usize) -> bool {
    selection.len() <= max_chats && total_tokens(selection) <= token_budget
}

/// Candidates must already be ranked.
fn fit_to_budget(
    candidates: Vec<SelectedConversation>,
    category_count: usize,
    max_chats: usize,
    token_budget: usize,
) -> Vec<SelectedConversation> {
    if fits(&candidates, max_chats, token_budget) {
        return candidates;
    }

    for min_matches in 2..=category_count {
        let narrowed: Vec<SelectedConversation> = candidates
            .iter()
            .filter(|c| c.matched_categories() >= min_matches)
            .cloned()
            .collect();
        if narrowed.is_empty() {
            break;
        }
        if fits(&narrowed, max_chats, token_budget) {
            tracing::debug!(min_matches, selected = narrowed.len(), "narrowed chat selection");
            return narrowed;
        }
    }

    let mut used = 0;
    let mut picked = Vec::new();
    for candidate in candidates {
        if picked.len() >= max_chats {
            break;
        }
        if used + candidate.estimated_tokens > token_budget {
            continue;
        }
        used += candidate.estimated_tokens;
        picked.push(candidate);
    }
    tracing::debug!(selected = picked.len(), tokens = used, "greedy chat selection");
    picked
}

/// Renders selected conversations as `=== Chat N ===` transcript blocks.
/// Blank messages are left out.
pub fn format_for_prompt<'a>(selected: impl IntoIterator<Item = &'a SelectedConversation>) -> String {
    let mut out = String::new();
    for (index, chat) in selected.into_iter().enumerate() {
        out.push_str(&format!("\n=== Chat {} ===\n", index + 1));
        for message in chat.conversation.messages().iter().filter(|m| !m.text.trim().is_empty()) {
            out.push_str(&message.transcript_line());
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::storage::InMemoryStore;
    use crate::domain::conversation::PlatformKind;
    use crate::domain::foundation::Timestamp;

    fn owner() -> UserId {
        UserId::new("owner-1").unwrap()
    }

    /// A conversation with one message of `chars` characters.
    async fn seed(
        store: &InMemoryStore,
        owner: &UserId,
        chars: usize,
        scores: &[(&str, f64, f64)],
    ) -> Conversation {
        let conversation = Conversation::new(owner.clone(), PlatformKind::Telegram, "d", "Sam")
            .unwrap()
            .with_messages([Message::from_counterpart("x".repeat(chars), Timestamp::from_unix_secs(1))]);
        store.save(&conversation).await.unwrap();
        let rows: Vec<CategoryScore> = scores
            .iter()
            .map(|(name, rel, succ)| CategoryScore::new(conversation.id(), *name, *rel, *succ))
            .collect();
        store.upsert_many(&rows).await.unwrap();
        conversation
    }

    fn selector(store: &InMemoryStore) -> SmartChatSelector {
        SmartChatSelector::new(Arc::new(store.clone()), Arc::new(store.clone()))
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn ranks_by_relevance_then_success() {
        let store = InMemoryStore::new();
        let low = seed(&store, &owner(), 40, &[("dating", 0.5, 0.9)]).await;
        let high = seed(&store, &owner(), 40, &[("romance", 0.9, 0.1)]).await;
        let tie = seed(&store, &owner(), 40, &[("dating", 0.5, 0.95)]).await;

        let selected = selector(&store)
            .select(&owner(), &names(&["dating", "romance"]), 10, 8000)
            .await
            .unwrap();

        let order: Vec<_> = selected.iter().map(|s| s.conversation.id()).collect();
        assert_eq!(order, vec![high.id(), tie.id(), low.id()]);
    }

    #[tokio::test]
    async fn other_owners_are_excluded() {
        let store = InMemoryStore::new();
        seed(&store, &UserId::new("someone-else").unwrap(), 40, &[("dating", 0.9, 0.9)]).await;
        let mine = seed(&store, &owner(), 40, &[("dating", 0.1, 0.1)]).await;

        let selected = selector(&store)
            .select(&owner(), &names(&["dating"]), 10, 8000)
            .await
            .unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].conversation.id(), mine.id());
    }

    #[tokio::test]
    async fn narrows_to_multi_category_matches_when_over_budget() {
        let store = InMemoryStore::new();
        // 400 chars => 150 tokens each.
        let both = seed(&store, &owner(), 400, &[("dating", 0.6, 0.6), ("romance", 0.6, 0.6)]).await;
        seed(&store, &owner(), 400, &[("dating", 0.9, 0.9)]).await;
        seed(&store, &owner(), 400, &[("romance", 0.8, 0.8)]).await;

        let selected = selector(&store)
            .select(&owner(), &names(&["dating", "romance"]), 10, 200)
            .await
            .unwrap();

        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].conversation.id(), both.id());
    }

    #[tokio::test]
    async fn lone_oversized_conversation_is_excluded() {
        let store = InMemoryStore::new();
        seed(&store, &owner(), 40_000, &[("dating", 1.0, 1.0)]).await;
        let small = seed(&store, &owner(), 40, &[("dating", 0.2, 0.2)]).await;

        let selected = selector(&store)
            .select(&owner(), &names(&["dating"]), 10, 1000)
            .await
            .unwrap();

        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].conversation.id(), small.id());
        assert!(total_tokens(&selected) <= 1000);
    }

    #[tokio::test]
    async fn respects_max_chats() {
        let store = InMemoryStore::new();
        for i in 0..5 {
            seed(&store, &owner(), 40, &[("dating", 0.1 * i as f64, 0.5)]).await;
        }
        let selected = selector(&store)
            .select(&owner(), &names(&["dating"]), 2, 8000)
            .await
            .unwrap();
        assert_eq!(selected.len(), 2);
        assert!((selected[0].max_relevance() - 0.4).abs() < 1e-9);
    }

    #[tokio::test]
    async fn no_categories_selects_nothing() {
        let store = InMemoryStore::new();
        seed(&store, &owner(), 40, &[("dating", 0.9, 0.9)]).await;
        let selected = selector(&store).select(&owner(), &[], 10, 8000).await.unwrap();
        assert!(selected.is_empty());
    }

    #[test]
    fn estimate_counts_chars_plus_overhead() {
        let ts = Timestamp::from_unix_secs(0);
        let messages = vec![Message::from_user("abcd".repeat(10), ts)];
        assert_eq!(estimate_tokens(&messages), 60);
        assert_eq!(estimate_tokens(&[]), 50);
    }

    #[test]
    fn format_renders_numbered_blocks() {
        let ts = Timestamp::from_unix_secs(0);
        let conversation = Conversation::new(owner(), PlatformKind::Telegram, "d", "Sam")
            .unwrap()
            .with_messages([
                Message::from_user("hi", ts),
                Message::from_counterpart("hey!", ts.plus_secs(5)),
            ]);
        let selected = vec![SelectedConversation {
            estimated_tokens: estimate_tokens(conversation.messages()),
            conversation,
            scores: vec![],
        }];

        let text = format_for_prompt(&selected);
        assert_eq!(text, "\n=== Chat 1 ===\nYou: hi\nThem: hey!\n");
    }
}
