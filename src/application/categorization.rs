//! Chat categorization - scores conversations against the category registry.
//!
//! The completion service does the judging; everything around it is defensive:
//! fenced or malformed JSON, unknown category names and timeouts all degrade to
//! a single neutral fallback score instead of an error.
//!
//! Re-categorization is incremental. Only messages newer than the last
//! categorization are sent out, and the fresh scores are blended into the
//! stored ones with weights derived from message volume and engagement
//! (see [`new_score_weight`]).

use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;

use super::json_reply::{parse_json, trace_id};
use crate::domain::analysis::EngagementMetrics;
use crate::domain::categories::CategoryRegistry;
use crate::domain::conversation::{
    clamp_unit, CategoryScore, Conversation, ConversationGoal, Message, OutcomeType,
};
use crate::domain::foundation::{ConversationId, UserId};
use crate::ports::{
    AIProvider, CategoryScoreRepository, CompletionRequest, ConversationRepository, MessageRole,
    RepositoryError, RequestMetadata, RequestPurpose,
};

const DEFAULT_SUCCESS_SCORE: f64 = 50.0;
const DEFAULT_RELEVANCE: f64 = 0.5;
const MAX_COUNT_RATIO: f64 = 3.0;
const MAX_VOLUME_PENALTY: f64 = 0.3;

#[derive(Debug, Error)]
pub enum CategorizationError {
    #[error("conversation not found: {0}")]
    ConversationNotFound(ConversationId),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Runs categorization and keeps `CategoryScore` rows current.
pub struct CategorizationService {
    ai: Arc<dyn AIProvider>,
    registry: Arc<CategoryRegistry>,
    conversations: Arc<dyn ConversationRepository>,
    scores: Arc<dyn CategoryScoreRepository>,
    completion_timeout: Duration,
}

impl CategorizationService {
    pub fn new(
        ai: Arc<dyn AIProvider>,
        registry: Arc<CategoryRegistry>,
        conversations: Arc<dyn ConversationRepository>,
        scores: Arc<dyn CategoryScoreRepository>,
    ) -> Self {
        Self {
            ai,
            registry,
            conversations,
            scores,
            completion_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, completion_timeout: Duration) -> Self {
        self.completion_timeout = completion_timeout;
        self
    }

    pub fn registry(&self) -> &CategoryRegistry {
        &self.registry
    }

    /// Scores a whole conversation. Never fails; see module docs for fallbacks.
    pub async fn categorize(&self, conversation: &Conversation) -> Vec<CategoryScore> {
        self.categorize_messages(conversation.id(), conversation.owner(), conversation.messages())
            .await
    }

    /// Full categorization, upserted.
    pub async fn categorize_and_store(
        &self,
        conversation: &Conversation,
    ) -> Result<Vec<CategoryScore>, CategorizationError> {
        let scores = self.categorize(conversation).await;
        self.scores.upsert_many(&scores).await?;
        tracing::info!(
            conversation_id = %conversation.id(),
            categories = scores.len(),
            "conversation categorized"
        );
        Ok(scores)
    }

    /// Categorizes only the messages added since the last run and merges the
    /// result into the stored scores.
    ///
    /// Returns every score touched: merged, newly inserted, or (when nothing
    /// is new) the stored scores unchanged.
    pub async fn recategorize_incremental(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<CategoryScore>, CategorizationError> {
        let conversation = self
            .conversations
            .find_by_id(conversation_id)
            .await?
            .ok_or(CategorizationError::ConversationNotFound(*conversation_id))?;

        let prior = self.scores.find_for_conversation(conversation_id).await?;
        let last_run = self.scores.last_categorized_at(conversation_id).await?;
        let last_run = match last_run {
            Some(ts) if !prior.is_empty() => ts,
            _ => return self.categorize_and_store(&conversation).await,
        };

        let new_messages = conversation.messages_after(last_run);
        if new_messages.is_empty() {
            tracing::debug!(conversation_id = %conversation_id, "no new messages, scores unchanged");
            return Ok(prior);
        }

        let new_count = new_messages.len();
        let old_count = conversation.len() - new_count;
        let fresh = self
            .categorize_messages(*conversation_id, conversation.owner(), &new_messages)
            .await;
        let metrics = EngagementMetrics::compute(conversation.messages());
        let weight = new_score_weight(&metrics, old_count, new_count);
        let merged = merge_scores(&prior, &fresh, weight);

        self.scores.upsert_many(&merged).await?;
        tracing::info!(
            conversation_id = %conversation_id,
            old_messages = old_count,
            new_messages = new_count,
            new_weight = weight,
            updated = merged.len(),
            "conversation re-categorized"
        );
        Ok(merged)
    }

    /// Brings every conversation of an owner up to date.
    ///
    /// Failures are logged per conversation and do not stop the batch.
    /// Returns the number of conversations processed successfully.
    pub async fn categorize_owner(&self, owner: &UserId) -> Result<usize, CategorizationError> {
        let conversations = self.conversations.find_by_owner(owner).await?;
        let mut processed = 0;
        for conversation in conversations.iter().filter(|c| !c.is_empty()) {
            match self.recategorize_incremental(&conversation.id()).await {
                Ok(_) => processed += 1,
                Err(e) => tracing::error!(
                    conversation_id = %conversation.id(),
                    error = %e,
                    "categorization failed"
                ),
            }
        }
        Ok(processed)
    }

    /// Categories relevant to a goal, resolved against the registry.
    ///
    /// Falls back to a keyword scan of the raw reply, then the goal's own
    /// registered categories, then the registry fallback category.
    pub async fn relevant_categories(&self, goal: &ConversationGoal) -> Vec<String> {
        let prompt = relevant_categories_prompt(&self.registry, goal);
        let metadata = RequestMetadata::new(
            goal.owner.clone(),
            RequestPurpose::CategorySelection,
            trace_id(),
        )
        .with_goal(goal.id)
        .with_conversation(goal.conversation_id);
        let request = CompletionRequest::new(metadata)
            .with_system_prompt(CLASSIFIER_SYSTEM_PROMPT)
            .with_message(MessageRole::User, prompt)
            .with_max_tokens(300)
            .with_temperature(0.3);

        let reply = self.complete(request).await.unwrap_or_default();

        let resolved = parse_category_list(&self.registry, &reply);
        if !resolved.is_empty() {
            return resolved;
        }
        if !reply.trim().is_empty() {
            tracing::warn!(goal_id = %goal.id, response = %reply, "unparseable category list");
            let scanned = self.registry.scan_text(&reply);
            if !scanned.is_empty() {
                return scanned;
            }
        }
        let own: Vec<String> = goal
            .categories
            .iter()
            .filter_map(|c| self.registry.get(c).map(|d| d.name.clone()))
            .collect();
        if !own.is_empty() {
            return own;
        }
        vec![self.registry.fallback_name().to_string()]
    }

    async fn categorize_messages(
        &self,
        conversation_id: ConversationId,
        owner: &UserId,
        messages: &[Message],
    ) -> Vec<CategoryScore> {
        let fallback = || {
            vec![CategoryScore::neutral_fallback(
                conversation_id,
                self.registry.fallback_name(),
            )]
        };
        if messages.is_empty() {
            return fallback();
        }

        let metadata = RequestMetadata::new(owner.clone(), RequestPurpose::Categorization, trace_id())
            .with_conversation(conversation_id);
        let request = CompletionRequest::new(metadata)
            .with_system_prompt(CLASSIFIER_SYSTEM_PROMPT)
            .with_message(MessageRole::User, categorization_prompt(&self.registry, messages))
            .with_max_tokens(1000)
            .with_temperature(0.3);

        let Some(reply) = self.complete(request).await else {
            return fallback();
        };

        match parse_scored_categories(&self.registry, conversation_id, &reply) {
            Some(scores) if !scores.is_empty() => scores,
            _ => {
                tracing::warn!(
                    conversation_id = %conversation_id,
                    response = %reply,
                    "unusable categorization response, using fallback category"
                );
                fallback()
            }
        }
    }

    /// Completion with timeout; `None` on any failure.
    async fn complete(&self, request: CompletionRequest) -> Option<String> {
        let purpose = request.metadata.purpose;
        match timeout(self.completion_timeout, self.ai.complete(request)).await {
            Ok(Ok(response)) => Some(response.content),
            Ok(Err(e)) => {
                tracing::warn!(purpose = purpose.as_str(), error = %e, "completion failed");
                None
            }
            Err(_) => {
                tracing::warn!(
                    purpose = purpose.as_str(),
                    timeout_secs = self.completion_timeout.as_secs(),
                    "completion timed out"
                );
                None
            }
        }
    }
}

/// Weight given to freshly computed scores when merging into stored ones.
///
/// Blends an engagement estimate with the share of new messages, then damps
/// the result when old messages outnumber new ones more than 3 to 1.
pub fn new_score_weight(metrics: &EngagementMetrics, old_count: usize, new_count: usize) -> f64 {
    let total = old_count + new_count;
    let ratio_weight = if total == 0 {
        0.5
    } else {
        old_count as f64 / total as f64
    };
    let count_weight = ratio_weight * ratio_weight;

    let reply_speed = (1.0 - (metrics.avg_reply_time_secs - 60.0) / 3600.0).clamp(0.5, 1.0);
    let engagement_weight = 0.4 * metrics.engagement_level
        + 0.3 * metrics.reply_ratio.min(1.0)
        + 0.3 * reply_speed;

    let mut weight = 0.4 * engagement_weight + 0.6 * (1.0 - count_weight);

    if old_count > 0 && new_count > 0 {
        let count_ratio = old_count as f64 / new_count as f64;
        if count_ratio > MAX_COUNT_RATIO {
            weight *= 1.0 - ((count_ratio - MAX_COUNT_RATIO) / 10.0).min(MAX_VOLUME_PENALTY);
        }
    }
    clamp_unit(weight)
}

/// Blends `fresh` into `prior` for shared categories; fresh-only categories
/// pass through. Prior-only categories are not returned (they stay as stored).
pub fn merge_scores(prior: &[CategoryScore], fresh: &[CategoryScore], new_weight: f64) -> Vec<CategoryScore> {
    let old_weight = 1.0 - new_weight;
    let prior_by_name: HashMap<&str, &CategoryScore> =
        prior.iter().map(|s| (s.category.as_str(), s)).collect();

    fresh
        .iter()
        .map(|new| match prior_by_name.get(new.category.as_str()) {
            Some(old) => CategoryScore {
                conversation_id: new.conversation_id,
                category: new.category.clone(),
                relevance: clamp_unit(old.relevance * old_weight + new.relevance * new_weight),
                success: clamp_unit(old.success * old_weight + new.success * new_weight),
                outcome: new.outcome.or(old.outcome),
                reason: if new.reason.trim().is_empty() {
                    old.reason.clone()
                } else {
                    new.reason.clone()
                },
                categorized_at: new.categorized_at,
            },
            None => new.clone(),
        })
        .collect()
}

const CLASSIFIER_SYSTEM_PROMPT: &str =
    "You classify chat conversations. Reply with JSON only, never prose.";

fn categorization_prompt(registry: &CategoryRegistry, messages: &[Message]) -> String {
    let transcript: Vec<String> = messages.iter().map(Message::transcript_line).collect();
    let outcomes: String = OutcomeType::all()
        .iter()
        .map(|o| format!("\"{}\" - {}\n", o.as_str(), o.description()))
        .collect();

    format!(
        "Analyze the following chat conversation and:\n\
         1. Categorize it into one or more EXACT categories\n\
         2. For each category, rate the success (0-100) of achieving that category's goal\n\n\
         IMPORTANT: You MUST use the EXACT category names provided below.\n\n\
         {categories}\n\
         Chat Conversation:\n{transcript}\n\n\
         For each relevant category, provide a relevance score (0.0-1.0) for how well the \
         conversation matches the category, and a success score (0-100). A thoughtful \
         rejection caused by circumstances scores high; a rejection caused by the approach \
         scores low.\n\n\
         Outcome Types (use exact names):\n{outcomes}\n\
         Return your response as a JSON object with this format:\n\
         {{\"categories\": [{{\"name\": \"EXACT_CATEGORY_NAME\", \"relevance\": 0.85, \
         \"success_score\": 75, \"outcome_type\": \"circumstantial_rejection\", \
         \"reason\": \"brief explanation\"}}]}}\n\n\
         Return JSON only, no additional text:",
        categories = registry.prompt_listing(),
        transcript = transcript.join("\n"),
        outcomes = outcomes,
    )
}

fn relevant_categories_prompt(registry: &CategoryRegistry, goal: &ConversationGoal) -> String {
    format!(
        "Given the following goal and meeting context, determine which categories from the list are relevant.\n\n\
         Goal Type: {goal_type}\n\
         Goal Description: {outcome}\n\
         Meeting Context: {context}\n\n\
         {categories}\n\
         IMPORTANT: You MUST use the EXACT category names from the list above.\n\
         Return ONLY a JSON array of category names sorted by relevance, for example \
         [\"dating\", \"flirting\", \"romance\"].\n\n\
         Return JSON only, no additional text:",
        goal_type = goal.goal_type,
        outcome = goal.desired_outcome,
        context = goal.meeting_context,
        categories = registry.prompt_listing(),
    )
}

#[derive(Debug, Deserialize)]
struct ScoredCategoriesReply {
    categories: Vec<ScoredCategory>,
}

#[derive(Debug, Deserialize)]
struct ScoredCategory {
    name: String,
    #[serde(default)]
    relevance: Option<f64>,
    #[serde(default)]
    success_score: Option<f64>,
    #[serde(default)]
    outcome_type: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

/// `None` when the reply is not the expected JSON shape.
fn parse_scored_categories(
    registry: &CategoryRegistry,
    conversation_id: ConversationId,
    reply: &str,
) -> Option<Vec<CategoryScore>> {
    let parsed: ScoredCategoriesReply = parse_json(reply).ok()?;
    let mut scores: Vec<CategoryScore> = Vec::new();
    for entry in parsed.categories {
        let Some(name) = registry.resolve(&entry.name) else {
            tracing::debug!(name = %entry.name, "dropping unknown category");
            continue;
        };
        let mut score = CategoryScore::new(
            conversation_id,
            name,
            entry.relevance.unwrap_or(DEFAULT_RELEVANCE),
            entry.success_score.unwrap_or(DEFAULT_SUCCESS_SCORE) / 100.0,
        )
        .with_reason(entry.reason.unwrap_or_default());
        score.outcome = parse_outcome(entry.outcome_type.as_deref());

        // Two labels can resolve to one category; keep the more relevant.
        match scores.iter_mut().find(|s| s.category == score.category) {
            Some(existing) if existing.relevance < score.relevance => *existing = score,
            Some(_) => {}
            None => scores.push(score),
        }
    }
    Some(scores)
}

/// Absent or blank stays `None` so a merge keeps the stored outcome;
/// unrecognised names count as neutral.
fn parse_outcome(raw: Option<&str>) -> Option<OutcomeType> {
    let raw = raw.map(str::trim).filter(|r| !r.is_empty())?;
    Some(OutcomeType::from_name(raw).unwrap_or_default())
}

fn parse_category_list(registry: &CategoryRegistry, reply: &str) -> Vec<String> {
    let Ok(names) = parse_json::<Vec<String>>(reply) else {
        return Vec::new();
    };
    let mut resolved: Vec<String> = Vec::new();
    for name in names {
        if let Some(category) = registry.resolve(&name) {
            if !resolved.iter().any(|c| c == category) {
                resolved.push(category.to_string());
            }
        }
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ai::{MockAIProvider, MockError};
    use crate::adapters::storage::InMemoryStore;
    use crate::domain::categories::CategoryDefinition;
    use crate::domain::conversation::{GoalType, PlatformKind};
    use crate::domain::foundation::Timestamp;
    use proptest::prelude::*;

    fn registry() -> Arc<CategoryRegistry> {
        Arc::new(
            CategoryRegistry::new(vec![
                CategoryDefinition::new("dating", "Romantic plans").with_keywords(["date", "dinner"]),
                CategoryDefinition::new("business", "Deals").with_keywords(["deal", "contract"]),
                CategoryDefinition::new("other", "Anything else"),
            ])
            .unwrap(),
        )
    }

    fn owner() -> UserId {
        UserId::new("owner-1").unwrap()
    }

    fn conversation(messages: Vec<Message>) -> Conversation {
        Conversation::new(owner(), PlatformKind::Telegram, "dialog-1", "Sam")
            .unwrap()
            .with_messages(messages)
    }

    fn chat() -> Vec<Message> {
        vec![
            Message::from_user("Dinner on Friday?", Timestamp::from_unix_secs(100)),
            Message::from_counterpart("It's a date!", Timestamp::from_unix_secs(160)),
        ]
    }

    fn service(ai: MockAIProvider, store: &InMemoryStore) -> CategorizationService {
        CategorizationService::new(
            Arc::new(ai),
            registry(),
            Arc::new(store.clone()),
            Arc::new(store.clone()),
        )
    }

    fn metrics(engagement: f64, reply_ratio: f64, avg_reply: f64) -> EngagementMetrics {
        EngagementMetrics {
            user_message_count: 10,
            counterpart_message_count: 10,
            reply_ratio,
            avg_reply_time_secs: avg_reply,
            engagement_level: engagement,
        }
    }

    #[tokio::test]
    async fn empty_conversation_gets_fallback_without_completion() {
        let ai = MockAIProvider::new();
        let store = InMemoryStore::new();
        let svc = service(ai.clone(), &store);

        let scores = svc.categorize(&conversation(vec![])).await;

        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].category, "other");
        assert_eq!(scores[0].relevance, 0.5);
        assert_eq!(scores[0].success, 0.5);
        assert_eq!(ai.call_count(), 0);
    }

    #[tokio::test]
    async fn parses_fenced_reply_and_resolves_names() {
        let ai = MockAIProvider::new().with_response(
            "```json\n{\"categories\":[\
             {\"name\":\"Dating\",\"relevance\":0.9,\"success_score\":80,\"outcome_type\":\"success\",\"reason\":\"agreed to dinner\"},\
             {\"name\":\"dinner plans\",\"relevance\":0.4,\"success_score\":10},\
             {\"name\":\"astronomy\",\"relevance\":1.0}]}\n```",
        );
        let store = InMemoryStore::new();
        let scores = service(ai, &store).categorize(&conversation(chat())).await;

        assert_eq!(scores.len(), 1);
        let dating = &scores[0];
        assert_eq!(dating.category, "dating");
        assert_eq!(dating.relevance, 0.9);
        assert!((dating.success - 0.8).abs() < 1e-9);
        assert_eq!(dating.outcome, Some(OutcomeType::Success));
    }

    #[tokio::test]
    async fn classification_requests_carry_the_json_system_prompt() {
        let ai = MockAIProvider::new()
            .with_response(r#"{"categories":[{"name":"dating","relevance":0.9}]}"#)
            .with_response(r#"["dating"]"#);
        let store = InMemoryStore::new();
        let svc = service(ai.clone(), &store);
        let goal = ConversationGoal::new(owner(), ConversationId::new(), GoalType::new("dating"), "coffee")
            .unwrap();

        svc.categorize(&conversation(chat())).await;
        svc.relevant_categories(&goal).await;

        let calls = ai.get_calls();
        assert_eq!(calls.len(), 2);
        for call in calls {
            assert_eq!(call.system_prompt.as_deref(), Some(CLASSIFIER_SYSTEM_PROMPT));
        }
    }

    #[tokio::test]
    async fn malformed_reply_falls_back_to_neutral() {
        let ai = MockAIProvider::new().with_response("I think this is about dating.");
        let store = InMemoryStore::new();
        let scores = service(ai, &store).categorize(&conversation(chat())).await;

        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].category, "other");
        assert_eq!(scores[0].outcome, Some(OutcomeType::Neutral));
    }

    #[tokio::test]
    async fn unknown_outcome_and_missing_success_use_defaults() {
        let ai = MockAIProvider::new().with_response(
            r#"{"categories":[{"name":"business","relevance":0.7,"outcome_type":"meh"}]}"#,
        );
        let store = InMemoryStore::new();
        let scores = service(ai, &store).categorize(&conversation(chat())).await;

        assert_eq!(scores[0].success, 0.5);
        assert_eq!(scores[0].outcome, Some(OutcomeType::Neutral));
    }

    #[tokio::test]
    async fn completion_error_falls_back() {
        let ai = MockAIProvider::new().with_error(MockError::Unavailable {
            message: "down".to_string(),
        });
        let store = InMemoryStore::new();
        let scores = service(ai, &store).categorize(&conversation(chat())).await;
        assert_eq!(scores[0].category, "other");
    }

    #[tokio::test(start_paused = true)]
    async fn completion_timeout_falls_back() {
        let ai = MockAIProvider::new()
            .with_response(r#"{"categories":[{"name":"dating","relevance":0.9}]}"#)
            .with_delay(Duration::from_secs(120));
        let store = InMemoryStore::new();
        let svc = service(ai, &store).with_timeout(Duration::from_secs(5));

        let scores = svc.categorize(&conversation(chat())).await;
        assert_eq!(scores[0].category, "other");
    }

    #[tokio::test]
    async fn relevant_categories_resolves_array() {
        let ai = MockAIProvider::new().with_response(r#"["Dating", "dinner", "astronomy"]"#);
        let store = InMemoryStore::new();
        let goal = ConversationGoal::new(owner(), ConversationId::new(), GoalType::new("dating"), "coffee")
            .unwrap();

        let categories = service(ai, &store).relevant_categories(&goal).await;
        assert_eq!(categories, vec!["dating"]);
    }

    #[tokio::test]
    async fn relevant_categories_scans_prose_reply() {
        let ai = MockAIProvider::new().with_response("Mostly business, maybe a contract talk.");
        let store = InMemoryStore::new();
        let goal = ConversationGoal::new(owner(), ConversationId::new(), GoalType::new("business"), "deal")
            .unwrap();

        let categories = service(ai, &store).relevant_categories(&goal).await;
        assert_eq!(categories, vec!["business"]);
    }

    #[tokio::test]
    async fn relevant_categories_falls_back_to_goal_then_default() {
        let failing = || {
            MockAIProvider::new().with_error(MockError::Network {
                message: "reset".to_string(),
            })
        };
        let store = InMemoryStore::new();
        let goal = ConversationGoal::new(owner(), ConversationId::new(), GoalType::new("dating"), "coffee")
            .unwrap()
            .with_categories(["business", "unknown"]);

        assert_eq!(
            service(failing(), &store).relevant_categories(&goal).await,
            vec!["business"]
        );

        let bare = goal.clone().with_categories(Vec::<String>::new());
        assert_eq!(
            service(failing(), &store).relevant_categories(&bare).await,
            vec!["other"]
        );
    }

    #[tokio::test]
    async fn incremental_without_new_messages_is_a_no_op() {
        let ai = MockAIProvider::new();
        let store = InMemoryStore::new();
        let conv = conversation(chat());
        store.save(&conv).await.unwrap();
        let stored = CategoryScore::new(conv.id(), "dating", 0.8, 0.6)
            .categorized_at(Timestamp::from_unix_secs(500));
        store.upsert_many(&[stored.clone()]).await.unwrap();

        let svc = service(ai.clone(), &store);
        let first = svc.recategorize_incremental(&conv.id()).await.unwrap();
        let second = svc.recategorize_incremental(&conv.id()).await.unwrap();

        assert_eq!(first, vec![stored.clone()]);
        assert_eq!(second, vec![stored]);
        assert_eq!(ai.call_count(), 0);
    }

    #[tokio::test]
    async fn incremental_without_prior_scores_runs_full_categorization() {
        let ai = MockAIProvider::new()
            .with_response(r#"{"categories":[{"name":"dating","relevance":0.9,"success_score":90}]}"#);
        let store = InMemoryStore::new();
        let conv = conversation(chat());
        store.save(&conv).await.unwrap();

        let scores = service(ai, &store).recategorize_incremental(&conv.id()).await.unwrap();

        assert_eq!(scores.len(), 1);
        assert_eq!(store.find_for_conversation(&conv.id()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn incremental_merges_shared_and_keeps_old_only() {
        let ai = MockAIProvider::new().with_response(
            r#"{"categories":[
                {"name":"dating","relevance":1.0,"success_score":100,"reason":"confirmed"},
                {"name":"business","relevance":0.6,"success_score":40}]}"#,
        );
        let store = InMemoryStore::new();
        let mut messages = chat();
        messages.push(Message::from_user("See you at 8", Timestamp::from_unix_secs(1000)));
        let conv = conversation(messages);
        store.save(&conv).await.unwrap();
        store
            .upsert_many(&[
                CategoryScore::new(conv.id(), "dating", 0.5, 0.5)
                    .with_reason("early")
                    .categorized_at(Timestamp::from_unix_secs(500)),
                CategoryScore::new(conv.id(), "other", 0.3, 0.3)
                    .categorized_at(Timestamp::from_unix_secs(500)),
            ])
            .await
            .unwrap();

        let merged = service(ai, &store)
            .recategorize_incremental(&conv.id())
            .await
            .unwrap();

        let dating = merged.iter().find(|s| s.category == "dating").unwrap();
        assert!(dating.relevance > 0.5 && dating.relevance < 1.0);
        assert_eq!(dating.reason, "confirmed");
        assert!(merged.iter().any(|s| s.category == "business"));

        let stored = store.find_for_conversation(&conv.id()).await.unwrap();
        assert_eq!(stored.len(), 3);
        let other = stored.iter().find(|s| s.category == "other").unwrap();
        assert_eq!(other.relevance, 0.3);
    }

    #[tokio::test]
    async fn incremental_keeps_stored_outcome_when_reply_omits_it() {
        let ai = MockAIProvider::new().with_response(
            r#"{"categories":[{"name":"dating","relevance":0.9,"success_score":85,"outcome_type":"  "}]}"#,
        );
        let store = InMemoryStore::new();
        let mut messages = chat();
        messages.push(Message::from_counterpart("Can't wait", Timestamp::from_unix_secs(1000)));
        let conv = conversation(messages);
        store.save(&conv).await.unwrap();
        store
            .upsert_many(&[CategoryScore::new(conv.id(), "dating", 0.7, 0.9)
                .with_outcome(OutcomeType::Success)
                .categorized_at(Timestamp::from_unix_secs(500))])
            .await
            .unwrap();

        let merged = service(ai, &store)
            .recategorize_incremental(&conv.id())
            .await
            .unwrap();

        assert_eq!(merged[0].outcome, Some(OutcomeType::Success));
        let stored = store.find_for_conversation(&conv.id()).await.unwrap();
        assert_eq!(stored[0].outcome, Some(OutcomeType::Success));
    }

    #[test]
    fn missing_outcome_is_none_and_unknown_is_neutral() {
        assert_eq!(parse_outcome(None), None);
        assert_eq!(parse_outcome(Some("")), None);
        assert_eq!(parse_outcome(Some("partial success")), Some(OutcomeType::PartialSuccess));
        assert_eq!(parse_outcome(Some("meh")), Some(OutcomeType::Neutral));
    }

    #[tokio::test]
    async fn incremental_for_unknown_conversation_is_not_found() {
        let store = InMemoryStore::new();
        let result = service(MockAIProvider::new(), &store)
            .recategorize_incremental(&ConversationId::new())
            .await;
        assert!(matches!(result, Err(CategorizationError::ConversationNotFound(_))));
    }

    #[test]
    fn volume_penalty_keeps_large_history_dominant() {
        let weight = new_score_weight(&metrics(1.0, 1.0, 30.0), 50, 10);
        assert!(weight < 0.5, "weight was {weight}");
        assert!((weight - 0.466_666).abs() < 1e-4);
    }

    #[test]
    fn empty_counts_use_even_ratio() {
        let weight = new_score_weight(&metrics(0.0, 0.0, 120.0), 0, 0);
        let expected = 0.4 * (0.3 * (1.0 - 60.0 / 3600.0)) + 0.6 * 0.75;
        assert!((weight - expected).abs() < 1e-9);
    }

    #[test]
    fn merge_prefers_new_outcome_and_keeps_old_when_missing() {
        let id = ConversationId::new();
        let old = CategoryScore::new(id, "dating", 0.2, 0.4).with_outcome(OutcomeType::Neutral);
        let mut new = CategoryScore::new(id, "dating", 0.6, 0.8);
        new.outcome = None;

        let merged = merge_scores(&[old], &[new], 0.5);
        assert!((merged[0].relevance - 0.4).abs() < 1e-9);
        assert!((merged[0].success - 0.6).abs() < 1e-9);
        assert_eq!(merged[0].outcome, Some(OutcomeType::Neutral));
    }

    proptest! {
        #[test]
        fn new_weight_stays_in_unit_interval(
            engagement in 0.0f64..=1.0,
            ratio in 0.0f64..10.0,
            reply in 0.0f64..100_000.0,
            old in 0usize..500,
            new in 0usize..500,
        ) {
            let w = new_score_weight(&metrics(engagement, ratio, reply), old, new);
            prop_assert!((0.0..=1.0).contains(&w));
        }

        #[test]
        fn merged_scores_lie_between_inputs(
            a in 0.0f64..=1.0,
            b in 0.0f64..=1.0,
            w in 0.0f64..=1.0,
        ) {
            let id = ConversationId::new();
            let merged = merge_scores(
                &[CategoryScore::new(id, "x", a, a)],
                &[CategoryScore::new(id, "x", b, b)],
                w,
            );
            let lo = a.min(b) - 1e-12;
            let hi = a.max(b) + 1e-12;
            prop_assert!(merged[0].relevance >= lo && merged[0].relevance <= hi);
        }
    }
}
