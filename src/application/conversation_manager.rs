//! AutomatedConversationManager - drives one automated reply loop per goal.
//!
//! Each active goal owns a `tokio::sync::Mutex<ConversationState>` in the
//! goal registry, a polling task for inbound messages and at most one current
//! pending-send task. Completion, humanization and platform calls run outside
//! the state lock; the state is re-checked before their results are committed.
//!
//! Deliveries of one goal are serialized by a send lock held from the timing
//! check until the sent message is recorded. Tasks are never aborted: a
//! superseded send task notices its stale generation when it wakes, and
//! closing signals the goal's shutdown channel and waits for an in-flight
//! delivery to be recorded.
//!
//! ## Lifecycle
//!
//! ```text
//! initialize ──► Active ──(inbound, draft)──► PendingResponse ──(send)──► Active
//!                   │                               │
//!                   └────────── close_and_summarize ┴──► Closed
//! ```
//!
//! ## Failure handling
//!
//! | Failure | Result |
//! |---------|--------|
//! | completion error or timeout | no draft, logged |
//! | humanizer error or timeout | raw completion is used |
//! | platform send error | pending kept, retried after its delay |
//! | summarizer error | summary explains the error, goal still closes |
//! | polling tick error | logged, other goals unaffected |

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tokio::time::{self, timeout};

use super::categorization::CategorizationService;
use super::chat_selector::{SelectedConversation, SmartChatSelector};
use super::json_reply::trace_id;
use super::reply_prompt::{select_example_mix, stored_success, ReplyContext, ReplyPromptBuilder};
use crate::domain::analysis::{
    ConversationSample, DisinterestDetector, ResponseTimingAnalyzer, SuccessKeywords,
    SuccessScorer, WeightedResponseSynthesis, DEFAULT_MESSAGE_WINDOW,
};
use crate::domain::categories::CategoryRegistry;
use crate::domain::conversation::{
    ConversationGoal, ConversationState, ConversationSummary, GoalStatus, Message,
    PendingResponse, PlatformKind, QuizQuestion, StyleProfile,
};
use crate::domain::foundation::{ConversationId, GoalId, Timestamp, ValidationError};
use crate::ports::{
    AIProvider, CategoryScoreRepository, CompletionRequest, ConnectorRegistry,
    ConversationRepository, ConversationStateRepository, ConversationSummarizer,
    DisinterestLogEntry, Humanizer, MessageRole, PlatformError, RepositoryError, RequestMetadata,
    RequestPurpose,
};

/// Engagement assumed while a conversation has fewer than 3 messages.
const NEUTRAL_ENGAGEMENT: f64 = 0.5;
const MIN_MESSAGES_FOR_ANALYSIS: usize = 3;
const REPLY_MAX_TOKENS: u32 = 500;

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("goal not found: {0}")]
    GoalNotFound(GoalId),

    #[error("goal already initialized: {0}")]
    AlreadyInitialized(GoalId),

    #[error("goal is closed: {0}")]
    GoalClosed(GoalId),

    #[error("conversation not found: {0}")]
    ConversationNotFound(ConversationId),

    #[error(transparent)]
    InvalidState(#[from] ValidationError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Platform(#[from] PlatformError),
}

/// Tuning for the reply loop.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Inbound polling period per goal.
    pub poll_interval: Duration,
    /// Token budget for historical candidates pulled by the selector.
    pub token_budget: usize,
    /// Token budget for examples rendered into the reply prompt.
    pub prompt_token_budget: usize,
    pub max_candidates: usize,
    pub max_examples: usize,
    /// Disinterest above this is logged.
    pub warn_threshold: f64,
    /// Disinterest above this suspends automation.
    pub suspend_threshold: f64,
    pub completion_timeout: Duration,
    pub humanize_timeout: Duration,
    pub platform_timeout: Duration,
    pub summary_timeout: Duration,
    /// Timing re-checks before a pending reply is sent regardless.
    pub max_send_attempts: u32,
    pub quiz_questions: usize,
    /// Trailing messages inspected by the success heuristic.
    pub success_message_window: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            token_budget: 8000,
            prompt_token_budget: 6000,
            max_candidates: 50,
            max_examples: 5,
            warn_threshold: 0.7,
            suspend_threshold: 0.8,
            completion_timeout: Duration::from_secs(30),
            humanize_timeout: Duration::from_secs(60),
            platform_timeout: Duration::from_secs(30),
            summary_timeout: Duration::from_secs(60),
            max_send_attempts: 3,
            quiz_questions: 5,
            success_message_window: DEFAULT_MESSAGE_WINDOW,
        }
    }
}

impl ManagerConfig {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_send_attempts(mut self, attempts: u32) -> Self {
        self.max_send_attempts = attempts;
        self
    }

    pub fn with_completion_timeout(mut self, completion_timeout: Duration) -> Self {
        self.completion_timeout = completion_timeout;
        self
    }

    pub fn with_humanize_timeout(mut self, humanize_timeout: Duration) -> Self {
        self.humanize_timeout = humanize_timeout;
        self
    }
}

/// Collaborators the manager is wired with.
pub struct ManagerPorts {
    pub ai: Arc<dyn AIProvider>,
    pub humanizer: Arc<dyn Humanizer>,
    pub summarizer: Arc<dyn ConversationSummarizer>,
    pub connectors: ConnectorRegistry,
    pub conversations: Arc<dyn ConversationRepository>,
    pub scores: Arc<dyn CategoryScoreRepository>,
    pub states: Arc<dyn ConversationStateRepository>,
    pub categories: Arc<CategoryRegistry>,
}

/// What happened to an inbound batch.
#[derive(Debug, Clone, PartialEq)]
pub enum IncomingOutcome {
    /// Every message was already known.
    Duplicate,
    /// Automation is paused for manual intervention.
    Suspended { probability: f64 },
    /// A reply is pending delivery after `delay_secs`.
    Drafted { delay_secs: u64 },
    /// No reply: completion failed or the conversation moved on while drafting.
    NoDraft,
}

/// What a delivery attempt did.
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    Sent { platform_message_id: Option<String> },
    /// Too early to reply; retried after `after_secs`.
    Deferred { after_secs: u64 },
    /// The platform rejected the send; retried after `after_secs`.
    SendFailed { after_secs: u64 },
    NothingPending,
    /// A newer schedule took over this send task.
    Superseded,
}

struct GoalHandle {
    state: Arc<Mutex<ConversationState>>,
    send_lock: Arc<Mutex<()>>,
    platform: PlatformKind,
    target: String,
    shutdown: watch::Sender<bool>,
    /// Bumped whenever the pending send is rescheduled or cancelled.
    send_generation: u64,
}

impl GoalHandle {
    /// Tells the poller and any sleeping send task to exit.
    fn stop(&self) {
        let _ = self.shutdown.send(true);
    }
}

/// Lock-free view of a registered goal.
struct GoalSlot {
    state: Arc<Mutex<ConversationState>>,
    send_lock: Arc<Mutex<()>>,
    platform: PlatformKind,
    target: String,
}

/// Inputs for drafting, copied out of the state so the lock can be released.
struct DraftInput {
    goal: ConversationGoal,
    categories: Vec<String>,
    style: StyleProfile,
    messages: Vec<Message>,
    engagement: f64,
    inbound_seen: usize,
}

struct ManagerInner {
    config: ManagerConfig,
    ai: Arc<dyn AIProvider>,
    humanizer: Arc<dyn Humanizer>,
    summarizer: Arc<dyn ConversationSummarizer>,
    connectors: ConnectorRegistry,
    conversations: Arc<dyn ConversationRepository>,
    states: Arc<dyn ConversationStateRepository>,
    categorization: CategorizationService,
    selector: SmartChatSelector,
    detector: DisinterestDetector,
    timing: ResponseTimingAnalyzer,
    synthesis: WeightedResponseSynthesis,
    scorer: SuccessScorer,
    prompts: ReplyPromptBuilder,
    goals: StdMutex<HashMap<GoalId, GoalHandle>>,
}

fn locked<T>(mutex: &StdMutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Cheap to clone; clones share the goal registry.
#[derive(Clone)]
pub struct AutomatedConversationManager {
    inner: Arc<ManagerInner>,
}

impl AutomatedConversationManager {
    pub fn new(ports: ManagerPorts, config: ManagerConfig) -> Self {
        Self::with_success_keywords(ports, config, SuccessKeywords::default())
    }

    pub fn with_success_keywords(
        ports: ManagerPorts,
        config: ManagerConfig,
        keywords: SuccessKeywords,
    ) -> Self {
        let categorization = CategorizationService::new(
            ports.ai.clone(),
            ports.categories,
            ports.conversations.clone(),
            ports.scores.clone(),
        )
        .with_timeout(config.completion_timeout);
        let selector = SmartChatSelector::new(ports.conversations.clone(), ports.scores);
        let scorer = SuccessScorer::new(keywords).with_window(config.success_message_window);
        let prompts = ReplyPromptBuilder::new(config.prompt_token_budget, config.max_examples);

        Self {
            inner: Arc::new(ManagerInner {
                config,
                ai: ports.ai,
                humanizer: ports.humanizer,
                summarizer: ports.summarizer,
                connectors: ports.connectors,
                conversations: ports.conversations,
                states: ports.states,
                categorization,
                selector,
                detector: DisinterestDetector::new(),
                timing: ResponseTimingAnalyzer::new(),
                synthesis: WeightedResponseSynthesis::default(),
                scorer,
                prompts,
                goals: StdMutex::new(HashMap::new()),
            }),
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.inner.config
    }

    /// Goals currently driven by this manager.
    pub fn active_goals(&self) -> Vec<GoalId> {
        let mut ids: Vec<GoalId> = locked(&self.inner.goals).keys().copied().collect();
        ids.sort();
        ids
    }

    /// Snapshot of a registered goal's state.
    pub async fn state(&self, goal_id: GoalId) -> Result<ConversationState, ManagerError> {
        let slot = self.slot(goal_id)?;
        let state = slot.state.lock().await;
        Ok(state.clone())
    }

    /// Starts automation for a goal.
    ///
    /// Brings the owner's category scores up to date, resolves relevant
    /// categories, synthesizes a style profile from the scored history,
    /// persists the new state and starts polling.
    pub async fn initialize(&self, goal: ConversationGoal) -> Result<ConversationState, ManagerError> {
        let goal_id = goal.id;
        if locked(&self.inner.goals).contains_key(&goal_id) {
            return Err(ManagerError::AlreadyInitialized(goal_id));
        }
        let conversation = self
            .inner
            .conversations
            .find_by_id(&goal.conversation_id)
            .await?
            .ok_or(ManagerError::ConversationNotFound(goal.conversation_id))?;

        // Scores for new history must exist before the selector ranks it.
        match self.inner.categorization.categorize_owner(&goal.owner).await {
            Ok(processed) => {
                tracing::debug!(goal_id = %goal_id, processed, "owner history categorized")
            }
            Err(e) => {
                tracing::warn!(goal_id = %goal_id, error = %e, "owner history not categorized")
            }
        }
        let categories = self.inner.categorization.relevant_categories(&goal).await;
        let style = self.synthesize_style(&goal, &categories).await;

        let mut state = ConversationState::new(goal, conversation.messages().to_vec());
        state.activate(categories, style)?;
        if state.messages().len() >= MIN_MESSAGES_FOR_ANALYSIS {
            let report = self.inner.detector.analyze(state.messages());
            state.engagement_score = 1.0 - report.probability;
            state.last_disinterest = Some(report);
        }
        self.inner.states.save_state(&state).await?;

        self.register(
            state.clone(),
            conversation.platform(),
            conversation.platform_ref().to_string(),
        )?;
        tracing::info!(
            goal_id = %goal_id,
            conversation_id = %conversation.id(),
            platform = %conversation.platform(),
            categories = ?state.relevant_categories,
            "goal initialized"
        );
        Ok(state)
    }

    /// Appends one inbound message and, unless automation is paused, drafts
    /// and schedules a reply.
    pub async fn on_incoming_message(
        &self,
        goal_id: GoalId,
        message: Message,
    ) -> Result<IncomingOutcome, ManagerError> {
        self.ingest(goal_id, vec![message]).await
    }

    /// Delivers the pending reply if the timing check allows it.
    ///
    /// A deferred or failed delivery is rescheduled after the pending delay.
    pub async fn fire_scheduled_send(&self, goal_id: GoalId) -> Result<SendOutcome, ManagerError> {
        let outcome = self.deliver(goal_id, None).await?;
        match outcome {
            SendOutcome::Deferred { after_secs } | SendOutcome::SendFailed { after_secs } => {
                self.schedule_send(goal_id, Duration::from_secs(after_secs));
            }
            SendOutcome::Sent { .. } | SendOutcome::NothingPending | SendOutcome::Superseded => {}
        }
        Ok(outcome)
    }

    /// Stops automation, closes the goal and stores its summary.
    ///
    /// Idempotent: closing an already-closed goal returns the stored summary.
    pub async fn close_and_summarize(
        &self,
        goal_id: GoalId,
    ) -> Result<Option<ConversationSummary>, ManagerError> {
        let removed = locked(&self.inner.goals).remove(&goal_id);
        let (state, send_lock) = match removed {
            Some(handle) => {
                handle.stop();
                (handle.state, handle.send_lock)
            }
            None => match self.inner.states.load_state(&goal_id).await? {
                Some(stored) if !stored.is_open() => {
                    return Ok(self.inner.states.find_summary(&goal_id).await?);
                }
                Some(stored) => (Arc::new(Mutex::new(stored)), Arc::new(Mutex::new(()))),
                None => return Err(ManagerError::GoalNotFound(goal_id)),
            },
        };

        let (goal, messages) = {
            // A delivery already in flight is recorded before the goal closes.
            let _sending = send_lock.lock().await;
            let mut state = state.lock().await;
            if state.is_open() {
                state.close()?;
            }
            self.inner.states.save_state(&state).await?;
            (state.goal.clone(), state.messages().to_vec())
        };
        tracing::info!(goal_id = %goal_id, messages = messages.len(), "goal closed");

        let summary = self.summarize(&goal, &messages).await;
        if let Err(e) = self.inner.states.save_summary(&goal_id, &summary).await {
            tracing::warn!(goal_id = %goal_id, error = %e, "failed to store summary");
        }
        Ok(Some(summary))
    }

    /// Lets automation continue after a disinterest suspension.
    pub async fn resume_automation(&self, goal_id: GoalId) -> Result<(), ManagerError> {
        let slot = self.slot(goal_id)?;
        let mut state = slot.state.lock().await;
        if !state.is_open() {
            return Err(ManagerError::GoalClosed(goal_id));
        }
        state.manual_intervention_required = false;
        self.inner.states.save_state(&state).await?;
        tracing::info!(goal_id = %goal_id, "automation resumed");
        Ok(())
    }

    /// One polling tick over every active goal.
    ///
    /// Returns how many goals received new messages. Errors are logged per
    /// goal and never stop the tick.
    pub async fn poll_once(&self) -> usize {
        let mut updated = 0;
        for goal_id in self.active_goals() {
            match self.poll_goal(goal_id).await {
                Ok(Some(_)) => updated += 1,
                Ok(None) => {}
                Err(e) => tracing::error!(goal_id = %goal_id, error = %e, "poll tick failed"),
            }
        }
        updated
    }

    /// Rebuilds the goal registry from stored open states and reschedules
    /// their pending replies.
    pub async fn restore_active_goals(&self) -> Result<usize, ManagerError> {
        let stored = self.inner.states.find_active().await?;
        let mut restored = 0;

        for state in stored {
            let goal_id = state.goal.id;
            if locked(&self.inner.goals).contains_key(&goal_id) {
                continue;
            }
            if state.status == GoalStatus::Uninitialized {
                tracing::warn!(goal_id = %goal_id, "skipping goal that was never activated");
                continue;
            }
            let Some(conversation) = self
                .inner
                .conversations
                .find_by_id(&state.goal.conversation_id)
                .await?
            else {
                tracing::warn!(goal_id = %goal_id, "conversation missing, goal not restored");
                continue;
            };

            let now = Timestamp::now();
            let due_in = state
                .pending()
                .map(|pending| pending.due_at().secs_since(&now).max(0.0));

            if let Err(e) = self.register(
                state,
                conversation.platform(),
                conversation.platform_ref().to_string(),
            ) {
                tracing::warn!(goal_id = %goal_id, error = %e, "goal not restored");
                continue;
            }
            if let Some(secs) = due_in {
                self.schedule_send(goal_id, Duration::from_secs_f64(secs));
            }
            restored += 1;
        }

        tracing::info!(restored, "active goals restored");
        Ok(restored)
    }

    /// Parks until `shutdown` flips to true, then stops every goal task.
    ///
    /// Goal tasks run on their own; states are already persisted, so a later
    /// `restore_active_goals` picks up where this left off.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        while !*shutdown.borrow() {
            if shutdown.changed().await.is_err() {
                break;
            }
        }
        self.shutdown();
    }

    /// Stops all polling and pending-send tasks and empties the registry.
    ///
    /// A delivery already talking to the platform still records its message.
    pub fn shutdown(&self) {
        let mut goals = locked(&self.inner.goals);
        for handle in goals.values() {
            handle.stop();
        }
        let stopped = goals.len();
        goals.clear();
        tracing::info!(stopped, "conversation manager stopped");
    }

    // ----- internals -----

    fn slot(&self, goal_id: GoalId) -> Result<GoalSlot, ManagerError> {
        let goals = locked(&self.inner.goals);
        let handle = goals.get(&goal_id).ok_or(ManagerError::GoalNotFound(goal_id))?;
        Ok(GoalSlot {
            state: handle.state.clone(),
            send_lock: handle.send_lock.clone(),
            platform: handle.platform,
            target: handle.target.clone(),
        })
    }

    fn register(
        &self,
        state: ConversationState,
        platform: PlatformKind,
        target: String,
    ) -> Result<(), ManagerError> {
        let goal_id = state.goal.id;
        let mut goals = locked(&self.inner.goals);
        if goals.contains_key(&goal_id) {
            return Err(ManagerError::AlreadyInitialized(goal_id));
        }
        let (shutdown, shutdown_rx) = watch::channel(false);
        self.spawn_poller(goal_id, shutdown_rx);
        goals.insert(
            goal_id,
            GoalHandle {
                state: Arc::new(Mutex::new(state)),
                send_lock: Arc::new(Mutex::new(())),
                platform,
                target,
                shutdown,
                send_generation: 0,
            },
        );
        Ok(())
    }

    /// A tick in progress runs to completion; shutdown is observed between ticks.
    fn spawn_poller(&self, goal_id: GoalId, mut shutdown: watch::Receiver<bool>) {
        let weak: Weak<ManagerInner> = Arc::downgrade(&self.inner);
        let period = self.inner.config.poll_interval;

        tokio::spawn(async move {
            let mut interval = time::interval(period);
            // The first tick completes immediately.
            interval.tick().await;
            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            return;
                        }
                    }
                    _ = interval.tick() => {
                        let Some(inner) = weak.upgrade() else { return };
                        let manager = AutomatedConversationManager { inner };
                        if let Err(e) = manager.poll_goal(goal_id).await {
                            tracing::error!(goal_id = %goal_id, error = %e, "poll tick failed");
                        }
                    }
                }
            }
        });
    }

    /// Starts a send task firing after `delay` and retires the previous one.
    ///
    /// The previous task is not aborted: it exits when it next wakes and sees
    /// a newer generation, so a send already under way is still recorded.
    fn schedule_send(&self, goal_id: GoalId, delay: Duration) {
        let (generation, mut shutdown) = {
            let mut goals = locked(&self.inner.goals);
            let Some(handle) = goals.get_mut(&goal_id) else {
                return;
            };
            handle.send_generation += 1;
            (handle.send_generation, handle.shutdown.subscribe())
        };
        let weak: Weak<ManagerInner> = Arc::downgrade(&self.inner);

        tokio::spawn(async move {
            let mut wait = delay;
            loop {
                let stopped = tokio::select! {
                    _ = time::sleep(wait) => false,
                    _ = shutdown.wait_for(|stop| *stop) => true,
                };
                if stopped {
                    return;
                }
                let Some(inner) = weak.upgrade() else { return };
                let manager = AutomatedConversationManager { inner };
                match manager.deliver(goal_id, Some(generation)).await {
                    Ok(SendOutcome::Deferred { after_secs })
                    | Ok(SendOutcome::SendFailed { after_secs }) => {
                        wait = Duration::from_secs(after_secs);
                    }
                    Ok(_) => return,
                    Err(ManagerError::GoalNotFound(_)) => return,
                    Err(e) => {
                        tracing::error!(goal_id = %goal_id, error = %e, "scheduled send failed");
                        return;
                    }
                }
            }
        });
        tracing::debug!(goal_id = %goal_id, generation, delay_secs = delay.as_secs(), "send scheduled");
    }

    fn cancel_send(&self, goal_id: GoalId) {
        if let Some(handle) = locked(&self.inner.goals).get_mut(&goal_id) {
            handle.send_generation += 1;
        }
    }

    fn is_current_send(&self, goal_id: GoalId, generation: u64) -> bool {
        locked(&self.inner.goals)
            .get(&goal_id)
            .map(|handle| handle.send_generation == generation)
            .unwrap_or(false)
    }

    /// Pulls new counterpart messages for one goal. `None` when nothing new arrived.
    async fn poll_goal(&self, goal_id: GoalId) -> Result<Option<IncomingOutcome>, ManagerError> {
        let slot = self.slot(goal_id)?;
        let connector = self.inner.connectors.get(slot.platform)?;
        let limit = self.inner.config.platform_timeout;

        let inbound = timeout(limit, connector.poll_new_messages(&slot.target))
            .await
            .map_err(|_| PlatformError::Timeout {
                timeout_secs: limit.as_secs(),
            })??;
        let inbound: Vec<Message> = inbound
            .into_iter()
            .filter(Message::is_from_counterpart)
            .collect();
        if inbound.is_empty() {
            return Ok(None);
        }

        match self.ingest(goal_id, inbound).await? {
            IncomingOutcome::Duplicate => Ok(None),
            outcome => Ok(Some(outcome)),
        }
    }

    async fn ingest(
        &self,
        goal_id: GoalId,
        mut batch: Vec<Message>,
    ) -> Result<IncomingOutcome, ManagerError> {
        batch.sort_by_key(|m| m.timestamp);
        let slot = self.slot(goal_id)?;
        let config = &self.inner.config;

        let input = {
            let mut state = slot.state.lock().await;
            if !state.is_open() {
                return Err(ManagerError::GoalClosed(goal_id));
            }

            let mut fresh = Vec::new();
            for message in batch {
                match state.append_message(message.clone()) {
                    Ok(true) => fresh.push(message),
                    Ok(false) => {}
                    Err(e) => {
                        tracing::warn!(goal_id = %goal_id, error = %e, "dropping inbound message")
                    }
                }
            }
            if fresh.is_empty() {
                return Ok(IncomingOutcome::Duplicate);
            }
            self.inner
                .conversations
                .append_messages(&state.goal.conversation_id, &fresh)
                .await?;

            let report = self.inner.detector.analyze(state.messages());
            let probability = report.probability;
            state.engagement_score = if state.messages().len() < MIN_MESSAGES_FOR_ANALYSIS {
                NEUTRAL_ENGAGEMENT
            } else {
                1.0 - probability
            };

            if probability > config.warn_threshold {
                tracing::warn!(
                    goal_id = %goal_id,
                    probability,
                    recommendation = %report.recommendation,
                    "high disinterest detected"
                );
                let entry =
                    DisinterestLogEntry::new(goal_id, state.goal.conversation_id, report.clone());
                if let Err(e) = self.inner.states.record_disinterest(&entry).await {
                    tracing::warn!(goal_id = %goal_id, error = %e, "failed to record disinterest");
                }
            }
            state.last_disinterest = Some(report);

            let pace = self.inner.timing.analyze_target_timing(state.messages());
            tracing::debug!(
                goal_id = %goal_id,
                avg_reply_secs = pace.avg_delay_secs,
                recommended_delay_secs = pace.recommended_delay(),
                "counterpart timing updated"
            );
            state.target_timing = Some(pace);

            if probability > config.suspend_threshold && !state.manual_intervention_required {
                state.manual_intervention_required = true;
                state.discard_pending()?;
                self.cancel_send(goal_id);
                tracing::warn!(goal_id = %goal_id, probability, "automation suspended");
            }
            self.inner.states.save_state(&state).await?;

            if state.manual_intervention_required {
                return Ok(IncomingOutcome::Suspended { probability });
            }

            DraftInput {
                goal: state.goal.clone(),
                categories: state.relevant_categories.clone(),
                style: state.style_profile.clone(),
                messages: state.messages().to_vec(),
                engagement: state.engagement_score,
                inbound_seen: inbound_count(state.messages()),
            }
        };

        let Some(text) = self.draft_reply(&input).await else {
            return Ok(IncomingOutcome::NoDraft);
        };
        let delay_secs = self
            .inner
            .timing
            .calculate_optimal_delay(&input.messages, input.engagement, input.style.avg_response_time_secs)
            .round() as u64;

        {
            let mut state = slot.state.lock().await;
            if !state.is_open()
                || state.manual_intervention_required
                || inbound_count(state.messages()) != input.inbound_seen
            {
                tracing::debug!(goal_id = %goal_id, "conversation moved on while drafting, draft dropped");
                return Ok(IncomingOutcome::NoDraft);
            }
            state.set_pending(PendingResponse::new(text, delay_secs, Timestamp::now()))?;
            self.inner.states.save_state(&state).await?;
        }
        self.schedule_send(goal_id, Duration::from_secs(delay_secs));

        tracing::debug!(goal_id = %goal_id, delay_secs, "reply drafted");
        Ok(IncomingOutcome::Drafted { delay_secs })
    }

    async fn draft_reply(&self, input: &DraftInput) -> Option<String> {
        let goal = &input.goal;
        let config = &self.inner.config;

        let candidates = match self
            .inner
            .selector
            .select(&goal.owner, &input.categories, config.max_candidates, config.token_budget)
            .await
        {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::warn!(goal_id = %goal.id, error = %e, "example selection failed");
                Vec::new()
            }
        };
        let examples = select_example_mix(without_own(candidates, goal.conversation_id));
        let mut prompt = self.inner.prompts.build(&ReplyContext {
            goal,
            style: &input.style,
            messages: &input.messages,
            examples: &examples,
        });

        let provider = self.inner.ai.provider_info();
        let prompt_tokens = self.inner.ai.estimate_tokens(&prompt);
        if !examples.is_empty()
            && prompt_tokens.saturating_add(REPLY_MAX_TOKENS) > provider.max_context_tokens
        {
            tracing::warn!(
                goal_id = %goal.id,
                provider = %provider.name,
                model = %provider.model,
                prompt_tokens,
                max_context_tokens = provider.max_context_tokens,
                "reply prompt exceeds the context window, dropping examples"
            );
            prompt = self.inner.prompts.build(&ReplyContext {
                goal,
                style: &input.style,
                messages: &input.messages,
                examples: &[],
            });
        }

        let metadata = RequestMetadata::new(goal.owner.clone(), RequestPurpose::ReplyDraft, trace_id())
            .with_goal(goal.id)
            .with_conversation(goal.conversation_id);
        let request = CompletionRequest::new(metadata)
            .with_message(MessageRole::User, prompt)
            .with_max_tokens(REPLY_MAX_TOKENS)
            .with_temperature(0.8);

        let draft = match timeout(config.completion_timeout, self.inner.ai.complete(request)).await {
            Ok(Ok(response)) => response.content.trim().to_string(),
            Ok(Err(e)) => {
                tracing::warn!(goal_id = %goal.id, error = %e, "reply completion failed");
                return None;
            }
            Err(_) => {
                tracing::warn!(
                    goal_id = %goal.id,
                    timeout_secs = config.completion_timeout.as_secs(),
                    "reply completion timed out"
                );
                return None;
            }
        };
        if draft.is_empty() {
            tracing::warn!(goal_id = %goal.id, "empty reply completion");
            return None;
        }
        Some(self.humanize(goal.id, draft).await)
    }

    async fn humanize(&self, goal_id: GoalId, draft: String) -> String {
        let limit = self.inner.config.humanize_timeout;
        let humanizer = self.inner.humanizer.name();
        let attempt = async {
            match self.inner.humanizer.humanize(&draft).await {
                Err(e) if e.is_retryable() => {
                    tracing::debug!(goal_id = %goal_id, humanizer, error = %e, "humanizer failed, retrying once");
                    self.inner.humanizer.humanize(&draft).await
                }
                other => other,
            }
        };
        let result = timeout(limit, attempt).await;
        match result {
            Ok(Ok(text)) if !text.trim().is_empty() => text,
            Ok(Ok(_)) => draft,
            Ok(Err(e)) => {
                tracing::warn!(goal_id = %goal_id, humanizer, error = %e, "humanizer failed, using raw draft");
                draft
            }
            Err(_) => {
                tracing::warn!(
                    goal_id = %goal_id,
                    humanizer,
                    timeout_secs = limit.as_secs(),
                    "humanizer timed out, using raw draft"
                );
                draft
            }
        }
    }

    /// One delivery attempt. `generation` identifies the scheduled task making
    /// it; manual calls pass `None`.
    async fn deliver(
        &self,
        goal_id: GoalId,
        generation: Option<u64>,
    ) -> Result<SendOutcome, ManagerError> {
        let slot = self.slot(goal_id)?;
        let max_attempts = self.inner.config.max_send_attempts;

        // Held until the sent message is recorded.
        let _sending = slot.send_lock.lock().await;
        if let Some(generation) = generation {
            if !self.is_current_send(goal_id, generation) {
                return Ok(SendOutcome::Superseded);
            }
        }

        let (snapshot, delay_secs) = {
            let mut state = slot.state.lock().await;
            if !state.is_open() || state.manual_intervention_required {
                return Ok(SendOutcome::NothingPending);
            }
            let age = state.last_message_age_secs(Timestamp::now());
            let ready = self.inner.timing.should_respond_now(age, state.engagement_score);

            let Some(pending) = state.pending_mut() else {
                return Ok(SendOutcome::NothingPending);
            };
            let delay_secs = pending.delay_secs;
            if !ready && pending.attempts < max_attempts {
                pending.attempts += 1;
                let attempts = pending.attempts;
                self.inner.states.save_state(&state).await?;
                tracing::debug!(goal_id = %goal_id, attempts, after_secs = delay_secs, "send deferred");
                return Ok(SendOutcome::Deferred {
                    after_secs: delay_secs,
                });
            }
            if !ready {
                tracing::info!(goal_id = %goal_id, attempts = max_attempts, "send attempts exhausted, sending anyway");
            }
            (pending.clone(), delay_secs)
        };
        let text = &snapshot.text;

        let connector = self.inner.connectors.get(slot.platform)?;
        let limit = self.inner.config.platform_timeout;
        let sent = timeout(limit, connector.send(&slot.target, text))
            .await
            .unwrap_or(Err(PlatformError::Timeout {
                timeout_secs: limit.as_secs(),
            }));

        let receipt = match sent {
            Ok(receipt) if receipt.delivered => receipt,
            Ok(_) => {
                tracing::warn!(goal_id = %goal_id, "reply not delivered, will retry");
                return Ok(SendOutcome::SendFailed {
                    after_secs: delay_secs,
                });
            }
            Err(e) if !e.is_retryable() => {
                tracing::error!(goal_id = %goal_id, error = %e, "reply cannot be delivered, giving up");
                return Err(e.into());
            }
            Err(e) => {
                tracing::warn!(goal_id = %goal_id, error = %e, "reply send failed, will retry");
                return Ok(SendOutcome::SendFailed {
                    after_secs: delay_secs,
                });
            }
        };

        let mut state = slot.state.lock().await;
        let message = Message::from_user(text.clone(), Timestamp::now());
        if !state.is_open() {
            tracing::warn!(goal_id = %goal_id, "goal closed while the reply was in flight");
            self.inner
                .conversations
                .append_messages(&state.goal.conversation_id, std::slice::from_ref(&message))
                .await?;
            return Ok(SendOutcome::Sent {
                platform_message_id: receipt.platform_message_id,
            });
        }
        if state.pending() == Some(&snapshot) {
            state.record_sent(message.clone())?;
        } else {
            // A newer draft replaced this one mid-send; keep it pending.
            state.append_message(message.clone())?;
            state.last_response_at = Some(message.timestamp);
        }
        self.inner
            .conversations
            .append_messages(&state.goal.conversation_id, std::slice::from_ref(&message))
            .await?;
        self.inner.states.save_state(&state).await?;

        tracing::info!(goal_id = %goal_id, platform = %slot.platform, "reply sent");
        Ok(SendOutcome::Sent {
            platform_message_id: receipt.platform_message_id,
        })
    }

    /// Style blended from the owner's scored history in the relevant categories.
    ///
    /// When stored scores cannot be read, the owner's conversations are scored
    /// with the keyword heuristic instead.
    async fn synthesize_style(&self, goal: &ConversationGoal, categories: &[String]) -> StyleProfile {
        let config = &self.inner.config;
        let selected = self
            .inner
            .selector
            .select(&goal.owner, categories, config.max_candidates, config.token_budget)
            .await;

        let outcome = match selected {
            Ok(candidates) => {
                let candidates = without_own(candidates, goal.conversation_id);
                let samples: Vec<ConversationSample<'_>> = candidates
                    .iter()
                    .map(|c| ConversationSample::new(c.conversation.messages(), stored_success(c)))
                    .collect();
                self.inner.synthesis.synthesize(&samples)
            }
            Err(e) => {
                tracing::warn!(goal_id = %goal.id, error = %e, "stored scores unavailable, using success heuristic");
                let history = self
                    .inner
                    .conversations
                    .find_by_owner(&goal.owner)
                    .await
                    .unwrap_or_default();
                let samples: Vec<ConversationSample<'_>> = history
                    .iter()
                    .filter(|c| c.id() != goal.conversation_id)
                    .map(|c| {
                        let success = self.inner.scorer.score(c.messages(), &goal.goal_type);
                        ConversationSample::new(c.messages(), success)
                    })
                    .collect();
                self.inner.synthesis.synthesize(&samples)
            }
        };

        tracing::debug!(
            goal_id = %goal.id,
            successful = outcome.successful_count,
            failed = outcome.failed_count,
            "style synthesized"
        );
        outcome.profile
    }

    async fn summarize(&self, goal: &ConversationGoal, messages: &[Message]) -> ConversationSummary {
        let limit = self.inner.config.summary_timeout;
        let summarizer = &self.inner.summarizer;

        let summary = match timeout(limit, summarizer.summarize(goal, messages)).await {
            Ok(Ok(summary)) => summary,
            Ok(Err(e)) => {
                tracing::warn!(goal_id = %goal.id, error = %e, "summary failed");
                return ConversationSummary::failed(e);
            }
            Err(_) => {
                tracing::warn!(goal_id = %goal.id, timeout_secs = limit.as_secs(), "summary timed out");
                return ConversationSummary::failed("summary timed out");
            }
        };

        let count = self.inner.config.quiz_questions;
        let quiz = match timeout(limit, summarizer.generate_quiz(goal, &summary, count)).await {
            Ok(Ok(quiz)) => quiz,
            Ok(Err(e)) => {
                tracing::warn!(goal_id = %goal.id, error = %e, "quiz generation failed");
                vec![QuizQuestion::fallback()]
            }
            Err(_) => {
                tracing::warn!(goal_id = %goal.id, "quiz generation timed out");
                vec![QuizQuestion::fallback()]
            }
        };
        summary.with_quiz(quiz)
    }
}

fn without_own(
    candidates: Vec<SelectedConversation>,
    own: ConversationId,
) -> Vec<SelectedConversation> {
    candidates
        .into_iter()
        .filter(|c| c.conversation.id() != own)
        .collect()
}

/// Counterpart messages seen so far; late arrivals can land mid-history, so
/// the count changes even when the newest message does not.
fn inbound_count(messages: &[Message]) -> usize {
    messages.iter().filter(|m| m.is_from_counterpart()).count()
}
