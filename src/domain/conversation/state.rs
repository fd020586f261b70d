//! Runtime state of an automated conversation, one per goal.
//!
//! `GoalStatus` moves through:
//! - `Uninitialized`: created, categories and style not resolved yet
//! - `Active`: waiting for counterpart messages
//! - `PendingResponse`: a drafted reply is scheduled for delivery
//! - `Closed`: automation ended, read-only

use serde::{Deserialize, Serialize};

use super::{ConversationGoal, Message, StyleProfile};
use crate::domain::analysis::{DisinterestReport, TargetTiming};
use crate::domain::foundation::{StateMachine, Timestamp, ValidationError};

/// Lifecycle of an automated goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    #[default]
    Uninitialized,
    Active,
    PendingResponse,
    Closed,
}

impl GoalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GoalStatus::Uninitialized => "uninitialized",
            GoalStatus::Active => "active",
            GoalStatus::PendingResponse => "pending_response",
            GoalStatus::Closed => "closed",
        }
    }

    pub fn parse(value: &str) -> Option<GoalStatus> {
        match value {
            "uninitialized" => Some(GoalStatus::Uninitialized),
            "active" => Some(GoalStatus::Active),
            "pending_response" => Some(GoalStatus::PendingResponse),
            "closed" => Some(GoalStatus::Closed),
            _ => None,
        }
    }

    pub fn is_open(&self) -> bool {
        !matches!(self, GoalStatus::Closed)
    }
}

impl StateMachine for GoalStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use GoalStatus::*;
        matches!(
            (self, target),
            (Uninitialized, Active)
                | (Active, PendingResponse)
                | (PendingResponse, Active)
                | (Active, Closed)
                | (PendingResponse, Closed)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use GoalStatus::*;
        match self {
            Uninitialized => vec![Active],
            Active => vec![PendingResponse, Closed],
            PendingResponse => vec![Active, Closed],
            Closed => vec![],
        }
    }
}

/// A drafted reply waiting for its send time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingResponse {
    pub text: String,
    pub delay_secs: u64,
    pub scheduled_at: Timestamp,
    /// Delivery attempts already made (deferrals and failed sends).
    pub attempts: u32,
}

impl PendingResponse {
    pub fn new(text: impl Into<String>, delay_secs: u64, now: Timestamp) -> Self {
        Self {
            text: text.into(),
            delay_secs,
            scheduled_at: now,
            attempts: 0,
        }
    }

    /// When the reply becomes due.
    pub fn due_at(&self) -> Timestamp {
        self.scheduled_at.plus_secs(self.delay_secs as i64)
    }
}

/// Everything the automation knows about one goal's conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub goal: ConversationGoal,
    pub status: GoalStatus,
    pub relevant_categories: Vec<String>,
    messages: Vec<Message>,
    pub style_profile: StyleProfile,
    pub engagement_score: f64,
    pub last_disinterest: Option<DisinterestReport>,
    /// Counterpart reply pace, refreshed on each inbound batch.
    #[serde(default)]
    pub target_timing: Option<TargetTiming>,
    pub manual_intervention_required: bool,
    pending: Option<PendingResponse>,
    pub last_response_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ConversationState {
    /// Creates an uninitialized state seeded with existing history.
    pub fn new(goal: ConversationGoal, history: Vec<Message>) -> Self {
        let mut messages = history;
        messages.sort_by_key(|m| m.timestamp);
        let now = Timestamp::now();
        Self {
            goal,
            status: GoalStatus::Uninitialized,
            relevant_categories: Vec::new(),
            messages,
            style_profile: StyleProfile::default_persona(),
            engagement_score: 0.5,
            last_disinterest: None,
            target_timing: None,
            manual_intervention_required: false,
            pending: None,
            last_response_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Moves to `Active` with the resolved categories and synthesized style.
    pub fn activate(
        &mut self,
        relevant_categories: Vec<String>,
        style_profile: StyleProfile,
    ) -> Result<(), ValidationError> {
        self.status = self.status.transition_to(GoalStatus::Active)?;
        self.relevant_categories = relevant_categories;
        self.style_profile = style_profile;
        self.touch();
        Ok(())
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn pending(&self) -> Option<&PendingResponse> {
        self.pending.as_ref()
    }

    pub fn pending_mut(&mut self) -> Option<&mut PendingResponse> {
        self.pending.as_mut()
    }

    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }

    /// Adds a message at its time-ordered position.
    ///
    /// Returns `Ok(false)` for a message id already present. A message that
    /// arrives late, such as a counterpart message written before our reply
    /// went out, lands before the newer messages instead of being dropped.
    pub fn append_message(&mut self, message: Message) -> Result<bool, ValidationError> {
        if !self.is_open() {
            return Err(ValidationError::invalid_format(
                "status",
                "cannot append to a closed conversation",
            ));
        }
        if self.messages.iter().any(|m| m.id == message.id) {
            return Ok(false);
        }
        self.insert_ordered(message);
        self.touch();
        Ok(true)
    }

    /// Stores a drafted reply. A newer draft replaces an older one.
    pub fn set_pending(&mut self, pending: PendingResponse) -> Result<(), ValidationError> {
        if self.status != GoalStatus::PendingResponse {
            self.status = self.status.transition_to(GoalStatus::PendingResponse)?;
        }
        self.pending = Some(pending);
        self.touch();
        Ok(())
    }

    /// Drops the pending reply without sending it.
    pub fn discard_pending(&mut self) -> Result<Option<PendingResponse>, ValidationError> {
        if self.status == GoalStatus::PendingResponse {
            self.status = self.status.transition_to(GoalStatus::Active)?;
        }
        self.touch();
        Ok(self.pending.take())
    }

    /// Records a delivered reply: appends it, clears pending, returns to `Active`.
    pub fn record_sent(&mut self, sent: Message) -> Result<(), ValidationError> {
        self.status = self.status.transition_to(GoalStatus::Active)?;
        self.pending = None;
        self.last_response_at = Some(sent.timestamp);
        self.insert_ordered(sent);
        self.touch();
        Ok(())
    }

    /// Ends automation for this goal.
    pub fn close(&mut self) -> Result<(), ValidationError> {
        self.status = self.status.transition_to(GoalStatus::Closed)?;
        self.pending = None;
        self.touch();
        Ok(())
    }

    /// Seconds since the latest message, or 0 when there is none.
    pub fn last_message_age_secs(&self, now: Timestamp) -> f64 {
        self.messages
            .last()
            .map(|m| now.secs_since(&m.timestamp).max(0.0))
            .unwrap_or(0.0)
    }

    fn insert_ordered(&mut self, message: Message) {
        let position = self
            .messages
            .partition_point(|m| m.timestamp <= message.timestamp);
        self.messages.insert(position, message);
    }

    fn touch(&mut self) {
        self.updated_at = Timestamp::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::conversation::GoalType;
    use crate::domain::foundation::{ConversationId, UserId};

    fn goal() -> ConversationGoal {
        ConversationGoal::new(
            UserId::new("owner").unwrap(),
            ConversationId::new(),
            GoalType::new("dating"),
            "Get a coffee date",
        )
        .unwrap()
    }

    fn active_state() -> ConversationState {
        let mut state = ConversationState::new(goal(), Vec::new());
        state
            .activate(vec!["dating".to_string()], StyleProfile::default_persona())
            .unwrap();
        state
    }

    #[test]
    fn goal_status_transitions_follow_lifecycle() {
        assert!(GoalStatus::Uninitialized.can_transition_to(&GoalStatus::Active));
        assert!(GoalStatus::Active.can_transition_to(&GoalStatus::PendingResponse));
        assert!(GoalStatus::PendingResponse.can_transition_to(&GoalStatus::Active));
        assert!(!GoalStatus::Uninitialized.can_transition_to(&GoalStatus::PendingResponse));
        assert!(GoalStatus::Closed.is_terminal());
    }

    #[test]
    fn can_transition_to_is_consistent_with_valid_transitions() {
        for status in [
            GoalStatus::Uninitialized,
            GoalStatus::Active,
            GoalStatus::PendingResponse,
            GoalStatus::Closed,
        ] {
            for target in status.valid_transitions() {
                assert!(status.can_transition_to(&target));
            }
        }
    }

    #[test]
    fn late_message_is_inserted_at_its_time() {
        let mut state = active_state();
        state
            .append_message(Message::from_user("Coffee Saturday?", Timestamp::from_unix_secs(100)))
            .unwrap();
        let late = Message::from_counterpart("also, hi", Timestamp::from_unix_secs(80));
        assert!(state.append_message(late).unwrap());

        let texts: Vec<&str> = state.messages().iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["also, hi", "Coffee Saturday?"]);
    }

    #[test]
    fn append_ignores_duplicates() {
        let mut state = active_state();
        let msg = Message::from_counterpart("hi", Timestamp::from_unix_secs(100));
        assert!(state.append_message(msg.clone()).unwrap());
        assert!(!state.append_message(msg).unwrap());
    }

    #[test]
    fn newer_draft_replaces_pending() {
        let mut state = active_state();
        let now = Timestamp::from_unix_secs(0);
        state.set_pending(PendingResponse::new("first", 60, now)).unwrap();
        state.set_pending(PendingResponse::new("second", 60, now)).unwrap();
        assert_eq!(state.status, GoalStatus::PendingResponse);
        assert_eq!(state.pending().unwrap().text, "second");
    }

    #[test]
    fn record_sent_clears_pending_and_returns_to_active() {
        let mut state = active_state();
        let now = Timestamp::from_unix_secs(10);
        state.set_pending(PendingResponse::new("reply", 60, now)).unwrap();
        state
            .record_sent(Message::from_user("reply", now.plus_secs(60)))
            .unwrap();

        assert_eq!(state.status, GoalStatus::Active);
        assert!(state.pending().is_none());
        assert_eq!(state.last_response_at, Some(now.plus_secs(60)));
        assert_eq!(state.messages().len(), 1);
    }

    #[test]
    fn closed_state_rejects_messages() {
        let mut state = active_state();
        state.close().unwrap();
        assert!(state.close().is_err());
        assert!(state
            .append_message(Message::from_counterpart("hello?", Timestamp::now()))
            .is_err());
    }

    #[test]
    fn pending_due_at_adds_delay() {
        let pending = PendingResponse::new("x", 90, Timestamp::from_unix_secs(1000));
        assert_eq!(pending.due_at().as_unix_secs(), 1090);
    }
}
