//! Conversation goals: what the automation is trying to achieve with a counterpart.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::{ConversationId, GoalId, UserId, ValidationError};

/// Free-form goal label (`dating`, `business`, `networking`, ...), stored lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GoalType(String);

impl GoalType {
    pub fn new(label: impl AsRef<str>) -> Self {
        Self(label.as_ref().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GoalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A goal the user sets for one target conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationGoal {
    pub id: GoalId,
    pub owner: UserId,
    pub conversation_id: ConversationId,
    pub goal_type: GoalType,
    pub desired_outcome: String,
    #[serde(default)]
    pub meeting_context: String,
    /// Categories the user already associated with this goal.
    #[serde(default)]
    pub categories: Vec<String>,
}

impl ConversationGoal {
    /// Creates a goal, requiring a non-empty desired outcome.
    pub fn new(
        owner: UserId,
        conversation_id: ConversationId,
        goal_type: GoalType,
        desired_outcome: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let desired_outcome = desired_outcome.into();
        if desired_outcome.trim().is_empty() {
            return Err(ValidationError::empty_field("desired_outcome"));
        }
        Ok(Self {
            id: GoalId::new(),
            owner,
            conversation_id,
            goal_type,
            desired_outcome,
            meeting_context: String::new(),
            categories: Vec::new(),
        })
    }

    pub fn with_meeting_context(mut self, context: impl Into<String>) -> Self {
        self.meeting_context = context.into();
        self
    }

    /// Sets the user-provided categories (lowercased, deduplicated).
    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.categories.clear();
        for category in categories {
            let name = category.as_ref().trim().to_lowercase();
            if !name.is_empty() && !self.categories.contains(&name) {
                self.categories.push(name);
            }
        }
        self
    }
}
