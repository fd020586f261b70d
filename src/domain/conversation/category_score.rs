//! Per-(conversation, category) relevance and success scores.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::{ConversationId, Timestamp};

/// How a categorized conversation ended up, relative to its goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeType {
    Success,
    PartialSuccess,
    CircumstantialRejection,
    ApproachRejection,
    #[default]
    Neutral,
}

impl OutcomeType {
    pub fn all() -> &'static [OutcomeType] {
        &[
            OutcomeType::Success,
            OutcomeType::PartialSuccess,
            OutcomeType::CircumstantialRejection,
            OutcomeType::ApproachRejection,
            OutcomeType::Neutral,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeType::Success => "success",
            OutcomeType::PartialSuccess => "partial_success",
            OutcomeType::CircumstantialRejection => "circumstantial_rejection",
            OutcomeType::ApproachRejection => "approach_rejection",
            OutcomeType::Neutral => "neutral",
        }
    }

    /// Explanation used when asking the completion service to classify outcomes.
    pub fn description(&self) -> &'static str {
        match self {
            OutcomeType::Success => "The goal was achieved",
            OutcomeType::PartialSuccess => {
                "Progress was made toward the goal but it was not fully achieved"
            }
            OutcomeType::CircumstantialRejection => {
                "The goal failed for reasons outside the approach (timing, availability, circumstances)"
            }
            OutcomeType::ApproachRejection => {
                "The goal failed because of how the conversation was handled"
            }
            OutcomeType::Neutral => "No clear outcome yet",
        }
    }

    /// Lenient parse: case, surrounding whitespace, spaces and hyphens are ignored.
    pub fn from_name(name: &str) -> Option<OutcomeType> {
        let normalized = name.trim().to_lowercase().replace([' ', '-'], "_");
        OutcomeType::all()
            .iter()
            .copied()
            .find(|outcome| outcome.as_str() == normalized)
    }
}

impl fmt::Display for OutcomeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Score of one conversation against one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub conversation_id: ConversationId,
    pub category: String,
    pub relevance: f64,
    pub success: f64,
    pub outcome: Option<OutcomeType>,
    #[serde(default)]
    pub reason: String,
    pub categorized_at: Timestamp,
}

impl CategoryScore {
    /// Creates a score; relevance and success are clamped to [0, 1].
    pub fn new(
        conversation_id: ConversationId,
        category: impl Into<String>,
        relevance: f64,
        success: f64,
    ) -> Self {
        Self {
            conversation_id,
            category: category.into(),
            relevance: clamp_unit(relevance),
            success: clamp_unit(success),
            outcome: None,
            reason: String::new(),
            categorized_at: Timestamp::now(),
        }
    }

    /// The neutral 0.5/0.5 score used when a conversation cannot be categorized.
    pub fn neutral_fallback(conversation_id: ConversationId, category: impl Into<String>) -> Self {
        Self::new(conversation_id, category, 0.5, 0.5)
            .with_outcome(OutcomeType::Neutral)
            .with_reason("Fallback categorization")
    }

    pub fn with_outcome(mut self, outcome: OutcomeType) -> Self {
        self.outcome = Some(outcome);
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    pub fn categorized_at(mut self, at: Timestamp) -> Self {
        self.categorized_at = at;
        self
    }
}

/// Clamps to [0, 1], mapping NaN to 0.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
