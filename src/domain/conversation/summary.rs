//! End-of-goal conversation summary and recall quiz.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::Timestamp;

/// Whether the goal was reached, as judged from the transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    #[default]
    Pending,
    Achieved,
    Failed,
}

impl OutcomeStatus {
    /// Lenient parse; anything unrecognized is `Pending`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "achieved" => OutcomeStatus::Achieved,
            "failed" => OutcomeStatus::Failed,
            _ => OutcomeStatus::Pending,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeStatus::Pending => "pending",
            OutcomeStatus::Achieved => "achieved",
            OutcomeStatus::Failed => "failed",
        }
    }
}

/// Facts about the counterpart worth remembering before meeting them.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KeyPersonalDetails {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub occupation: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub important_facts: Vec<String>,
    #[serde(default)]
    pub preferences: Vec<String>,
}

impl KeyPersonalDetails {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.occupation.is_none()
            && self.location.is_none()
            && self.interests.is_empty()
            && self.important_facts.is_empty()
            && self.preferences.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub summary: String,
    pub key_details: KeyPersonalDetails,
    pub next_steps: String,
    pub outcome_status: OutcomeStatus,
    pub tone: String,
    #[serde(default)]
    pub quiz: Vec<QuizQuestion>,
    pub generated_at: Timestamp,
}

impl ConversationSummary {
    /// Summary carrying only an explanation of why generation failed.
    pub fn failed(reason: impl std::fmt::Display) -> Self {
        Self {
            summary: format!("Error generating summary: {}", reason),
            key_details: KeyPersonalDetails::default(),
            next_steps: "None".to_string(),
            outcome_status: OutcomeStatus::Pending,
            tone: "neutral".to_string(),
            quiz: Vec::new(),
            generated_at: Timestamp::now(),
        }
    }

    pub fn with_quiz(mut self, quiz: Vec<QuizQuestion>) -> Self {
        self.quiz = quiz;
        self
    }
}

/// A question testing recall of the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    pub correct_answer: String,
    #[serde(rename = "type", default = "default_question_type")]
    pub question_type: String,
}

fn default_question_type() -> String {
    "text".to_string()
}

impl QuizQuestion {
    pub fn new(question: impl Into<String>, correct_answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            correct_answer: correct_answer.into(),
            question_type: default_question_type(),
        }
    }

    /// Used when quiz generation fails.
    pub fn fallback() -> Self {
        Self::new("Review the conversation summary and key details", "Please review")
    }

    /// Case-insensitive match; either answer containing the other also counts.
    pub fn is_correct(&self, answer: &str) -> bool {
        let given = answer.trim().to_lowercase();
        let expected = self.correct_answer.trim().to_lowercase();
        if given.is_empty() || expected.is_empty() {
            return false;
        }
        given == expected || given.contains(&expected) || expected.contains(&given)
    }
}
