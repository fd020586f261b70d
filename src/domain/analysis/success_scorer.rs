//! Heuristic success scoring for historical conversations.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::text::contains_term;
use crate::domain::conversation::{clamp_unit, GoalType, Message};

const DEFAULT_KEY: &str = "default";
pub const DEFAULT_MESSAGE_WINDOW: usize = 5;

/// Phrases that signal a goal was reached, keyed by goal type.
///
/// Lookups for unknown goal types use the `default` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SuccessKeywords {
    by_goal: HashMap<String, Vec<String>>,
}

impl SuccessKeywords {
    pub fn new(by_goal: HashMap<String, Vec<String>>) -> Self {
        let by_goal = by_goal
            .into_iter()
            .map(|(goal, words)| {
                let words = words.into_iter().map(|w| w.trim().to_lowercase()).collect();
                (goal.trim().to_lowercase(), words)
            })
            .collect();
        Self { by_goal }
    }

    /// Keywords for a goal type, falling back to the `default` entry.
    pub fn for_goal(&self, goal_type: &GoalType) -> &[String] {
        self.by_goal
            .get(goal_type.as_str())
            .or_else(|| self.by_goal.get(DEFAULT_KEY))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Adds or replaces the keywords for one goal type.
    pub fn with_goal<I, S>(mut self, goal_type: &str, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.by_goal.insert(
            goal_type.trim().to_lowercase(),
            keywords
                .into_iter()
                .map(|k| k.as_ref().trim().to_lowercase())
                .collect(),
        );
        self
    }
}

impl Default for SuccessKeywords {
    fn default() -> Self {
        let dating = ["see you", "it's a date", "pick you up", "can't wait", "sounds good"];
        let business = ["deal", "agreed", "send the contract", "let's schedule", "sign"];
        let networking = ["let's connect", "call", "meeting", "introduce"];
        let fallback = ["see you", "sounds good", "agreed", "great"];

        let mut keywords = Self {
            by_goal: HashMap::new(),
        };
        keywords = keywords.with_goal("dating", dating);
        for goal in ["business", "investment", "sponsorship"] {
            keywords = keywords.with_goal(goal, business);
        }
        for goal in ["networking", "collaboration"] {
            keywords = keywords.with_goal(goal, networking);
        }
        keywords.with_goal(DEFAULT_KEY, fallback)
    }
}

/// Scores how well a historical conversation met its goal.
///
/// success = 0.7 × goal achieved + 0.3 × engagement heuristic.
#[derive(Debug, Clone)]
pub struct SuccessScorer {
    keywords: SuccessKeywords,
    window: usize,
}

impl SuccessScorer {
    pub fn new(keywords: SuccessKeywords) -> Self {
        Self {
            keywords,
            window: DEFAULT_MESSAGE_WINDOW,
        }
    }

    /// Number of trailing messages searched for success keywords.
    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window.max(1);
        self
    }

    pub fn score(&self, messages: &[Message], goal_type: &GoalType) -> f64 {
        if messages.is_empty() {
            return 0.0;
        }
        let achieved = if self.goal_achieved(messages, goal_type) {
            1.0
        } else {
            0.0
        };
        clamp_unit(0.7 * achieved + 0.3 * engagement_heuristic(messages))
    }

    fn goal_achieved(&self, messages: &[Message], goal_type: &GoalType) -> bool {
        let keywords = self.keywords.for_goal(goal_type);
        let start = messages.len().saturating_sub(self.window);
        messages[start..]
            .iter()
            .any(|m| keywords.iter().any(|k| contains_term(&m.text, k)))
    }
}

impl Default for SuccessScorer {
    fn default() -> Self {
        Self::new(SuccessKeywords::default())
    }
}

fn engagement_heuristic(messages: &[Message]) -> f64 {
    let total_chars: usize = messages.iter().map(|m| m.text.chars().count()).sum();
    let avg = total_chars as f64 / messages.len() as f64;
    if avg < 50.0 {
        0.3
    } else if avg < 150.0 {
        0.6
    } else {
        0.8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::Timestamp;

    fn msgs(texts: &[&str]) -> Vec<Message> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let ts = Timestamp::from_unix_secs(i as i64 * 60);
                if i % 2 == 0 {
                    Message::from_user(*t, ts)
                } else {
                    Message::from_counterpart(*t, ts)
                }
            })
            .collect()
    }

    #[test]
    fn empty_conversation_scores_zero() {
        assert_eq!(SuccessScorer::default().score(&[], &GoalType::new("dating")), 0.0);
    }

    #[test]
    fn keyword_in_window_counts_as_achieved() {
        let messages = msgs(&["hey", "hi", "dinner friday?", "It's a date!"]);
        let score = SuccessScorer::default().score(&messages, &GoalType::new("Dating"));
        assert!((score - (0.7 + 0.3 * 0.3)).abs() < 1e-9);
    }

    #[test]
    fn keyword_outside_window_is_ignored() {
        let messages = msgs(&["sounds good", "a", "b", "c", "d", "e"]);
        let score = SuccessScorer::default().score(&messages, &GoalType::new("dating"));
        assert!((score - 0.09).abs() < 1e-9);
    }

    #[test]
    fn unknown_goal_uses_default_keywords() {
        let messages = msgs(&["that would be great"]);
        let score = SuccessScorer::default().score(&messages, &GoalType::new("gardening"));
        assert!(score > 0.7);
    }

    #[test]
    fn keywords_are_configurable() {
        let keywords = SuccessKeywords::default().with_goal("tutoring", ["booked"]);
        let messages = msgs(&["ok you're booked for monday"]);
        let score = SuccessScorer::new(keywords).score(&messages, &GoalType::new("tutoring"));
        assert!(score > 0.7);
    }

    #[test]
    fn longer_messages_raise_engagement_component() {
        let long = "a".repeat(200);
        let messages = msgs(&[long.as_str()]);
        let score = SuccessScorer::default().score(&messages, &GoalType::new("dating"));
        assert!((score - 0.24).abs() < 1e-9);
    }
}
