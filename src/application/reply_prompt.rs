//! Reply drafting prompt: historical examples, style guidelines and the live
//! conversation, bounded by a token budget.

use super::chat_selector::{estimate_tokens, format_for_prompt, SelectedConversation};
use crate::domain::analysis::{FAILURE_THRESHOLD, SUCCESS_THRESHOLD};
use crate::domain::conversation::{ConversationGoal, Message, StyleProfile};

/// Success assumed for a candidate with no stored score in the relevant categories.
pub const NEUTRAL_SUCCESS: f64 = 0.5;

const MAX_MIX: usize = 10;
const SUCCESSFUL_SHARE: f64 = 0.70;
const FAILED_SHARE: f64 = 0.15;
const MIN_REMAINING_TOKENS: usize = 1000;

/// Stored success of a candidate: best score over the requested categories.
pub fn stored_success(candidate: &SelectedConversation) -> f64 {
    if candidate.scores.is_empty() {
        NEUTRAL_SUCCESS
    } else {
        candidate.max_success()
    }
}

/// Picks up to 10 examples: 70% successful, up to 15% failed, the rest
/// filled from the remaining candidates in rank order.
///
/// Candidates must already be ranked; the result keeps successful examples
/// first so they survive prompt budgeting.
pub fn select_example_mix(candidates: Vec<SelectedConversation>) -> Vec<SelectedConversation> {
    let max_examples = candidates.len().min(MAX_MIX);
    if max_examples == 0 {
        return Vec::new();
    }
    let successful_quota = (max_examples as f64 * SUCCESSFUL_SHARE).round() as usize;
    let failed_quota = (max_examples as f64 * FAILED_SHARE).round() as usize;

    let mut by_success: Vec<(usize, f64)> = candidates
        .iter()
        .enumerate()
        .map(|(index, c)| (index, stored_success(c)))
        .collect();
    by_success.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

    let mut picked: Vec<usize> = by_success
        .iter()
        .filter(|(_, success)| *success >= SUCCESS_THRESHOLD)
        .take(successful_quota)
        .map(|(index, _)| *index)
        .collect();
    picked.extend(
        by_success
            .iter()
            .filter(|(_, success)| *success < FAILURE_THRESHOLD)
            .take(failed_quota)
            .map(|(index, _)| *index),
    );
    for index in 0..candidates.len() {
        if picked.len() >= max_examples {
            break;
        }
        if !picked.contains(&index) {
            picked.push(index);
        }
    }

    let mut slots: Vec<Option<SelectedConversation>> = candidates.into_iter().map(Some).collect();
    picked
        .into_iter()
        .filter_map(|index| slots.get_mut(index).and_then(Option::take))
        .collect()
}

/// Everything the reply prompt is built from.
pub struct ReplyContext<'a> {
    pub goal: &'a ConversationGoal,
    pub style: &'a StyleProfile,
    pub messages: &'a [Message],
    pub examples: &'a [SelectedConversation],
}

#[derive(Debug, Clone, Copy)]
pub struct ReplyPromptBuilder {
    token_budget: usize,
    max_examples: usize,
}

impl Default for ReplyPromptBuilder {
    fn default() -> Self {
        Self::new(6000, 5)
    }
}

impl ReplyPromptBuilder {
    pub fn new(token_budget: usize, max_examples: usize) -> Self {
        Self {
            token_budget,
            max_examples,
        }
    }

    pub fn build(&self, context: &ReplyContext<'_>) -> String {
        let mut prompt = String::from("You are helping User X have a conversation with User Y.\n\n");
        prompt.push_str(&format!("Goal: {}\n", context.goal.desired_outcome));
        prompt.push_str(&format!("Meeting Context: {}\n\n", context.goal.meeting_context));

        let examples = self.render_examples(context.examples);
        if !examples.is_empty() {
            prompt.push_str("Here are examples of successful similar conversations:\n");
            prompt.push_str(&examples);
            prompt.push('\n');
        }

        prompt.push_str(&context.style.guidelines());
        prompt.push('\n');

        prompt.push_str("Current Conversation:\n");
        push_transcript(&mut prompt, context.messages);
        prompt.push('\n');

        prompt.push_str(
            "Generate a natural, engaging response that:\n\
             1. Matches the communication style guidelines above\n\
             2. Moves toward achieving the goal\n\
             3. Uses patterns from successful examples\n\
             4. Sounds human and authentic\n\n\
             Response:",
        );
        prompt
    }

    /// Examples larger than half the remaining budget are skipped; rendering
    /// stops once fewer than 1000 tokens remain.
    fn render_examples(&self, examples: &[SelectedConversation]) -> String {
        let mut remaining = self.token_budget;
        let mut fitting = Vec::new();

        for example in examples.iter().take(self.max_examples) {
            let cost = estimate_tokens(example.conversation.messages());
            if cost > remaining / 2 {
                continue;
            }
            fitting.push(example);
            remaining -= cost;
            if remaining < MIN_REMAINING_TOKENS {
                break;
            }
        }
        format_for_prompt(fitting)
    }
}

fn push_transcript(out: &mut String, messages: &[Message]) {
    for message in messages.iter().filter(|m| !m.text.trim().is_empty()) {
        out.push_str(&message.transcript_line());
        out.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::conversation::{CategoryScore, Conversation, GoalType, PlatformKind};
    use crate::domain::foundation::{ConversationId, Timestamp, UserId};

    fn candidate(success: Option<f64>, chars: usize) -> SelectedConversation {
        let conversation =
            Conversation::new(UserId::new("owner").unwrap(), PlatformKind::Telegram, "d", "Sam")
                .unwrap()
                .with_messages([Message::from_counterpart(
                    "y".repeat(chars),
                    Timestamp::from_unix_secs(1),
                )]);
        let scores = success
            .map(|s| vec![CategoryScore::new(conversation.id(), "dating", 0.8, s)])
            .unwrap_or_default();
        SelectedConversation {
            estimated_tokens: estimate_tokens(conversation.messages()),
            conversation,
            scores,
        }
    }

    fn successes(mix: &[SelectedConversation]) -> Vec<f64> {
        mix.iter().map(stored_success).collect()
    }

    #[test]
    fn mix_prefers_successful_then_failed_then_rank() {
        let mut candidates = Vec::new();
        for _ in 0..8 {
            candidates.push(candidate(Some(0.9), 10));
        }
        for _ in 0..3 {
            candidates.push(candidate(Some(0.1), 10));
        }
        candidates.push(candidate(Some(0.5), 10));

        let mix = select_example_mix(candidates);
        let scores = successes(&mix);

        assert_eq!(mix.len(), 10);
        assert_eq!(scores.iter().filter(|s| **s >= 0.7).count(), 8);
        assert_eq!(&scores[..7], &[0.9; 7]);
        assert_eq!(scores[7], 0.1);
        assert_eq!(scores[8], 0.1);
    }

    #[test]
    fn unscored_candidates_count_as_neutral() {
        let mix = select_example_mix(vec![candidate(None, 10), candidate(Some(0.95), 10)]);
        assert_eq!(successes(&mix), vec![0.95, NEUTRAL_SUCCESS]);
    }

    #[test]
    fn empty_candidates_give_empty_mix() {
        assert!(select_example_mix(Vec::new()).is_empty());
    }

    fn goal() -> ConversationGoal {
        ConversationGoal::new(
            UserId::new("owner").unwrap(),
            ConversationId::new(),
            GoalType::new("dating"),
            "Coffee this weekend",
        )
        .unwrap()
        .with_meeting_context("Matched on an app")
    }

    #[test]
    fn prompt_contains_sections_in_order() {
        let goal = goal();
        let style = StyleProfile::default_persona();
        let messages = vec![
            Message::from_counterpart("hey there", Timestamp::from_unix_secs(1)),
            Message::from_user("  ", Timestamp::from_unix_secs(2)),
        ];
        let examples = vec![candidate(Some(0.9), 40)];

        let prompt = ReplyPromptBuilder::default().build(&ReplyContext {
            goal: &goal,
            style: &style,
            messages: &messages,
            examples: &examples,
        });

        let header = prompt.find("Goal: Coffee this weekend").unwrap();
        let example = prompt.find("=== Chat 1 ===").unwrap();
        let guidelines = prompt.find("Communication Style Guidelines:").unwrap();
        let current = prompt.find("Current Conversation:\nThem: hey there\n\n").unwrap();
        assert!(header < example && example < guidelines && guidelines < current);
        assert!(prompt.ends_with("Response:"));
        assert!(!prompt.contains("You:   "));
    }

    #[test]
    fn oversized_examples_are_skipped_and_budget_stops_rendering() {
        let goal = goal();
        let style = StyleProfile::default_persona();
        // 4000 chars => 1050 tokens; 16_000 chars => 4050 tokens.
        let examples = vec![
            candidate(Some(0.9), 16_000),
            candidate(Some(0.9), 4000),
            candidate(Some(0.9), 4000),
            candidate(Some(0.9), 4000),
            candidate(Some(0.9), 4000),
            candidate(Some(0.9), 4000),
        ];

        let prompt = ReplyPromptBuilder::new(6000, 6).build(&ReplyContext {
            goal: &goal,
            style: &style,
            messages: &[],
            examples: &examples,
        });

        // 6000 -> 4950 -> 3900 -> 2850 -> 1800; the fifth (1050 > 900) is skipped.
        assert!(prompt.contains("=== Chat 4 ==="));
        assert!(!prompt.contains("=== Chat 5 ==="));
    }

    #[test]
    fn no_examples_omits_example_header() {
        let goal = goal();
        let style = StyleProfile::default_persona();
        let prompt = ReplyPromptBuilder::default().build(&ReplyContext {
            goal: &goal,
            style: &style,
            messages: &[],
            examples: &[],
        });
        assert!(!prompt.contains("examples of successful"));
    }
}
