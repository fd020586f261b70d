//! Statistical style extraction from a message history.

use super::text::{contains_any, contains_emoji, has_acknowledgement, mean, word_count};
use crate::domain::conversation::{Message, StyleProfile};

const HUMOR_MARKERS: [&str; 11] = [
    "haha", "lol", "lmao", "hehe", "joke", "funny", "😂", "😆", "😊", "🙂", "😅",
];
const GREETINGS: [&str; 6] = [
    "hello",
    "hi",
    "hey",
    "greetings",
    "good morning",
    "good afternoon",
];
const COURTESIES: [&str; 3] = ["please", "thank you", "thanks"];
const ABBREVIATIONS: [&str; 4] = ["u", "ur", "r", "plz"];
const SLANG: [&str; 5] = ["yo", "sup", "wassup", "hey there", "what's up"];
const EMPATHY_MARKERS: [&str; 12] = [
    "sorry",
    "understand",
    "feel",
    "hope",
    "wish",
    "care",
    "support",
    "help",
    "listen",
    "how are you",
    "that must be",
    "i can imagine",
];

const DEFAULT_RESPONSE_TIME_SECS: f64 = 60.0;
const DEFAULT_MESSAGE_LENGTH_WORDS: f64 = 20.0;
const DEFAULT_QUESTION_RATE: f64 = 0.3;
const EMPTY_OPENING: &str = "Hi there!";
const OPENING_SCAN: usize = 5;

/// Derives a [`StyleProfile`] from messages. Pure and deterministic.
#[derive(Debug, Clone, Copy, Default)]
pub struct StyleExtractor;

impl StyleExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, messages: &[Message]) -> StyleProfile {
        if messages.is_empty() {
            return StyleProfile {
                humor: 0.5,
                formality: 0.5,
                empathy: 0.5,
                avg_response_time_secs: DEFAULT_RESPONSE_TIME_SECS,
                avg_message_length_words: DEFAULT_MESSAGE_LENGTH_WORDS,
                question_rate: DEFAULT_QUESTION_RATE,
                engagement_level: 0.5,
                preferred_opening: EMPTY_OPENING.to_string(),
            };
        }

        let humor = (3.0 * fraction(messages, |m| contains_any(&m.text, &HUMOR_MARKERS))).min(1.0);
        let empathy =
            (2.0 * fraction(messages, |m| contains_any(&m.text, &EMPATHY_MARKERS))).min(1.0);
        let question_rate = fraction(messages, |m| m.text.contains('?'));
        let engagement_level = fraction(messages, |m| {
            m.text.chars().count() > 10 && !has_acknowledgement(&m.text) && m.text.contains('?')
        });

        let lengths: Vec<f64> = messages.iter().map(|m| word_count(&m.text) as f64).collect();

        StyleProfile {
            humor,
            formality: formality(messages),
            empathy,
            avg_response_time_secs: average_turn_gap(messages),
            avg_message_length_words: mean(&lengths).unwrap_or(DEFAULT_MESSAGE_LENGTH_WORDS),
            question_rate,
            engagement_level,
            preferred_opening: preferred_opening(messages),
        }
    }
}

fn fraction(messages: &[Message], predicate: impl Fn(&Message) -> bool) -> f64 {
    messages.iter().filter(|m| predicate(m)).count() as f64 / messages.len() as f64
}

fn formality(messages: &[Message]) -> f64 {
    let formal = messages.iter().filter(|m| is_formal(&m.text)).count() as f64;
    let informal = messages.iter().filter(|m| is_informal(&m.text)).count() as f64;
    (formal / (formal + informal + 1.0)).clamp(0.1, 0.9)
}

fn is_formal(text: &str) -> bool {
    let trimmed = text.trim_end();
    contains_any(text, &GREETINGS)
        || contains_any(text, &COURTESIES)
        || !contains_any(text, &ABBREVIATIONS)
        || trimmed.ends_with(['.', '!', '?'])
}

fn is_informal(text: &str) -> bool {
    contains_any(text, &SLANG)
        || contains_any(text, &ABBREVIATIONS)
        || contains_emoji(text)
        || has_punctuation_run(text)
}

/// Two or more consecutive `!`/`?`.
fn has_punctuation_run(text: &str) -> bool {
    let mut run = 0;
    for c in text.chars() {
        if c == '!' || c == '?' {
            run += 1;
            if run >= 2 {
                return true;
            }
        } else {
            run = 0;
        }
    }
    false
}

/// Mean positive gap between consecutive messages from different senders.
fn average_turn_gap(messages: &[Message]) -> f64 {
    let gaps: Vec<f64> = messages
        .windows(2)
        .filter(|pair| pair[0].sender != pair[1].sender)
        .map(|pair| pair[1].timestamp.secs_since(&pair[0].timestamp))
        .filter(|gap| *gap > 0.0)
        .collect();
    mean(&gaps).unwrap_or(DEFAULT_RESPONSE_TIME_SECS)
}

fn preferred_opening(messages: &[Message]) -> String {
    let opener = messages
        .iter()
        .take(OPENING_SCAN)
        .find(|m| m.is_from_user())
        .map(|m| m.text.as_str())
        .unwrap_or("");

    let label = if contains_any(opener, &["hello", "hi"]) {
        "Friendly greeting"
    } else if contains_any(opener, &["hey", "yo"]) {
        "Casual greeting"
    } else if contains_any(opener, &["how are you"]) {
        "Inquisitive greeting"
    } else if contains_emoji(opener) {
        "Playful greeting"
    } else {
        "Standard greeting"
    };
    label.to_string()
}
