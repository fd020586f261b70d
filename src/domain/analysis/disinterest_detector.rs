//! Disinterest detection.
//!
//! Scores how likely the counterpart is losing interest from five
//! independently triggered indicators. Each triggered indicator contributes
//! `weight × severity`; the probability is the weighted mean over the
//! triggered indicators only.
//!
//! | indicator | trigger | weight |
//! |---|---|---|
//! | short_responses | avg counterpart words < 5 | 0.25 |
//! | long_delays | avg counterpart reply delay > 24h | 0.30 |
//! | low_engagement | counterpart question rate < 10% | 0.20 |
//! | one_word_responses | one-word reply rate > 30% | 0.15 |
//! | declining_engagement | 2nd-half avg length down > 30% | 0.10 |

use serde::{Deserialize, Serialize};

use super::text::{format_duration, is_question, mean, word_count};
use crate::domain::conversation::{clamp_unit, Message};

const MIN_MESSAGES_FOR_ANALYSIS: usize = 3;
const MIN_MESSAGES_FOR_DECLINE: usize = 6;
const SHORT_RESPONSE_WORDS: f64 = 5.0;
const LONG_DELAY_SECS: f64 = 86_400.0;
const LOW_QUESTION_RATE: f64 = 0.1;
const ONE_WORD_RATE: f64 = 0.3;
const DECLINE_THRESHOLD: f64 = 0.3;

pub const INSUFFICIENT_DATA: &str = "Insufficient data for analysis";

/// The five disengagement signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorKind {
    ShortResponses,
    LongDelays,
    LowEngagement,
    OneWordResponses,
    DecliningEngagement,
}

impl IndicatorKind {
    pub fn weight(&self) -> f64 {
        match self {
            IndicatorKind::ShortResponses => 0.25,
            IndicatorKind::LongDelays => 0.30,
            IndicatorKind::LowEngagement => 0.20,
            IndicatorKind::OneWordResponses => 0.15,
            IndicatorKind::DecliningEngagement => 0.10,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IndicatorKind::ShortResponses => "short_responses",
            IndicatorKind::LongDelays => "long_delays",
            IndicatorKind::LowEngagement => "low_engagement",
            IndicatorKind::OneWordResponses => "one_word_responses",
            IndicatorKind::DecliningEngagement => "declining_engagement",
        }
    }
}

/// One triggered indicator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisinterestIndicator {
    pub kind: IndicatorKind,
    /// In [0, 1].
    pub severity: f64,
    pub description: String,
}

/// Result of a disinterest analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisinterestReport {
    pub probability: f64,
    pub indicators: Vec<DisinterestIndicator>,
    pub recommendation: String,
}

impl DisinterestReport {
    fn insufficient_data() -> Self {
        Self {
            probability: 0.0,
            indicators: Vec::new(),
            recommendation: INSUFFICIENT_DATA.to_string(),
        }
    }

    pub fn has_indicator(&self, kind: IndicatorKind) -> bool {
        self.indicators.iter().any(|i| i.kind == kind)
    }
}

/// Stateless detector; see the module docs for the scoring table.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisinterestDetector;

impl DisinterestDetector {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze(&self, messages: &[Message]) -> DisinterestReport {
        if messages.len() < MIN_MESSAGES_FOR_ANALYSIS {
            return DisinterestReport::insufficient_data();
        }

        let mut indicators = Vec::new();

        let avg_words = average_counterpart_words(messages);
        if avg_words < SHORT_RESPONSE_WORDS {
            indicators.push(DisinterestIndicator {
                kind: IndicatorKind::ShortResponses,
                severity: 1.0 - avg_words / SHORT_RESPONSE_WORDS,
                description: format!(
                    "Target's responses are very short (avg {:.1} words)",
                    avg_words
                ),
            });
        }

        let avg_delay = average_counterpart_delay(messages);
        if avg_delay > LONG_DELAY_SECS {
            indicators.push(DisinterestIndicator {
                kind: IndicatorKind::LongDelays,
                severity: ((avg_delay / LONG_DELAY_SECS) / 2.0).min(1.0),
                description: format!(
                    "Target takes very long to respond (avg {})",
                    format_duration(avg_delay)
                ),
            });
        }

        let question_rate = counterpart_rate(messages, |m| is_question(&m.text));
        if question_rate < LOW_QUESTION_RATE {
            indicators.push(DisinterestIndicator {
                kind: IndicatorKind::LowEngagement,
                severity: 1.0 - question_rate / LOW_QUESTION_RATE,
                description: format!(
                    "Target asks few questions (only {:.1}% of messages are questions)",
                    question_rate * 100.0
                ),
            });
        }

        let one_word_rate = counterpart_rate(messages, |m| word_count(&m.text) == 1);
        if one_word_rate > ONE_WORD_RATE {
            indicators.push(DisinterestIndicator {
                kind: IndicatorKind::OneWordResponses,
                severity: (one_word_rate / 0.5).min(1.0),
                description: format!(
                    "High rate of one-word responses ({:.1}%)",
                    one_word_rate * 100.0
                ),
            });
        }

        let decline = engagement_decline(messages);
        if decline > DECLINE_THRESHOLD {
            indicators.push(DisinterestIndicator {
                kind: IndicatorKind::DecliningEngagement,
                severity: decline.min(1.0),
                description: format!(
                    "Engagement is declining over time (decline: {:.1}%)",
                    decline * 100.0
                ),
            });
        }

        let probability = weighted_probability(&indicators);
        DisinterestReport {
            probability,
            recommendation: recommendation(probability).to_string(),
            indicators,
        }
    }
}

fn average_counterpart_words(messages: &[Message]) -> f64 {
    let counts: Vec<f64> = messages
        .iter()
        .filter(|m| m.is_from_counterpart())
        .map(|m| word_count(&m.text) as f64)
        .collect();
    mean(&counts).unwrap_or(0.0)
}

/// Mean gap between a user message and the counterpart message right after it.
fn average_counterpart_delay(messages: &[Message]) -> f64 {
    let delays: Vec<f64> = messages
        .windows(2)
        .filter(|pair| pair[0].is_from_user() && pair[1].is_from_counterpart())
        .map(|pair| pair[1].timestamp.secs_since(&pair[0].timestamp))
        .collect();
    mean(&delays).unwrap_or(0.0)
}

fn counterpart_rate(messages: &[Message], predicate: impl Fn(&Message) -> bool) -> f64 {
    let counterpart: Vec<&Message> = messages.iter().filter(|m| m.is_from_counterpart()).collect();
    if counterpart.is_empty() {
        return 0.0;
    }
    let hits = counterpart.iter().filter(|m| predicate(m)).count();
    hits as f64 / counterpart.len() as f64
}

/// Relative drop in counterpart message length from the first half to the second.
fn engagement_decline(messages: &[Message]) -> f64 {
    if messages.len() < MIN_MESSAGES_FOR_DECLINE {
        return 0.0;
    }
    let (first, second) = messages.split_at(messages.len() / 2);
    let first_avg = average_counterpart_words(first);
    if first_avg == 0.0 {
        return 0.0;
    }
    let second_avg = average_counterpart_words(second);
    ((first_avg - second_avg) / first_avg).max(0.0)
}

fn weighted_probability(indicators: &[DisinterestIndicator]) -> f64 {
    let total_weight: f64 = indicators.iter().map(|i| i.kind.weight()).sum();
    if total_weight <= 0.0 {
        return 0.0;
    }
    let weighted: f64 = indicators
        .iter()
        .map(|i| i.kind.weight() * i.severity)
        .sum();
    clamp_unit(weighted / total_weight)
}

fn recommendation(probability: f64) -> &'static str {
    if probability < 0.3 {
        "Continue conversation. Engagement looks good."
    } else if probability < 0.5 {
        "Monitor engagement. Some indicators suggest mild disinterest. Try to ask more engaging questions."
    } else if probability < 0.7 {
        "Warning: Moderate disinterest detected. Consider changing approach or taking a break from messaging."
    } else {
        "High disinterest probability. Strongly recommend disengaging or waiting for target to initiate."
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::Timestamp;
    use proptest::prelude::*;

    fn at(secs: i64) -> Timestamp {
        Timestamp::from_unix_secs(secs)
    }

    /// Alternating user/counterpart messages with the given counterpart replies.
    fn exchange(replies: &[&str], reply_delay: i64) -> Vec<Message> {
        let mut messages = Vec::new();
        let mut clock = 0;
        for reply in replies {
            messages.push(Message::from_user("so tell me more about that", at(clock)));
            clock += reply_delay;
            messages.push(Message::from_counterpart(*reply, at(clock)));
            clock += 60;
        }
        messages
    }

    #[test]
    fn fewer_than_three_messages_is_insufficient() {
        let messages = exchange(&["sure"], 5);
        let report = DisinterestDetector::new().analyze(&messages);

        assert_eq!(report.probability, 0.0);
        assert!(report.indicators.is_empty());
        assert_eq!(report.recommendation, INSUFFICIENT_DATA);
    }

    #[test]
    fn short_one_word_replies_score_moderate() {
        // Counterpart word lengths [2, 3, 1, 2, 1, 2], all replies within 10s.
        let replies = ["maybe later", "what about you", "ok", "sounds fine", "yeah", "and you?"];
        let report = DisinterestDetector::new().analyze(&exchange(&replies, 8));

        assert!(report.has_indicator(IndicatorKind::ShortResponses));
        assert!(report.has_indicator(IndicatorKind::OneWordResponses));
        assert!(!report.has_indicator(IndicatorKind::LongDelays));
        assert!(
            (0.5..=0.7).contains(&report.probability),
            "probability was {}",
            report.probability
        );
        assert!(report.recommendation.starts_with("Warning"));
    }

    #[test]
    fn engaged_counterpart_triggers_nothing() {
        let replies = [
            "I went hiking in the mountains last weekend, it was gorgeous",
            "We should totally go together sometime, what trails do you like?",
            "That one is on my list too, how long did it take you to finish?",
        ];
        let report = DisinterestDetector::new().analyze(&exchange(&replies, 30));

        assert!(report.indicators.is_empty());
        assert_eq!(report.probability, 0.0);
        assert_eq!(
            report.recommendation,
            "Continue conversation. Engagement looks good."
        );
    }

    #[test]
    fn multi_day_delays_trigger_long_delays() {
        let replies = [
            "sorry I was busy with work stuff all week long honestly",
            "yeah maybe we can talk about it some other time later on",
            "what did you want to talk about again, I forgot now?",
        ];
        let report = DisinterestDetector::new().analyze(&exchange(&replies, 3 * 86_400));

        let long = report
            .indicators
            .iter()
            .find(|i| i.kind == IndicatorKind::LongDelays)
            .unwrap();
        assert_eq!(long.severity, 1.0);
        assert!(long.description.contains("3.0 days"));
    }

    #[test]
    fn shrinking_replies_trigger_declining_engagement() {
        let replies = [
            "oh wow that is such a cool story, tell me everything about it please",
            "haha I love that, what happened after you got there with everyone?",
            "nice",
            "ok",
        ];
        let report = DisinterestDetector::new().analyze(&exchange(&replies, 20));
        assert!(report.has_indicator(IndicatorKind::DecliningEngagement));
    }

    proptest! {
        #[test]
        fn probability_stays_in_unit_interval(
            words in proptest::collection::vec(0usize..12, 3..12),
            delay in 0i64..(10 * 86_400),
        ) {
            let replies: Vec<String> = words.iter().map(|n| vec!["word"; *n].join(" ")).collect();
            let refs: Vec<&str> = replies.iter().map(String::as_str).collect();
            let report = DisinterestDetector::new().analyze(&exchange(&refs, delay));
            prop_assert!((0.0..=1.0).contains(&report.probability));
            for indicator in &report.indicators {
                prop_assert!((0.0..=1.0).contains(&indicator.severity));
            }
        }
    }
}
