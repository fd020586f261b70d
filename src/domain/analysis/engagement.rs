//! Engagement metrics used to weight incremental category merges.

use serde::{Deserialize, Serialize};

use super::text::{has_acknowledgement, mean};
use crate::domain::conversation::Message;

const DEFAULT_REPLY_TIME_SECS: f64 = 120.0;
const MAX_REPLY_GAP_SECS: f64 = 86_400.0;

/// Snapshot of how responsive the counterpart is across a whole history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagementMetrics {
    pub user_message_count: usize,
    pub counterpart_message_count: usize,
    /// Counterpart messages per user message.
    pub reply_ratio: f64,
    pub avg_reply_time_secs: f64,
    pub engagement_level: f64,
}

impl EngagementMetrics {
    /// Metrics for an empty history.
    pub fn empty() -> Self {
        Self {
            user_message_count: 0,
            counterpart_message_count: 0,
            reply_ratio: 1.0,
            avg_reply_time_secs: DEFAULT_REPLY_TIME_SECS,
            engagement_level: 0.0,
        }
    }

    pub fn compute(messages: &[Message]) -> Self {
        if messages.is_empty() {
            return Self::empty();
        }

        let user_message_count = messages.iter().filter(|m| m.is_from_user()).count();
        let counterpart_message_count = messages.len() - user_message_count;

        let reply_ratio = if user_message_count > 0 {
            counterpart_message_count as f64 / user_message_count as f64
        } else {
            0.0
        };

        let gaps: Vec<f64> = messages
            .windows(2)
            .filter(|pair| pair[0].is_from_user() && pair[1].is_from_counterpart())
            .map(|pair| pair[1].timestamp.secs_since(&pair[0].timestamp))
            .filter(|gap| *gap > 0.0 && *gap < MAX_REPLY_GAP_SECS)
            .collect();
        let avg_reply_time_secs = mean(&gaps).unwrap_or(DEFAULT_REPLY_TIME_SECS);

        let engagement_level = if counterpart_message_count == 0 {
            0.5
        } else {
            let engaged = messages
                .iter()
                .filter(|m| m.is_from_counterpart())
                .filter(|m| is_engaged_message(&m.text))
                .count();
            engaged as f64 / counterpart_message_count as f64
        };

        Self {
            user_message_count,
            counterpart_message_count,
            reply_ratio,
            avg_reply_time_secs,
            engagement_level,
        }
    }
}

/// Substantial, not an acknowledgement, and either asks something or goes into detail.
fn is_engaged_message(text: &str) -> bool {
    let length = text.chars().count();
    length > 20 && !has_acknowledgement(text) && (text.contains('?') || length > 50)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::Timestamp;

    fn at(secs: i64) -> Timestamp {
        Timestamp::from_unix_secs(secs)
    }

    #[test]
    fn empty_history_uses_defaults() {
        let metrics = EngagementMetrics::compute(&[]);
        assert_eq!(metrics, EngagementMetrics::empty());
        assert_eq!(metrics.reply_ratio, 1.0);
        assert_eq!(metrics.avg_reply_time_secs, 120.0);
    }

    #[test]
    fn reply_ratio_and_reply_time() {
        let messages = vec![
            Message::from_user("hey, how was the trip?", at(0)),
            Message::from_counterpart("amazing, we hiked every single day and the views were unreal", at(30)),
            Message::from_user("where did you go?", at(100)),
            Message::from_counterpart("the dolomites, have you ever been there yourself?", at(190)),
        ];
        let metrics = EngagementMetrics::compute(&messages);

        assert_eq!(metrics.user_message_count, 2);
        assert_eq!(metrics.counterpart_message_count, 2);
        assert_eq!(metrics.reply_ratio, 1.0);
        assert_eq!(metrics.avg_reply_time_secs, 60.0);
        assert_eq!(metrics.engagement_level, 1.0);
    }

    #[test]
    fn gaps_over_a_day_are_ignored() {
        let messages = vec![
            Message::from_user("hello", at(0)),
            Message::from_counterpart("hi", at(100_000)),
        ];
        let metrics = EngagementMetrics::compute(&messages);
        assert_eq!(metrics.avg_reply_time_secs, 120.0);
    }

    #[test]
    fn no_counterpart_messages_is_half_engaged() {
        let messages = vec![Message::from_user("anyone there?", at(0))];
        let metrics = EngagementMetrics::compute(&messages);
        assert_eq!(metrics.engagement_level, 0.5);
        assert_eq!(metrics.reply_ratio, 0.0);
    }

    #[test]
    fn acknowledgements_do_not_count_as_engaged() {
        let messages = vec![
            Message::from_user("want to grab lunch tomorrow?", at(0)),
            Message::from_counterpart("ok cool, that works for me I think", at(10)),
        ];
        let metrics = EngagementMetrics::compute(&messages);
        assert_eq!(metrics.engagement_level, 0.0);
    }
}
