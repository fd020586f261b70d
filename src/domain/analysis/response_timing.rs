//! Reply-timing advice.
//!
//! Everything here is advisory: functions return a number of seconds or a
//! yes/no and never block. Non-finite inputs fall back to the defaults.

use serde::{Deserialize, Serialize};

use super::text::mean;
use crate::domain::conversation::Message;

pub const MIN_DELAY_SECS: f64 = 30.0;
pub const MAX_DELAY_SECS: f64 = 7200.0;
pub const DEFAULT_BASE_DELAY_SECS: f64 = 120.0;
const DEFAULT_HISTORICAL_DELAY_SECS: f64 = 120.0;
const MAX_COUNTED_GAP_SECS: f64 = 86_400.0;

/// Counterpart reply-time statistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetTiming {
    pub avg_delay_secs: f64,
    pub min_delay_secs: f64,
    pub max_delay_secs: f64,
}

impl Default for TargetTiming {
    fn default() -> Self {
        Self {
            avg_delay_secs: 120.0,
            min_delay_secs: 60.0,
            max_delay_secs: 300.0,
        }
    }
}

impl TargetTiming {
    /// Mirrors the counterpart's pace, slowing down for very fast
    /// responders and speeding up for very slow ones.
    pub fn recommended_delay(&self) -> f64 {
        let avg = self.avg_delay_secs;
        if avg < 60.0 {
            avg * 1.5
        } else if avg > 3600.0 {
            avg * 0.8
        } else {
            avg
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseTimingAnalyzer;

impl ResponseTimingAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Delay before sending a reply, in [30, 7200] seconds.
    ///
    /// `0.7 × historical user delay × (1 − 0.3 × engagement) + 0.1 × base`
    pub fn calculate_optimal_delay(&self, history: &[Message], engagement: f64, base: f64) -> f64 {
        let engagement = if engagement.is_finite() {
            engagement.clamp(0.0, 1.0)
        } else {
            0.5
        };
        let base = if base.is_finite() && base >= 0.0 {
            base
        } else {
            DEFAULT_BASE_DELAY_SECS
        };
        let historical = self.historical_average_delay(history);

        let delay = 0.7 * historical * (1.0 - 0.3 * engagement) + 0.1 * base;
        if delay.is_finite() {
            delay.clamp(MIN_DELAY_SECS, MAX_DELAY_SECS)
        } else {
            MAX_DELAY_SECS
        }
    }

    /// Mean gap between a counterpart message and the user's next reply.
    pub fn historical_average_delay(&self, history: &[Message]) -> f64 {
        if history.len() < 2 {
            return DEFAULT_HISTORICAL_DELAY_SECS;
        }
        let gaps: Vec<f64> = history
            .windows(2)
            .filter(|pair| pair[0].is_from_counterpart() && pair[1].is_from_user())
            .map(|pair| pair[1].timestamp.secs_since(&pair[0].timestamp))
            .filter(|gap| *gap > 0.0 && *gap < MAX_COUNTED_GAP_SECS)
            .collect();
        mean(&gaps).unwrap_or(DEFAULT_HISTORICAL_DELAY_SECS)
    }

    /// Whether enough time passed since the last message to reply now.
    pub fn should_respond_now(&self, last_message_age_secs: f64, engagement: f64) -> bool {
        let age = if last_message_age_secs.is_finite() {
            last_message_age_secs
        } else {
            0.0
        };
        let engagement = if engagement.is_finite() { engagement } else { 0.5 };

        if engagement > 0.8 {
            age > 30.0
        } else if engagement < 0.3 {
            age > 3600.0
        } else {
            age > 300.0
        }
    }

    /// Counterpart reply delays over the whole history.
    pub fn analyze_target_timing(&self, history: &[Message]) -> TargetTiming {
        let delays: Vec<f64> = history
            .windows(2)
            .filter(|pair| pair[0].is_from_user() && pair[1].is_from_counterpart())
            .map(|pair| pair[1].timestamp.secs_since(&pair[0].timestamp))
            .filter(|gap| *gap > 0.0)
            .collect();

        match mean(&delays) {
            Some(avg) => TargetTiming {
                avg_delay_secs: avg,
                min_delay_secs: delays.iter().copied().fold(f64::INFINITY, f64::min),
                max_delay_secs: delays.iter().copied().fold(0.0, f64::max),
            },
            None => TargetTiming::default(),
        }
    }
}
