//! Reply loop tuning

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::application::ManagerConfig;

/// Settings for the automated conversation manager.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AutomationConfig {
    pub poll_interval_secs: u64,
    pub token_budget: usize,
    pub prompt_token_budget: usize,
    pub max_candidates: usize,
    pub max_examples: usize,
    pub warn_threshold: f64,
    pub suspend_threshold: f64,
    pub completion_timeout_secs: u64,
    pub humanize_timeout_secs: u64,
    pub send_timeout_secs: u64,
    pub summary_timeout_secs: u64,
    pub max_send_attempts: u32,
    pub quiz_questions: usize,
    pub success_message_window: usize,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        let defaults = ManagerConfig::default();
        Self {
            poll_interval_secs: defaults.poll_interval.as_secs(),
            token_budget: defaults.token_budget,
            prompt_token_budget: defaults.prompt_token_budget,
            max_candidates: defaults.max_candidates,
            max_examples: defaults.max_examples,
            warn_threshold: defaults.warn_threshold,
            suspend_threshold: defaults.suspend_threshold,
            completion_timeout_secs: defaults.completion_timeout.as_secs(),
            humanize_timeout_secs: defaults.humanize_timeout.as_secs(),
            send_timeout_secs: defaults.platform_timeout.as_secs(),
            summary_timeout_secs: defaults.summary_timeout.as_secs(),
            max_send_attempts: defaults.max_send_attempts,
            quiz_questions: defaults.quiz_questions,
            success_message_window: defaults.success_message_window,
        }
    }
}

impl AutomationConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let unit = 0.0..=1.0;
        if !unit.contains(&self.warn_threshold)
            || !unit.contains(&self.suspend_threshold)
            || self.warn_threshold > self.suspend_threshold
        {
            return Err(ValidationError::InvalidThresholds);
        }
        for (name, secs) in [
            ("automation.poll_interval_secs", self.poll_interval_secs),
            ("automation.completion_timeout_secs", self.completion_timeout_secs),
            ("automation.humanize_timeout_secs", self.humanize_timeout_secs),
            ("automation.send_timeout_secs", self.send_timeout_secs),
            ("automation.summary_timeout_secs", self.summary_timeout_secs),
        ] {
            if secs == 0 {
                return Err(ValidationError::InvalidTimeout(name));
            }
        }
        if self.token_budget == 0 {
            return Err(ValidationError::InvalidBudget("automation.token_budget"));
        }
        if self.prompt_token_budget == 0 {
            return Err(ValidationError::InvalidBudget("automation.prompt_token_budget"));
        }
        Ok(())
    }

    pub fn manager_config(&self) -> ManagerConfig {
        ManagerConfig {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            token_budget: self.token_budget,
            prompt_token_budget: self.prompt_token_budget,
            max_candidates: self.max_candidates,
            max_examples: self.max_examples,
            warn_threshold: self.warn_threshold,
            suspend_threshold: self.suspend_threshold,
            completion_timeout: Duration::from_secs(self.completion_timeout_secs),
            humanize_timeout: Duration::from_secs(self.humanize_timeout_secs),
            platform_timeout: Duration::from_secs(self.send_timeout_secs),
            summary_timeout: Duration::from_secs(self.summary_timeout_secs),
            max_send_attempts: self.max_send_attempts,
            quiz_questions: self.quiz_questions,
            success_message_window: self.success_message_window,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_manager_defaults() {
        let config = AutomationConfig::default();
        assert_eq!(config.poll_interval_secs, 30);
        assert_eq!(config.token_budget, 8000);
        assert_eq!(config.warn_threshold, 0.7);
        assert_eq!(config.suspend_threshold, 0.8);
        assert!(config.validate().is_ok());

        let manager = config.manager_config();
        assert_eq!(manager.poll_interval, Duration::from_secs(30));
        assert_eq!(manager.max_examples, 5);
    }

    #[test]
    fn test_thresholds_must_be_ordered_units() {
        let inverted = AutomationConfig {
            warn_threshold: 0.9,
            suspend_threshold: 0.8,
            ..Default::default()
        };
        assert_eq!(inverted.validate(), Err(ValidationError::InvalidThresholds));

        let out_of_range = AutomationConfig {
            suspend_threshold: 1.5,
            ..Default::default()
        };
        assert_eq!(out_of_range.validate(), Err(ValidationError::InvalidThresholds));
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let config = AutomationConfig {
            poll_interval_secs: 0,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ValidationError::InvalidTimeout("automation.poll_interval_secs"))
        );
    }
}
