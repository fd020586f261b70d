//! Communication style profile.

use serde::{Deserialize, Serialize};

/// Statistical description of how someone writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleProfile {
    pub humor: f64,
    pub formality: f64,
    pub empathy: f64,
    pub avg_response_time_secs: f64,
    pub avg_message_length_words: f64,
    pub question_rate: f64,
    pub engagement_level: f64,
    pub preferred_opening: String,
}

impl StyleProfile {
    /// The persona used when no historical data is available.
    pub fn default_persona() -> Self {
        Self {
            humor: 0.4,
            formality: 0.5,
            empathy: 0.7,
            avg_response_time_secs: 120.0,
            avg_message_length_words: 25.0,
            question_rate: 0.3,
            engagement_level: 0.6,
            preferred_opening: "Hey! How are you doing?".to_string(),
        }
    }

    /// Numeric fields in a fixed order, for blending and bounds checks.
    pub fn numeric_fields(&self) -> [f64; 7] {
        [
            self.humor,
            self.formality,
            self.empathy,
            self.avg_response_time_secs,
            self.avg_message_length_words,
            self.question_rate,
            self.engagement_level,
        ]
    }

    /// Builds a profile from fields in `numeric_fields` order.
    pub fn from_numeric_fields(fields: [f64; 7], preferred_opening: impl Into<String>) -> Self {
        let [humor, formality, empathy, response, length, questions, engagement] = fields;
        Self {
            humor,
            formality,
            empathy,
            avg_response_time_secs: response,
            avg_message_length_words: length,
            question_rate: questions,
            engagement_level: engagement,
            preferred_opening: preferred_opening.into(),
        }
    }

    /// Renders the profile as prompt guidelines.
    pub fn guidelines(&self) -> String {
        format!(
            "Communication Style Guidelines:\n\
             - Humor Level: {:.1}\n\
             - Formality: {:.1}\n\
             - Empathy: {:.1}\n\
             - Average Response Time: {:.0} seconds\n\
             - Average Message Length: {:.0} words\n\
             - Question Rate: {:.1}\n\
             - Preferred Opening: {}\n",
            self.humor,
            self.formality,
            self.empathy,
            self.avg_response_time_secs,
            self.avg_message_length_words,
            self.question_rate,
            self.preferred_opening,
        )
    }
}

impl Default for StyleProfile {
    fn default() -> Self {
        Self::default_persona()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_fields_roundtrip() {
        let persona = StyleProfile::default_persona();
        let rebuilt =
            StyleProfile::from_numeric_fields(persona.numeric_fields(), persona.preferred_opening.clone());
        assert_eq!(rebuilt, persona);
    }

    #[test]
    fn guidelines_include_rounded_values() {
        let text = StyleProfile::default_persona().guidelines();
        assert!(text.contains("Humor Level: 0.4"));
        assert!(text.contains("Average Response Time: 120 seconds"));
        assert!(text.contains("Average Message Length: 25 words"));
    }
}
