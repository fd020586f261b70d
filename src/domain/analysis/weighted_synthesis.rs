//! Weighted style synthesis.
//!
//! Historical conversations are split by success score into successful
//! (`>= 0.7`) and failed (`< 0.3`) partitions; the middle band is ignored.
//! The target style blends the partitions' average profiles with the
//! default persona, 70/15/15.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::StyleExtractor;
use crate::domain::conversation::{Message, StyleProfile};

pub const SUCCESS_THRESHOLD: f64 = 0.7;
pub const FAILURE_THRESHOLD: f64 = 0.3;

const SUCCESS_WEIGHT: f64 = 0.70;
const FAILURE_WEIGHT: f64 = 0.15;
const PERSONA_WEIGHT: f64 = 0.15;

/// A historical conversation with its success score.
#[derive(Debug, Clone, Copy)]
pub struct ConversationSample<'a> {
    pub messages: &'a [Message],
    pub success: f64,
}

impl<'a> ConversationSample<'a> {
    pub fn new(messages: &'a [Message], success: f64) -> Self {
        Self { messages, success }
    }
}

/// Blended profile plus how many samples fed each partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisOutcome {
    pub profile: StyleProfile,
    pub successful_count: usize,
    pub failed_count: usize,
}

#[derive(Debug, Clone)]
pub struct WeightedResponseSynthesis {
    extractor: StyleExtractor,
    persona: StyleProfile,
}

impl Default for WeightedResponseSynthesis {
    fn default() -> Self {
        Self::new(StyleProfile::default_persona())
    }
}

impl WeightedResponseSynthesis {
    pub fn new(persona: StyleProfile) -> Self {
        Self {
            extractor: StyleExtractor::new(),
            persona,
        }
    }

    pub fn persona(&self) -> &StyleProfile {
        &self.persona
    }

    pub fn synthesize(&self, samples: &[ConversationSample<'_>]) -> SynthesisOutcome {
        let successful: Vec<StyleProfile> = samples
            .iter()
            .filter(|s| s.success >= SUCCESS_THRESHOLD)
            .map(|s| self.extractor.extract(s.messages))
            .collect();
        let failed: Vec<StyleProfile> = samples
            .iter()
            .filter(|s| s.success < FAILURE_THRESHOLD)
            .map(|s| self.extractor.extract(s.messages))
            .collect();

        SynthesisOutcome {
            profile: self.blend(&successful, &failed),
            successful_count: successful.len(),
            failed_count: failed.len(),
        }
    }

    /// Blends already-extracted partition profiles with the persona.
    pub fn blend(&self, successful: &[StyleProfile], failed: &[StyleProfile]) -> StyleProfile {
        let persona = self.persona.numeric_fields();
        let fields = match (average(successful), average(failed)) {
            (None, None) => return self.persona.clone(),
            (None, Some(b)) => weighted(&[(b, 0.5), (persona, 0.5)]),
            (Some(a), None) => {
                let total = SUCCESS_WEIGHT + PERSONA_WEIGHT;
                weighted(&[(a, SUCCESS_WEIGHT / total), (persona, PERSONA_WEIGHT / total)])
            }
            (Some(a), Some(b)) => weighted(&[
                (a, SUCCESS_WEIGHT),
                (b, FAILURE_WEIGHT),
                (persona, PERSONA_WEIGHT),
            ]),
        };
        let opening = most_common_opening(successful)
            .unwrap_or_else(|| self.persona.preferred_opening.clone());
        StyleProfile::from_numeric_fields(fields, opening)
    }
}

fn average(profiles: &[StyleProfile]) -> Option<[f64; 7]> {
    if profiles.is_empty() {
        return None;
    }
    let mut sums = [0.0; 7];
    for profile in profiles {
        for (sum, value) in sums.iter_mut().zip(profile.numeric_fields()) {
            *sum += value;
        }
    }
    let n = profiles.len() as f64;
    Some(sums.map(|s| s / n))
}

fn weighted(sources: &[([f64; 7], f64)]) -> [f64; 7] {
    let mut out = [0.0; 7];
    for (fields, weight) in sources {
        for (o, value) in out.iter_mut().zip(fields) {
            *o += value * weight;
        }
    }
    out
}

/// Most frequent non-empty opening; ties go to the one seen first.
fn most_common_opening(profiles: &[StyleProfile]) -> Option<String> {
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (index, profile) in profiles.iter().enumerate() {
        let opening = profile.preferred_opening.trim();
        if opening.is_empty() {
            continue;
        }
        counts.entry(opening).or_insert((0, index)).0 += 1;
    }
    counts
        .into_iter()
        .max_by(|(_, (ca, ia)), (_, (cb, ib))| ca.cmp(cb).then(ib.cmp(ia)))
        .map(|(opening, _)| opening.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::Timestamp;
    use proptest::prelude::*;

    fn profile(value: f64, opening: &str) -> StyleProfile {
        StyleProfile::from_numeric_fields([value; 7], opening)
    }

    #[test]
    fn no_samples_returns_default_persona() {
        let synthesis = WeightedResponseSynthesis::default();
        let outcome = synthesis.synthesize(&[]);
        assert_eq!(outcome.profile, StyleProfile::default_persona());
        assert_eq!(outcome.successful_count, 0);
        assert_eq!(outcome.failed_count, 0);
    }

    #[test]
    fn full_blend_uses_70_15_15() {
        let persona = profile(0.0, "persona");
        let synthesis = WeightedResponseSynthesis::new(persona);
        let blended = synthesis.blend(&[profile(1.0, "a")], &[profile(2.0, "b")]);
        assert!((blended.humor - (0.70 + 0.30)).abs() < 1e-9);
        assert_eq!(blended.preferred_opening, "a");
    }

    #[test]
    fn only_failed_partition_splits_evenly_with_persona() {
        let synthesis = WeightedResponseSynthesis::new(profile(0.0, "persona"));
        let blended = synthesis.blend(&[], &[profile(1.0, "b")]);
        assert!((blended.empathy - 0.5).abs() < 1e-9);
        assert_eq!(blended.preferred_opening, "persona");
    }

    #[test]
    fn only_successful_partition_renormalizes() {
        let synthesis = WeightedResponseSynthesis::new(profile(0.0, "persona"));
        let blended = synthesis.blend(&[profile(1.0, "a")], &[]);
        assert!((blended.formality - 0.70 / 0.85).abs() < 1e-9);
    }

    #[test]
    fn middle_band_samples_are_ignored() {
        let messages = vec![Message::from_user("hello there", Timestamp::from_unix_secs(0))];
        let synthesis = WeightedResponseSynthesis::default();
        let outcome = synthesis.synthesize(&[ConversationSample::new(&messages, 0.5)]);
        assert_eq!(outcome.profile, StyleProfile::default_persona());
    }

    #[test]
    fn most_common_opening_wins() {
        let synthesis = WeightedResponseSynthesis::default();
        let blended = synthesis.blend(
            &[
                profile(0.5, "Casual greeting"),
                profile(0.5, "Friendly greeting"),
                profile(0.5, "Friendly greeting"),
            ],
            &[],
        );
        assert_eq!(blended.preferred_opening, "Friendly greeting");
    }

    fn arb_profile() -> impl Strategy<Value = StyleProfile> {
        proptest::array::uniform7(0.0f64..500.0)
            .prop_map(|fields| StyleProfile::from_numeric_fields(fields, "x"))
    }

    proptest! {
        #[test]
        fn blended_fields_stay_within_source_bounds(
            successful in proptest::collection::vec(arb_profile(), 0..4),
            failed in proptest::collection::vec(arb_profile(), 0..4),
        ) {
            let synthesis = WeightedResponseSynthesis::default();
            let blended = synthesis.blend(&successful, &failed).numeric_fields();

            let mut sources: Vec<[f64; 7]> =
                successful.iter().chain(failed.iter()).map(StyleProfile::numeric_fields).collect();
            sources.push(synthesis.persona().numeric_fields());

            for i in 0..7 {
                let lo = sources.iter().map(|s| s[i]).fold(f64::INFINITY, f64::min);
                let hi = sources.iter().map(|s| s[i]).fold(f64::NEG_INFINITY, f64::max);
                prop_assert!(blended[i] >= lo - 1e-9 && blended[i] <= hi + 1e-9);
            }
        }
    }
}
