//! Analysis - pure conversation analytics.
//!
//! Stateless, deterministic services that take message histories and return
//! scores or profiles. No ports or I/O.
//!
//! - `SuccessScorer` - keyword and length based success heuristic
//! - `StyleExtractor` - humor, formality, empathy and pacing statistics
//! - `DisinterestDetector` - weighted disengagement indicators
//! - `ResponseTimingAnalyzer` - reply delay advice
//! - `WeightedResponseSynthesis` - 70/15/15 style blending
//! - `EngagementMetrics` - engagement snapshot for incremental re-scoring

mod disinterest_detector;
mod engagement;
mod response_timing;
mod style_extractor;
mod success_scorer;
pub mod text;
mod weighted_synthesis;

pub use disinterest_detector::{
    DisinterestDetector, DisinterestIndicator, DisinterestReport, IndicatorKind, INSUFFICIENT_DATA,
};
pub use engagement::EngagementMetrics;
pub use response_timing::{
    ResponseTimingAnalyzer, TargetTiming, DEFAULT_BASE_DELAY_SECS, MAX_DELAY_SECS, MIN_DELAY_SECS,
};
pub use style_extractor::StyleExtractor;
pub use success_scorer::{SuccessKeywords, SuccessScorer, DEFAULT_MESSAGE_WINDOW};
pub use weighted_synthesis::{
    ConversationSample, SynthesisOutcome, WeightedResponseSynthesis, FAILURE_THRESHOLD,
    SUCCESS_THRESHOLD,
};
