//! Conversation domain - messages, conversations, goals, scores and runtime state.

mod category_score;
mod conversation;
mod goal;
mod message;
mod state;
mod style_profile;
mod summary;

pub use category_score::{clamp_unit, CategoryScore, OutcomeType};
pub use conversation::{Conversation, PlatformKind};
pub use goal::{ConversationGoal, GoalType};
pub use message::{Message, SenderRole};
pub use state::{ConversationState, GoalStatus, PendingResponse};
pub use style_profile::StyleProfile;
pub use summary::{ConversationSummary, KeyPersonalDetails, OutcomeStatus, QuizQuestion};
