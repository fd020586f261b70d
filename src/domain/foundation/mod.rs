//! Foundation module - Shared domain primitives.
//!
//! Identifiers, timestamps, validation errors and the state machine
//! trait used across the conversation domain.

mod errors;
mod ids;
mod state_machine;
mod timestamp;

pub use errors::ValidationError;
pub use ids::{ConversationId, GoalId, MessageId, UserId};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
