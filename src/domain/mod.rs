//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps, errors, state machine)
//! - `conversation` - Messages, conversations, goals, scores and runtime state
//! - `categories` - Category definitions and the registry
//! - `analysis` - Pure conversation analytics (disinterest, timing, style synthesis)

pub mod analysis;
pub mod categories;
pub mod conversation;
pub mod foundation;
