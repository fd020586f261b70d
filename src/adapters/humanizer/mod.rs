//! Humanizer adapters.
//!
//! - `PassthroughHumanizer` - returns drafts unchanged
//! - `HttpHumanizer` - submit/poll client for a remote rewriting service

mod http_humanizer;
mod passthrough;

pub use http_humanizer::{HttpHumanizer, HttpHumanizerConfig};
pub use passthrough::PassthroughHumanizer;
