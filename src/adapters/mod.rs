//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `ai` - Completion providers (OpenAI, mock)
//! - `humanizer` - Draft rewriting (HTTP service, passthrough)
//! - `platform` - Chat platform connectors
//! - `postgres` - PostgreSQL repositories
//! - `storage` - In-memory repositories

pub mod ai;
pub mod humanizer;
pub mod platform;
pub mod postgres;
pub mod storage;

pub use ai::{MockAIProvider, OpenAIConfig, OpenAIProvider};
pub use humanizer::{HttpHumanizer, HttpHumanizerConfig, PassthroughHumanizer};
pub use platform::{InMemoryConnector, UnsupportedConnector};
pub use postgres::{
    PostgresCategoryScoreRepository, PostgresConversationRepository,
    PostgresConversationStateRepository,
};
pub use storage::InMemoryStore;
