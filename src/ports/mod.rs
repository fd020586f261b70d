//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Service Ports
//!
//! - `AIProvider` - Completion service (categorization, drafting, summaries)
//! - `Humanizer` - Rewrites drafted replies
//! - `PlatformConnector` - Sends and polls messages on a chat platform
//!   (looked up per `PlatformKind` through `ConnectorRegistry`)
//! - `ConversationSummarizer` - End-of-goal summary and recall quiz
//!
//! ## Persistence Ports
//!
//! - `ConversationRepository` - Conversations and their messages
//! - `CategoryScoreRepository` - Per-category relevance and success scores
//! - `ConversationStateRepository` - Goal runtime state, disinterest log, summaries

mod ai_provider;
mod category_score_repository;
mod connector_registry;
mod conversation_repository;
mod conversation_state_repository;
mod humanizer;
mod platform_connector;
mod repository_error;
mod summarizer;

pub use ai_provider::{
    AIError, AIProvider, ChatMessage, CompletionRequest, CompletionResponse, FinishReason,
    MessageRole, ProviderInfo, RequestMetadata, RequestPurpose, TokenUsage,
};
pub use category_score_repository::{CategoryMatch, CategoryScoreRepository};
pub use connector_registry::ConnectorRegistry;
pub use conversation_repository::ConversationRepository;
pub use conversation_state_repository::{ConversationStateRepository, DisinterestLogEntry};
pub use humanizer::{Humanizer, HumanizerError};
pub use platform_connector::{PlatformConnector, PlatformError, SendReceipt};
pub use repository_error::RepositoryError;
pub use summarizer::{ConversationSummarizer, SummarizerError};
