//! Application layer - services that orchestrate domain analysis over ports.
//!
//! - `categorization` - AI categorization with incremental score merging
//! - `chat_selector` - budgeted selection of historical conversations
//! - `reply_prompt` - example mix and reply prompt assembly
//! - `summarizer` - end-of-goal summaries and quizzes
//! - `conversation_manager` - the per-goal automated reply loop

pub mod categorization;
pub mod chat_selector;
pub mod conversation_manager;
mod json_reply;
pub mod reply_prompt;
pub mod summarizer;

pub use categorization::{merge_scores, new_score_weight, CategorizationError, CategorizationService};
pub use chat_selector::{estimate_tokens, format_for_prompt, SelectedConversation, SmartChatSelector};
pub use conversation_manager::{
    AutomatedConversationManager, IncomingOutcome, ManagerConfig, ManagerError, ManagerPorts,
    SendOutcome,
};
pub use reply_prompt::{select_example_mix, ReplyContext, ReplyPromptBuilder};
pub use summarizer::AiConversationSummarizer;
