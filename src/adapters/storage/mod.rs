//! Storage Adapters
//!
//! In-memory implementations of the persistence ports.
//!
//! ## Available Adapters
//!
//! - **InMemoryStore** - All three repositories over shared maps (testing,
//!   database-less runs)
//!
//! ## Usage
//!
//! ```ignore
//! use adapters::storage::InMemoryStore;
//!
//! let store = Arc::new(InMemoryStore::new());
//! let conversations: Arc<dyn ConversationRepository> = store.clone();
//! let scores: Arc<dyn CategoryScoreRepository> = store.clone();
//! ```

mod in_memory_store;

pub use in_memory_store::InMemoryStore;
