//! Conversation categories and the registry that defines them.

mod registry;

pub use registry::{CategoryDefinition, CategoryRegistry, CategoryRegistryError};
