//! Error type shared by the persistence ports.

use thiserror::Error;

/// Errors raised by repository implementations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

impl RepositoryError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        RepositoryError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn database(message: impl Into<String>) -> Self {
        RepositoryError::Database(message.into())
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        RepositoryError::Serialization(message.into())
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_displays_entity_and_id() {
        let err = RepositoryError::not_found("Conversation", "abc");
        assert_eq!(err.to_string(), "Conversation not found: abc");
    }
}
