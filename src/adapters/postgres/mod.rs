//! PostgreSQL adapters - Database implementations for repository ports.
//!
//! - `PostgresConversationRepository` - conversations and messages
//! - `PostgresCategoryScoreRepository` - category scores, upserted in place
//! - `PostgresConversationStateRepository` - goal state, disinterest log, summaries
//!
//! The schema lives in `migrations/` and is applied with [`run_migrations`].

mod pg_category_score_repository;
mod pg_conversation_repository;
mod pg_conversation_state_repository;

pub use pg_category_score_repository::PostgresCategoryScoreRepository;
pub use pg_conversation_repository::PostgresConversationRepository;
pub use pg_conversation_state_repository::PostgresConversationStateRepository;

use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::time::Duration;

use crate::ports::RepositoryError;

/// Opens a connection pool.
pub async fn connect(
    url: &str,
    min_connections: u32,
    max_connections: u32,
    acquire_timeout: Duration,
) -> Result<PgPool, RepositoryError> {
    PgPoolOptions::new()
        .min_connections(min_connections)
        .max_connections(max_connections)
        .acquire_timeout(acquire_timeout)
        .connect(url)
        .await
        .map_err(|e| RepositoryError::database(format!("Failed to connect: {}", e)))
}

/// Applies the embedded migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<(), RepositoryError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| RepositoryError::database(format!("Failed to run migrations: {}", e)))
}

/// Reads a column, mapping decode failures to `RepositoryError::Serialization`.
pub(crate) fn column<'r, T>(row: &'r PgRow, name: &str) -> Result<T, RepositoryError>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(name)
        .map_err(|e| RepositoryError::serialization(format!("column {}: {}", name, e)))
}
