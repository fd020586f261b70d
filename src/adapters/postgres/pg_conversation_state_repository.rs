//! PostgreSQL implementation of ConversationStateRepository.
//!
//! States, disinterest reports and summaries are stored as JSONB documents,
//! with the columns needed for lookups kept alongside.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::column;
use crate::domain::conversation::{ConversationState, ConversationSummary, GoalStatus};
use crate::domain::foundation::{ConversationId, GoalId, Timestamp};
use crate::ports::{ConversationStateRepository, DisinterestLogEntry, RepositoryError};

#[derive(Clone)]
pub struct PostgresConversationStateRepository {
    pool: PgPool,
}

impl PostgresConversationStateRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConversationStateRepository for PostgresConversationStateRepository {
    async fn save_state(&self, state: &ConversationState) -> Result<(), RepositoryError> {
        let document = serde_json::to_string(state)?;
        sqlx::query(
            r#"
            INSERT INTO conversation_states (
                goal_id, conversation_id, status, state, created_at, updated_at
            ) VALUES ($1, $2, $3, $4::jsonb, $5, $6)
            ON CONFLICT (goal_id) DO UPDATE SET
                status = EXCLUDED.status,
                state = EXCLUDED.state,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(state.goal.id.as_uuid())
        .bind(state.goal.conversation_id.as_uuid())
        .bind(state.status.as_str())
        .bind(document)
        .bind(state.created_at.as_datetime())
        .bind(state.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::database(format!("Failed to save state: {}", e)))?;
        Ok(())
    }

    async fn load_state(
        &self,
        goal_id: &GoalId,
    ) -> Result<Option<ConversationState>, RepositoryError> {
        let row = sqlx::query("SELECT state::text AS state FROM conversation_states WHERE goal_id = $1")
            .bind(goal_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryError::database(format!("Failed to load state: {}", e)))?;

        match row {
            Some(row) => Ok(Some(serde_json::from_str(&column::<String>(&row, "state")?)?)),
            None => Ok(None),
        }
    }

    async fn find_active(&self) -> Result<Vec<ConversationState>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT state::text AS state
            FROM conversation_states
            WHERE status <> $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(GoalStatus::Closed.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::database(format!("Failed to fetch active states: {}", e)))?;

        rows.iter()
            .map(|row| Ok(serde_json::from_str(&column::<String>(row, "state")?)?))
            .collect()
    }

    async fn record_disinterest(&self, entry: &DisinterestLogEntry) -> Result<(), RepositoryError> {
        let report = serde_json::to_string(&entry.report)?;
        sqlx::query(
            r#"
            INSERT INTO disinterest_log (goal_id, conversation_id, probability, report, recorded_at)
            VALUES ($1, $2, $3, $4::jsonb, $5)
            "#,
        )
        .bind(entry.goal_id.as_uuid())
        .bind(entry.conversation_id.as_uuid())
        .bind(entry.report.probability)
        .bind(report)
        .bind(entry.recorded_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::database(format!("Failed to record disinterest: {}", e)))?;
        Ok(())
    }

    async fn disinterest_log(
        &self,
        goal_id: &GoalId,
    ) -> Result<Vec<DisinterestLogEntry>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT conversation_id, report::text AS report, recorded_at
            FROM disinterest_log
            WHERE goal_id = $1
            ORDER BY recorded_at ASC, id ASC
            "#,
        )
        .bind(goal_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::database(format!("Failed to fetch disinterest log: {}", e)))?;

        rows.iter()
            .map(|row| {
                let conversation_id: Uuid = column(row, "conversation_id")?;
                let recorded_at: DateTime<Utc> = column(row, "recorded_at")?;
                Ok(DisinterestLogEntry {
                    goal_id: *goal_id,
                    conversation_id: ConversationId::from_uuid(conversation_id),
                    report: serde_json::from_str(&column::<String>(row, "report")?)?,
                    recorded_at: Timestamp::from_datetime(recorded_at),
                })
            })
            .collect()
    }

    async fn save_summary(
        &self,
        goal_id: &GoalId,
        summary: &ConversationSummary,
    ) -> Result<(), RepositoryError> {
        let document = serde_json::to_string(summary)?;
        sqlx::query(
            r#"
            INSERT INTO conversation_summaries (goal_id, summary, generated_at)
            VALUES ($1, $2::jsonb, $3)
            ON CONFLICT (goal_id) DO UPDATE SET
                summary = EXCLUDED.summary,
                generated_at = EXCLUDED.generated_at
            "#,
        )
        .bind(goal_id.as_uuid())
        .bind(document)
        .bind(summary.generated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::database(format!("Failed to save summary: {}", e)))?;
        Ok(())
    }

    async fn find_summary(
        &self,
        goal_id: &GoalId,
    ) -> Result<Option<ConversationSummary>, RepositoryError> {
        let row = sqlx::query(
            "SELECT summary::text AS summary FROM conversation_summaries WHERE goal_id = $1",
        )
        .bind(goal_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryError::database(format!("Failed to load summary: {}", e)))?;

        match row {
            Some(row) => Ok(Some(serde_json::from_str(&column::<String>(&row, "summary")?)?)),
            None => Ok(None),
        }
    }
}
