//! PostgreSQL implementation of CategoryScoreRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::PgPool;
use std::collections::BTreeMap;
use uuid::Uuid;

use super::column;
use crate::domain::conversation::{CategoryScore, OutcomeType};
use crate::domain::foundation::{ConversationId, Timestamp};
use crate::ports::{CategoryMatch, CategoryScoreRepository, RepositoryError};

#[derive(Clone)]
pub struct PostgresCategoryScoreRepository {
    pool: PgPool,
}

impl PostgresCategoryScoreRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CategoryScoreRepository for PostgresCategoryScoreRepository {
    async fn find_for_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<CategoryScore>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT conversation_id, category, relevance, success, outcome, reason, categorized_at
            FROM category_scores
            WHERE conversation_id = $1
            ORDER BY category ASC
            "#,
        )
        .bind(conversation_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::database(format!("Failed to fetch category scores: {}", e)))?;

        rows.iter().map(score_from_row).collect()
    }

    async fn last_categorized_at(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<Timestamp>, RepositoryError> {
        let latest: Option<DateTime<Utc>> = sqlx::query_scalar(
            "SELECT MAX(categorized_at) FROM category_scores WHERE conversation_id = $1",
        )
        .bind(conversation_id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            RepositoryError::database(format!("Failed to fetch categorization time: {}", e))
        })?;

        Ok(latest.map(Timestamp::from_datetime))
    }

    async fn upsert_many(&self, scores: &[CategoryScore]) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            RepositoryError::database(format!("Failed to start transaction: {}", e))
        })?;

        for score in scores {
            sqlx::query(
                r#"
                INSERT INTO category_scores (
                    conversation_id, category, relevance, success, outcome, reason, categorized_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (conversation_id, category) DO UPDATE SET
                    relevance = EXCLUDED.relevance,
                    success = EXCLUDED.success,
                    outcome = EXCLUDED.outcome,
                    reason = EXCLUDED.reason,
                    categorized_at = EXCLUDED.categorized_at
                "#,
            )
            .bind(score.conversation_id.as_uuid())
            .bind(&score.category)
            .bind(score.relevance)
            .bind(score.success)
            .bind(score.outcome.map(|o| o.as_str()))
            .bind(&score.reason)
            .bind(score.categorized_at.as_datetime())
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                RepositoryError::database(format!("Failed to upsert category score: {}", e))
            })?;
        }

        tx.commit().await.map_err(|e| {
            RepositoryError::database(format!("Failed to commit transaction: {}", e))
        })?;
        Ok(())
    }

    async fn find_by_categories(
        &self,
        categories: &[String],
    ) -> Result<Vec<CategoryMatch>, RepositoryError> {
        if categories.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(
            r#"
            SELECT conversation_id, category, relevance, success, outcome, reason, categorized_at
            FROM category_scores
            WHERE category = ANY($1)
            ORDER BY conversation_id ASC, category ASC
            "#,
        )
        .bind(categories)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::database(format!("Failed to fetch category scores: {}", e)))?;

        let mut grouped: BTreeMap<ConversationId, Vec<CategoryScore>> = BTreeMap::new();
        for row in &rows {
            let score = score_from_row(row)?;
            grouped.entry(score.conversation_id).or_default().push(score);
        }
        Ok(grouped
            .into_iter()
            .map(|(conversation_id, scores)| CategoryMatch {
                conversation_id,
                scores,
            })
            .collect())
    }
}

fn score_from_row(row: &PgRow) -> Result<CategoryScore, RepositoryError> {
    let conversation_id: Uuid = column(row, "conversation_id")?;
    let outcome: Option<String> = column(row, "outcome")?;
    let categorized_at: DateTime<Utc> = column(row, "categorized_at")?;
    Ok(CategoryScore {
        conversation_id: ConversationId::from_uuid(conversation_id),
        category: column(row, "category")?,
        relevance: column(row, "relevance")?,
        success: column(row, "success")?,
        outcome: outcome.map(|o| OutcomeType::from_name(&o).unwrap_or_default()),
        reason: column(row, "reason")?,
        categorized_at: Timestamp::from_datetime(categorized_at),
    })
}
