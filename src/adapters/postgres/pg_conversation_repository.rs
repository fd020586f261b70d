//! PostgreSQL implementation of ConversationRepository.
//!
//! Conversations live in `conversations`, their messages in `messages`.
//! Messages are insert-only; a known message id is skipped.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::HashMap;
use uuid::Uuid;

use super::column;
use crate::domain::conversation::{Conversation, Message, PlatformKind, SenderRole};
use crate::domain::foundation::{ConversationId, MessageId, Timestamp, UserId, ValidationError};
use crate::ports::{ConversationRepository, RepositoryError};

#[derive(Clone)]
pub struct PostgresConversationRepository {
    pool: PgPool,
}

impl PostgresConversationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_messages(
        tx: &mut Transaction<'_, Postgres>,
        conversation_id: &ConversationId,
        messages: &[Message],
    ) -> Result<usize, RepositoryError> {
        let mut inserted = 0;
        for message in messages {
            let result = sqlx::query(
                r#"
                INSERT INTO messages (id, conversation_id, sender, text, has_attachment, sent_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (id) DO NOTHING
                "#,
            )
            .bind(message.id.as_uuid())
            .bind(conversation_id.as_uuid())
            .bind(sender_to_str(message.sender))
            .bind(&message.text)
            .bind(message.has_attachment)
            .bind(message.timestamp.as_datetime())
            .execute(&mut **tx)
            .await
            .map_err(|e| RepositoryError::database(format!("Failed to insert message: {}", e)))?;
            inserted += result.rows_affected() as usize;
        }
        Ok(inserted)
    }

    /// Loads conversations matching `filter_sql` (a WHERE clause over `c`) with their messages.
    async fn load_where(
        &self,
        filter_sql: &str,
        bind: QueryBind<'_>,
    ) -> Result<Vec<Conversation>, RepositoryError> {
        let sql = format!(
            "SELECT c.id, c.owner_id, c.platform, c.platform_ref, c.counterpart_name \
             FROM conversations c WHERE {} ORDER BY c.created_at ASC, c.id ASC",
            filter_sql
        );
        let query = sqlx::query(&sql);
        let query = match bind {
            QueryBind::Ids(ids) => query.bind(ids),
            QueryBind::Owner(owner) => query.bind(owner),
        };
        let rows = query.fetch_all(&self.pool).await.map_err(|e| {
            RepositoryError::database(format!("Failed to fetch conversations: {}", e))
        })?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = rows
            .iter()
            .map(|row| column::<Uuid>(row, "id"))
            .collect::<Result<_, _>>()?;
        let mut messages = self.load_messages(&ids).await?;

        rows.iter()
            .map(|row| {
                let id: Uuid = column(row, "id")?;
                let owner = UserId::new(column::<String>(row, "owner_id")?)
                    .map_err(|e| RepositoryError::serialization(e.to_string()))?;
                let platform: PlatformKind = column::<String>(row, "platform")?
                    .parse()
                    .map_err(|e: ValidationError| RepositoryError::serialization(e.to_string()))?;
                Ok(Conversation::reconstitute(
                    ConversationId::from_uuid(id),
                    owner,
                    platform,
                    column(row, "platform_ref")?,
                    column(row, "counterpart_name")?,
                    messages.remove(&id).unwrap_or_default(),
                ))
            })
            .collect()
    }

    async fn load_messages(
        &self,
        conversation_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<Message>>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, conversation_id, sender, text, has_attachment, sent_at
            FROM messages
            WHERE conversation_id = ANY($1)
            ORDER BY sent_at ASC
            "#,
        )
        .bind(conversation_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::database(format!("Failed to fetch messages: {}", e)))?;

        let mut grouped: HashMap<Uuid, Vec<Message>> = HashMap::new();
        for row in &rows {
            let conversation_id: Uuid = column(row, "conversation_id")?;
            grouped
                .entry(conversation_id)
                .or_default()
                .push(message_from_row(row)?);
        }
        Ok(grouped)
    }
}

enum QueryBind<'a> {
    Ids(Vec<Uuid>),
    Owner(&'a str),
}

#[async_trait]
impl ConversationRepository for PostgresConversationRepository {
    async fn save(&self, conversation: &Conversation) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            RepositoryError::database(format!("Failed to start transaction: {}", e))
        })?;

        sqlx::query(
            r#"
            INSERT INTO conversations (id, owner_id, platform, platform_ref, counterpart_name)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET counterpart_name = EXCLUDED.counterpart_name
            "#,
        )
        .bind(conversation.id().as_uuid())
        .bind(conversation.owner().as_str())
        .bind(conversation.platform().as_str())
        .bind(conversation.platform_ref())
        .bind(conversation.counterpart_name())
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::database(format!("Failed to upsert conversation: {}", e)))?;

        Self::insert_messages(&mut tx, &conversation.id(), conversation.messages()).await?;

        tx.commit().await.map_err(|e| {
            RepositoryError::database(format!("Failed to commit transaction: {}", e))
        })?;
        Ok(())
    }

    async fn append_messages(
        &self,
        conversation_id: &ConversationId,
        messages: &[Message],
    ) -> Result<usize, RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            RepositoryError::database(format!("Failed to start transaction: {}", e))
        })?;

        let exists = sqlx::query("SELECT 1 FROM conversations WHERE id = $1")
            .bind(conversation_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| {
                RepositoryError::database(format!("Failed to fetch conversation: {}", e))
            })?;
        if exists.is_none() {
            return Err(RepositoryError::not_found("Conversation", conversation_id));
        }

        let inserted = Self::insert_messages(&mut tx, conversation_id, messages).await?;

        tx.commit().await.map_err(|e| {
            RepositoryError::database(format!("Failed to commit transaction: {}", e))
        })?;
        Ok(inserted)
    }

    async fn find_by_id(
        &self,
        id: &ConversationId,
    ) -> Result<Option<Conversation>, RepositoryError> {
        Ok(self
            .load_where("c.id = ANY($1)", QueryBind::Ids(vec![*id.as_uuid()]))
            .await?
            .into_iter()
            .next())
    }

    async fn find_by_ids(
        &self,
        ids: &[ConversationId],
    ) -> Result<Vec<Conversation>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let uuids = ids.iter().map(|id| *id.as_uuid()).collect();
        let mut found = self.load_where("c.id = ANY($1)", QueryBind::Ids(uuids)).await?;
        // Keep the caller's order.
        found.sort_by_key(|c| ids.iter().position(|id| *id == c.id()));
        Ok(found)
    }

    async fn find_by_owner(&self, owner: &UserId) -> Result<Vec<Conversation>, RepositoryError> {
        self.load_where("c.owner_id = $1", QueryBind::Owner(owner.as_str()))
            .await
    }
}

fn message_from_row(row: &PgRow) -> Result<Message, RepositoryError> {
    let id: Uuid = column(row, "id")?;
    let sender = str_to_sender(&column::<String>(row, "sender")?)?;
    let sent_at: DateTime<Utc> = column(row, "sent_at")?;
    let mut message = Message::new(
        sender,
        column::<String>(row, "text")?,
        Timestamp::from_datetime(sent_at),
    )
    .with_id(MessageId::from_uuid(id));
    if column::<bool>(row, "has_attachment")? {
        message = message.with_attachment();
    }
    Ok(message)
}

fn sender_to_str(sender: SenderRole) -> &'static str {
    match sender {
        SenderRole::User => "user",
        SenderRole::Counterpart => "counterpart",
    }
}

fn str_to_sender(value: &str) -> Result<SenderRole, RepositoryError> {
    match value {
        "user" => Ok(SenderRole::User),
        "counterpart" => Ok(SenderRole::Counterpart),
        other => Err(RepositoryError::serialization(format!(
            "unknown sender '{}'",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sender_round_trips_through_column_text() {
        for sender in [SenderRole::User, SenderRole::Counterpart] {
            assert_eq!(str_to_sender(sender_to_str(sender)).unwrap(), sender);
        }
        assert!(str_to_sender("bot").is_err());
    }
}
