//! Poison message repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use medinsight_core::error::{AppError, ErrorKind};
use medinsight_core::result::AppResult;
use medinsight_core::types::{PageRequest, PageResponse, PoisonMessageId};
use medinsight_entity::dead_letter::PoisonMessage;

use crate::store::PoisonMessageStore;

/// Repository for quarantined broker records.
#[derive(Debug, Clone)]
pub struct PoisonMessageRepository {
    pool: PgPool,
}

impl PoisonMessageRepository {
    /// Create a new poison message repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PoisonMessageStore for PoisonMessageRepository {
    async fn insert(&self, message: &PoisonMessage) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO poison_messages (id, source_topic, source_partition, source_offset, \
             message_key, payload, error, attempts, quarantined_at, replayed_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(message.id)
        .bind(&message.source_topic)
        .bind(message.source_partition)
        .bind(message.source_offset)
        .bind(&message.message_key)
        .bind(&message.payload)
        .bind(&message.error)
        .bind(message.attempts)
        .bind(message.quarantined_at)
        .bind(message.replayed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to insert poison message", e))?;
        Ok(())
    }

    async fn find_by_id(&self, id: PoisonMessageId) -> AppResult<Option<PoisonMessage>> {
        sqlx::query_as::<_, PoisonMessage>("SELECT * FROM poison_messages WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find poison message", e))
    }

    async fn list(&self, page: &PageRequest) -> AppResult<PageResponse<PoisonMessage>> {
        let total = self.count().await?;
        let items = sqlx::query_as::<_, PoisonMessage>(
            "SELECT * FROM poison_messages ORDER BY quarantined_at DESC LIMIT $1 OFFSET $2",
        )
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list poison messages", e))?;
        Ok(PageResponse::new(items, page, total))
    }

    async fn count(&self) -> AppResult<u64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM poison_messages")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count poison messages", e))?;
        Ok(total as u64)
    }

    async fn mark_replayed(&self, id: PoisonMessageId, at: DateTime<Utc>) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE poison_messages SET replayed_at = $2 WHERE id = $1 AND replayed_at IS NULL",
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to mark poison message replayed", e))?;
        Ok(result.rows_affected() == 1)
    }

    async fn clear_replayed(&self, id: PoisonMessageId) -> AppResult<()> {
        sqlx::query("UPDATE poison_messages SET replayed_at = NULL WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to clear poison message replay", e))?;
        Ok(())
    }
}
