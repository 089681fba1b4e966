//! Notification repository implementation.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use medinsight_core::error::{AppError, ErrorKind};
use medinsight_core::result::AppResult;
use medinsight_core::types::NotificationId;
use medinsight_entity::delivery::DeliveryTask;
use medinsight_entity::notification::{Notification, NotificationStatus};

use super::delivery::insert_task;
use crate::store::NotificationStore;

/// Repository for notification records.
#[derive(Debug, Clone)]
pub struct NotificationRepository {
    pool: PgPool,
}

impl NotificationRepository {
    /// Create a new notification repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const INSERT_SQL: &str = "INSERT INTO notifications (id, recipient_id, recipient_email, \
    recipient_phone, notification_type, channel, subject, message, status, scheduled_at, \
    sent_at, failure_reason, created_at, updated_at) \
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)";

fn insert_query(
    n: &Notification,
) -> sqlx::query::Query<'_, Postgres, sqlx::postgres::PgArguments> {
    sqlx::query(INSERT_SQL)
        .bind(n.id)
        .bind(n.recipient_id)
        .bind(&n.recipient_email)
        .bind(&n.recipient_phone)
        .bind(n.notification_type)
        .bind(n.channel)
        .bind(&n.subject)
        .bind(&n.message)
        .bind(n.status)
        .bind(n.scheduled_at)
        .bind(n.sent_at)
        .bind(&n.failure_reason)
        .bind(n.created_at)
        .bind(n.updated_at)
}

#[async_trait]
impl NotificationStore for NotificationRepository {
    async fn insert(&self, notification: &Notification) -> AppResult<()> {
        insert_query(notification)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to insert notification", e))?;
        Ok(())
    }

    async fn insert_with_task(
        &self,
        notification: &Notification,
        task: &DeliveryTask,
    ) -> AppResult<()> {
        let mut tx: Transaction<'_, Postgres> = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to begin transaction", e))?;

        insert_query(notification)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to insert notification", e))?;
        insert_task(task)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to insert delivery task", e))?;

        tx.commit()
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to commit notification", e))
    }

    async fn find_by_id(&self, id: NotificationId) -> AppResult<Option<Notification>> {
        sqlx::query_as::<_, Notification>("SELECT * FROM notifications WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find notification", e))
    }

    async fn list_by_recipient(
        &self,
        recipient_id: Uuid,
        status: Option<NotificationStatus>,
    ) -> AppResult<Vec<Notification>> {
        sqlx::query_as::<_, Notification>(
            "SELECT * FROM notifications WHERE recipient_id = $1 \
             AND ($2::notification_status IS NULL OR status = $2) \
             ORDER BY created_at DESC",
        )
        .bind(recipient_id)
        .bind(status)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list notifications", e))
    }

    async fn list_by_status(&self, status: NotificationStatus) -> AppResult<Vec<Notification>> {
        sqlx::query_as::<_, Notification>(
            "SELECT * FROM notifications WHERE status = $1 ORDER BY scheduled_at ASC",
        )
        .bind(status)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list notifications", e))
    }

    async fn update_status(
        &self,
        notification: &Notification,
        expected: NotificationStatus,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE notifications SET status = $2, sent_at = $3, failure_reason = $4, updated_at = $5 \
             WHERE id = $1 AND status = $6",
        )
        .bind(notification.id)
        .bind(notification.status)
        .bind(notification.sent_at)
        .bind(&notification.failure_reason)
        .bind(notification.updated_at)
        .bind(expected)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to update notification", e))?;
        Ok(result.rows_affected() == 1)
    }
}
