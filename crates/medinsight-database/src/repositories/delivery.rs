//! Delivery task repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres};

use medinsight_core::error::{AppError, ErrorKind};
use medinsight_core::result::AppResult;
use medinsight_core::types::DeliveryTaskId;
use medinsight_entity::delivery::{DeliveryStatus, DeliveryTask};

use crate::store::DeliveryTaskStore;

/// Repository for outbox delivery tasks.
#[derive(Debug, Clone)]
pub struct DeliveryTaskRepository {
    pool: PgPool,
}

impl DeliveryTaskRepository {
    /// Create a new delivery task repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Insert statement shared with the notification repository's transaction.
pub(crate) fn insert_task(
    task: &DeliveryTask,
) -> sqlx::query::Query<'_, Postgres, sqlx::postgres::PgArguments> {
    sqlx::query(
        "INSERT INTO delivery_tasks (id, task_kind, notification_id, channel, status, attempts, \
         max_attempts, run_after, last_error, worker_id, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
    )
    .bind(task.id)
    .bind(&task.task_kind)
    .bind(task.notification_id)
    .bind(task.channel)
    .bind(task.status)
    .bind(task.attempts)
    .bind(task.max_attempts)
    .bind(task.run_after)
    .bind(&task.last_error)
    .bind(&task.worker_id)
    .bind(task.created_at)
    .bind(task.updated_at)
}

#[async_trait]
impl DeliveryTaskStore for DeliveryTaskRepository {
    async fn enqueue(&self, task: &DeliveryTask) -> AppResult<()> {
        insert_task(task)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to enqueue delivery task", e))?;
        Ok(())
    }

    async fn claim_next(
        &self,
        worker_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<DeliveryTask>> {
        sqlx::query_as::<_, DeliveryTask>(
            "UPDATE delivery_tasks SET status = 'running', worker_id = $1, \
             attempts = attempts + 1, updated_at = NOW() \
             WHERE id = ( \
                SELECT id FROM delivery_tasks \
                WHERE status = 'pending' AND run_after <= $2 \
                ORDER BY run_after ASC \
                FOR UPDATE SKIP LOCKED \
                LIMIT 1 \
             ) RETURNING *",
        )
        .bind(worker_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to claim delivery task", e))
    }

    async fn find_by_id(&self, id: DeliveryTaskId) -> AppResult<Option<DeliveryTask>> {
        sqlx::query_as::<_, DeliveryTask>("SELECT * FROM delivery_tasks WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find delivery task", e))
    }

    async fn complete(&self, id: DeliveryTaskId) -> AppResult<()> {
        sqlx::query(
            "UPDATE delivery_tasks SET status = 'completed', last_error = NULL, \
             updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to complete delivery task", e))?;
        Ok(())
    }

    async fn reschedule(
        &self,
        id: DeliveryTaskId,
        run_after: DateTime<Utc>,
        error: &str,
    ) -> AppResult<()> {
        sqlx::query(
            "UPDATE delivery_tasks SET status = 'pending', run_after = $2, last_error = $3, \
             worker_id = NULL, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(run_after)
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to reschedule delivery task", e))?;
        Ok(())
    }

    async fn fail(&self, id: DeliveryTaskId, error: &str) -> AppResult<()> {
        sqlx::query(
            "UPDATE delivery_tasks SET status = 'failed', last_error = $2, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to fail delivery task", e))?;
        Ok(())
    }

    async fn count_by_status(&self, status: DeliveryStatus) -> AppResult<u64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM delivery_tasks WHERE status = $1")
            .bind(status)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count delivery tasks", e))?;
        Ok(total as u64)
    }

    async fn requeue_stale(&self, before: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE delivery_tasks SET status = 'pending', worker_id = NULL, updated_at = NOW() \
             WHERE status = 'running' AND updated_at < $1",
        )
        .bind(before)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to requeue stale tasks", e))?;
        Ok(result.rows_affected())
    }

    async fn purge_finished(&self, before: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            "DELETE FROM delivery_tasks WHERE status IN ('completed', 'failed') AND updated_at < $1",
        )
        .bind(before)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to purge delivery tasks", e))?;
        Ok(result.rows_affected())
    }
}
