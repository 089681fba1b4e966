//! Delivery queue over the outbox task store.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use medinsight_core::AppResult;
use medinsight_core::types::DeliveryTaskId;
use medinsight_database::DeliveryTaskStore;
use medinsight_entity::delivery::{DeliveryStatus, DeliveryTask};

/// Queue of delivery tasks claimed by one worker.
#[derive(Debug, Clone)]
pub struct DeliveryQueue {
    /// Task store
    store: Arc<dyn DeliveryTaskStore>,
    /// Worker identifier for claiming tasks
    worker_id: String,
}

impl DeliveryQueue {
    /// Create a new delivery queue
    pub fn new(store: Arc<dyn DeliveryTaskStore>, worker_id: impl Into<String>) -> Self {
        Self {
            store,
            worker_id: worker_id.into(),
        }
    }

    /// The identifier stamped on claimed tasks
    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Enqueue a task
    pub async fn enqueue(&self, task: &DeliveryTask) -> AppResult<()> {
        self.store.enqueue(task).await?;
        tracing::debug!(
            "Enqueued task: id={}, kind='{}', run_after={}",
            task.id,
            task.task_kind,
            task.run_after
        );
        Ok(())
    }

    /// Claim the next due task
    pub async fn dequeue(&self) -> AppResult<Option<DeliveryTask>> {
        let task = self.store.claim_next(&self.worker_id, Utc::now()).await?;
        if let Some(task) = &task {
            tracing::debug!(
                "Dequeued task: id={}, kind='{}', attempt={}/{}",
                task.id,
                task.task_kind,
                task.attempts,
                task.max_attempts
            );
        }
        Ok(task)
    }

    /// Mark a task as completed
    pub async fn complete(&self, id: DeliveryTaskId) -> AppResult<()> {
        self.store.complete(id).await?;
        tracing::debug!("Task completed: id={}", id);
        Ok(())
    }

    /// Hand a task back to the queue, due at `run_after`
    pub async fn reschedule(
        &self,
        id: DeliveryTaskId,
        run_after: DateTime<Utc>,
        error: &str,
    ) -> AppResult<()> {
        self.store.reschedule(id, run_after, error).await?;
        tracing::debug!("Task rescheduled: id={}, run_after={}", id, run_after);
        Ok(())
    }

    /// Mark a task as failed
    pub async fn fail(&self, id: DeliveryTaskId, error: &str) -> AppResult<()> {
        self.store.fail(id, error).await?;
        tracing::debug!("Task failed: id={}, error='{}'", id, error);
        Ok(())
    }

    /// Return tasks stuck in `running` since before `before` to the queue
    pub async fn requeue_stale(&self, before: DateTime<Utc>) -> AppResult<u64> {
        self.store.requeue_stale(before).await
    }

    /// Delete finished tasks last touched before `before`
    pub async fn purge_finished(&self, before: DateTime<Utc>) -> AppResult<u64> {
        self.store.purge_finished(before).await
    }

    /// Get queue statistics
    pub async fn stats(&self) -> AppResult<QueueStats> {
        Ok(QueueStats {
            pending: self.store.count_by_status(DeliveryStatus::Pending).await?,
            running: self.store.count_by_status(DeliveryStatus::Running).await?,
            completed: self.store.count_by_status(DeliveryStatus::Completed).await?,
            failed: self.store.count_by_status(DeliveryStatus::Failed).await?,
            worker_id: self.worker_id.clone(),
        })
    }
}

/// Queue statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStats {
    /// Number of pending tasks
    pub pending: u64,
    /// Number of running tasks
    pub running: u64,
    /// Number of completed tasks
    pub completed: u64,
    /// Number of failed tasks
    pub failed: u64,
    /// Current worker identifier
    pub worker_id: String,
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use medinsight_core::events::NotificationChannel;
    use medinsight_core::types::NotificationId;
    use medinsight_database::Stores;

    use super::*;

    fn task(run_after: DateTime<Utc>) -> DeliveryTask {
        DeliveryTask::for_notification(NotificationId::new(), NotificationChannel::Sms, 3, run_after)
    }

    #[tokio::test]
    async fn test_future_tasks_are_not_dequeued() {
        let queue = DeliveryQueue::new(Stores::memory().deliveries, "w1");
        queue.enqueue(&task(Utc::now() + Duration::hours(1))).await.unwrap();
        assert!(queue.dequeue().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stats_follow_task_lifecycle() {
        let queue = DeliveryQueue::new(Stores::memory().deliveries, "w1");
        let due = task(Utc::now() - Duration::seconds(1));
        queue.enqueue(&due).await.unwrap();
        queue.enqueue(&task(Utc::now() - Duration::seconds(1))).await.unwrap();

        let claimed = queue.dequeue().await.unwrap().unwrap();
        assert_eq!(claimed.worker_id.as_deref(), Some("w1"));
        assert_eq!(claimed.attempts, 1);

        let stats = queue.stats().await.unwrap();
        assert_eq!((stats.pending, stats.running), (1, 1));

        queue.complete(claimed.id).await.unwrap();
        let next = queue.dequeue().await.unwrap().unwrap();
        queue.fail(next.id, "invalid number").await.unwrap();

        let stats = queue.stats().await.unwrap();
        assert_eq!((stats.pending, stats.running, stats.completed, stats.failed), (0, 0, 1, 1));
    }
}
