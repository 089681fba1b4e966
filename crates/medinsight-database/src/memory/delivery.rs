use async_trait::async_trait;
use chrono::{DateTime, Utc};

use medinsight_core::types::DeliveryTaskId;
use medinsight_core::{AppError, AppResult};
use medinsight_entity::delivery::{DeliveryStatus, DeliveryTask};

use super::MemoryStore;
use crate::store::DeliveryTaskStore;

impl MemoryStore {
    async fn update_task(
        &self,
        id: DeliveryTaskId,
        apply: impl FnOnce(&mut DeliveryTask) + Send,
    ) -> AppResult<()> {
        let mut tasks = self.tasks.lock().await;
        let task = tasks
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(format!("Delivery task {id} not found")))?;
        apply(task);
        task.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl DeliveryTaskStore for MemoryStore {
    async fn enqueue(&self, task: &DeliveryTask) -> AppResult<()> {
        self.tasks.lock().await.insert(task.id, task.clone());
        Ok(())
    }

    async fn claim_next(
        &self,
        worker_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<DeliveryTask>> {
        let mut tasks = self.tasks.lock().await;
        let next = tasks
            .values_mut()
            .filter(|task| task.status == DeliveryStatus::Pending && task.run_after <= now)
            .min_by_key(|task| task.run_after);

        Ok(next.map(|task| {
            task.status = DeliveryStatus::Running;
            task.worker_id = Some(worker_id.to_string());
            task.attempts += 1;
            task.updated_at = Utc::now();
            task.clone()
        }))
    }

    async fn find_by_id(&self, id: DeliveryTaskId) -> AppResult<Option<DeliveryTask>> {
        Ok(self.tasks.lock().await.get(&id).cloned())
    }

    async fn complete(&self, id: DeliveryTaskId) -> AppResult<()> {
        self.update_task(id, |task| {
            task.status = DeliveryStatus::Completed;
            task.last_error = None;
        })
        .await
    }

    async fn reschedule(
        &self,
        id: DeliveryTaskId,
        run_after: DateTime<Utc>,
        error: &str,
    ) -> AppResult<()> {
        let error = error.to_string();
        self.update_task(id, move |task| {
            task.status = DeliveryStatus::Pending;
            task.run_after = run_after;
            task.last_error = Some(error);
            task.worker_id = None;
        })
        .await
    }

    async fn fail(&self, id: DeliveryTaskId, error: &str) -> AppResult<()> {
        let error = error.to_string();
        self.update_task(id, move |task| {
            task.status = DeliveryStatus::Failed;
            task.last_error = Some(error);
        })
        .await
    }

    async fn count_by_status(&self, status: DeliveryStatus) -> AppResult<u64> {
        let tasks = self.tasks.lock().await;
        Ok(tasks.values().filter(|task| task.status == status).count() as u64)
    }

    async fn requeue_stale(&self, before: DateTime<Utc>) -> AppResult<u64> {
        let mut tasks = self.tasks.lock().await;
        let mut requeued = 0;
        for task in tasks.values_mut() {
            if task.status == DeliveryStatus::Running && task.updated_at < before {
                task.status = DeliveryStatus::Pending;
                task.worker_id = None;
                task.updated_at = Utc::now();
                requeued += 1;
            }
        }
        Ok(requeued)
    }

    async fn purge_finished(&self, before: DateTime<Utc>) -> AppResult<u64> {
        let mut tasks = self.tasks.lock().await;
        let len = tasks.len();
        tasks.retain(|_, task| !(task.status.is_terminal() && task.updated_at < before));
        Ok((len - tasks.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use medinsight_core::events::NotificationChannel;
    use medinsight_core::types::NotificationId;

    use super::*;

    fn task_due_in(seconds: i64) -> DeliveryTask {
        DeliveryTask::for_notification(
            NotificationId::new(),
            NotificationChannel::Email,
            3,
            Utc::now() + Duration::seconds(seconds),
        )
    }

    #[tokio::test]
    async fn test_claim_skips_tasks_not_yet_due() {
        let store = MemoryStore::new();
        store.enqueue(&task_due_in(60)).await.unwrap();
        assert!(store.claim_next("w1", Utc::now()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_claim_takes_earliest_and_counts_attempt() {
        let store = MemoryStore::new();
        let late = task_due_in(-10);
        let early = task_due_in(-60);
        store.enqueue(&late).await.unwrap();
        store.enqueue(&early).await.unwrap();

        let claimed = store.claim_next("w1", Utc::now()).await.unwrap().unwrap();
        assert_eq!(claimed.id, early.id);
        assert_eq!(claimed.attempts, 1);
        assert_eq!(claimed.status, DeliveryStatus::Running);
        assert_eq!(claimed.worker_id.as_deref(), Some("w1"));

        let second = store.claim_next("w2", Utc::now()).await.unwrap().unwrap();
        assert_eq!(second.id, late.id);
        assert!(store.claim_next("w3", Utc::now()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reschedule_then_requeue_and_purge() {
        let store = MemoryStore::new();
        let task = task_due_in(-1);
        store.enqueue(&task).await.unwrap();
        store.claim_next("w1", Utc::now()).await.unwrap();

        assert_eq!(
            store.requeue_stale(Utc::now() + Duration::seconds(1)).await.unwrap(),
            1
        );
        let claimed = store.claim_next("w2", Utc::now()).await.unwrap().unwrap();
        assert_eq!(claimed.attempts, 2);

        store.complete(task.id).await.unwrap();
        assert_eq!(
            store.purge_finished(Utc::now() + Duration::seconds(1)).await.unwrap(),
            1
        );
        assert!(store.find_by_id(task.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_of_unknown_task_is_not_found() {
        let store = MemoryStore::new();
        let err = store.complete(DeliveryTaskId::new()).await.unwrap_err();
        assert_eq!(err.kind, medinsight_core::error::ErrorKind::NotFound);
    }
}
