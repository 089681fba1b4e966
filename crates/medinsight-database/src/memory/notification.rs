use async_trait::async_trait;
use uuid::Uuid;

use medinsight_core::types::NotificationId;
use medinsight_core::{AppError, AppResult};
use medinsight_entity::delivery::DeliveryTask;
use medinsight_entity::notification::{Notification, NotificationStatus};

use super::MemoryStore;
use crate::store::NotificationStore;

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn insert(&self, notification: &Notification) -> AppResult<()> {
        if self.notifications.contains_key(&notification.id) {
            return Err(AppError::conflict(format!(
                "Notification {} already exists",
                notification.id
            )));
        }
        self.notifications.insert(notification.id, notification.clone());
        Ok(())
    }

    async fn insert_with_task(
        &self,
        notification: &Notification,
        task: &DeliveryTask,
    ) -> AppResult<()> {
        // Hold the task table across both writes so no worker can claim the
        // task before its notification is visible.
        let mut tasks = self.tasks.lock().await;
        if tasks.contains_key(&task.id) {
            return Err(AppError::conflict(format!("Delivery task {} already exists", task.id)));
        }
        NotificationStore::insert(self, notification).await?;
        tasks.insert(task.id, task.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: NotificationId) -> AppResult<Option<Notification>> {
        Ok(self.notifications.get(&id).map(|entry| entry.value().clone()))
    }

    async fn list_by_recipient(
        &self,
        recipient_id: Uuid,
        status: Option<NotificationStatus>,
    ) -> AppResult<Vec<Notification>> {
        let mut found: Vec<Notification> = self
            .notifications
            .iter()
            .filter(|entry| entry.recipient_id == recipient_id)
            .filter(|entry| status.is_none_or(|s| entry.status == s))
            .map(|entry| entry.value().clone())
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn list_by_status(&self, status: NotificationStatus) -> AppResult<Vec<Notification>> {
        let mut found: Vec<Notification> = self
            .notifications
            .iter()
            .filter(|entry| entry.status == status)
            .map(|entry| entry.value().clone())
            .collect();
        found.sort_by(|a, b| a.scheduled_at.cmp(&b.scheduled_at));
        Ok(found)
    }

    async fn update_status(
        &self,
        notification: &Notification,
        expected: NotificationStatus,
    ) -> AppResult<bool> {
        let Some(mut stored) = self.notifications.get_mut(&notification.id) else {
            return Ok(false);
        };
        if stored.status != expected {
            return Ok(false);
        }
        stored.status = notification.status;
        stored.sent_at = notification.sent_at;
        stored.failure_reason = notification.failure_reason.clone();
        stored.updated_at = notification.updated_at;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use medinsight_core::events::{NotificationChannel, NotificationEvent, NotificationType};
    use medinsight_entity::delivery::DeliveryStatus;

    use super::*;
    use crate::store::DeliveryTaskStore;

    fn pending() -> Notification {
        Notification::pending_from_event(&NotificationEvent::new(
            Uuid::new_v4(),
            NotificationType::LabResultReady,
            NotificationChannel::Sms,
            "Lab results",
            "Your results are ready",
        ))
    }

    #[tokio::test]
    async fn test_update_status_is_conditional() {
        let store = MemoryStore::new();
        let mut notification = pending();
        NotificationStore::insert(&store, &notification).await.unwrap();

        notification.transition(NotificationStatus::Sent, None).unwrap();
        assert!(store
            .update_status(&notification, NotificationStatus::Pending)
            .await
            .unwrap());
        // A second writer that still believes the record is pending loses.
        assert!(!store
            .update_status(&notification, NotificationStatus::Pending)
            .await
            .unwrap());

        let stored = NotificationStore::find_by_id(&store, notification.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, NotificationStatus::Sent);
    }

    #[tokio::test]
    async fn test_insert_with_task_stores_both() {
        let store = MemoryStore::new();
        let notification = pending();
        let task = DeliveryTask::for_notification(
            notification.id,
            notification.channel,
            3,
            Utc::now(),
        );
        store.insert_with_task(&notification, &task).await.unwrap();

        assert!(NotificationStore::find_by_id(&store, notification.id)
            .await
            .unwrap()
            .is_some());
        assert_eq!(
            store.count_by_status(DeliveryStatus::Pending).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_list_by_recipient_with_status() {
        let store = MemoryStore::new();
        let first = pending();
        let recipient = first.recipient_id;
        let mut second = pending();
        second.recipient_id = recipient;
        second.transition(NotificationStatus::Failed, None).unwrap();
        NotificationStore::insert(&store, &first).await.unwrap();
        NotificationStore::insert(&store, &second).await.unwrap();

        assert_eq!(store.list_by_recipient(recipient, None).await.unwrap().len(), 2);
        let failed = store
            .list_by_recipient(recipient, Some(NotificationStatus::Failed))
            .await
            .unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].id, second.id);
    }
}
