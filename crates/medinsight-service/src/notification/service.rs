//! Notification records and their status transitions.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use medinsight_core::events::NotificationEvent;
use medinsight_core::types::NotificationId;
use medinsight_core::{AppError, AppResult};
use medinsight_database::NotificationStore;
use medinsight_entity::delivery::DeliveryTask;
use medinsight_entity::notification::{Notification, NotificationStatus};

/// Owns notification records. Every status change goes through the
/// status machine and a compare-and-set on the stored status.
#[derive(Debug, Clone)]
pub struct NotificationService {
    /// Notification store.
    store: Arc<dyn NotificationStore>,
}

impl NotificationService {
    /// Creates a new notification service.
    pub fn new(store: Arc<dyn NotificationStore>) -> Self {
        Self { store }
    }

    /// Store a notification as PENDING, whatever status it carried.
    pub async fn create(&self, mut notification: Notification) -> AppResult<Notification> {
        let now = Utc::now();
        notification.status = NotificationStatus::Pending;
        notification.sent_at = None;
        notification.failure_reason = None;
        notification.created_at = now;
        notification.updated_at = now;
        self.store.insert(&notification).await?;
        info!(
            notification_id = %notification.id,
            notification_type = %notification.notification_type,
            "Notification saved"
        );
        Ok(notification)
    }

    /// Store the PENDING record for a consumed event.
    pub async fn create_from_event(&self, event: &NotificationEvent) -> AppResult<Notification> {
        self.create(Notification::pending_from_event(event)).await
    }

    /// Store the PENDING record for a consumed event with the task that
    /// delivers it, due at the notification's schedule.
    pub async fn create_with_delivery(
        &self,
        event: &NotificationEvent,
        max_attempts: i32,
    ) -> AppResult<(Notification, DeliveryTask)> {
        let notification = Notification::pending_from_event(event);
        let task = DeliveryTask::for_notification(
            notification.id,
            notification.channel,
            max_attempts.max(1),
            notification.scheduled_at,
        );
        self.store.insert_with_task(&notification, &task).await?;
        info!(
            notification_id = %notification.id,
            task_id = %task.id,
            run_after = %task.run_after,
            "Notification saved, delivery queued"
        );
        Ok((notification, task))
    }

    /// Fetch one notification.
    pub async fn get(&self, id: NotificationId) -> AppResult<Notification> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Notification {id} not found")))
    }

    /// All notifications for a recipient, newest first.
    pub async fn list_for_recipient(&self, recipient_id: Uuid) -> AppResult<Vec<Notification>> {
        self.store.list_by_recipient(recipient_id, None).await
    }

    /// A recipient's notifications in one status.
    pub async fn list_for_recipient_with_status(
        &self,
        recipient_id: Uuid,
        status: NotificationStatus,
    ) -> AppResult<Vec<Notification>> {
        self.store.list_by_recipient(recipient_id, Some(status)).await
    }

    /// Notifications still waiting to be sent.
    pub async fn list_pending(&self) -> AppResult<Vec<Notification>> {
        self.store.list_by_status(NotificationStatus::Pending).await
    }

    /// PENDING -> SENT.
    pub async fn mark_sent(&self, id: NotificationId) -> AppResult<Notification> {
        self.transition(id, NotificationStatus::Sent, None).await
    }

    /// SENT -> DELIVERED.
    pub async fn mark_delivered(&self, id: NotificationId) -> AppResult<Notification> {
        self.transition(id, NotificationStatus::Delivered, None).await
    }

    /// PENDING -> FAILED.
    pub async fn mark_failed(
        &self,
        id: NotificationId,
        reason: impl Into<String>,
    ) -> AppResult<Notification> {
        self.transition(id, NotificationStatus::Failed, Some(reason.into()))
            .await
    }

    async fn transition(
        &self,
        id: NotificationId,
        next: NotificationStatus,
        reason: Option<String>,
    ) -> AppResult<Notification> {
        let mut notification = self.get(id).await?;
        let expected = notification.status;
        notification.transition(next, reason)?;

        if !self.store.update_status(&notification, expected).await? {
            warn!(notification_id = %id, "Notification changed while transitioning");
            return Err(AppError::conflict(format!(
                "Notification {id} was modified concurrently"
            )));
        }
        info!(notification_id = %id, from = %expected, to = %next, "Notification status changed");
        Ok(notification)
    }
}
