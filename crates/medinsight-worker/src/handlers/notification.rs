//! Sends outbox notifications.

use std::sync::Arc;

use async_trait::async_trait;

use medinsight_core::AppResult;
use medinsight_core::error::ErrorKind;
use medinsight_entity::delivery::{DeliveryTask, NOTIFICATION_DELIVERY};
use medinsight_entity::notification::NotificationStatus;
use medinsight_service::{DeliveryDispatcher, NotificationService, SendError};

use crate::executor::{DeliveryError, TaskHandler};

/// Delivers the notification a task points at and records the outcome.
#[derive(Debug)]
pub struct NotificationDeliveryHandler {
    /// Notification records
    service: Arc<NotificationService>,
    /// Channel senders
    dispatcher: Arc<DeliveryDispatcher>,
}

impl NotificationDeliveryHandler {
    /// Create a new notification delivery handler
    pub fn new(service: Arc<NotificationService>, dispatcher: Arc<DeliveryDispatcher>) -> Self {
        Self {
            service,
            dispatcher,
        }
    }
}

#[async_trait]
impl TaskHandler for NotificationDeliveryHandler {
    fn task_kind(&self) -> &str {
        NOTIFICATION_DELIVERY
    }

    async fn execute(&self, task: &DeliveryTask) -> Result<(), DeliveryError> {
        let notification = match self.service.get(task.notification_id).await {
            Ok(notification) => notification,
            Err(e) if e.kind == ErrorKind::NotFound => {
                return Err(DeliveryError::Permanent(e.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        // A previous attempt may have sent before its claim went stale.
        if notification.status != NotificationStatus::Pending {
            tracing::info!(
                "Notification {} already {}, nothing to deliver",
                notification.id,
                notification.status
            );
            return Ok(());
        }

        self.dispatcher
            .deliver(&notification)
            .await
            .map_err(|e| match e {
                SendError::Permanent(msg) => DeliveryError::Permanent(msg),
                SendError::Transient(msg) => DeliveryError::Transient(msg),
            })?;

        self.service.mark_sent(notification.id).await?;
        Ok(())
    }

    async fn on_give_up(&self, task: &DeliveryTask, error: &str) -> AppResult<()> {
        let notification = self.service.get(task.notification_id).await?;
        if notification.status == NotificationStatus::Pending {
            self.service.mark_failed(notification.id, error).await?;
        }
        Ok(())
    }
}
