//! Consumer of the notification event topic.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use medinsight_broker::{ConsumerRecord, ListenerError, RecordHandler};
use medinsight_core::config::DeliveryMode;
use medinsight_core::events::{NotificationEvent, PipelineEvent};

use super::service::NotificationService;
use crate::delivery::DeliveryDispatcher;

/// Persists each notification event and gets it delivered.
///
/// In outbox mode the PENDING record and its delivery task are written
/// together and the offset commits at once. In inline mode the send happens
/// here; a failed send leaves the record FAILED and dead-letters the event.
#[derive(Debug, Clone)]
pub struct NotificationEventHandler {
    service: Arc<NotificationService>,
    dispatcher: Arc<DeliveryDispatcher>,
    mode: DeliveryMode,
    max_delivery_attempts: i32,
}

impl NotificationEventHandler {
    /// Create a handler.
    pub fn new(
        service: Arc<NotificationService>,
        dispatcher: Arc<DeliveryDispatcher>,
        mode: DeliveryMode,
        max_delivery_attempts: i32,
    ) -> Self {
        Self {
            service,
            dispatcher,
            mode,
            max_delivery_attempts,
        }
    }

    async fn deliver_inline(&self, event: &NotificationEvent) -> Result<(), ListenerError> {
        let notification = self.service.create_from_event(event).await?;

        let failure = match self.dispatcher.deliver(&notification).await {
            Ok(()) => match self.service.mark_sent(notification.id).await {
                Ok(_) => return Ok(()),
                Err(e) => e.to_string(),
            },
            Err(e) => e.to_string(),
        };

        error!(
            notification_id = %notification.id,
            error = %failure,
            "Failed to send notification"
        );
        if let Err(e) = self.service.mark_failed(notification.id, failure.clone()).await {
            error!(
                notification_id = %notification.id,
                error = %e,
                "Failed to mark notification FAILED"
            );
        }
        // The record already exists; a redelivery would store a duplicate.
        Err(ListenerError::Rejected(failure))
    }
}

#[async_trait]
impl RecordHandler for NotificationEventHandler {
    fn name(&self) -> &'static str {
        "notification"
    }

    async fn handle(&self, record: &ConsumerRecord) -> Result<(), ListenerError> {
        let event = NotificationEvent::from_payload(&record.payload)?;
        info!(
            notification_type = %event.notification_type,
            channel = %event.channel,
            recipient_id = %event.recipient_id,
            "Consumed notification event"
        );

        match self.mode {
            DeliveryMode::Outbox => {
                self.service
                    .create_with_delivery(&event, self.max_delivery_attempts)
                    .await?;
                Ok(())
            }
            DeliveryMode::Inline => self.deliver_inline(&event).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use chrono::Utc;
    use uuid::Uuid;

    use medinsight_core::config::NotificationConfig;
    use medinsight_core::events::{NotificationChannel, NotificationType};
    use medinsight_core::types::NotificationId;
    use medinsight_core::{AppError, AppResult};
    use medinsight_database::{NotificationStore, Stores};
    use medinsight_entity::delivery::{DeliveryStatus, DeliveryTask};
    use medinsight_entity::notification::{Notification, NotificationStatus};

    use super::*;
    use crate::delivery::{ChannelSender, OutgoingMessage, SendError};

    #[derive(Debug)]
    struct FailingEmail;

    #[async_trait]
    impl ChannelSender for FailingEmail {
        fn channel(&self) -> NotificationChannel {
            NotificationChannel::Email
        }

        async fn send(&self, _message: &OutgoingMessage) -> Result<(), SendError> {
            Err(SendError::Transient("smtp down".into()))
        }
    }

    /// Fails the first status update, then behaves like the inner store.
    #[derive(Debug)]
    struct FirstUpdateFails {
        inner: Arc<dyn NotificationStore>,
        failed: AtomicBool,
    }

    #[async_trait]
    impl NotificationStore for FirstUpdateFails {
        async fn insert(&self, notification: &Notification) -> AppResult<()> {
            self.inner.insert(notification).await
        }

        async fn insert_with_task(
            &self,
            notification: &Notification,
            task: &DeliveryTask,
        ) -> AppResult<()> {
            self.inner.insert_with_task(notification, task).await
        }

        async fn find_by_id(&self, id: NotificationId) -> AppResult<Option<Notification>> {
            self.inner.find_by_id(id).await
        }

        async fn list_by_recipient(
            &self,
            recipient_id: Uuid,
            status: Option<NotificationStatus>,
        ) -> AppResult<Vec<Notification>> {
            self.inner.list_by_recipient(recipient_id, status).await
        }

        async fn list_by_status(&self, status: NotificationStatus) -> AppResult<Vec<Notification>> {
            self.inner.list_by_status(status).await
        }

        async fn update_status(
            &self,
            notification: &Notification,
            expected: NotificationStatus,
        ) -> AppResult<bool> {
            if !self.failed.swap(true, Ordering::SeqCst) {
                return Err(AppError::database("write failed"));
            }
            self.inner.update_status(notification, expected).await
        }
    }

    fn record(event: &NotificationEvent) -> ConsumerRecord {
        ConsumerRecord {
            topic: "notification-events".into(),
            partition: 0,
            offset: 0,
            key: Some(event.recipient_id.to_string()),
            payload: event.to_payload().unwrap(),
            headers: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    fn welcome(recipient: Uuid) -> NotificationEvent {
        NotificationEvent::new(
            recipient,
            NotificationType::PatientWelcome,
            NotificationChannel::Email,
            "Welcome",
            "Glad to have you",
        )
        .with_email("new.patient@example.com")
    }

    fn handler(stores: &Stores, dispatcher: DeliveryDispatcher, mode: DeliveryMode) -> NotificationEventHandler {
        NotificationEventHandler::new(
            Arc::new(NotificationService::new(stores.notifications.clone())),
            Arc::new(dispatcher),
            mode,
            3,
        )
    }

    #[tokio::test]
    async fn test_inline_success_marks_sent() {
        let stores = Stores::memory();
        let dispatcher = DeliveryDispatcher::from_config(
            &NotificationConfig::default(),
            &Default::default(),
        );
        let handler = handler(&stores, dispatcher, DeliveryMode::Inline);
        let recipient = Uuid::new_v4();

        handler.handle(&record(&welcome(recipient))).await.unwrap();

        let stored = stores.notifications.list_by_recipient(recipient, None).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].status, NotificationStatus::Sent);
        assert!(stored[0].sent_at.is_some());
    }

    #[tokio::test]
    async fn test_inline_failure_marks_failed_and_rejects() {
        let stores = Stores::memory();
        let dispatcher =
            DeliveryDispatcher::new(&NotificationConfig::default()).with_sender(Arc::new(FailingEmail));
        let handler = handler(&stores, dispatcher, DeliveryMode::Inline);
        let recipient = Uuid::new_v4();

        let err = handler.handle(&record(&welcome(recipient))).await.unwrap_err();
        assert!(matches!(err, ListenerError::Rejected(_)));

        let stored = stores.notifications.list_by_recipient(recipient, None).await.unwrap();
        assert_eq!(stored[0].status, NotificationStatus::Failed);
        assert!(stored[0].failure_reason.as_deref().unwrap_or_default().contains("smtp down"));
    }

    #[tokio::test]
    async fn test_inline_store_failure_after_send_marks_failed_and_rejects() {
        let stores = Stores::memory();
        let flaky: Arc<dyn NotificationStore> = Arc::new(FirstUpdateFails {
            inner: stores.notifications.clone(),
            failed: AtomicBool::new(false),
        });
        let handler = NotificationEventHandler::new(
            Arc::new(NotificationService::new(flaky)),
            Arc::new(DeliveryDispatcher::from_config(
                &NotificationConfig::default(),
                &Default::default(),
            )),
            DeliveryMode::Inline,
            3,
        );
        let recipient = Uuid::new_v4();

        let err = handler.handle(&record(&welcome(recipient))).await.unwrap_err();
        match err {
            ListenerError::Rejected(reason) => assert!(reason.contains("write failed")),
            other => panic!("expected Rejected, got {other:?}"),
        }

        let stored = stores.notifications.list_by_recipient(recipient, None).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].status, NotificationStatus::Failed);
        assert!(stored[0].sent_at.is_none());
    }

    #[tokio::test]
    async fn test_outbox_queues_without_sending() {
        let stores = Stores::memory();
        let dispatcher =
            DeliveryDispatcher::new(&NotificationConfig::default()).with_sender(Arc::new(FailingEmail));
        let handler = handler(&stores, dispatcher, DeliveryMode::Outbox);
        let recipient = Uuid::new_v4();

        handler.handle(&record(&welcome(recipient))).await.unwrap();

        let stored = stores.notifications.list_by_recipient(recipient, None).await.unwrap();
        assert_eq!(stored[0].status, NotificationStatus::Pending);
        assert_eq!(
            stores.deliveries.count_by_status(DeliveryStatus::Pending).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_unknown_channel_is_malformed() {
        let stores = Stores::memory();
        let handler = handler(
            &stores,
            DeliveryDispatcher::new(&NotificationConfig::default()),
            DeliveryMode::Outbox,
        );
        let mut bad = record(&welcome(Uuid::new_v4()));
        bad.payload = String::from_utf8(bad.payload)
            .unwrap()
            .replace("\"EMAIL\"", "\"FAX\"")
            .into_bytes();

        let err = handler.handle(&bad).await.unwrap_err();
        assert!(matches!(err, ListenerError::Malformed(_)));
    }
}
