//! Notification events through the consumer, the outbox, and the worker.

mod helpers;

use uuid::Uuid;

use helpers::{TestApp, eventually, fast_config};
use medinsight_core::config::DeliveryMode;
use medinsight_core::error::ErrorKind;
use medinsight_core::events::{NotificationChannel, NotificationEvent, NotificationType};
use medinsight_entity::notification::{Notification, NotificationStatus};
use medinsight_service::delivery::{MessageBody, SendError};

fn welcome(recipient: Uuid) -> NotificationEvent {
    NotificationEvent::new(
        recipient,
        NotificationType::PatientWelcome,
        NotificationChannel::Email,
        "Welcome to MedInsight+",
        "Your patient portal account is ready.",
    )
    .with_email("jane.doe@example.com")
}

async fn only_notification(t: &TestApp, recipient: Uuid) -> Option<Notification> {
    let mut items = t
        .app
        .notifications()
        .list_for_recipient(recipient)
        .await
        .unwrap();
    (items.len() == 1).then(|| items.remove(0))
}

async fn status_of(t: &TestApp, recipient: Uuid) -> Option<NotificationStatus> {
    only_notification(t, recipient).await.map(|n| n.status)
}

#[tokio::test]
async fn test_outbox_commits_before_delivery() {
    let mut config = fast_config(DeliveryMode::Outbox);
    config.worker.enabled = false;
    let mut t = TestApp::start(config).await;
    let recipient = Uuid::new_v4();

    t.app
        .publisher()
        .publish_notification_event(welcome(recipient))
        .await;

    assert!(eventually(|| async { status_of(&t, recipient).await.is_some() }).await);
    assert_eq!(status_of(&t, recipient).await, Some(NotificationStatus::Pending));
    assert!(t.sender.sent().is_empty());

    t.stop().await;
    assert_eq!(
        t.broker
            .committed_offset("notification-service-group", "notification-events", 0),
        Some(1)
    );
}

#[tokio::test]
async fn test_outbox_worker_sends_welcome_email() {
    let mut t = TestApp::start(fast_config(DeliveryMode::Outbox)).await;
    let recipient = Uuid::new_v4();

    t.app
        .publisher()
        .publish_notification_event(welcome(recipient))
        .await;

    assert!(
        eventually(|| async { status_of(&t, recipient).await == Some(NotificationStatus::Sent) })
            .await
    );
    let notification = only_notification(&t, recipient).await.unwrap();
    assert!(notification.sent_at.is_some());

    let sent = t.sender.sent();
    assert_eq!(sent.len(), 1);
    let (channel, message) = &sent[0];
    assert_eq!(*channel, NotificationChannel::Email);
    assert_eq!(message.recipient, "jane.doe@example.com");
    assert_eq!(message.notification_id, notification.id);
    match &message.body {
        MessageBody::Html { html, .. } => {
            assert!(html.contains("Welcome to MedInsight+"));
            assert!(html.contains("jane.doe"));
        }
        other => panic!("expected HTML welcome email, got {other:?}"),
    }
    t.stop().await;
}

#[tokio::test]
async fn test_outbox_retries_transient_send_failure() {
    let mut config = fast_config(DeliveryMode::Outbox);
    config.notification.max_delivery_attempts = 1_000;
    let mut t = TestApp::start(config).await;
    t.sender
        .fail_with(Some(SendError::Transient("smtp timeout".into())));
    let recipient = Uuid::new_v4();

    t.app
        .publisher()
        .publish_notification_event(welcome(recipient))
        .await;

    assert!(eventually(|| async { status_of(&t, recipient).await.is_some() }).await);
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert_eq!(status_of(&t, recipient).await, Some(NotificationStatus::Pending));

    t.sender.fail_with(None);
    assert!(
        eventually(|| async { status_of(&t, recipient).await == Some(NotificationStatus::Sent) })
            .await
    );
    assert_eq!(t.sender.sent().len(), 1);
    t.stop().await;
}

#[tokio::test]
async fn test_outbox_permanent_failure_marks_failed() {
    let mut t = TestApp::start(fast_config(DeliveryMode::Outbox)).await;
    let recipient = Uuid::new_v4();
    let event = NotificationEvent::new(
        recipient,
        NotificationType::AppointmentReminder,
        NotificationChannel::Sms,
        "Reminder",
        "Your appointment is tomorrow at 9:00.",
    );

    t.app.publisher().publish_notification_event(event).await;

    assert!(
        eventually(
            || async { status_of(&t, recipient).await == Some(NotificationStatus::Failed) }
        )
        .await
    );
    let notification = only_notification(&t, recipient).await.unwrap();
    assert!(notification.failure_reason.is_some());
    assert!(t.sender.sent().is_empty());
    t.stop().await;
}

#[tokio::test]
async fn test_inline_mode_sends_before_commit() {
    let mut t = TestApp::start(fast_config(DeliveryMode::Inline)).await;
    let recipient = Uuid::new_v4();

    t.app
        .publisher()
        .publish_notification_event(welcome(recipient))
        .await;

    assert!(
        eventually(|| async { status_of(&t, recipient).await == Some(NotificationStatus::Sent) })
            .await
    );
    assert_eq!(t.sender.sent().len(), 1);
    assert!(t.records("notification-events-dlq").is_empty());
    t.stop().await;
}

#[tokio::test]
async fn test_inline_send_failure_marks_failed_and_dead_letters() {
    let mut t = TestApp::start(fast_config(DeliveryMode::Inline)).await;
    t.sender
        .fail_with(Some(SendError::Transient("smtp down".into())));
    let recipient = Uuid::new_v4();

    t.app
        .publisher()
        .publish_notification_event(welcome(recipient))
        .await;

    assert!(eventually(|| async { t.records("notification-events-dlq").len() == 1 }).await);
    assert_eq!(status_of(&t, recipient).await, Some(NotificationStatus::Failed));
    assert_eq!(t.app.metrics().redelivered(), 0);

    let original = &t.records("notification-events")[0];
    let dead = &t.records("notification-events-dlq")[0];
    assert_eq!(dead.key, original.key);
    assert_eq!(dead.payload, original.payload);
    t.stop().await;
}

#[tokio::test]
async fn test_status_never_moves_backward() {
    let mut t = TestApp::start(fast_config(DeliveryMode::Inline)).await;
    let recipient = Uuid::new_v4();

    t.app
        .publisher()
        .publish_notification_event(welcome(recipient))
        .await;
    assert!(
        eventually(|| async { status_of(&t, recipient).await == Some(NotificationStatus::Sent) })
            .await
    );
    let id = only_notification(&t, recipient).await.unwrap().id;
    let notifications = t.app.notifications();

    let err = notifications.mark_failed(id, "late failure").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Conflict);
    let err = notifications.mark_sent(id).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Conflict);

    let delivered = notifications.mark_delivered(id).await.unwrap();
    assert_eq!(delivered.status, NotificationStatus::Delivered);
    t.stop().await;
}
