//! Dead-letter routing, poison quarantine, and replay.

mod helpers;

use std::sync::Arc;

use uuid::Uuid;

use helpers::{DlqDownBroker, TestApp, eventually, fast_config};
use medinsight_broker::InMemoryBroker;
use medinsight_broker::record::{HEADER_EXCEPTION_MESSAGE, HEADER_ORIGINAL_TOPIC};
use medinsight_core::config::DeliveryMode;
use medinsight_core::events::{NotificationChannel, NotificationEvent, NotificationType};
use medinsight_entity::notification::NotificationStatus;
use medinsight_service::delivery::SendError;
use medinsight_core::error::ErrorKind;
use medinsight_core::types::PageRequest;
use medinsight_entity::audit::AlertSeverity;
use medinsight_service::quarantine::POISON_MESSAGE_ALERT;

async fn start_with_dlq_down() -> TestApp {
    start_with_dlq_down_in(DeliveryMode::Outbox).await
}

async fn start_with_dlq_down_in(mode: DeliveryMode) -> TestApp {
    let config = fast_config(mode);
    let broker = Arc::new(InMemoryBroker::new(config.broker.partitions));
    let pipeline = Arc::new(DlqDownBroker {
        inner: broker.clone(),
    });
    TestApp::start_with_broker(config, broker, pipeline).await
}

async fn quarantined(t: &TestApp) -> u64 {
    t.app.dlq().stats().await.unwrap().quarantined_messages
}

#[tokio::test]
async fn test_unreachable_dlq_poisons_record_after_bounded_attempts() {
    let mut t = start_with_dlq_down().await;

    t.send_raw("audit-events", Some("k-1"), b"not json").await;

    assert!(eventually(|| async { quarantined(&t).await == 1 }).await);
    assert_eq!(t.app.metrics().poisoned(), 1);
    // Two failed sends were retried in place before the third gave up.
    assert_eq!(t.app.metrics().dead_letter_retries(), 2);
    assert_eq!(t.app.metrics().redelivered(), 0);
    assert!(t.records("audit-events-dlq").is_empty());

    let page = t.app.dlq().list(&PageRequest::new(1, 10)).await.unwrap();
    assert_eq!(page.items.len(), 1);
    let poison = &page.items[0];
    assert_eq!(poison.source_topic, "audit-events");
    assert_eq!(poison.source_offset, 0);
    assert_eq!(poison.message_key.as_deref(), Some("k-1"));
    assert_eq!(poison.payload, b"not json");
    assert_eq!(poison.attempts, 3);
    assert!(poison.replayed_at.is_none());

    let alerts = t
        .app
        .audit()
        .list_alerts(Some(AlertSeverity::Critical), Some(false))
        .await
        .unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].alert_type, POISON_MESSAGE_ALERT);

    t.stop().await;
    assert_eq!(
        t.broker
            .committed_offset("audit-service-group", "audit-events", 0),
        Some(1)
    );
}

#[tokio::test]
async fn test_poisoned_record_does_not_block_partition() {
    let mut t = start_with_dlq_down().await;

    t.send_raw("audit-events", None, b"{\"action\":").await;
    let valid = serde_json::json!({
        "action": "LOGIN",
        "entityType": "USER",
        "entityId": "u-7",
        "timestamp": "2025-03-01T10:00:00Z"
    });
    t.send_raw("audit-events", None, valid.to_string().as_bytes())
        .await;

    assert!(eventually(|| async { t.app.audit().count().await.unwrap() == 1 }).await);
    assert_eq!(quarantined(&t).await, 1);
    t.stop().await;
}

#[tokio::test]
async fn test_replay_returns_record_to_source_topic_once() {
    let mut t = start_with_dlq_down().await;

    t.send_raw("notification-events", Some("r-1"), b"{}").await;
    assert!(eventually(|| async { quarantined(&t).await == 1 }).await);

    let dlq = t.app.dlq();
    let id = dlq.list(&PageRequest::new(1, 10)).await.unwrap().items[0].id;
    let replayed = dlq.replay(id).await.unwrap();
    assert!(replayed.replayed_at.is_some());

    let records = t.records("notification-events");
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].key.as_deref(), Some("r-1"));
    assert_eq!(records[1].payload, b"{}");

    let err = dlq.replay(id).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Conflict);

    // The replayed copy fails the same way and is quarantined again.
    assert!(eventually(|| async { quarantined(&t).await == 2 }).await);
    t.stop().await;
}

#[tokio::test]
async fn test_dead_lettered_record_carries_failure_headers() {
    let mut t = TestApp::start(fast_config(DeliveryMode::Outbox)).await;

    t.send_raw("notification-events", Some("r-2"), b"[1, 2, 3]").await;

    assert!(eventually(|| async { t.records("notification-events-dlq").len() == 1 }).await);
    let dead = &t.records("notification-events-dlq")[0];
    assert_eq!(dead.key.as_deref(), Some("r-2"));
    assert_eq!(dead.header(HEADER_ORIGINAL_TOPIC), Some("notification-events"));
    assert!(dead.header(HEADER_EXCEPTION_MESSAGE).is_some());
    assert_eq!(quarantined(&t).await, 0);
    assert_eq!(t.app.metrics().dead_lettered(), 1);
    t.stop().await;
}

#[tokio::test]
async fn test_failed_inline_send_is_stored_once_when_dlq_is_down() {
    let mut t = start_with_dlq_down_in(DeliveryMode::Inline).await;
    t.sender
        .fail_with(Some(SendError::Transient("smtp down".into())));
    let recipient = Uuid::new_v4();
    let event = NotificationEvent::new(
        recipient,
        NotificationType::LabResultReady,
        NotificationChannel::Email,
        "Lab results",
        "Your results are available.",
    )
    .with_email("pat@example.com");

    t.app.publisher().publish_notification_event(event).await;

    assert!(eventually(|| async { quarantined(&t).await == 1 }).await);
    let stored = t
        .app
        .notifications()
        .list_for_recipient(recipient)
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].status, NotificationStatus::Failed);
    assert_eq!(t.sender.sent().len(), 0);
    t.stop().await;
}
