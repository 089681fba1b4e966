//! Audit events from publish to persisted audit log.

mod helpers;

use uuid::Uuid;

use helpers::{TestApp, eventually, fast_config};
use medinsight_broker::record::{HEADER_EXCEPTION_MESSAGE, HEADER_ORIGINAL_TOPIC};
use medinsight_core::config::DeliveryMode;
use medinsight_core::events::{AuditAction, AuditEvent};
use medinsight_core::types::PageRequest;
use medinsight_entity::audit::AuditLogFilter;

#[tokio::test]
async fn test_published_event_is_persisted_unchanged() {
    let mut t = TestApp::start(fast_config(DeliveryMode::Outbox)).await;
    let actor = Uuid::new_v4();
    let event = AuditEvent::new(AuditAction::Delete, "Patient", "42")
        .with_actor(actor, "dr.house")
        .with_origin("10.1.2.3", "Mozilla/5.0")
        .with_change("reason", "duplicate record");

    t.app.publisher().publish_audit_event(event.clone()).await;

    let audit = t.app.audit().clone();
    assert!(eventually(|| async { audit.count().await.unwrap() == 1 }).await);

    let page = audit
        .by_actor(actor, &PageRequest::default())
        .await
        .unwrap();
    assert_eq!(page.total_items, 1);
    let log = &page.items[0];
    assert_eq!(log.action, AuditAction::Delete);
    assert_eq!(log.entity_type, "Patient");
    assert_eq!(log.entity_id, "42");
    assert_eq!(log.actor_name.as_deref(), Some("dr.house"));
    assert_eq!(log.ip_address.as_deref(), Some("10.1.2.3"));
    assert_eq!(log.user_agent.as_deref(), Some("Mozilla/5.0"));
    assert_eq!(log.changes["reason"], "duplicate record");
    assert_eq!(log.timestamp, event.timestamp);

    assert!(t.records("audit-events-dlq").is_empty());
    t.stop().await;
}

#[tokio::test]
async fn test_each_event_yields_exactly_one_log() {
    let mut t = TestApp::start(fast_config(DeliveryMode::Outbox)).await;
    for id in 0..10 {
        let event = AuditEvent::new(AuditAction::Read, "Encounter", id.to_string());
        t.app.publisher().publish_audit_event(event).await;
    }

    let audit = t.app.audit().clone();
    assert!(eventually(|| async { audit.count().await.unwrap() == 10 }).await);

    let filter = AuditLogFilter {
        entity_type: Some("Encounter".into()),
        ..Default::default()
    };
    let page = audit
        .search(&filter, &PageRequest::new(1, 100))
        .await
        .unwrap();
    let mut ids: Vec<String> = page.items.iter().map(|l| l.entity_id.clone()).collect();
    ids.sort_by_key(|id| id.parse::<u32>().unwrap());
    assert_eq!(ids, (0..10).map(|i| i.to_string()).collect::<Vec<_>>());

    // Nothing further arrives after the pipeline is quiet.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert_eq!(audit.count().await.unwrap(), 10);
    t.stop().await;
}

#[tokio::test]
async fn test_malformed_message_goes_to_dlq_without_redelivery() {
    let mut t = TestApp::start(fast_config(DeliveryMode::Outbox)).await;
    t.send_raw("audit-events", Some("Patient:1"), b"{not json").await;

    assert!(eventually(|| async { t.records("audit-events-dlq").len() == 1 }).await);
    let dead = &t.records("audit-events-dlq")[0];
    assert_eq!(dead.payload, b"{not json");
    assert_eq!(dead.key.as_deref(), Some("Patient:1"));
    assert_eq!(dead.header(HEADER_ORIGINAL_TOPIC), Some("audit-events"));
    assert!(dead.header(HEADER_EXCEPTION_MESSAGE).is_some());

    let metrics = t.app.metrics();
    assert_eq!(metrics.redelivered(), 0);
    assert_eq!(metrics.dead_lettered(), 1);
    assert_eq!(t.app.audit().count().await.unwrap(), 0);

    t.stop().await;
    assert_eq!(
        t.broker
            .committed_offset("audit-service-group", "audit-events", 0),
        Some(1)
    );
}

#[tokio::test]
async fn test_invalid_event_is_dead_lettered_and_next_one_still_lands() {
    let mut t = TestApp::start(fast_config(DeliveryMode::Outbox)).await;

    // Well-formed JSON that fails validation: empty entity type.
    let mut bad = serde_json::to_value(AuditEvent::new(AuditAction::Update, "Patient", "1")).unwrap();
    bad["entityType"] = serde_json::Value::String(String::new());
    t.send_raw("audit-events", None, &serde_json::to_vec(&bad).unwrap())
        .await;
    t.app
        .publisher()
        .publish_audit_event(AuditEvent::new(AuditAction::Update, "Patient", "2"))
        .await;

    let audit = t.app.audit().clone();
    assert!(eventually(|| async { audit.count().await.unwrap() == 1 }).await);
    assert!(eventually(|| async { t.records("audit-events-dlq").len() == 1 }).await);
    t.stop().await;
}
