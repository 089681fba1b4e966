//! Broker client traits.

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use medinsight_core::AppResult;

use crate::record::{ConsumerRecord, OutboundRecord};

/// Appends records to topics.
#[async_trait]
pub trait MessageProducer: Send + Sync + Debug + 'static {
    /// Append a record and wait for the broker to acknowledge it.
    async fn send(&self, record: OutboundRecord) -> AppResult<()>;
}

/// One member of a consumer group.
///
/// Records of one partition are handed out in offset order. A record stays
/// in flight until it is committed or rewound; while it is in flight the
/// member receives nothing else from that partition.
#[async_trait]
pub trait MessageConsumer: Send + Sync + Debug {
    /// Wait up to `timeout` for the next record.
    async fn poll(&self, timeout: Duration) -> AppResult<Option<ConsumerRecord>>;

    /// Mark `record` and everything before it in its partition as consumed.
    async fn commit(&self, record: &ConsumerRecord) -> AppResult<()>;

    /// Hand `record` out again on the next poll.
    async fn rewind(&self, record: &ConsumerRecord) -> AppResult<()>;
}

/// A broker connection: the factory for producers and group members.
#[async_trait]
pub trait MessageBroker: Send + Sync + Debug + 'static {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// A producer sharing this connection.
    fn producer(&self) -> Arc<dyn MessageProducer>;

    /// Join consumer group `group` subscribed to `topics`.
    async fn subscribe(&self, group: &str, topics: &[String])
    -> AppResult<Box<dyn MessageConsumer>>;

    /// Create any of `topics` that do not exist.
    async fn ensure_topics(&self, topics: &[String]) -> AppResult<()>;

    /// Records currently retained on `topic`, or `None` if the topic does
    /// not exist.
    async fn topic_depth(&self, topic: &str) -> AppResult<Option<u64>>;
}
