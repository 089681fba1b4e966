//! Message broker configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Which broker client carries the event topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrokerProvider {
    /// In-process partitioned log with consumer groups.
    #[default]
    Memory,
    /// Apache Kafka via librdkafka. Requires the `kafka` feature.
    Kafka,
}

/// Broker client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Broker implementation.
    #[serde(default)]
    pub provider: BrokerProvider,
    /// Client identifier reported to the broker.
    #[serde(default = "default_client_id")]
    pub client_id: String,
    /// Partitions created per topic when the broker creates topics itself.
    #[serde(default = "default_partitions")]
    pub partitions: u32,
    /// Create missing topics at startup.
    #[serde(default = "default_true")]
    pub create_topics: bool,
    /// Kafka-specific settings.
    #[serde(default)]
    pub kafka: KafkaConfig,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            provider: BrokerProvider::default(),
            client_id: default_client_id(),
            partitions: default_partitions(),
            create_topics: default_true(),
            kafka: KafkaConfig::default(),
        }
    }
}

/// Kafka client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KafkaConfig {
    /// Comma-separated `host:port` list.
    #[serde(default = "default_bootstrap_servers")]
    pub bootstrap_servers: String,
    /// Where a new consumer group starts reading: `earliest` or `latest`.
    #[serde(default = "default_auto_offset_reset")]
    pub auto_offset_reset: String,
    /// Group session timeout in milliseconds.
    #[serde(default = "default_session_timeout")]
    pub session_timeout_ms: u64,
    /// How long a produce call may wait for the broker acknowledgment.
    #[serde(default = "default_message_timeout")]
    pub message_timeout_ms: u64,
    /// Replication factor used when creating topics.
    #[serde(default = "default_replication")]
    pub replication_factor: i32,
    /// Extra librdkafka properties passed through verbatim.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            bootstrap_servers: default_bootstrap_servers(),
            auto_offset_reset: default_auto_offset_reset(),
            session_timeout_ms: default_session_timeout(),
            message_timeout_ms: default_message_timeout(),
            replication_factor: default_replication(),
            properties: BTreeMap::new(),
        }
    }
}

fn default_client_id() -> String {
    "medinsight".to_string()
}

fn default_partitions() -> u32 {
    3
}

fn default_true() -> bool {
    true
}

fn default_bootstrap_servers() -> String {
    "localhost:9092".to_string()
}

fn default_auto_offset_reset() -> String {
    "earliest".to_string()
}

fn default_session_timeout() -> u64 {
    6000
}

fn default_message_timeout() -> u64 {
    5000
}

fn default_replication() -> i32 {
    1
}
