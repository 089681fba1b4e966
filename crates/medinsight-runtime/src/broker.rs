//! Broker selection.

use std::sync::Arc;

use tracing::info;

use medinsight_broker::{InMemoryBroker, MessageBroker};
use medinsight_core::AppResult;
use medinsight_core::config::{BrokerConfig, BrokerProvider};

/// Open the configured broker client.
pub fn connect_broker(config: &BrokerConfig) -> AppResult<Arc<dyn MessageBroker>> {
    match config.provider {
        BrokerProvider::Memory => {
            info!(partitions = config.partitions, "Using in-memory broker");
            Ok(Arc::new(InMemoryBroker::new(config.partitions)))
        }
        BrokerProvider::Kafka => connect_kafka(config),
    }
}

#[cfg(feature = "kafka")]
fn connect_kafka(config: &BrokerConfig) -> AppResult<Arc<dyn MessageBroker>> {
    info!(
        bootstrap_servers = %config.kafka.bootstrap_servers,
        "Connecting to Kafka"
    );
    Ok(Arc::new(medinsight_broker::kafka::KafkaBroker::connect(config)?))
}

#[cfg(not(feature = "kafka"))]
fn connect_kafka(_config: &BrokerConfig) -> AppResult<Arc<dyn MessageBroker>> {
    Err(medinsight_core::AppError::configuration(
        "broker.provider = \"kafka\" requires building with the `kafka` feature",
    ))
}
