//! Kafka broker client built on librdkafka.
//!
//! Offsets are committed manually after each record is handled, so a
//! crash redelivers the record that was in flight.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{BaseConsumer, CommitMode, Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::{BorrowedMessage, Header, Headers, Message, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::types::RDKafkaErrorCode;
use rdkafka::util::Timeout;
use rdkafka::{Offset, TopicPartitionList};
use tracing::{info, warn};

use medinsight_core::config::BrokerConfig;
use medinsight_core::error::{AppError, ErrorKind};
use medinsight_core::AppResult;

use crate::record::{ConsumerRecord, OutboundRecord};
use crate::traits::{MessageBroker, MessageConsumer, MessageProducer};

const METADATA_TIMEOUT: Duration = Duration::from_secs(5);

fn kafka_error(message: &str, err: KafkaError) -> AppError {
    AppError::with_source(ErrorKind::Broker, format!("{message}: {err}"), err)
}

/// Connection settings shared by every client this broker creates.
#[derive(Clone)]
pub struct KafkaBroker {
    config: BrokerConfig,
    producer: Arc<KafkaProducer>,
    admin: Arc<BaseConsumer>,
}

impl std::fmt::Debug for KafkaBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KafkaBroker")
            .field("bootstrap_servers", &self.config.kafka.bootstrap_servers)
            .finish_non_exhaustive()
    }
}

impl KafkaBroker {
    /// Create the producer and the metadata client.
    pub fn connect(config: &BrokerConfig) -> AppResult<Self> {
        info!(
            bootstrap_servers = %config.kafka.bootstrap_servers,
            client_id = %config.client_id,
            "Connecting to Kafka"
        );
        let producer: FutureProducer = base_config(config)
            .set("message.timeout.ms", config.kafka.message_timeout_ms.to_string())
            .create()
            .map_err(|e| kafka_error("Failed to create Kafka producer", e))?;
        let admin: BaseConsumer = base_config(config)
            .create()
            .map_err(|e| kafka_error("Failed to create Kafka metadata client", e))?;

        Ok(Self {
            config: config.clone(),
            producer: Arc::new(KafkaProducer {
                producer,
                timeout: Duration::from_millis(config.kafka.message_timeout_ms),
            }),
            admin: Arc::new(admin),
        })
    }
}

fn base_config(config: &BrokerConfig) -> ClientConfig {
    let mut client = ClientConfig::new();
    client
        .set("bootstrap.servers", &config.kafka.bootstrap_servers)
        .set("client.id", &config.client_id);
    for (key, value) in &config.kafka.properties {
        client.set(key, value);
    }
    client
}

#[async_trait]
impl MessageBroker for KafkaBroker {
    fn name(&self) -> &'static str {
        "kafka"
    }

    fn producer(&self) -> Arc<dyn MessageProducer> {
        self.producer.clone()
    }

    async fn subscribe(
        &self,
        group: &str,
        topics: &[String],
    ) -> AppResult<Box<dyn MessageConsumer>> {
        let consumer: StreamConsumer = base_config(&self.config)
            .set("group.id", group)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", &self.config.kafka.auto_offset_reset)
            .set(
                "session.timeout.ms",
                self.config.kafka.session_timeout_ms.to_string(),
            )
            .create()
            .map_err(|e| kafka_error("Failed to create Kafka consumer", e))?;

        let names: Vec<&str> = topics.iter().map(String::as_str).collect();
        consumer
            .subscribe(&names)
            .map_err(|e| kafka_error("Failed to subscribe", e))?;
        info!(group, topics = ?topics, "Kafka consumer subscribed");

        Ok(Box::new(KafkaConsumer { consumer }))
    }

    async fn ensure_topics(&self, topics: &[String]) -> AppResult<()> {
        let admin: AdminClient<DefaultClientContext> = base_config(&self.config)
            .create()
            .map_err(|e| kafka_error("Failed to create Kafka admin client", e))?;
        let partitions = self.config.partitions as i32;
        let new_topics: Vec<NewTopic<'_>> = topics
            .iter()
            .map(|name| {
                NewTopic::new(
                    name,
                    partitions,
                    TopicReplication::Fixed(self.config.kafka.replication_factor),
                )
            })
            .collect();

        let results = admin
            .create_topics(&new_topics, &AdminOptions::new())
            .await
            .map_err(|e| kafka_error("Failed to create topics", e))?;
        for result in results {
            match result {
                Ok(name) => info!(topic = %name, "Created topic"),
                Err((_, RDKafkaErrorCode::TopicAlreadyExists)) => {}
                Err((name, code)) => {
                    return Err(AppError::broker(format!(
                        "Failed to create topic {name}: {code}"
                    )));
                }
            }
        }
        Ok(())
    }

    async fn topic_depth(&self, topic: &str) -> AppResult<Option<u64>> {
        let admin = self.admin.clone();
        let topic = topic.to_string();
        tokio::task::spawn_blocking(move || {
            let metadata = admin
                .fetch_metadata(Some(&topic), METADATA_TIMEOUT)
                .map_err(|e| kafka_error("Failed to fetch topic metadata", e))?;
            let Some(entry) = metadata.topics().iter().find(|t| t.name() == topic) else {
                return Ok(None);
            };
            if entry.error().is_some() || entry.partitions().is_empty() {
                return Ok(None);
            }
            let mut depth = 0u64;
            for partition in entry.partitions() {
                let (low, high) = admin
                    .fetch_watermarks(&topic, partition.id(), METADATA_TIMEOUT)
                    .map_err(|e| kafka_error("Failed to fetch watermarks", e))?;
                depth += (high - low).max(0) as u64;
            }
            Ok(Some(depth))
        })
        .await
        .map_err(|e| AppError::internal(format!("Metadata task failed: {e}")))?
    }
}

/// Producer that waits for the broker acknowledgment of every record.
pub struct KafkaProducer {
    producer: FutureProducer,
    timeout: Duration,
}

impl std::fmt::Debug for KafkaProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KafkaProducer")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl MessageProducer for KafkaProducer {
    async fn send(&self, record: OutboundRecord) -> AppResult<()> {
        let mut headers = OwnedHeaders::new();
        for (name, value) in &record.headers {
            headers = headers.insert(Header {
                key: name.as_str(),
                value: Some(value.as_bytes()),
            });
        }

        let mut future_record: FutureRecord<'_, str, [u8]> =
            FutureRecord::to(&record.topic)
                .payload(record.payload.as_slice())
                .headers(headers);
        if let Some(key) = record.key.as_deref() {
            future_record = future_record.key(key);
        }

        self.producer
            .send(future_record, Timeout::After(self.timeout))
            .await
            .map(|_| ())
            .map_err(|(e, _)| kafka_error(&format!("Failed to produce to {}", record.topic), e))
    }
}

/// One member of a Kafka consumer group.
pub struct KafkaConsumer {
    consumer: StreamConsumer,
}

impl std::fmt::Debug for KafkaConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KafkaConsumer").finish_non_exhaustive()
    }
}

fn to_consumer_record(message: &BorrowedMessage<'_>) -> ConsumerRecord {
    let headers = message
        .headers()
        .map(|headers| {
            headers
                .iter()
                .map(|h| {
                    let value = h
                        .value
                        .map(|v| String::from_utf8_lossy(v).into_owned())
                        .unwrap_or_default();
                    (h.key.to_string(), value)
                })
                .collect()
        })
        .unwrap_or_default();
    let timestamp = message
        .timestamp()
        .to_millis()
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .unwrap_or_else(Utc::now);

    ConsumerRecord {
        topic: message.topic().to_string(),
        partition: message.partition(),
        offset: message.offset(),
        key: message
            .key()
            .map(|k| String::from_utf8_lossy(k).into_owned()),
        payload: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
        headers,
        timestamp,
    }
}

#[async_trait]
impl MessageConsumer for KafkaConsumer {
    async fn poll(&self, timeout: Duration) -> AppResult<Option<ConsumerRecord>> {
        match tokio::time::timeout(timeout, self.consumer.recv()).await {
            Err(_) => Ok(None),
            Ok(Ok(message)) => Ok(Some(to_consumer_record(&message))),
            Ok(Err(e)) => Err(kafka_error("Failed to receive from Kafka", e)),
        }
    }

    async fn commit(&self, record: &ConsumerRecord) -> AppResult<()> {
        let mut offsets = TopicPartitionList::new();
        offsets
            .add_partition_offset(&record.topic, record.partition, Offset::Offset(record.offset + 1))
            .map_err(|e| kafka_error("Invalid commit offset", e))?;
        self.consumer
            .commit(&offsets, CommitMode::Async)
            .map_err(|e| kafka_error("Failed to commit offset", e))
    }

    async fn rewind(&self, record: &ConsumerRecord) -> AppResult<()> {
        if let Err(e) = self.consumer.seek(
            &record.topic,
            record.partition,
            Offset::Offset(record.offset),
            Duration::from_secs(5),
        ) {
            warn!(record = %record.position(), error = %e, "Seek failed, record will be redelivered after rebalance");
            return Err(kafka_error("Failed to seek", e));
        }
        Ok(())
    }
}
