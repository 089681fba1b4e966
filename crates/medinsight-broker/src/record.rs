//! Records as they travel to and from the broker.

use chrono::{DateTime, Utc};

/// Header carrying the topic a dead-lettered record came from.
pub const HEADER_ORIGINAL_TOPIC: &str = "x-original-topic";
/// Header carrying the partition a dead-lettered record came from.
pub const HEADER_ORIGINAL_PARTITION: &str = "x-original-partition";
/// Header carrying the offset a dead-lettered record came from.
pub const HEADER_ORIGINAL_OFFSET: &str = "x-original-offset";
/// Header carrying the processing error of a dead-lettered record.
pub const HEADER_EXCEPTION_MESSAGE: &str = "x-exception-message";

/// A record to append to a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRecord {
    /// Destination topic.
    pub topic: String,
    /// Partitioning key.
    pub key: Option<String>,
    /// Record value.
    pub payload: Vec<u8>,
    /// Record headers.
    pub headers: Vec<(String, String)>,
}

impl OutboundRecord {
    /// A record without headers.
    pub fn new(topic: impl Into<String>, key: Option<String>, payload: Vec<u8>) -> Self {
        Self {
            topic: topic.into(),
            key,
            payload,
            headers: Vec::new(),
        }
    }

    /// Add a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// A record handed to a consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerRecord {
    /// Topic the record was read from.
    pub topic: String,
    /// Partition within the topic.
    pub partition: i32,
    /// Offset within the partition.
    pub offset: i64,
    /// Partitioning key.
    pub key: Option<String>,
    /// Record value.
    pub payload: Vec<u8>,
    /// Record headers.
    pub headers: Vec<(String, String)>,
    /// Broker append time.
    pub timestamp: DateTime<Utc>,
}

impl ConsumerRecord {
    /// First value of header `name`.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// `topic/partition@offset`, for logs.
    pub fn position(&self) -> String {
        format!("{}/{}@{}", self.topic, self.partition, self.offset)
    }
}
