//! # medinsight-broker
//!
//! Everything between a domain service and a consumer's handler: the
//! broker clients ([`memory`] and, with the `kafka` feature, [`kafka`]),
//! the [`topics::TopicRegistry`], the fire-and-forget
//! [`publisher::EventPublisher`], the [`listener::ListenerContainer`] that
//! drives a consumer group, and the [`dead_letter::DeadLetterErrorHandler`]
//! that decides what happens to a record whose handler failed.

pub mod backoff;
pub mod dead_letter;
#[cfg(feature = "kafka")]
pub mod kafka;
pub mod listener;
pub mod memory;
pub mod metrics;
pub mod publisher;
pub mod record;
pub mod topics;
pub mod traits;

pub use dead_letter::{DeadLetterErrorHandler, Disposition, PoisonSink, QuarantinedRecord};
pub use listener::{ListenerContainer, ListenerError, RecordHandler};
pub use memory::InMemoryBroker;
pub use metrics::PipelineMetrics;
pub use publisher::EventPublisher;
pub use record::{ConsumerRecord, OutboundRecord};
pub use topics::TopicRegistry;
pub use traits::{MessageBroker, MessageConsumer, MessageProducer};
