//! Outbox delivery for MedInsight notifications.
//!
//! This crate provides:
//! - A delivery queue over the outbox task store
//! - A task executor that dispatches tasks to the handler for their kind
//! - A worker runner that claims due tasks and retries transient failures
//! - A cron scheduler for queue maintenance

pub mod executor;
pub mod handlers;
pub mod queue;
pub mod runner;
pub mod scheduler;

pub use executor::{DeliveryError, TaskExecutor, TaskHandler};
pub use handlers::NotificationDeliveryHandler;
pub use queue::{DeliveryQueue, QueueStats};
pub use runner::WorkerRunner;
pub use scheduler::MaintenanceScheduler;
