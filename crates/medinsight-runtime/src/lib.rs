//! # medinsight-runtime
//!
//! Assembles the pipeline from configuration. [`ApplicationBuilder`] opens
//! the record stores and the broker (either can be injected for tests),
//! builds the services, and [`Application::start`] launches one listener
//! container per consumer group plus the outbox delivery worker.

pub mod app;
pub mod broker;
pub mod signal;

pub use app::{Application, ApplicationBuilder, RunningApplication};
pub use broker::connect_broker;
pub use signal::shutdown_signal;
