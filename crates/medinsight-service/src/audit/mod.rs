//! Audit trail: direct logging, queries, security alerts, and the audit
//! event consumer.

pub mod consumer;
pub mod service;

pub use consumer::AuditEventHandler;
pub use service::AuditService;
