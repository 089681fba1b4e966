//! Audit trail records and security alerts.

pub mod alert;
pub mod model;

pub use alert::{AlertSeverity, NewSecurityAlert, SecurityAlert};
pub use model::{AuditLog, AuditLogFilter};
