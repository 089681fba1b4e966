//! Shared value types.

pub mod id;
pub mod pagination;

pub use id::{AuditLogId, DeliveryTaskId, NotificationId, PoisonMessageId, SecurityAlertId};
pub use pagination::{PageRequest, PageResponse};
