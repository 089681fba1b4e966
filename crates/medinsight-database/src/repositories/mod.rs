//! PostgreSQL implementations of the store traits.

pub mod alert;
pub mod audit;
pub mod delivery;
pub mod notification;
pub mod poison;

pub use alert::SecurityAlertRepository;
pub use audit::AuditLogRepository;
pub use delivery::DeliveryTaskRepository;
pub use notification::NotificationRepository;
pub use poison::PoisonMessageRepository;
