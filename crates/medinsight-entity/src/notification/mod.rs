//! Notification records and their delivery status machine.

pub mod model;
pub mod status;

pub use model::Notification;
pub use status::NotificationStatus;
