//! Outbox delivery tasks.

pub mod model;
pub mod status;

pub use model::{DeliveryTask, NOTIFICATION_DELIVERY};
pub use status::DeliveryStatus;
