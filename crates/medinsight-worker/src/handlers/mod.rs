//! Task handler implementations.

pub mod notification;

pub use notification::NotificationDeliveryHandler;
