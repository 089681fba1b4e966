//! Notification records, their consumer, and email templates.

pub mod consumer;
pub mod service;
pub mod templates;

pub use consumer::NotificationEventHandler;
pub use service::NotificationService;
