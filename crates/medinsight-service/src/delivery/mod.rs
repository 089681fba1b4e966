//! Channel senders and the dispatcher that routes a notification to one.

pub mod dispatcher;
pub mod email;
pub mod noop;
pub mod sender;
pub mod sms;

pub use dispatcher::DeliveryDispatcher;
pub use email::EmailSender;
pub use noop::LogOnlySender;
pub use sender::{ChannelSender, MessageBody, OutgoingMessage, SendError};
pub use sms::SmsSender;
