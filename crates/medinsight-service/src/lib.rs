//! # medinsight-service
//!
//! Business logic of the pipeline's terminal services. The audit and
//! notification services own their stores; the consumers in
//! [`audit::consumer`] and [`notification::consumer`] are the
//! [`RecordHandler`](medinsight_broker::RecordHandler)s the listener
//! containers drive. [`delivery`] sends notifications over their channel,
//! [`quarantine`] keeps records that could not be dead-lettered, and
//! [`dlq`] gives operators a view over both.
//!
//! Services follow constructor injection: every dependency is an `Arc`
//! handed in at construction time.

pub mod audit;
pub mod context;
pub mod delivery;
pub mod dlq;
pub mod notification;
pub mod quarantine;

pub use audit::{AuditEventHandler, AuditService};
pub use context::RequestContext;
pub use delivery::{ChannelSender, DeliveryDispatcher, SendError};
pub use dlq::DlqMonitor;
pub use notification::{NotificationEventHandler, NotificationService};
pub use quarantine::QuarantineService;
