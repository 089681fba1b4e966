//! In-memory implementations of every store trait.
//!
//! One [`MemoryStore`] holds all tables so that a notification and its
//! delivery task are visible together. Records live as long as the process.

mod audit;
mod delivery;
mod notification;
mod poison;

use std::collections::BTreeMap;

use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock};

use medinsight_core::types::{DeliveryTaskId, NotificationId, PoisonMessageId, SecurityAlertId};
use medinsight_entity::audit::{AuditLog, SecurityAlert};
use medinsight_entity::dead_letter::PoisonMessage;
use medinsight_entity::delivery::DeliveryTask;
use medinsight_entity::notification::Notification;

/// Process-local record store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    audit_logs: RwLock<Vec<AuditLog>>,
    alerts: DashMap<SecurityAlertId, SecurityAlert>,
    notifications: DashMap<NotificationId, Notification>,
    tasks: Mutex<BTreeMap<DeliveryTaskId, DeliveryTask>>,
    poison: DashMap<PoisonMessageId, PoisonMessage>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}
