//! Audit trail events.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{EventKind, PipelineEvent};
use crate::error::AppError;

/// Actions recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "audit_action", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    /// A record was created.
    Create,
    /// A record was viewed.
    Read,
    /// A record was modified.
    Update,
    /// A record was removed.
    Delete,
    /// A user signed in.
    Login,
    /// A user signed out.
    Logout,
    /// Data left the system as a file.
    Export,
    /// Data left the system on paper.
    Print,
}

impl AuditAction {
    /// Every action.
    pub const ALL: [AuditAction; 8] = [
        Self::Create,
        Self::Read,
        Self::Update,
        Self::Delete,
        Self::Login,
        Self::Logout,
        Self::Export,
        Self::Print,
    ];

    /// Return the wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Read => "READ",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Login => "LOGIN",
            Self::Logout => "LOGOUT",
            Self::Export => "EXPORT",
            Self::Print => "PRINT",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|action| action.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| AppError::validation(format!("Unknown audit action: {s}")))
    }
}

/// One audited action, published by the service that performed it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    /// The acting user.
    #[serde(rename = "userId", default)]
    pub actor_id: Option<Uuid>,
    /// Display name of the acting user.
    #[serde(rename = "username", default)]
    #[validate(length(max = 255))]
    pub actor_name: Option<String>,
    /// What was done.
    pub action: AuditAction,
    /// Type of the affected record, e.g. `Patient`.
    #[validate(length(min = 1, max = 100))]
    pub entity_type: String,
    /// Identifier of the affected record.
    #[validate(length(min = 1, max = 255))]
    pub entity_id: String,
    /// Client address the request came from.
    #[serde(default)]
    #[validate(length(max = 64))]
    pub ip_address: Option<String>,
    /// Client user agent.
    #[serde(default)]
    #[validate(length(max = 1024))]
    pub user_agent: Option<String>,
    /// Changed fields.
    #[serde(default)]
    pub changes: BTreeMap<String, serde_json::Value>,
    /// When the action happened. Copied unchanged into the audit log.
    pub timestamp: DateTime<Utc>,
}

impl AuditEvent {
    /// Create an event stamped with the current time.
    pub fn new(action: AuditAction, entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self {
            actor_id: None,
            actor_name: None,
            action,
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
            ip_address: None,
            user_agent: None,
            changes: BTreeMap::new(),
            timestamp: Utc::now(),
        }
    }

    /// Set the acting user.
    pub fn with_actor(mut self, actor_id: Uuid, actor_name: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id);
        self.actor_name = Some(actor_name.into());
        self
    }

    /// Set the request origin.
    pub fn with_origin(mut self, ip_address: impl Into<String>, user_agent: impl Into<String>) -> Self {
        self.ip_address = Some(ip_address.into());
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Record one changed field.
    pub fn with_change(mut self, field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.changes.insert(field.into(), value.into());
        self
    }
}

impl PipelineEvent for AuditEvent {
    const KIND: EventKind = EventKind::Audit;

    fn partition_key(&self) -> Option<String> {
        Some(format!("{}:{}", self.entity_type, self.entity_id))
    }
}
