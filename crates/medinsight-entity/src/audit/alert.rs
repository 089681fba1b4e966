//! Security alert entity model.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use medinsight_core::types::SecurityAlertId;

/// How urgently an alert needs operator attention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "alert_severity", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertSeverity {
    /// Informational.
    Low,
    /// Should be reviewed.
    Medium,
    /// Needs prompt review.
    High,
    /// Needs immediate action.
    Critical,
}

impl AlertSeverity {
    /// Return the wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AlertSeverity {
    type Err = medinsight_core::AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LOW" => Ok(Self::Low),
            "MEDIUM" => Ok(Self::Medium),
            "HIGH" => Ok(Self::High),
            "CRITICAL" => Ok(Self::Critical),
            other => Err(medinsight_core::AppError::validation(format!(
                "Unknown alert severity: {other}"
            ))),
        }
    }
}

/// A security-relevant condition raised for operators.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SecurityAlert {
    /// Unique alert identifier.
    pub id: SecurityAlertId,
    /// Urgency.
    pub severity: AlertSeverity,
    /// Machine-readable category, e.g. `POISON_MESSAGE`.
    pub alert_type: String,
    /// Human-readable description.
    pub description: String,
    /// Address involved, if any.
    pub source_ip: Option<String>,
    /// User involved, if any.
    pub actor_id: Option<Uuid>,
    /// Whether an operator has closed the alert.
    pub resolved: bool,
    /// When the condition was detected.
    pub detected_at: DateTime<Utc>,
    /// When the alert was resolved.
    pub resolved_at: Option<DateTime<Utc>>,
}

impl SecurityAlert {
    /// Create an open alert from its description.
    pub fn open(new: NewSecurityAlert) -> Self {
        Self {
            id: SecurityAlertId::new(),
            severity: new.severity,
            alert_type: new.alert_type,
            description: new.description,
            source_ip: new.source_ip,
            actor_id: new.actor_id,
            resolved: false,
            detected_at: Utc::now(),
            resolved_at: None,
        }
    }
}

/// Data required to raise an alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSecurityAlert {
    /// Urgency.
    pub severity: AlertSeverity,
    /// Machine-readable category.
    pub alert_type: String,
    /// Human-readable description.
    pub description: String,
    /// Address involved.
    pub source_ip: Option<String>,
    /// User involved.
    pub actor_id: Option<Uuid>,
}
