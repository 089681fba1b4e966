//! User notification events.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{EventKind, PipelineEvent};
use crate::error::AppError;

/// Transport a notification is delivered over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "notification_channel", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationChannel {
    /// SMTP email.
    Email,
    /// Text message.
    Sms,
    /// Mobile push.
    Push,
    /// Shown inside the portal.
    InApp,
}

impl NotificationChannel {
    /// Every channel.
    pub const ALL: [NotificationChannel; 4] = [Self::Email, Self::Sms, Self::Push, Self::InApp];

    /// Return the wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "EMAIL",
            Self::Sms => "SMS",
            Self::Push => "PUSH",
            Self::InApp => "IN_APP",
        }
    }
}

impl fmt::Display for NotificationChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for NotificationChannel {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|channel| channel.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| AppError::validation(format!("Unknown notification channel: {s}")))
    }
}

/// What a notification is about. Independent of the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "notification_type", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    /// Upcoming appointment.
    AppointmentReminder,
    /// Appointment was booked.
    AppointmentConfirmation,
    /// Lab results can be viewed.
    LabResultReady,
    /// A prescription can be collected.
    PrescriptionReady,
    /// Operational message from the platform.
    SystemAlert,
    /// A payment is due.
    PaymentDue,
    /// A patient account was created.
    PatientWelcome,
}

impl NotificationType {
    /// Every notification type.
    pub const ALL: [NotificationType; 7] = [
        Self::AppointmentReminder,
        Self::AppointmentConfirmation,
        Self::LabResultReady,
        Self::PrescriptionReady,
        Self::SystemAlert,
        Self::PaymentDue,
        Self::PatientWelcome,
    ];

    /// Return the wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AppointmentReminder => "APPOINTMENT_REMINDER",
            Self::AppointmentConfirmation => "APPOINTMENT_CONFIRMATION",
            Self::LabResultReady => "LAB_RESULT_READY",
            Self::PrescriptionReady => "PRESCRIPTION_READY",
            Self::SystemAlert => "SYSTEM_ALERT",
            Self::PaymentDue => "PAYMENT_DUE",
            Self::PatientWelcome => "PATIENT_WELCOME",
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for NotificationType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| AppError::validation(format!("Unknown notification type: {s}")))
    }
}

/// A request to notify one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEvent {
    /// The user to notify.
    #[serde(rename = "recipientUserId")]
    pub recipient_id: Uuid,
    /// Email address for the EMAIL channel.
    #[serde(default)]
    #[validate(email)]
    pub recipient_email: Option<String>,
    /// Phone number for the SMS channel.
    #[serde(default)]
    #[validate(length(max = 32))]
    pub recipient_phone: Option<String>,
    /// What the notification is about.
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    /// Delivery transport.
    pub channel: NotificationChannel,
    /// Subject line.
    #[validate(length(min = 1, max = 255))]
    pub subject: String,
    /// Body text.
    #[validate(length(min = 1))]
    pub message: String,
    /// Earliest send time. Absent means now.
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
}

impl NotificationEvent {
    /// Create an unscheduled notification.
    pub fn new(
        recipient_id: Uuid,
        notification_type: NotificationType,
        channel: NotificationChannel,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            recipient_id,
            recipient_email: None,
            recipient_phone: None,
            notification_type,
            channel,
            subject: subject.into(),
            message: message.into(),
            scheduled_at: None,
        }
    }

    /// Set the recipient email address.
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.recipient_email = Some(email.into());
        self
    }

    /// Set the recipient phone number.
    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.recipient_phone = Some(phone.into());
        self
    }

    /// Delay delivery until `at`.
    pub fn scheduled_for(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_at = Some(at);
        self
    }
}

impl PipelineEvent for NotificationEvent {
    const KIND: EventKind = EventKind::Notification;

    fn partition_key(&self) -> Option<String> {
        Some(self.recipient_id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_in_app_wire_value() {
        let json = serde_json::to_string(&NotificationChannel::InApp).expect("serialize");
        assert_eq!(json, "\"IN_APP\"");
    }

    #[test]
    fn test_welcome_event_wire_format() {
        let id = Uuid::new_v4();
        let event = NotificationEvent::new(
            id,
            NotificationType::PatientWelcome,
            NotificationChannel::Email,
            "Welcome to MedInsight",
            "Your account is ready",
        )
        .with_email("jane@example.com");
        let json = serde_json::to_value(&event).expect("serialize");

        assert_eq!(json["recipientUserId"], id.to_string());
        assert_eq!(json["type"], "PATIENT_WELCOME");
        assert_eq!(json["channel"], "EMAIL");
        assert_eq!(json["recipientEmail"], "jane@example.com");
    }

    #[test]
    fn test_unknown_channel_is_rejected() {
        let raw = format!(
            r#"{{"recipientUserId":"{}","type":"SYSTEM_ALERT","channel":"FAX","subject":"s","message":"m"}}"#,
            Uuid::new_v4()
        );
        let err = NotificationEvent::from_payload(raw.as_bytes()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Serialization);
    }

    #[test]
    fn test_invalid_email_fails_validation() {
        let event = NotificationEvent::new(
            Uuid::new_v4(),
            NotificationType::SystemAlert,
            NotificationChannel::Email,
            "Maintenance",
            "Tonight",
        )
        .with_email("not-an-address");
        let payload = event.to_payload().expect("encode");
        let err = NotificationEvent::from_payload(&payload).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[test]
    fn test_type_and_channel_parse_independently() {
        assert_eq!(
            "patient_welcome".parse::<NotificationType>().ok(),
            Some(NotificationType::PatientWelcome)
        );
        assert!("PATIENT_WELCOME".parse::<NotificationChannel>().is_err());
    }
}
