//! Topic names per event kind.
//!
//! Each event kind is bound to a main topic and a dead-letter topic.
//! Topics that are not bound (for example topics created by operators for
//! ad-hoc routing) dead-letter to `<topic><dead_letter_suffix>`.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::events::EventKind;

/// Main and dead-letter topic for one event kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicBinding {
    /// Topic the publisher writes to and the consumer group reads from.
    pub name: String,
    /// Topic failed records are republished to.
    pub dead_letter: String,
}

impl TopicBinding {
    /// Build a binding from two names.
    pub fn new(name: impl Into<String>, dead_letter: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dead_letter: dead_letter.into(),
        }
    }
}

/// Topic configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicsConfig {
    /// Audit event topics.
    #[serde(default = "default_audit")]
    pub audit: TopicBinding,
    /// Notification event topics.
    #[serde(default = "default_notification")]
    pub notification: TopicBinding,
    /// Suffix appended to unbound topics to derive their dead-letter topic.
    #[serde(default = "default_suffix")]
    pub dead_letter_suffix: String,
}

impl Default for TopicsConfig {
    fn default() -> Self {
        Self {
            audit: default_audit(),
            notification: default_notification(),
            dead_letter_suffix: default_suffix(),
        }
    }
}

impl TopicsConfig {
    /// Return the binding for an event kind.
    pub fn binding(&self, kind: EventKind) -> &TopicBinding {
        match kind {
            EventKind::Audit => &self.audit,
            EventKind::Notification => &self.notification,
        }
    }

    /// All bindings in event-kind order.
    pub fn bindings(&self) -> impl Iterator<Item = (EventKind, &TopicBinding)> {
        EventKind::ALL.into_iter().map(|kind| (kind, self.binding(kind)))
    }

    /// Check that every name is non-empty, no name is used twice, and no
    /// dead-letter topic equals a main topic.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.dead_letter_suffix.trim().is_empty() {
            return Err(AppError::configuration(
                "topics.dead_letter_suffix must not be empty",
            ));
        }

        let mut seen = HashSet::new();
        for (kind, binding) in self.bindings() {
            for name in [&binding.name, &binding.dead_letter] {
                if name.trim().is_empty() {
                    return Err(AppError::configuration(format!(
                        "topics.{kind}: topic names must not be empty"
                    )));
                }
                if !seen.insert(name.as_str()) {
                    return Err(AppError::configuration(format!(
                        "topics.{kind}: topic '{name}' is configured more than once"
                    )));
                }
            }
        }
        Ok(())
    }
}

fn default_audit() -> TopicBinding {
    TopicBinding::new("audit-events", "audit-events-dlq")
}

fn default_notification() -> TopicBinding {
    TopicBinding::new("notification-events", "notification-events-dlq")
}

fn default_suffix() -> String {
    "-dlq".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let topics = TopicsConfig::default();
        assert!(topics.validate().is_ok());
        assert_eq!(topics.binding(EventKind::Audit).name, "audit-events");
        assert_eq!(
            topics.binding(EventKind::Notification).dead_letter,
            "notification-events-dlq"
        );
    }

    #[test]
    fn test_rejects_empty_name() {
        let mut topics = TopicsConfig::default();
        topics.audit.name = "  ".to_string();
        assert!(topics.validate().is_err());
    }

    #[test]
    fn test_rejects_dead_letter_equal_to_main() {
        let mut topics = TopicsConfig::default();
        topics.notification.dead_letter = "notification-events".to_string();
        assert!(topics.validate().is_err());
    }

    #[test]
    fn test_rejects_shared_topic_across_kinds() {
        let mut topics = TopicsConfig::default();
        topics.notification.name = "audit-events".to_string();
        assert!(topics.validate().is_err());
    }
}
