//! Topic resolution for publishers, consumers, and the dead-letter handler.

use std::collections::HashMap;

use medinsight_core::AppResult;
use medinsight_core::config::TopicsConfig;
use medinsight_core::events::EventKind;

/// Resolved topic names, validated once at startup.
#[derive(Debug, Clone)]
pub struct TopicRegistry {
    main: HashMap<EventKind, String>,
    dead_letters: HashMap<String, String>,
    suffix: String,
}

impl TopicRegistry {
    /// Validate the configuration and build the lookup tables.
    pub fn from_config(config: &TopicsConfig) -> AppResult<Self> {
        config.validate()?;
        let mut main = HashMap::new();
        let mut dead_letters = HashMap::new();
        for (kind, binding) in config.bindings() {
            main.insert(kind, binding.name.clone());
            dead_letters.insert(binding.name.clone(), binding.dead_letter.clone());
        }
        Ok(Self {
            main,
            dead_letters,
            suffix: config.dead_letter_suffix.clone(),
        })
    }

    /// Main topic of an event kind.
    pub fn topic_for(&self, kind: EventKind) -> &str {
        // Every kind is inserted by `from_config`.
        self.main.get(&kind).map(String::as_str).unwrap_or_default()
    }

    /// Dead-letter topic for records that failed on `topic`. Bound topics
    /// use their configured name; any other topic gets the suffix.
    pub fn dead_letter_for(&self, topic: &str) -> String {
        self.dead_letters
            .get(topic)
            .cloned()
            .unwrap_or_else(|| format!("{topic}{}", self.suffix))
    }

    /// Main topics in event-kind order.
    pub fn main_topics(&self) -> Vec<String> {
        EventKind::ALL
            .iter()
            .map(|kind| self.topic_for(*kind).to_string())
            .collect()
    }

    /// Dead-letter topics of the bound main topics, in event-kind order.
    pub fn dead_letter_topics(&self) -> Vec<String> {
        self.main_topics()
            .iter()
            .map(|topic| self.dead_letter_for(topic))
            .collect()
    }

    /// Main and dead-letter topics.
    pub fn all_topics(&self) -> Vec<String> {
        let mut all = self.main_topics();
        all.extend(self.dead_letter_topics());
        all
    }
}
