// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reverse lookup from incoming topics to configured actions.

use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;

use crate::config::{ActionGroup, ActionTopics};

use super::matcher::{TopicPattern, normalize};

/// Behaviour attached to an action topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ActionType {
    /// Set the thermostat setpoint; payload is a temperature.
    Thermostat,
    /// Mirror the payload back to the status topic.
    Scene,
    /// Any other configured name. Matched but ignored.
    Other(String),
}

impl ActionType {
    /// Returns the configuration name of this action type.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Thermostat => "thermostat",
            Self::Scene => "scene",
            Self::Other(name) => name,
        }
    }
}

impl From<&str> for ActionType {
    fn from(name: &str) -> Self {
        match name {
            "thermostat" => Self::Thermostat,
            "scene" => Self::Scene,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A configured action, as found by [`ActionLookup::resolve`].
#[derive(Debug, Clone)]
pub struct ActionEntry {
    action: ActionType,
    topics: ActionTopics,
    listen: TopicPattern,
    status: TopicPattern,
}

impl ActionEntry {
    fn new(action: ActionType, topics: &ActionTopics) -> Self {
        Self {
            action,
            listen: TopicPattern::compile(topics.listen.as_str()),
            status: TopicPattern::compile(topics.status.as_str()),
            topics: topics.clone(),
        }
    }

    /// The action type.
    #[must_use]
    pub fn action(&self) -> &ActionType {
        &self.action
    }

    /// The configured topic pair.
    #[must_use]
    pub fn topics(&self) -> &ActionTopics {
        &self.topics
    }

    /// The compiled listen pattern.
    #[must_use]
    pub fn listen(&self) -> &TopicPattern {
        &self.listen
    }

    /// The compiled status pattern.
    #[must_use]
    pub fn status(&self) -> &TopicPattern {
        &self.status
    }
}

/// Lookup table built once from the configured action groups.
///
/// # Examples
///
/// ```
/// use plugwise_mqtt::config::MqttConfig;
/// use plugwise_mqtt::topic::{ActionLookup, ActionType};
///
/// let config = MqttConfig::new("localhost").with_action(
///     "gbridge",
///     "thermostat",
///     "gBridge/u1/{applianceId}/thermostat/set",
///     "gBridge/u1/{applianceId}/thermostat",
/// );
/// let lookup = ActionLookup::build(&config.topics.action);
///
/// let entry = lookup
///     .resolve("gBridge/u1/3a19bccef5982bde990632fd4f5894d4/thermostat/set")
///     .unwrap();
/// assert_eq!(entry.action(), &ActionType::Thermostat);
/// assert!(lookup.resolve("gBridge/u1/3a19bccef5982bde990632fd4f5894d4/thermostat").is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ActionLookup {
    entries: HashMap<String, ActionEntry>,
    filters: Vec<String>,
}

impl ActionLookup {
    /// Builds the table from all action groups.
    ///
    /// Groups and actions are taken in configuration order. Two listen
    /// templates that normalize to the same key are a configuration
    /// mistake; the later one wins.
    #[must_use]
    pub fn build(groups: &IndexMap<String, ActionGroup>) -> Self {
        let mut lookup = Self::default();

        for (group, actions) in groups {
            for (name, topics) in actions {
                let entry = ActionEntry::new(ActionType::from(name.as_str()), topics);
                lookup.filters.push(entry.listen.filter().to_string());
                lookup.filters.push(entry.status.filter().to_string());

                let key = entry.listen.key().to_string();
                tracing::debug!(group = %group, action = %name, key = %key, "Registering action topic");
                if let Some(previous) = lookup.entries.insert(key, entry) {
                    tracing::warn!(
                        group = %group,
                        action = %name,
                        replaced = %previous.topics.listen,
                        "Action listen topic collides with an earlier one"
                    );
                }
            }
        }

        lookup
    }

    /// Finds the action a concrete topic belongs to.
    #[must_use]
    pub fn resolve(&self, topic: &str) -> Option<&ActionEntry> {
        self.entries.get(normalize(topic).as_ref())
    }

    /// Subscription filters for every configured listen and status topic.
    #[must_use]
    pub fn subscription_filters(&self) -> &[String] {
        &self.filters
    }

    /// Number of distinct action keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no actions are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
