// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bridge configuration.
//!
//! The configuration is a JSON document with camelCase keys:
//!
//! ```json
//! {
//!   "mqtt": {
//!     "server": "mqtt://192.168.1.50",
//!     "port": 1883,
//!     "dryRun": false,
//!     "topics": {
//!       "action": {
//!         "gbridge": {
//!           "thermostat": {
//!             "listen": "gBridge/u1/{applianceId}/tempset-setpoint/set",
//!             "status": "gBridge/u1/{applianceId}/tempset-setpoint"
//!           }
//!         }
//!       },
//!       "status": { "main": { "topic": "plugwise/status" } },
//!       "data": {
//!         "all": { "topic": "plugwise/{applianceId}", "message": "MQTT_MESSAGE_COMPLETE" }
//!       }
//!     }
//!   },
//!   "plugwise": { "host": "192.168.1.60", "password": "abcdefgh" }
//! }
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Message value meaning "publish the whole telemetry object".
pub const COMPLETE_MESSAGE_MARKER: &str = "MQTT_MESSAGE_COMPLETE";

/// Top-level configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeConfig {
    /// Broker connection and topic layout.
    pub mqtt: MqttConfig,
    /// Heating controller connection.
    pub plugwise: PlugwiseConfig,
}

impl BridgeConfig {
    /// Loads and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, is not valid JSON for this
    /// layout, or fails validation.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let config = Self::from_json(&contents)?;
        tracing::info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Parses and validates a configuration document.
    ///
    /// # Errors
    ///
    /// Returns error if the document is malformed or fails validation.
    pub fn from_json(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values serde cannot check.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.mqtt.validate()?;
        if self.plugwise.host.trim().is_empty() {
            return Err(ConfigError::Invalid("plugwise host is empty".to_string()));
        }
        Ok(())
    }
}

/// Broker connection settings and topic layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MqttConfig {
    /// Broker URL (`mqtt://host`, `tcp://host` or `host`, optionally `:port`).
    pub server: String,
    /// Broker port, used when the URL carries none.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Client identifier; generated when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Broker username.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Broker password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Keep-alive interval in seconds.
    #[serde(default = "default_keep_alive")]
    pub keep_alive: u64,
    /// Seconds to wait for the broker to accept the connection.
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: u64,
    /// Log outbound telemetry instead of publishing it.
    #[serde(default)]
    pub dry_run: bool,
    /// Topic layout.
    #[serde(default)]
    pub topics: TopicsConfig,
}

fn default_port() -> u16 {
    1883
}

fn default_keep_alive() -> u64 {
    3600
}

fn default_connection_timeout() -> u64 {
    10
}

/// Durations are stored in seconds; a started second counts as a whole one.
fn whole_seconds(duration: Duration) -> u64 {
    duration.as_secs() + u64::from(duration.subsec_nanos() > 0)
}

impl MqttConfig {
    /// Creates a configuration for the given broker with no topics.
    ///
    /// # Examples
    ///
    /// ```
    /// use plugwise_mqtt::config::{MessageTemplate, MqttConfig};
    ///
    /// let config = MqttConfig::new("mqtt://localhost")
    ///     .with_action("gbridge", "thermostat", "in/{applianceId}", "out/{applianceId}")
    ///     .with_status_topic("main", "plugwise/status")
    ///     .with_data_topic("all", "plugwise/{applianceId}", MessageTemplate::Complete)
    ///     .with_dry_run(true);
    ///
    /// assert!(config.dry_run);
    /// ```
    #[must_use]
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            port: default_port(),
            client_id: None,
            username: None,
            password: None,
            keep_alive: default_keep_alive(),
            connection_timeout: default_connection_timeout(),
            dry_run: false,
            topics: TopicsConfig::default(),
        }
    }

    /// Sets the broker port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets broker credentials.
    #[must_use]
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Sets the client identifier.
    #[must_use]
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Sets the keep-alive interval.
    #[must_use]
    pub fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = whole_seconds(keep_alive);
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = whole_seconds(timeout);
        self
    }

    /// Enables or disables dry-run mode.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Adds an action topic pair to a group.
    #[must_use]
    pub fn with_action(
        mut self,
        group: impl Into<String>,
        action_type: impl Into<String>,
        listen: impl Into<String>,
        status: impl Into<String>,
    ) -> Self {
        self.topics
            .action
            .entry(group.into())
            .or_default()
            .insert(action_type.into(), ActionTopics::new(listen, status));
        self
    }

    /// Adds a status destination.
    #[must_use]
    pub fn with_status_topic(mut self, name: impl Into<String>, topic: impl Into<String>) -> Self {
        self.topics.status.insert(
            name.into(),
            StatusTopic {
                topic: topic.into(),
            },
        );
        self
    }

    /// Adds a telemetry destination.
    #[must_use]
    pub fn with_data_topic(
        mut self,
        name: impl Into<String>,
        topic: impl Into<String>,
        message: impl Into<MessageTemplate>,
    ) -> Self {
        self.topics.data.insert(
            name.into(),
            DataTopic {
                topic: topic.into(),
                message: message.into(),
            },
        );
        self
    }

    /// Returns the keep-alive interval.
    #[must_use]
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive)
    }

    /// Returns the connection timeout.
    #[must_use]
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout)
    }

    /// Checks the broker address and that no topic template is empty.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.trim().is_empty() {
            return Err(ConfigError::Invalid("mqtt server is empty".to_string()));
        }

        for (group, actions) in &self.topics.action {
            for (action_type, topics) in actions {
                if topics.listen.is_empty() || topics.status.is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "action {group}.{action_type} needs both listen and status topics"
                    )));
                }
            }
        }

        if let Some((name, _)) = self.topics.status.iter().find(|(_, s)| s.topic.is_empty()) {
            return Err(ConfigError::Invalid(format!("status topic {name} is empty")));
        }

        if let Some((name, _)) = self.topics.data.iter().find(|(_, d)| d.topic.is_empty()) {
            return Err(ConfigError::Invalid(format!("data topic {name} is empty")));
        }

        Ok(())
    }
}

/// All configured topics.
///
/// Every map keeps the order of the configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicsConfig {
    /// Inbound command topics, grouped per device class.
    #[serde(default)]
    pub action: IndexMap<String, ActionGroup>,
    /// Destinations for bridge status messages.
    #[serde(default)]
    pub status: IndexMap<String, StatusTopic>,
    /// Destinations for device telemetry.
    #[serde(default)]
    pub data: IndexMap<String, DataTopic>,
}

/// Action topics of one device class, keyed by action type.
pub type ActionGroup = IndexMap<String, ActionTopics>;

/// Command topic and the topic its result is reported on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionTopics {
    /// Template of the topic commands arrive on.
    pub listen: String,
    /// Template of the topic the result is published to.
    pub status: String,
}

impl ActionTopics {
    /// Creates an action topic pair.
    #[must_use]
    pub fn new(listen: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            listen: listen.into(),
            status: status.into(),
        }
    }
}

/// Destination for bridge status messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTopic {
    /// Literal topic.
    pub topic: String,
}

/// Destination for device telemetry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataTopic {
    /// Topic template.
    pub topic: String,
    /// Message template or the pass-through marker.
    pub message: MessageTemplate,
}

/// How a telemetry message is turned into a payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageTemplate {
    /// Publish the whole telemetry object as JSON.
    Complete,
    /// Render this template with the telemetry fields.
    Template(String),
}

impl MessageTemplate {
    /// Returns true for the pass-through marker.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }
}

impl From<String> for MessageTemplate {
    fn from(value: String) -> Self {
        if value == COMPLETE_MESSAGE_MARKER {
            Self::Complete
        } else {
            Self::Template(value)
        }
    }
}

impl From<&str> for MessageTemplate {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<MessageTemplate> for String {
    fn from(value: MessageTemplate) -> Self {
        match value {
            MessageTemplate::Complete => COMPLETE_MESSAGE_MARKER.to_string(),
            MessageTemplate::Template(template) => template,
        }
    }
}

/// Plugwise gateway (Smile) connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlugwiseConfig {
    /// Gateway host, with or without `http://`.
    pub host: String,
    /// HTTP basic auth user.
    #[serde(default = "default_plugwise_username")]
    pub username: String,
    /// HTTP basic auth password (the Smile ID).
    pub password: String,
    /// Request timeout in seconds.
    #[serde(default = "default_plugwise_timeout")]
    pub timeout: u64,
}

fn default_plugwise_username() -> String {
    "smile".to_string()
}

fn default_plugwise_timeout() -> u64 {
    10
}

impl PlugwiseConfig {
    /// Creates settings for a gateway with the default user.
    #[must_use]
    pub fn new(host: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            username: default_plugwise_username(),
            password: password.into(),
            timeout: default_plugwise_timeout(),
        }
    }

    /// Returns the request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}
