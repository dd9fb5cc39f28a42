// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Outbound message types.
//!
//! - [`TelemetryMessage`]: one appliance reading produced by the heating
//!   controller and fanned out to every data topic
//! - [`StatusMessage`]: the state of the bridge itself
//!
//! # Examples
//!
//! ```
//! use plugwise_mqtt::telemetry::TelemetryMessage;
//!
//! let message = TelemetryMessage::new("3a19bccef5982bde990632fd4f5894d4")
//!     .with_field("name", "Living room")
//!     .with_field("temperature", 20.5);
//!
//! let bindings = message.bindings();
//! assert_eq!(bindings["applianceId"], "3a19bccef5982bde990632fd4f5894d4");
//! assert_eq!(bindings["temperature"], "20.5");
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::topic::Bindings;
use crate::topic::matcher::APPLIANCE_BINDING;

const ID_FIELD: &str = "id";

/// A reading for one appliance.
///
/// Serialized flat: `{"id": "...", "temperature": 20.5, ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryMessage {
    /// Appliance identifier.
    pub id: String,
    /// Every other field of the reading.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl TelemetryMessage {
    /// Creates a message with no fields besides the identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: Map::new(),
        }
    }

    /// Adds a field.
    ///
    /// A field named `id` replaces the identifier instead, so the message
    /// never serializes two `id` keys.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let name = name.into();
        let value = value.into();
        if name == ID_FIELD {
            self.id = match value {
                Value::String(id) => id,
                other => other.to_string(),
            };
        } else {
            self.fields.insert(name, value);
        }
        self
    }

    /// Template bindings for this message.
    ///
    /// `applianceId` and `id` are the identifier; every field is bound by
    /// name, strings verbatim and other values as compact JSON. A field
    /// named `applianceId` overrides the identifier binding.
    #[must_use]
    pub fn bindings(&self) -> Bindings {
        let mut bindings = Bindings::with_capacity(self.fields.len() + 2);
        bindings.insert(APPLIANCE_BINDING.to_string(), self.id.clone());
        bindings.insert(ID_FIELD.to_string(), self.id.clone());
        for (name, value) in &self.fields {
            let text = match value {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            bindings.insert(name.clone(), text);
        }
        bindings
    }
}

/// Lifecycle state reported on the status topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BridgeState {
    /// Connected and handling messages.
    Online,
    /// Stopping on request.
    Offline,
    /// Running but something failed.
    Error,
}

/// A bridge status report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusMessage {
    /// Current state.
    pub status: BridgeState,
    /// Optional human readable detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// When the report was produced.
    pub timestamp: DateTime<Utc>,
}

impl StatusMessage {
    /// Creates a report for `status`, stamped now.
    #[must_use]
    pub fn new(status: BridgeState) -> Self {
        Self {
            status,
            message: None,
            timestamp: Utc::now(),
        }
    }

    /// Report for a bridge that is up.
    #[must_use]
    pub fn online() -> Self {
        Self::new(BridgeState::Online)
    }

    /// Report for a bridge that is going down.
    #[must_use]
    pub fn offline() -> Self {
        Self::new(BridgeState::Offline)
    }

    /// Report for a failure.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(BridgeState::Error).with_message(message)
    }

    /// Attaches a detail message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}
