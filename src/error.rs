// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the bridge.
//!
//! Only [`Error::Connect`] is fatal to the process. Every other failure is
//! logged where it happens and processing continues with the next message
//! or destination; [`Error::Shutdown`] is additionally returned to whoever
//! asked the bridge to stop.

use thiserror::Error;

/// The main error type for this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// The broker could not be reached or the connection was lost.
    #[error("failed to connect to MQTT broker: {0}")]
    Connect(#[source] ProtocolError),

    /// Subscribing to a topic filter failed.
    #[error("failed to subscribe to {pattern}: {source}")]
    Subscribe {
        /// The wildcard topic filter.
        pattern: String,
        /// The underlying transport failure.
        #[source]
        source: ProtocolError,
    },

    /// Publishing a message failed.
    #[error("failed to publish to {topic}: {source}")]
    Publish {
        /// The concrete topic.
        topic: String,
        /// The underlying transport failure.
        #[source]
        source: ProtocolError,
    },

    /// An action topic matched but carried no appliance identifier.
    #[error("no appliance found in action topic {topic}")]
    MalformedTopic {
        /// The incoming topic.
        topic: String,
    },

    /// Closing the broker connection did not complete cleanly.
    #[error("failed closing MQTT connections: {0}")]
    Shutdown(String),

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The heating controller refused or failed an operation.
    #[error("device error: {0}")]
    Device(#[from] DeviceError),
}

/// Errors related to the transport (MQTT) layer.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// MQTT client request could not be queued.
    #[cfg(feature = "mqtt")]
    #[error("MQTT error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    /// Connection to the broker failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Operation timed out.
    #[error("timed out after {0} ms")]
    Timeout(u64),

    /// Invalid broker URL or address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Internal channel was closed.
    #[error("channel closed: {0}")]
    ChannelClosed(String),

    /// A payload could not be encoded.
    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors related to loading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("cannot read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid JSON for the expected layout.
    #[error("cannot parse configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// The file parsed but a value is unusable.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Errors reported by the heating controller.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// HTTP request to the controller failed.
    #[cfg(feature = "http")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The controller answered with a non-success status.
    #[error("controller rejected request with HTTP {status}")]
    Rejected {
        /// HTTP status code returned by the controller.
        status: u16,
    },

    /// The controller refused the credentials.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// A thermostat command payload is not a usable number.
    #[error("invalid temperature: {0:?}")]
    InvalidTemperature(String),
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
