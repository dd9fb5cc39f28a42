// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Broker transports.
//!
//! The bridge talks to the broker through the [`Transport`] trait and is
//! driven by the [`TransportEvent`]s the transport produces.
//!
//! - [`MqttTransport`]: a real broker connection via `rumqttc`
//! - [`RecordingTransport`]: an in-memory transport that records traffic

mod memory;
#[cfg(feature = "mqtt")]
mod mqtt;

pub use memory::{PublishedMessage, RecordingTransport};
#[cfg(feature = "mqtt")]
pub use mqtt::MqttTransport;

use crate::error::ProtocolError;

/// Something that happened on the broker connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The broker accepted the connection (also after a reconnect).
    Connected,
    /// A message arrived on a subscribed topic.
    Message {
        /// Concrete topic.
        topic: String,
        /// UTF-8 payload.
        payload: String,
    },
    /// The connection is gone and will not come back.
    Disconnected(String),
}

/// Operations the bridge needs from a broker connection.
///
/// `publish` returns once the message is handed to the connection; it does
/// not wait for the broker to acknowledge delivery.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Subscribes to a topic filter.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the request cannot be sent.
    async fn subscribe(&self, filter: &str) -> Result<(), ProtocolError>;

    /// Publishes a payload to a concrete topic.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the message cannot be queued.
    async fn publish(&self, topic: &str, payload: String) -> Result<(), ProtocolError>;

    /// Closes the connection.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the connection did not close cleanly.
    async fn disconnect(&self) -> Result<(), ProtocolError>;
}
