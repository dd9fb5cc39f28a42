// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The MQTT ↔ heating controller bridge.
//!
//! # Architecture
//!
//! ```text
//! TransportEvent::Connected
//!         ↓
//!   Bridge::on_connected ── subscribe every listen/status filter
//!
//! TransportEvent::Message: gBridge/u1/<id>/tempset-setpoint/set → 21.5
//!         ↓
//!   Bridge::handle_message
//!         ↓
//!   ActionLookup::resolve ── miss → ignored
//!         ↓
//!   ApplianceId::find ── none → logged, dropped
//!         ↓
//!   thermostat: HeatingController::set_temperature, then mirror
//!   scene:      mirror
//!         ↓
//!   publish payload to rendered status topic
//! ```
//!
//! Telemetry flows the other way through [`Bridge::publish_telemetry`].

mod dispatch;
mod fanout;

pub use dispatch::Dispatch;
pub use fanout::Outbound;

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;

use crate::config::{MqttConfig, TopicsConfig};
use crate::controller::HeatingController;
use crate::error::{Error, ProtocolError, Result};
use crate::protocol::{Transport, TransportEvent};
use crate::topic::ActionLookup;

/// Translates between broker topics and the heating controller.
///
/// One bridge owns one broker connection. It is built by the application
/// and lives until [`Bridge::shutdown`] consumes it.
///
/// # Examples
///
/// ```
/// use plugwise_mqtt::bridge::{Bridge, Dispatch};
/// use plugwise_mqtt::config::MqttConfig;
/// use plugwise_mqtt::controller::HeatingController;
/// use plugwise_mqtt::protocol::RecordingTransport;
/// use plugwise_mqtt::topic::ApplianceId;
/// use plugwise_mqtt::DeviceError;
///
/// struct AlwaysOk;
///
/// impl HeatingController for AlwaysOk {
///     async fn set_temperature(&self, _: &ApplianceId, _: f64) -> Result<(), DeviceError> {
///         Ok(())
///     }
/// }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let config = MqttConfig::new("localhost").with_action(
///     "gbridge",
///     "thermostat",
///     "gBridge/u1/{applianceId}/thermostat/set",
///     "gBridge/u1/{applianceId}/thermostat",
/// );
/// let transport = RecordingTransport::new();
/// let bridge = Bridge::new(transport.clone(), AlwaysOk, &config);
///
/// let outcome = bridge
///     .handle_message("gBridge/u1/3a19bccef5982bde990632fd4f5894d4/thermostat/set", "21.5")
///     .await;
///
/// assert!(matches!(outcome, Dispatch::Mirrored { .. }));
/// assert_eq!(transport.published()[0].payload, "21.5");
/// # }
/// ```
#[derive(Debug)]
pub struct Bridge<T, D> {
    transport: T,
    controller: D,
    lookup: ActionLookup,
    topics: TopicsConfig,
    dry_run: bool,
    connection_lost: AtomicBool,
}

impl<T: Transport, D: HeatingController> Bridge<T, D> {
    /// Creates a bridge and builds its action lookup table.
    #[must_use]
    pub fn new(transport: T, controller: D, config: &MqttConfig) -> Self {
        let lookup = ActionLookup::build(&config.topics.action);
        tracing::debug!(
            actions = lookup.len(),
            status_topics = config.topics.status.len(),
            data_topics = config.topics.data.len(),
            dry_run = config.dry_run,
            "Bridge configured"
        );

        Self {
            transport,
            controller,
            lookup,
            topics: config.topics.clone(),
            dry_run: config.dry_run,
            connection_lost: AtomicBool::new(false),
        }
    }

    /// Returns the transport.
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns the heating controller.
    #[must_use]
    pub fn controller(&self) -> &D {
        &self.controller
    }

    /// Returns the action lookup table.
    #[must_use]
    pub fn lookup(&self) -> &ActionLookup {
        &self.lookup
    }

    /// Returns whether outbound telemetry is only logged.
    #[must_use]
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Subscribes to every configured listen and status topic.
    ///
    /// A failed subscription is logged and does not stop the others.
    /// Returns the number of successful subscriptions.
    pub async fn on_connected(&self) -> usize {
        let mut subscribed = 0;

        for filter in self.lookup.subscription_filters() {
            match self.transport.subscribe(filter).await {
                Ok(()) => {
                    tracing::debug!(topic = %filter, "MQTT subscription requested");
                    subscribed += 1;
                }
                Err(source) => {
                    let error = Error::Subscribe {
                        pattern: filter.clone(),
                        source,
                    };
                    tracing::error!(topic = %filter, error = %error, "MQTT subscribe failed");
                }
            }
        }

        subscribed
    }

    /// Handles transport events one at a time until the connection is lost.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connect`] when the transport reports the connection
    /// gone or the event stream ends.
    pub async fn run(&self, events: &mut mpsc::Receiver<TransportEvent>) -> Result<()> {
        while let Some(event) = events.recv().await {
            match event {
                TransportEvent::Connected => {
                    self.on_connected().await;
                }
                TransportEvent::Message { topic, payload } => {
                    self.handle_message(&topic, &payload).await;
                }
                TransportEvent::Disconnected(reason) => {
                    self.connection_lost.store(true, Ordering::Release);
                    let error = Error::Connect(ProtocolError::ConnectionFailed(reason));
                    tracing::error!(error = %error, "MQTT connection lost");
                    return Err(error);
                }
            }
        }

        self.connection_lost.store(true, Ordering::Release);
        Err(Error::Connect(ProtocolError::ChannelClosed(
            "transport event stream ended".to_string(),
        )))
    }

    /// Closes the broker connection.
    ///
    /// After [`Bridge::run`] reported the connection lost there is nothing
    /// left to close and this succeeds without touching the transport.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Shutdown`] if the connection did not close cleanly.
    pub async fn shutdown(self) -> Result<()> {
        if self.connection_lost.load(Ordering::Acquire) {
            tracing::info!("MQTT connection already closed");
            return Ok(());
        }

        match self.transport.disconnect().await {
            Ok(()) => {
                tracing::info!("MQTT connections closed");
                Ok(())
            }
            Err(e) => {
                let error = Error::Shutdown(e.to_string());
                tracing::error!(error = %error, "MQTT shutdown failed");
                Err(error)
            }
        }
    }

    /// Publishes a payload, logging instead of failing.
    ///
    /// Returns true if the transport accepted the message.
    async fn send(&self, topic: &str, payload: &str) -> bool {
        match self.transport.publish(topic, payload.to_string()).await {
            Ok(()) => true,
            Err(source) => {
                let error = Error::Publish {
                    topic: topic.to_string(),
                    source,
                };
                tracing::error!(topic = %topic, message = %payload, error = %error, "MQTT publish failed");
                false
            }
        }
    }
}
