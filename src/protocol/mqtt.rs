// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MQTT broker connection.
//!
//! # Examples
//!
//! ```no_run
//! use plugwise_mqtt::config::MqttConfig;
//! use plugwise_mqtt::protocol::{MqttTransport, Transport, TransportEvent};
//!
//! # async fn example() -> plugwise_mqtt::Result<()> {
//! let config = MqttConfig::new("mqtt://192.168.1.50");
//! let (transport, mut events) = MqttTransport::connect(&config).await?;
//!
//! while let Some(event) = events.recv().await {
//!     if let TransportEvent::Message { topic, payload } = event {
//!         println!("{topic}: {payload}");
//!     }
//! }
//!
//! transport
//!     .disconnect()
//!     .await
//!     .map_err(|e| plugwise_mqtt::Error::Shutdown(e.to_string()))?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use rumqttc::{
    AsyncClient, ClientError, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS,
    SubscribeReasonCode,
};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::MqttConfig;
use crate::error::{Error, ProtocolError};

use super::{Transport, TransportEvent};

/// Capacity of the rumqttc request queue.
const REQUEST_CAPACITY: usize = 100;

/// Capacity of the channel delivering events to the bridge.
const EVENT_CAPACITY: usize = 64;

/// How long disconnect waits for the event loop to wind down.
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// A connection to the MQTT broker.
///
/// Incoming messages are handed to the caller through the event channel
/// returned by [`MqttTransport::connect`], one at a time and in arrival
/// order. The connection is not re-established once lost.
///
/// Requests never wait for the event loop: when the request queue is full,
/// the request is handed to a background task and its failure is logged
/// there. Such requests may reach the broker after later ones.
#[derive(Clone)]
pub struct MqttTransport {
    inner: Arc<MqttTransportInner>,
}

struct MqttTransportInner {
    client: AsyncClient,
    host: String,
    port: u16,
    connected: AtomicBool,
    closing: AtomicBool,
    event_task: Mutex<Option<JoinHandle<()>>>,
}

impl MqttTransport {
    /// Connects to the broker and waits for it to accept the connection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connect`] if the address is invalid, the broker
    /// refuses the connection, or no answer arrives within the configured
    /// connection timeout.
    pub async fn connect(
        config: &MqttConfig,
    ) -> Result<(Self, mpsc::Receiver<TransportEvent>), Error> {
        let (host, port) = parse_broker_url(&config.server, config.port).map_err(Error::Connect)?;

        let client_id = config
            .client_id
            .clone()
            .unwrap_or_else(|| format!("plugwise_mqtt_{}", uuid::Uuid::new_v4().simple()));

        tracing::info!(server = %host, port, client_id = %client_id, "Connecting to MQTT server");

        let mut mqtt_options = MqttOptions::new(&client_id, &host, port);
        mqtt_options.set_keep_alive(config.keep_alive());
        mqtt_options.set_clean_session(true);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            mqtt_options.set_credentials(username, password);
        }

        let (client, event_loop) = AsyncClient::new(mqtt_options, REQUEST_CAPACITY);

        let transport = Self {
            inner: Arc::new(MqttTransportInner {
                client,
                host,
                port,
                connected: AtomicBool::new(false),
                closing: AtomicBool::new(false),
                event_task: Mutex::new(None),
            }),
        };

        let (events_tx, events_rx) = mpsc::channel(EVENT_CAPACITY);
        let (connack_tx, connack_rx) = oneshot::channel();

        let handle = tokio::spawn(handle_events(
            event_loop,
            Arc::clone(&transport.inner),
            events_tx,
            connack_tx,
        ));
        *transport.inner.event_task.lock() = Some(handle);

        let timeout = config.connection_timeout();
        match tokio::time::timeout(timeout, connack_rx).await {
            Ok(Ok(())) => {
                tracing::info!(
                    server = %transport.inner.host,
                    port = transport.inner.port,
                    "Connected to MQTT server"
                );
                Ok((transport, events_rx))
            }
            Ok(Err(_)) => {
                transport.abort_event_loop();
                Err(Error::Connect(ProtocolError::ConnectionFailed(
                    "MQTT event loop terminated before the broker accepted the connection"
                        .to_string(),
                )))
            }
            Err(_) => {
                transport.abort_event_loop();
                #[allow(clippy::cast_possible_truncation)]
                let timeout_ms = timeout.as_millis() as u64;
                Err(Error::Connect(ProtocolError::Timeout(timeout_ms)))
            }
        }
    }

    /// Returns whether the broker connection is currently up.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::Acquire)
    }

    /// Returns the broker host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.inner.host
    }

    /// Returns the broker port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.inner.port
    }

    fn abort_event_loop(&self) {
        if let Some(handle) = self.inner.event_task.lock().take() {
            handle.abort();
        }
    }
}

impl Transport for MqttTransport {
    async fn subscribe(&self, filter: &str) -> Result<(), ProtocolError> {
        match self.inner.client.try_subscribe(filter, QoS::AtLeastOnce) {
            Ok(()) => Ok(()),
            Err(ClientError::TryRequest(_)) => {
                let client = self.inner.client.clone();
                let filter = filter.to_string();
                tokio::spawn(async move {
                    if let Err(e) = client.subscribe(filter.as_str(), QoS::AtLeastOnce).await {
                        tracing::error!(topic = %filter, error = %e, "MQTT subscribe failed");
                    }
                });
                Ok(())
            }
            Err(e) => Err(ProtocolError::Mqtt(e)),
        }
    }

    async fn publish(&self, topic: &str, payload: String) -> Result<(), ProtocolError> {
        match self
            .inner
            .client
            .try_publish(topic, QoS::AtLeastOnce, false, payload.clone())
        {
            Ok(()) => Ok(()),
            Err(ClientError::TryRequest(_)) => {
                tracing::debug!(topic = %topic, "MQTT request queue full, publishing later");
                let client = self.inner.client.clone();
                let topic = topic.to_string();
                tokio::spawn(async move {
                    if let Err(e) = client
                        .publish(topic.as_str(), QoS::AtLeastOnce, false, payload)
                        .await
                    {
                        tracing::error!(topic = %topic, error = %e, "MQTT publish failed");
                    }
                });
                Ok(())
            }
            Err(e) => Err(ProtocolError::Mqtt(e)),
        }
    }

    async fn disconnect(&self) -> Result<(), ProtocolError> {
        tracing::info!(
            server = %self.inner.host,
            port = self.inner.port,
            "Disconnecting from MQTT server"
        );

        self.inner.closing.store(true, Ordering::Release);
        self.inner
            .client
            .disconnect()
            .await
            .map_err(ProtocolError::Mqtt)?;

        let handle = self.inner.event_task.lock().take();
        if let Some(handle) = handle {
            #[allow(clippy::cast_possible_truncation)]
            let timeout_ms = DISCONNECT_TIMEOUT.as_millis() as u64;
            tokio::time::timeout(DISCONNECT_TIMEOUT, handle)
                .await
                .map_err(|_| ProtocolError::Timeout(timeout_ms))?
                .map_err(|e| ProtocolError::ConnectionFailed(format!("event loop failed: {e}")))?;
        }

        self.inner.connected.store(false, Ordering::Release);
        Ok(())
    }
}

impl std::fmt::Debug for MqttTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttTransport")
            .field("host", &self.inner.host)
            .field("port", &self.inner.port)
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// Parses a broker URL into host and port.
///
/// A port in the URL wins over `default_port`.
fn parse_broker_url(url: &str, default_port: u16) -> Result<(String, u16), ProtocolError> {
    let url = url.trim();
    let url = url
        .strip_prefix("mqtt://")
        .or_else(|| url.strip_prefix("tcp://"))
        .unwrap_or(url)
        .trim_end_matches('/');

    let (host, port) = if let Some((h, p)) = url.rsplit_once(':') {
        let port = p
            .parse()
            .map_err(|_| ProtocolError::InvalidAddress(format!("invalid port: {p}")))?;
        (h, port)
    } else {
        (url, default_port)
    };

    if host.is_empty() {
        return Err(ProtocolError::InvalidAddress(
            "MQTT broker host is required".to_string(),
        ));
    }

    Ok((host.to_string(), port))
}

/// Number of filters in a SUBACK the broker did not grant.
fn refused_filters(return_codes: &[SubscribeReasonCode]) -> usize {
    return_codes
        .iter()
        .filter(|code| matches!(code, SubscribeReasonCode::Failure))
        .count()
}

/// Drives the rumqttc event loop and forwards what the bridge cares about.
async fn handle_events(
    mut event_loop: EventLoop,
    inner: Arc<MqttTransportInner>,
    events_tx: mpsc::Sender<TransportEvent>,
    connack_tx: oneshot::Sender<()>,
) {
    let mut connack_tx = Some(connack_tx);

    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(connack))) => {
                tracing::debug!(?connack, "MQTT connection acknowledged");
                inner.connected.store(true, Ordering::Release);
                if let Some(tx) = connack_tx.take() {
                    let _ = tx.send(());
                }
                let _ = events_tx.send(TransportEvent::Connected).await;
            }
            Ok(Event::Incoming(Packet::SubAck(suback))) => {
                if refused_filters(&suback.return_codes) > 0 {
                    tracing::error!(
                        pkid = suback.pkid,
                        codes = ?suback.return_codes,
                        "MQTT broker refused subscription"
                    );
                } else {
                    tracing::info!(pkid = suback.pkid, granted = ?suback.return_codes, "MQTT subscribed");
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                match String::from_utf8(publish.payload.to_vec()) {
                    Ok(payload) => {
                        let event = TransportEvent::Message {
                            topic: publish.topic,
                            payload,
                        };
                        // Receiver gone means the bridge stopped listening
                        let _ = events_tx.send(event).await;
                    }
                    Err(e) => {
                        tracing::warn!(topic = %publish.topic, error = %e, "Dropping non UTF-8 MQTT message");
                    }
                }
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                tracing::debug!("MQTT disconnect sent");
                inner.connected.store(false, Ordering::Release);
                break;
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                tracing::warn!("MQTT broker closed the connection");
                inner.connected.store(false, Ordering::Release);
                let _ = events_tx
                    .send(TransportEvent::Disconnected(
                        "broker sent DISCONNECT".to_string(),
                    ))
                    .await;
                break;
            }
            Ok(_) => {}
            Err(e) => {
                inner.connected.store(false, Ordering::Release);
                if inner.closing.load(Ordering::Acquire) {
                    tracing::debug!(error = %e, "MQTT event loop stopped while closing");
                } else {
                    tracing::error!(error = %e, "MQTT event loop error");
                    let _ = events_tx
                        .send(TransportEvent::Disconnected(e.to_string()))
                        .await;
                }
                break;
            }
        }
    }
}
