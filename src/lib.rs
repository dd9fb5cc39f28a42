// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `plugwise_mqtt` - a bridge between an MQTT broker and a Plugwise
//! heating controller.
//!
//! Inbound command topics (for example set by Google Home through gBridge)
//! are matched against configured, templated topics, turned into controller
//! actions, and the result is published back on a status topic. Telemetry
//! produced by the controller is fanned out to any number of templated
//! data topics.
//!
//! # Topics
//!
//! Topic templates contain `{name}` placeholders. Appliance identifiers
//! are 32 lowercase alphanumeric characters and are recognized in incoming
//! topics wherever the template had a placeholder:
//!
//! ```text
//! listen template: gBridge/u1/{applianceId}/tempset-setpoint/set
//! subscription:    gBridge/u1/+/tempset-setpoint/set
//! incoming topic:  gBridge/u1/3a19bccef5982bde990632fd4f5894d4/tempset-setpoint/set
//! status topic:    gBridge/u1/3a19bccef5982bde990632fd4f5894d4/tempset-setpoint
//! ```
//!
//! # Quick Start
//!
//! ```no_run
//! use plugwise_mqtt::bridge::Bridge;
//! use plugwise_mqtt::config::BridgeConfig;
//! use plugwise_mqtt::controller::PlugwiseClient;
//! use plugwise_mqtt::protocol::MqttTransport;
//! use plugwise_mqtt::telemetry::StatusMessage;
//!
//! #[tokio::main]
//! async fn main() -> plugwise_mqtt::Result<()> {
//!     let config = BridgeConfig::load("config.json")?;
//!     let controller = PlugwiseClient::new(&config.plugwise)?;
//!     let (transport, mut events) = MqttTransport::connect(&config.mqtt).await?;
//!
//!     let bridge = Bridge::new(transport, controller, &config.mqtt);
//!     bridge.publish_status(&StatusMessage::online()).await;
//!
//!     let result = bridge.run(&mut events).await;
//!     bridge.shutdown().await?;
//!     result
//! }
//! ```

pub mod bridge;
pub mod config;
pub mod controller;
pub mod error;
pub mod protocol;
pub mod telemetry;
pub mod topic;

pub use bridge::{Bridge, Dispatch, Outbound};
pub use config::{BridgeConfig, MessageTemplate, MqttConfig, PlugwiseConfig};
#[cfg(feature = "http")]
pub use controller::PlugwiseClient;
pub use controller::HeatingController;
pub use error::{ConfigError, DeviceError, Error, ProtocolError, Result};
#[cfg(feature = "mqtt")]
pub use protocol::MqttTransport;
pub use protocol::{RecordingTransport, Transport, TransportEvent};
pub use telemetry::{BridgeState, StatusMessage, TelemetryMessage};
pub use topic::{ActionLookup, ActionType, ApplianceId};
