// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end tests of the bridge over an in-memory transport.

use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;
use plugwise_mqtt::bridge::{Bridge, Dispatch};
use plugwise_mqtt::config::BridgeConfig;
use plugwise_mqtt::controller::HeatingController;
use plugwise_mqtt::protocol::{PublishedMessage, RecordingTransport, TransportEvent};
use plugwise_mqtt::telemetry::{StatusMessage, TelemetryMessage};
use plugwise_mqtt::topic::ApplianceId;
use plugwise_mqtt::{DeviceError, Error};
use tokio::sync::mpsc;

const THERMOSTAT: &str = "3a19bccef5982bde990632fd4f5894d4";
const LIVING_ROOM: &str = "9c2e4f1a0b3d5e7f9a1c3e5f7a9b1d3f";

const CONFIG: &str = r#"{
    "mqtt": {
        "server": "mqtt://broker.local",
        "topics": {
            "action": {
                "gbridge": {
                    "thermostat": {
                        "listen": "gBridge/u1/{applianceId}/tempset-setpoint/set",
                        "status": "gBridge/u1/{applianceId}/tempset-setpoint"
                    },
                    "scene": {
                        "listen": "gBridge/u1/{applianceId}/tempset-mode/set",
                        "status": "gBridge/u1/{applianceId}/tempset-mode"
                    }
                }
            },
            "status": {
                "main": { "topic": "plugwise/bridge/status" }
            },
            "data": {
                "all": {
                    "topic": "plugwise/{applianceId}",
                    "message": "MQTT_MESSAGE_COMPLETE"
                },
                "ambient": {
                    "topic": "gBridge/u1/{applianceId}/tempset-ambient/set",
                    "message": "{temperature}"
                }
            }
        }
    },
    "plugwise": {
        "host": "192.168.1.60",
        "password": "abcdefgh"
    }
}"#;

/// Controller that records setpoints and refuses some appliances.
#[derive(Default)]
struct Thermostats {
    refused: Option<String>,
    calls: AtomicU32,
    setpoints: Mutex<Vec<(String, f64)>>,
}

impl HeatingController for Thermostats {
    async fn set_temperature(
        &self,
        appliance: &ApplianceId,
        temperature: f64,
    ) -> Result<(), DeviceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.refused.as_deref() == Some(appliance.as_str()) {
            return Err(DeviceError::Rejected { status: 400 });
        }
        self.setpoints
            .lock()
            .push((appliance.to_string(), temperature));
        Ok(())
    }
}

fn bridge_with(
    controller: Thermostats,
    dry_run: bool,
) -> (Bridge<RecordingTransport, Thermostats>, RecordingTransport) {
    let mut config = BridgeConfig::from_json(CONFIG).unwrap();
    config.mqtt.dry_run = dry_run;
    let transport = RecordingTransport::new();
    let bridge = Bridge::new(transport.clone(), controller, &config.mqtt);
    (bridge, transport)
}

fn bridge() -> (Bridge<RecordingTransport, Thermostats>, RecordingTransport) {
    bridge_with(Thermostats::default(), false)
}

fn message(topic: String, payload: &str) -> TransportEvent {
    TransportEvent::Message {
        topic,
        payload: payload.to_string(),
    }
}

// ============================================================================
// Event loop
// ============================================================================

mod event_loop {
    use super::*;

    #[tokio::test]
    async fn connect_subscribes_then_dispatches_in_order() {
        let (bridge, transport) = bridge();
        let (tx, mut rx) = mpsc::channel(8);

        tx.send(TransportEvent::Connected).await.unwrap();
        tx.send(message(
            format!("gBridge/u1/{THERMOSTAT}/tempset-setpoint/set"),
            "21.5",
        ))
        .await
        .unwrap();
        tx.send(message(
            format!("gBridge/u1/{LIVING_ROOM}/tempset-mode/set"),
            "heat",
        ))
        .await
        .unwrap();
        tx.send(message("zigbee2mqtt/bridge/state".to_string(), "online"))
            .await
            .unwrap();
        tx.send(TransportEvent::Disconnected("broker went away".to_string()))
            .await
            .unwrap();

        let result = bridge.run(&mut rx).await;
        assert!(matches!(result, Err(Error::Connect(_))));

        // Configuration file order
        assert_eq!(
            transport.subscriptions(),
            vec![
                "gBridge/u1/+/tempset-setpoint/set",
                "gBridge/u1/+/tempset-setpoint",
                "gBridge/u1/+/tempset-mode/set",
                "gBridge/u1/+/tempset-mode",
            ]
        );

        assert_eq!(
            transport.published(),
            vec![
                PublishedMessage {
                    topic: format!("gBridge/u1/{THERMOSTAT}/tempset-setpoint"),
                    payload: "21.5".to_string(),
                },
                PublishedMessage {
                    topic: format!("gBridge/u1/{LIVING_ROOM}/tempset-mode"),
                    payload: "heat".to_string(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn closed_event_stream_is_connect_error() {
        let (bridge, _transport) = bridge();
        let (tx, mut rx) = mpsc::channel(1);
        drop(tx);

        assert!(matches!(bridge.run(&mut rx).await, Err(Error::Connect(_))));
    }

    #[tokio::test]
    async fn reconnect_subscribes_again() {
        let (bridge, transport) = bridge();
        let (tx, mut rx) = mpsc::channel(4);

        tx.send(TransportEvent::Connected).await.unwrap();
        tx.send(TransportEvent::Connected).await.unwrap();
        drop(tx);

        let _ = bridge.run(&mut rx).await;
        assert_eq!(transport.subscriptions().len(), 8);
    }

    #[tokio::test]
    async fn failed_subscription_does_not_block_others() {
        let (bridge, transport) = bridge();
        transport.fail_subscription("gBridge/u1/+/tempset-setpoint/set");

        assert_eq!(bridge.on_connected().await, 3);
        assert_eq!(transport.subscriptions().len(), 3);
    }
}

// ============================================================================
// Commands
// ============================================================================

mod commands {
    use super::*;

    #[tokio::test]
    async fn status_topic_echo_is_not_a_command() {
        let (bridge, transport) = bridge();

        // The bridge also subscribes to status topics and receives its own echo
        let outcome = bridge
            .handle_message(&format!("gBridge/u1/{THERMOSTAT}/tempset-setpoint"), "21.5")
            .await;

        assert_eq!(outcome, Dispatch::Unmatched);
        assert!(transport.published().is_empty());
        assert_eq!(bridge.controller().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn refused_setpoint_leaves_other_appliances_working() {
        let controller = Thermostats {
            refused: Some(THERMOSTAT.to_string()),
            ..Thermostats::default()
        };
        let (bridge, transport) = bridge_with(controller, false);

        let refused = bridge
            .handle_message(&format!("gBridge/u1/{THERMOSTAT}/tempset-setpoint/set"), "30")
            .await;
        let accepted = bridge
            .handle_message(&format!("gBridge/u1/{LIVING_ROOM}/tempset-setpoint/set"), "19")
            .await;

        assert_eq!(refused, Dispatch::Rejected);
        assert!(matches!(accepted, Dispatch::Mirrored { published: true, .. }));
        assert_eq!(transport.published().len(), 1);
        assert_eq!(
            *bridge.controller().setpoints.lock(),
            vec![(LIVING_ROOM.to_string(), 19.0)]
        );
    }

    #[tokio::test]
    async fn uppercase_identifier_is_not_an_appliance() {
        let (bridge, transport) = bridge();

        let outcome = bridge
            .handle_message(
                "gBridge/u1/3A19BCCEF5982BDE990632FD4F5894D4/tempset-setpoint/set",
                "21",
            )
            .await;

        assert_eq!(outcome, Dispatch::Unmatched);
        assert!(transport.published().is_empty());
    }
}

// ============================================================================
// Telemetry and status
// ============================================================================

mod outbound {
    use super::*;

    fn readings() -> Vec<TelemetryMessage> {
        vec![
            TelemetryMessage::new(THERMOSTAT)
                .with_field("name", "Living room")
                .with_field("temperature", 20.25),
        ]
    }

    #[tokio::test]
    async fn telemetry_reaches_every_data_topic() {
        let (bridge, transport) = bridge();

        let outbound = bridge.publish_telemetry(&readings()).await;

        assert_eq!(outbound.len(), 2);
        let published = transport.published();
        assert_eq!(published[0].topic, format!("plugwise/{THERMOSTAT}"));
        let decoded: serde_json::Value = serde_json::from_str(&published[0].payload).unwrap();
        assert_eq!(decoded["id"], THERMOSTAT);
        assert_eq!(decoded["name"], "Living room");
        assert_eq!(
            published[1].topic,
            format!("gBridge/u1/{THERMOSTAT}/tempset-ambient/set")
        );
        assert_eq!(published[1].payload, "20.25");
    }

    #[tokio::test]
    async fn dry_run_computes_everything_and_publishes_nothing() {
        let (bridge, transport) = bridge_with(Thermostats::default(), true);

        let outbound = bridge.publish_telemetry(&readings()).await;

        assert_eq!(outbound.len(), 2);
        assert_eq!(outbound[1].payload, "20.25");
        assert!(outbound.iter().all(|o| !o.published));
        assert!(transport.published().is_empty());
    }

    #[tokio::test]
    async fn status_is_published_even_in_dry_run() {
        let (bridge, transport) = bridge_with(Thermostats::default(), true);

        assert_eq!(bridge.publish_status(&StatusMessage::online()).await, 1);
        assert_eq!(transport.published()[0].topic, "plugwise/bridge/status");
    }
}

// ============================================================================
// Shutdown
// ============================================================================

mod shutdown {
    use super::*;

    #[tokio::test]
    async fn clean_close_succeeds() {
        let (bridge, transport) = bridge();

        assert!(bridge.shutdown().await.is_ok());
        assert!(transport.is_disconnected());
    }

    #[tokio::test]
    async fn failed_close_is_shutdown_error() {
        let (bridge, transport) = bridge();
        transport.fail_disconnect();

        assert!(matches!(bridge.shutdown().await, Err(Error::Shutdown(_))));
    }
}
