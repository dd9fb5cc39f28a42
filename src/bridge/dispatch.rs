// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Inbound command handling.

use crate::controller::{HeatingController, parse_temperature};
use crate::error::Error;
use crate::protocol::Transport;
use crate::topic::{ActionEntry, ActionType, ApplianceId};

use super::Bridge;

/// What happened to one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// The topic is not a configured action topic.
    Unmatched,
    /// The topic matched an action but holds no appliance identifier.
    Malformed,
    /// The payload was published back on the status topic.
    Mirrored {
        /// Rendered status topic.
        status_topic: String,
        /// Whether the transport accepted the publish.
        published: bool,
    },
    /// The controller refused the command; nothing was published.
    Rejected,
    /// The action type has no behaviour attached.
    Unhandled {
        /// Configured action type name.
        action: String,
    },
}

impl<T: Transport, D: HeatingController> Bridge<T, D> {
    /// Handles one inbound message.
    ///
    /// Messages on topics that are not action topics are ignored without
    /// complaint. An action topic without an appliance identifier is logged
    /// as an error and dropped.
    pub async fn handle_message(&self, topic: &str, payload: &str) -> Dispatch {
        tracing::debug!(topic = %topic, message = %payload, "MQTT message received");

        let Some(entry) = self.lookup.resolve(topic) else {
            tracing::trace!(topic = %topic, "Not an action topic");
            return Dispatch::Unmatched;
        };

        tracing::info!(
            topic = %topic,
            action = %entry.action(),
            listen = %entry.topics().listen,
            status = %entry.topics().status,
            message = %payload,
            "Action topic match"
        );

        let Some(appliance) = ApplianceId::find(topic) else {
            let error = Error::MalformedTopic {
                topic: topic.to_string(),
            };
            tracing::error!(error = %error, "Cannot handle message");
            return Dispatch::Malformed;
        };

        let status_topic = entry.status().render_for(&appliance);

        match entry.action() {
            ActionType::Thermostat => {
                self.set_thermostat(entry, topic, &appliance, status_topic, payload)
                    .await
            }
            // Mirror unconditionally so the command source does not keep
            // showing the previous mode.
            ActionType::Scene => self.mirror(status_topic, payload).await,
            ActionType::Other(action) => {
                tracing::debug!(topic = %topic, action = %action, "No behaviour for action type");
                Dispatch::Unhandled {
                    action: action.clone(),
                }
            }
        }
    }

    async fn set_thermostat(
        &self,
        entry: &ActionEntry,
        topic: &str,
        appliance: &ApplianceId,
        status_topic: String,
        payload: &str,
    ) -> Dispatch {
        let result = match parse_temperature(payload) {
            Ok(temperature) => {
                self.controller
                    .set_temperature(appliance, temperature)
                    .await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => self.mirror(status_topic, payload).await,
            Err(e) => {
                let error = Error::Device(e);
                tracing::error!(
                    topic = %topic,
                    appliance = %appliance,
                    listen = %entry.topics().listen,
                    status = %entry.topics().status,
                    message = %payload,
                    error = %error,
                    "Error setting thermostat"
                );
                Dispatch::Rejected
            }
        }
    }

    async fn mirror(&self, status_topic: String, payload: &str) -> Dispatch {
        let published = self.send(&status_topic, payload).await;
        Dispatch::Mirrored {
            status_topic,
            published,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use parking_lot::Mutex;

    use super::*;
    use crate::config::MqttConfig;
    use crate::error::DeviceError;
    use crate::protocol::{PublishedMessage, RecordingTransport};

    const ID: &str = "3a19bccef5982bde990632fd4f5894d4";

    #[derive(Default)]
    struct FakeController {
        fail: bool,
        calls: AtomicU32,
        last: Mutex<Option<(String, f64)>>,
    }

    impl HeatingController for FakeController {
        async fn set_temperature(
            &self,
            appliance: &ApplianceId,
            temperature: f64,
        ) -> Result<(), DeviceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last.lock() = Some((appliance.to_string(), temperature));
            if self.fail {
                Err(DeviceError::Rejected { status: 500 })
            } else {
                Ok(())
            }
        }
    }

    fn config() -> MqttConfig {
        MqttConfig::new("localhost")
            .with_action(
                "gbridge",
                "thermostat",
                "gBridge/u1/{applianceId}/thermostat/set",
                "gBridge/u1/{applianceId}/thermostat",
            )
            .with_action(
                "gbridge",
                "scene",
                "gBridge/u1/{applianceId}/scene/set",
                "gBridge/u1/{applianceId}/scene",
            )
            .with_action(
                "gbridge",
                "boiler",
                "gBridge/u1/{applianceId}/boiler/set",
                "gBridge/u1/{applianceId}/boiler",
            )
            .with_action("literal", "scene", "home/mode/set", "home/mode")
    }

    fn bridge(fail: bool) -> (Bridge<RecordingTransport, FakeController>, RecordingTransport) {
        let transport = RecordingTransport::new();
        let controller = FakeController {
            fail,
            ..FakeController::default()
        };
        (Bridge::new(transport.clone(), controller, &config()), transport)
    }

    #[tokio::test]
    async fn thermostat_success_mirrors_raw_payload() {
        let (bridge, transport) = bridge(false);

        let outcome = bridge
            .handle_message(&format!("gBridge/u1/{ID}/thermostat/set"), "21.5")
            .await;

        assert_eq!(
            outcome,
            Dispatch::Mirrored {
                status_topic: format!("gBridge/u1/{ID}/thermostat"),
                published: true,
            }
        );
        assert_eq!(
            transport.published(),
            vec![PublishedMessage {
                topic: format!("gBridge/u1/{ID}/thermostat"),
                payload: "21.5".to_string(),
            }]
        );

        let last = bridge.controller().last.lock().clone().unwrap();
        assert_eq!(last.0, ID);
        assert!((last.1 - 21.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn thermostat_payload_is_not_normalized() {
        let (bridge, transport) = bridge(false);

        bridge
            .handle_message(&format!("gBridge/u1/{ID}/thermostat/set"), " 20 ")
            .await;

        assert_eq!(transport.published()[0].payload, " 20 ");
    }

    #[tokio::test]
    async fn thermostat_failure_publishes_nothing() {
        let (bridge, transport) = bridge(true);

        let outcome = bridge
            .handle_message(&format!("gBridge/u1/{ID}/thermostat/set"), "21.5")
            .await;

        assert_eq!(outcome, Dispatch::Rejected);
        assert_eq!(bridge.controller().calls.load(Ordering::SeqCst), 1);
        assert!(transport.published().is_empty());
    }

    #[tokio::test]
    async fn thermostat_unparsable_payload_skips_controller() {
        let (bridge, transport) = bridge(false);

        let outcome = bridge
            .handle_message(&format!("gBridge/u1/{ID}/thermostat/set"), "warm")
            .await;

        assert_eq!(outcome, Dispatch::Rejected);
        assert_eq!(bridge.controller().calls.load(Ordering::SeqCst), 0);
        assert!(transport.published().is_empty());
    }

    #[tokio::test]
    async fn scene_mirrors_even_when_controller_fails() {
        let (bridge, transport) = bridge(true);

        let outcome = bridge
            .handle_message(&format!("gBridge/u1/{ID}/scene/set"), "Heat")
            .await;

        assert!(matches!(outcome, Dispatch::Mirrored { published: true, .. }));
        assert_eq!(bridge.controller().calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            transport.published(),
            vec![PublishedMessage {
                topic: format!("gBridge/u1/{ID}/scene"),
                payload: "Heat".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn unknown_action_type_is_noop() {
        let (bridge, transport) = bridge(false);

        let outcome = bridge
            .handle_message(&format!("gBridge/u1/{ID}/boiler/set"), "on")
            .await;

        assert_eq!(
            outcome,
            Dispatch::Unhandled {
                action: "boiler".to_string()
            }
        );
        assert!(transport.published().is_empty());
    }

    #[tokio::test]
    async fn unmatched_topic_ignored() {
        let (bridge, transport) = bridge(false);

        assert_eq!(
            bridge
                .handle_message(&format!("gBridge/u1/{ID}/thermostat"), "21.5")
                .await,
            Dispatch::Unmatched
        );
        assert_eq!(
            bridge.handle_message("random/topic", "x").await,
            Dispatch::Unmatched
        );
        assert!(transport.published().is_empty());
        assert_eq!(bridge.controller().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn matched_topic_without_identifier_is_malformed() {
        let (bridge, transport) = bridge(false);

        let outcome = bridge.handle_message("home/mode/set", "Heat").await;

        assert_eq!(outcome, Dispatch::Malformed);
        assert!(transport.published().is_empty());
    }

    #[tokio::test]
    async fn publish_failure_is_reported_not_fatal() {
        let (bridge, transport) = bridge(false);
        transport.fail_publishes();

        let outcome = bridge
            .handle_message(&format!("gBridge/u1/{ID}/scene/set"), "Off")
            .await;

        assert!(matches!(
            outcome,
            Dispatch::Mirrored {
                published: false,
                ..
            }
        ));
    }
}
