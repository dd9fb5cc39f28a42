// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Outbound telemetry and status publication.

use crate::config::MessageTemplate;
use crate::controller::HeatingController;
use crate::error::{Error, ProtocolError};
use crate::protocol::Transport;
use crate::telemetry::{StatusMessage, TelemetryMessage};
use crate::topic::template::render;

use super::Bridge;

/// One rendered (message, destination) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    /// Name of the data topic in the configuration.
    pub destination: String,
    /// Rendered topic.
    pub topic: String,
    /// Rendered or serialized payload.
    pub payload: String,
    /// Whether the transport accepted it; always false in dry-run mode.
    pub published: bool,
}

impl<T: Transport, D: HeatingController> Bridge<T, D> {
    /// Fans telemetry out to every configured data topic.
    ///
    /// Each message is rendered for each destination. In dry-run mode the
    /// rendered pairs are logged instead of published. Failures are logged
    /// and do not stop the remaining pairs.
    pub async fn publish_telemetry(&self, messages: &[TelemetryMessage]) -> Vec<Outbound> {
        tracing::info!("{} message(s) ready to send", messages.len());

        let mut outbound = Vec::with_capacity(messages.len() * self.topics.data.len());

        for message in messages {
            let bindings = message.bindings();

            for (destination, data_topic) in &self.topics.data {
                let topic = render(&data_topic.topic, &bindings);

                let payload = match &data_topic.message {
                    MessageTemplate::Complete => match serde_json::to_string(message) {
                        Ok(json) => json,
                        Err(e) => {
                            let error = Error::Publish {
                                topic,
                                source: ProtocolError::Serialize(e),
                            };
                            tracing::error!(appliance = %message.id, error = %error, "Cannot encode telemetry");
                            continue;
                        }
                    },
                    MessageTemplate::Template(template) => render(template, &bindings),
                };

                let published = if self.dry_run {
                    tracing::info!(topic = %topic, message = %payload, "dry run enabled; not publishing");
                    false
                } else {
                    tracing::debug!(topic = %topic, message = %payload, "Publishing");
                    self.send(&topic, &payload).await
                };

                outbound.push(Outbound {
                    destination: destination.clone(),
                    topic,
                    payload,
                    published,
                });
            }
        }

        outbound
    }

    /// Publishes a status report to every configured status topic.
    ///
    /// Returns the number of topics the transport accepted.
    pub async fn publish_status(&self, status: &StatusMessage) -> usize {
        if self.topics.status.is_empty() {
            return 0;
        }

        let payload = match serde_json::to_string(status) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(error = %e, "Cannot encode status message");
                return 0;
            }
        };

        let mut published = 0;
        for status_topic in self.topics.status.values() {
            if self.send(&status_topic.topic, &payload).await {
                published += 1;
            }
        }
        published
    }
}
