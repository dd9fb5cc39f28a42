// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-memory transport for tests and embedding.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::ProtocolError;

use super::Transport;

/// A message handed to [`RecordingTransport::publish`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    /// Concrete topic.
    pub topic: String,
    /// Payload as published.
    pub payload: String,
}

#[derive(Debug, Default)]
struct Recorded {
    subscriptions: Vec<String>,
    published: Vec<PublishedMessage>,
    failing_filters: HashSet<String>,
    fail_publish: bool,
    fail_disconnect: bool,
    disconnected: bool,
}

/// Transport that records every request instead of talking to a broker.
///
/// Clones share the same record, so a test can keep one handle while the
/// bridge owns another.
///
/// # Examples
///
/// ```
/// use plugwise_mqtt::protocol::{RecordingTransport, Transport};
///
/// # async fn example() {
/// let transport = RecordingTransport::new();
/// transport.publish("plugwise/status", "{}".to_string()).await.unwrap();
/// assert_eq!(transport.published()[0].topic, "plugwise/status");
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct RecordingTransport {
    inner: Arc<Mutex<Recorded>>,
}

impl RecordingTransport {
    /// Creates a transport on which every request succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subscribing to `filter` fail.
    pub fn fail_subscription(&self, filter: impl Into<String>) {
        self.inner.lock().failing_filters.insert(filter.into());
    }

    /// Makes every publish fail.
    pub fn fail_publishes(&self) {
        self.inner.lock().fail_publish = true;
    }

    /// Makes disconnect fail.
    pub fn fail_disconnect(&self) {
        self.inner.lock().fail_disconnect = true;
    }

    /// Filters subscribed so far, failed ones excluded.
    #[must_use]
    pub fn subscriptions(&self) -> Vec<String> {
        self.inner.lock().subscriptions.clone()
    }

    /// Messages published so far, failed ones excluded.
    #[must_use]
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.inner.lock().published.clone()
    }

    /// Returns true once disconnect succeeded.
    #[must_use]
    pub fn is_disconnected(&self) -> bool {
        self.inner.lock().disconnected
    }
}

impl Transport for RecordingTransport {
    async fn subscribe(&self, filter: &str) -> Result<(), ProtocolError> {
        let mut recorded = self.inner.lock();
        if recorded.failing_filters.contains(filter) {
            return Err(ProtocolError::ConnectionFailed(format!(
                "subscription to {filter} refused"
            )));
        }
        recorded.subscriptions.push(filter.to_string());
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: String) -> Result<(), ProtocolError> {
        let mut recorded = self.inner.lock();
        if recorded.fail_publish {
            return Err(ProtocolError::ChannelClosed("publish refused".to_string()));
        }
        recorded.published.push(PublishedMessage {
            topic: topic.to_string(),
            payload,
        });
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), ProtocolError> {
        let mut recorded = self.inner.lock();
        if recorded.fail_disconnect {
            return Err(ProtocolError::ConnectionFailed(
                "connection did not close".to_string(),
            ));
        }
        recorded.disconnected = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_subscriptions_and_publishes() {
        let transport = RecordingTransport::new();
        transport.subscribe("a/+/b").await.unwrap();
        transport.publish("a/1/b", "21.5".to_string()).await.unwrap();

        assert_eq!(transport.subscriptions(), vec!["a/+/b".to_string()]);
        assert_eq!(
            transport.published(),
            vec![PublishedMessage {
                topic: "a/1/b".to_string(),
                payload: "21.5".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn clones_share_record() {
        let transport = RecordingTransport::new();
        let handle = transport.clone();
        transport.publish("t", "p".to_string()).await.unwrap();
        assert_eq!(handle.published().len(), 1);
    }

    #[tokio::test]
    async fn configured_failures() {
        let transport = RecordingTransport::new();
        transport.fail_subscription("bad/+");
        transport.fail_publishes();
        transport.fail_disconnect();

        assert!(transport.subscribe("bad/+").await.is_err());
        assert!(transport.subscribe("good/+").await.is_ok());
        assert!(transport.publish("t", "p".to_string()).await.is_err());
        assert!(transport.disconnect().await.is_err());

        assert_eq!(transport.subscriptions(), vec!["good/+".to_string()]);
        assert!(transport.published().is_empty());
        assert!(!transport.is_disconnected());
    }
}
