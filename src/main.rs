// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `plugwise-mqtt` - runs the bridge until Ctrl-C or until the broker
//! connection is lost.
//!
//! # Usage
//!
//! ```bash
//! plugwise-mqtt [config.json]
//!
//! # More logging
//! RUST_LOG=plugwise_mqtt=debug plugwise-mqtt /etc/plugwise-mqtt.json
//! ```

use std::env;
use std::process::ExitCode;

use plugwise_mqtt::bridge::Bridge;
use plugwise_mqtt::config::BridgeConfig;
use plugwise_mqtt::controller::PlugwiseClient;
use plugwise_mqtt::protocol::MqttTransport;
use plugwise_mqtt::telemetry::StatusMessage;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = "config.json";

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    match run(&config_path).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Bridge stopped");
            ExitCode::FAILURE
        }
    }
}

async fn run(config_path: &str) -> plugwise_mqtt::Result<()> {
    let config = BridgeConfig::load(config_path)?;
    let controller = PlugwiseClient::new(&config.plugwise)?;

    // No broker means nothing to do: connect errors end the process
    let (transport, mut events) = MqttTransport::connect(&config.mqtt).await?;
    let bridge = Bridge::new(transport, controller, &config.mqtt);

    bridge.publish_status(&StatusMessage::online()).await;

    let outcome = tokio::select! {
        result = bridge.run(&mut events) => result,
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                tracing::warn!(error = %e, "Cannot listen for Ctrl-C, stopping");
            }
            tracing::info!("Shutdown requested");
            Ok(())
        }
    };

    if outcome.is_ok() {
        bridge.publish_status(&StatusMessage::offline()).await;
    }

    let closed = bridge.shutdown().await;
    outcome.and(closed)
}
