// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Plugwise Smile (Adam / Anna) HTTP client.

use reqwest::{Client, StatusCode, header};

use crate::config::PlugwiseConfig;
use crate::error::DeviceError;
use crate::topic::ApplianceId;

use super::HeatingController;

/// HTTP client for the Plugwise gateway's local API.
///
/// Setpoints are written with
/// `PUT /core/appliances;id=<appliance>/thermostat` and an XML body,
/// authenticated with HTTP basic auth.
///
/// # Examples
///
/// ```no_run
/// use plugwise_mqtt::config::PlugwiseConfig;
/// use plugwise_mqtt::controller::{HeatingController, PlugwiseClient};
/// use plugwise_mqtt::topic::ApplianceId;
///
/// # async fn example() -> Result<(), plugwise_mqtt::DeviceError> {
/// let client = PlugwiseClient::new(&PlugwiseConfig::new("192.168.1.60", "abcdefgh"))?;
/// let thermostat = ApplianceId::new("3a19bccef5982bde990632fd4f5894d4").unwrap();
/// client.set_temperature(&thermostat, 20.5).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct PlugwiseClient {
    base_url: String,
    client: Client,
    username: String,
    password: String,
}

impl PlugwiseClient {
    /// Creates a client for the configured gateway.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created.
    pub fn new(config: &PlugwiseConfig) -> Result<Self, DeviceError> {
        let host = config.host.trim_end_matches('/');
        let base_url = if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("http://{host}")
        };

        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(DeviceError::Http)?;

        Ok(Self {
            base_url,
            client,
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    /// Returns the base URL of the gateway.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn thermostat_url(&self, appliance: &ApplianceId) -> String {
        format!(
            "{}/core/appliances;id={}/thermostat",
            self.base_url,
            urlencoding::encode(appliance.as_str())
        )
    }
}

fn setpoint_body(temperature: f64) -> String {
    format!(
        "<thermostat_functionality><setpoint>{temperature}</setpoint></thermostat_functionality>"
    )
}

impl HeatingController for PlugwiseClient {
    async fn set_temperature(
        &self,
        appliance: &ApplianceId,
        temperature: f64,
    ) -> Result<(), DeviceError> {
        let url = self.thermostat_url(appliance);

        tracing::debug!(url = %url, temperature, "Setting thermostat");

        let response = self
            .client
            .put(&url)
            .basic_auth(&self.username, Some(&self.password))
            .header(header::CONTENT_TYPE, "text/xml")
            .body(setpoint_body(temperature))
            .send()
            .await
            .map_err(DeviceError::Http)?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(DeviceError::AuthenticationFailed);
        }
        if !status.is_success() {
            return Err(DeviceError::Rejected {
                status: status.as_u16(),
            });
        }

        tracing::debug!(appliance = %appliance, temperature, "Thermostat updated");
        Ok(())
    }
}
