// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Heating controller access.
//!
//! The bridge only needs to change a thermostat setpoint; everything else
//! about the controller stays behind the [`HeatingController`] trait.

#[cfg(feature = "http")]
mod plugwise;

#[cfg(feature = "http")]
pub use plugwise::PlugwiseClient;

use crate::error::DeviceError;
use crate::topic::ApplianceId;

/// Operations the bridge invokes on the heating controller.
#[allow(async_fn_in_trait)]
pub trait HeatingController {
    /// Sets the thermostat setpoint of an appliance, in degrees Celsius.
    ///
    /// # Errors
    ///
    /// Returns `DeviceError` if the controller did not accept the setpoint.
    async fn set_temperature(
        &self,
        appliance: &ApplianceId,
        temperature: f64,
    ) -> Result<(), DeviceError>;
}

/// Parses a thermostat command payload into a temperature.
///
/// Surrounding whitespace is ignored; anything that is not a finite decimal
/// number is rejected.
///
/// # Errors
///
/// Returns [`DeviceError::InvalidTemperature`] holding the raw payload.
pub fn parse_temperature(payload: &str) -> Result<f64, DeviceError> {
    payload
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| DeviceError::InvalidTemperature(payload.to_string()))
}
