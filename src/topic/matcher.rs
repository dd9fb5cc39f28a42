// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Matching concrete topics against configured topic patterns.
//!
//! Plugwise appliance identifiers are 32 lowercase alphanumeric characters.
//! An incoming topic is normalized by replacing the first such token with
//! [`APPLIANCE_PLACEHOLDER`]; configured templates are normalized by
//! replacing every placeholder with the same marker. Equal keys mean the
//! topic belongs to the pattern.
//!
//! ```text
//! gBridge/u1/3a19bccef5982bde990632fd4f5894d4/thermostat
//!                         ↓ normalize
//! gBridge/u1/{applianceId}/thermostat
//!                         ↑ TopicPattern::compile
//! gBridge/u1/{device}/thermostat
//! ```

use std::borrow::Cow;
use std::fmt;
use std::ops::Range;

use super::template::{self, Bindings};

/// Length of an appliance identifier.
pub const APPLIANCE_ID_LEN: usize = 32;

/// Canonical marker used in normalized topic keys.
pub const APPLIANCE_PLACEHOLDER: &str = "{applianceId}";

/// Binding name under which the appliance identifier is rendered.
pub const APPLIANCE_BINDING: &str = "applianceId";

/// A Plugwise appliance identifier taken from a topic.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ApplianceId(String);

impl ApplianceId {
    /// Creates an identifier if `value` has the expected shape.
    ///
    /// # Examples
    ///
    /// ```
    /// use plugwise_mqtt::topic::ApplianceId;
    ///
    /// assert!(ApplianceId::new("3a19bccef5982bde990632fd4f5894d4").is_some());
    /// assert!(ApplianceId::new("3A19BCCEF5982BDE990632FD4F5894D4").is_none());
    /// assert!(ApplianceId::new("short").is_none());
    /// ```
    #[must_use]
    pub fn new(value: &str) -> Option<Self> {
        (value.len() == APPLIANCE_ID_LEN && value.bytes().all(is_id_byte))
            .then(|| Self(value.to_string()))
    }

    /// Finds the identifier in a concrete topic.
    ///
    /// Only the first qualifying token counts. When a run of identifier
    /// characters is longer than 32, its first 32 characters are taken.
    ///
    /// ```
    /// use plugwise_mqtt::topic::ApplianceId;
    ///
    /// let id = ApplianceId::find("gBridge/u1/3a19bccef5982bde990632fd4f5894d4/thermostat");
    /// assert_eq!(id.unwrap().as_str(), "3a19bccef5982bde990632fd4f5894d4");
    /// ```
    #[must_use]
    pub fn find(topic: &str) -> Option<Self> {
        find_token(topic).map(|range| Self(topic[range].to_string()))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns template bindings holding just this identifier.
    #[must_use]
    pub fn bindings(&self) -> Bindings {
        let mut bindings = Bindings::with_capacity(1);
        bindings.insert(APPLIANCE_BINDING.to_string(), self.0.clone());
        bindings
    }
}

impl fmt::Debug for ApplianceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApplianceId({})", self.0)
    }
}

impl fmt::Display for ApplianceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ApplianceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Normalizes a concrete topic into a lookup key.
///
/// Returns the topic unchanged when it carries no identifier, so literal
/// configured topics still resolve.
#[must_use]
pub fn normalize(topic: &str) -> Cow<'_, str> {
    match find_token(topic) {
        Some(range) => {
            let mut key =
                String::with_capacity(topic.len() - range.len() + APPLIANCE_PLACEHOLDER.len());
            key.push_str(&topic[..range.start]);
            key.push_str(APPLIANCE_PLACEHOLDER);
            key.push_str(&topic[range.end..]);
            Cow::Owned(key)
        }
        None => Cow::Borrowed(topic),
    }
}

/// A configured topic template, compiled once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicPattern {
    template: String,
    key: String,
    filter: String,
}

impl TopicPattern {
    /// Compiles a template into its lookup key and subscription filter.
    #[must_use]
    pub fn compile(template: impl Into<String>) -> Self {
        let template = template.into();
        let key = template::replace_placeholders(&template, APPLIANCE_PLACEHOLDER);
        let filter = template::wildcard(&template);
        Self {
            template,
            key,
            filter,
        }
    }

    /// The template as configured.
    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    /// The normalized key concrete topics are compared against.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The broker subscription filter.
    #[must_use]
    pub fn filter(&self) -> &str {
        &self.filter
    }

    /// Returns true if the concrete topic normalizes to this pattern's key.
    #[must_use]
    pub fn matches(&self, topic: &str) -> bool {
        normalize(topic) == self.key.as_str()
    }

    /// Renders the template for one appliance.
    #[must_use]
    pub fn render_for(&self, appliance: &ApplianceId) -> String {
        template::render(&self.template, &appliance.bindings())
    }
}

fn is_id_byte(byte: u8) -> bool {
    byte.is_ascii_lowercase() || byte.is_ascii_digit()
}

/// Byte range of the first identifier-shaped token in `topic`.
fn find_token(topic: &str) -> Option<Range<usize>> {
    let mut run_start = 0;
    for (index, byte) in topic.bytes().enumerate() {
        if !is_id_byte(byte) {
            run_start = index + 1;
        } else if index + 1 - run_start == APPLIANCE_ID_LEN {
            return Some(run_start..index + 1);
        }
    }
    None
}
