// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Topic and message templates.
//!
//! A template is a plain string with `{name}` placeholders, where `name`
//! consists of ASCII letters only. Anything else inside braces is literal
//! text, and there is no escaping.
//!
//! ```
//! use std::collections::HashMap;
//! use plugwise_mqtt::topic::template::render;
//!
//! let mut values = HashMap::new();
//! values.insert("applianceId".to_string(), "abc".to_string());
//!
//! assert_eq!(render("plugwise/{applianceId}/{name}", &values), "plugwise/abc/{name}");
//! ```

use std::collections::HashMap;

/// Named values substituted into a template.
pub type Bindings = HashMap<String, String>;

/// Subscription wildcard matching exactly one topic level.
pub const SINGLE_LEVEL_WILDCARD: &str = "+";

/// One piece of a tokenized template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    /// Text copied as-is.
    Literal(&'a str),
    /// A `{name}` placeholder; holds `name` without braces.
    Placeholder(&'a str),
}

/// Iterator over the segments of a template.
#[derive(Debug, Clone)]
pub struct Segments<'a> {
    rest: &'a str,
}

impl<'a> Iterator for Segments<'a> {
    type Item = Segment<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() {
            return None;
        }

        if let Some((name, len)) = placeholder_at(self.rest) {
            self.rest = &self.rest[len..];
            return Some(Segment::Placeholder(name));
        }

        let end = self
            .rest
            .match_indices('{')
            .map(|(index, _)| index)
            .find(|&index| index > 0 && placeholder_at(&self.rest[index..]).is_some())
            .unwrap_or(self.rest.len());

        let (literal, rest) = self.rest.split_at(end);
        self.rest = rest;
        Some(Segment::Literal(literal))
    }
}

/// Splits a template into literal and placeholder segments.
#[must_use]
pub fn segments(template: &str) -> Segments<'_> {
    Segments { rest: template }
}

/// Returns the placeholder names of a template, in order of appearance.
#[must_use]
pub fn placeholders(template: &str) -> Vec<&str> {
    segments(template)
        .filter_map(|segment| match segment {
            Segment::Placeholder(name) => Some(name),
            Segment::Literal(_) => None,
        })
        .collect()
}

/// Renders a template, replacing every bound placeholder with its value.
///
/// Placeholders without a binding are kept verbatim. Substituted values are
/// not scanned again, so a value that itself looks like `{name}` stays as-is.
#[must_use]
pub fn render(template: &str, bindings: &Bindings) -> String {
    let mut rendered = String::with_capacity(template.len());
    for segment in segments(template) {
        match segment {
            Segment::Literal(text) => rendered.push_str(text),
            Segment::Placeholder(name) => match bindings.get(name) {
                Some(value) => rendered.push_str(value),
                None => {
                    rendered.push('{');
                    rendered.push_str(name);
                    rendered.push('}');
                }
            },
        }
    }
    rendered
}

/// Turns a template into a subscription filter: each placeholder becomes `+`.
///
/// ```
/// use plugwise_mqtt::topic::template::wildcard;
///
/// assert_eq!(wildcard("gBridge/u1/{applianceId}/thermostat"), "gBridge/u1/+/thermostat");
/// ```
#[must_use]
pub fn wildcard(template: &str) -> String {
    replace_placeholders(template, SINGLE_LEVEL_WILDCARD)
}

/// Replaces every placeholder, whatever its name, with `replacement`.
pub(crate) fn replace_placeholders(template: &str, replacement: &str) -> String {
    segments(template)
        .map(|segment| match segment {
            Segment::Literal(text) => text,
            Segment::Placeholder(_) => replacement,
        })
        .collect()
}

/// Recognizes a placeholder at the very start of `text`.
///
/// Returns the name and the byte length of the whole placeholder.
fn placeholder_at(text: &str) -> Option<(&str, usize)> {
    let body = text.strip_prefix('{')?;
    let name_len = body.bytes().take_while(u8::is_ascii_alphabetic).count();
    if name_len == 0 || body.as_bytes().get(name_len) != Some(&b'}') {
        return None;
    }
    Some((&body[..name_len], name_len + 2))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bindings(pairs: &[(&str, &str)]) -> Bindings {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn segments_mixed() {
        let parsed: Vec<_> = segments("a/{one}/b/{two}").collect();
        assert_eq!(
            parsed,
            vec![
                Segment::Literal("a/"),
                Segment::Placeholder("one"),
                Segment::Literal("/b/"),
                Segment::Placeholder("two"),
            ]
        );
    }

    #[test]
    fn segments_reject_non_letter_names() {
        let parsed: Vec<_> = segments("x/{id1}/{}/{a-b}").collect();
        assert_eq!(parsed, vec![Segment::Literal("x/{id1}/{}/{a-b}")]);
    }

    #[test]
    fn segments_unbalanced_braces_are_literal() {
        let parsed: Vec<_> = segments("{{name}").collect();
        assert_eq!(
            parsed,
            vec![Segment::Literal("{"), Segment::Placeholder("name")]
        );
        assert_eq!(segments("open{name").count(), 1);
    }

    #[test]
    fn render_replaces_every_occurrence() {
        let values = bindings(&[("id", "42")]);
        assert_eq!(render("{id}/{id}/x{id}", &values), "42/42/x42");
    }

    #[test]
    fn render_keeps_unbound_placeholders() {
        let values = bindings(&[("applianceId", "abc")]);
        assert_eq!(
            render("plugwise/{applianceId}/{temperature}", &values),
            "plugwise/abc/{temperature}"
        );
    }

    #[test]
    fn render_does_not_rescan_values() {
        let values = bindings(&[("a", "{b}"), ("b", "nope")]);
        assert_eq!(render("{a}", &values), "{b}");
    }

    #[test]
    fn render_without_placeholders() {
        assert_eq!(render("plugwise/status", &Bindings::new()), "plugwise/status");
        assert_eq!(render("", &Bindings::new()), "");
    }

    #[test]
    fn wildcard_replaces_only_placeholders() {
        assert_eq!(wildcard("home/{room}/{applianceId}/set"), "home/+/+/set");
        assert_eq!(wildcard("home/{1}/set"), "home/{1}/set");
        assert_eq!(wildcard("static/topic"), "static/topic");
    }

    #[test]
    fn placeholders_in_order() {
        assert_eq!(placeholders("{b}/x/{a}/{b}"), vec!["b", "a", "b"]);
        assert!(placeholders("none").is_empty());
    }

    #[test]
    fn render_non_ascii_literal() {
        let values = bindings(&[("name", "woonkamer")]);
        assert_eq!(render("température/{name}/°C", &values), "température/woonkamer/°C");
    }
}
