// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Topic templates, matching and the action lookup table.
//!
//! - [`template`]: `{name}` placeholder rendering and wildcard derivation
//! - [`matcher`]: appliance identifier extraction and topic normalization
//! - [`ActionLookup`]: the table mapping incoming topics to configured actions

mod lookup;
pub mod matcher;
pub mod template;

pub use lookup::{ActionEntry, ActionLookup, ActionType};
pub use matcher::{ApplianceId, TopicPattern, normalize};
pub use template::{Bindings, render, wildcard};
