// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Partial configuration as produced by a single source.

use serde::{Deserialize, Serialize};

use crate::sections::{AgentConfigLayer, HooksConfigLayer, LoggingConfigLayer, ServerConfigLayer};

/// One source's view of the configuration. Every section is optional so that
/// later sources only override what they actually set.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TetherConfigLayer {
	pub server: Option<ServerConfigLayer>,
	pub agent: Option<AgentConfigLayer>,
	pub hooks: Option<HooksConfigLayer>,
	pub logging: Option<LoggingConfigLayer>,
}

impl TetherConfigLayer {
	pub fn merge(&mut self, other: TetherConfigLayer) {
		merge_section(&mut self.server, other.server, ServerConfigLayer::merge);
		merge_section(&mut self.agent, other.agent, AgentConfigLayer::merge);
		merge_section(&mut self.hooks, other.hooks, HooksConfigLayer::merge);
		merge_section(&mut self.logging, other.logging, LoggingConfigLayer::merge);
	}
}

fn merge_section<T>(base: &mut Option<T>, other: Option<T>, merge: fn(&mut T, T)) {
	match (base.as_mut(), other) {
		(Some(existing), Some(incoming)) => merge(existing, incoming),
		(None, Some(incoming)) => *base = Some(incoming),
		(_, None) => {}
	}
}
