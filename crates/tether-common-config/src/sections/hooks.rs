// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Policy hook configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const DEFAULT_ADMIT_HOOK: &str = "/usr/local/sbin/ip_allow";
pub const DEFAULT_REVOKE_HOOK: &str = "/usr/local/sbin/ip_block";

/// How hook executions for the same peer address relate to each other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookOrdering {
	/// Fire and forget. A slow revoke may still be running when a later admit
	/// for the same address starts.
	#[default]
	Concurrent,
	/// Hooks for one address run strictly in invocation order.
	PerAddress,
}

impl HookOrdering {
	pub fn as_str(&self) -> &'static str {
		match self {
			HookOrdering::Concurrent => "concurrent",
			HookOrdering::PerAddress => "per_address",
		}
	}
}

impl std::str::FromStr for HookOrdering {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_lowercase().as_str() {
			"concurrent" => Ok(HookOrdering::Concurrent),
			"per_address" | "per-address" => Ok(HookOrdering::PerAddress),
			other => Err(format!("unknown hook ordering '{other}'")),
		}
	}
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HooksConfigLayer {
	pub admit: Option<PathBuf>,
	pub revoke: Option<PathBuf>,
	pub ordering: Option<HookOrdering>,
}

impl HooksConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.admit.is_some() {
			self.admit = other.admit;
		}
		if other.revoke.is_some() {
			self.revoke = other.revoke;
		}
		if other.ordering.is_some() {
			self.ordering = other.ordering;
		}
	}

	pub fn finalize(self) -> HooksConfig {
		HooksConfig {
			admit: self
				.admit
				.unwrap_or_else(|| PathBuf::from(DEFAULT_ADMIT_HOOK)),
			revoke: self
				.revoke
				.unwrap_or_else(|| PathBuf::from(DEFAULT_REVOKE_HOOK)),
			ordering: self.ordering.unwrap_or_default(),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HooksConfig {
	/// Executable run with the peer address when a client connects.
	pub admit: PathBuf,
	/// Executable run with the peer address when a client is dropped.
	pub revoke: PathBuf,
	pub ordering: HookOrdering,
}

impl Default for HooksConfig {
	fn default() -> Self {
		HooksConfigLayer::default().finalize()
	}
}
