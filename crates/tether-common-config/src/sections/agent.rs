// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Presence agent configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1";
pub const DEFAULT_SERVER_PORT: u16 = 2884;
pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 5;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AgentConfigLayer {
	pub server_host: Option<String>,
	pub server_port: Option<u16>,
	pub heartbeat_interval_secs: Option<u64>,
}

impl AgentConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.server_host.is_some() {
			self.server_host = other.server_host;
		}
		if other.server_port.is_some() {
			self.server_port = other.server_port;
		}
		if other.heartbeat_interval_secs.is_some() {
			self.heartbeat_interval_secs = other.heartbeat_interval_secs;
		}
	}

	pub fn finalize(self) -> AgentConfig {
		AgentConfig {
			server_host: self
				.server_host
				.unwrap_or_else(|| DEFAULT_SERVER_HOST.to_string()),
			server_port: self.server_port.unwrap_or(DEFAULT_SERVER_PORT),
			heartbeat_interval_secs: self
				.heartbeat_interval_secs
				.unwrap_or(DEFAULT_HEARTBEAT_INTERVAL_SECS),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentConfig {
	pub server_host: String,
	pub server_port: u16,
	/// Heartbeat period, connect timeout and retry delay all share this value.
	pub heartbeat_interval_secs: u64,
}

impl AgentConfig {
	pub fn server_endpoint(&self) -> String {
		format!("{}:{}", self.server_host, self.server_port)
	}

	pub fn heartbeat_interval(&self) -> Duration {
		Duration::from_secs(self.heartbeat_interval_secs)
	}
}

impl Default for AgentConfig {
	fn default() -> Self {
		AgentConfigLayer::default().finalize()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_values() {
		let config = AgentConfig::default();
		assert_eq!(config.server_endpoint(), "127.0.0.1:2884");
		assert_eq!(config.heartbeat_interval(), Duration::from_secs(5));
	}

	#[test]
	fn test_layer_finalize_with_values() {
		let config = AgentConfigLayer {
			server_host: Some("gw.example.net".to_string()),
			server_port: Some(7000),
			heartbeat_interval_secs: Some(2),
		}
		.finalize();
		assert_eq!(config.server_endpoint(), "gw.example.net:7000");
		assert_eq!(config.heartbeat_interval_secs, 2);
	}
}
