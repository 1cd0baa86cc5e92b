// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Gateway server configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 2884;
pub const DEFAULT_BACKLOG: u32 = 10;
pub const DEFAULT_SILENCE_THRESHOLD_SECS: u64 = 10;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Server configuration layer (partial, for merging).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ServerConfigLayer {
	pub host: Option<String>,
	pub port: Option<u16>,
	pub backlog: Option<u32>,
	pub silence_threshold_secs: Option<u64>,
	pub poll_interval_ms: Option<u64>,
	pub revoke_on_shutdown: Option<bool>,
}

impl ServerConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.host.is_some() {
			self.host = other.host;
		}
		if other.port.is_some() {
			self.port = other.port;
		}
		if other.backlog.is_some() {
			self.backlog = other.backlog;
		}
		if other.silence_threshold_secs.is_some() {
			self.silence_threshold_secs = other.silence_threshold_secs;
		}
		if other.poll_interval_ms.is_some() {
			self.poll_interval_ms = other.poll_interval_ms;
		}
		if other.revoke_on_shutdown.is_some() {
			self.revoke_on_shutdown = other.revoke_on_shutdown;
		}
	}

	pub fn finalize(self) -> ServerConfig {
		ServerConfig {
			host: self.host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
			port: self.port.unwrap_or(DEFAULT_PORT),
			backlog: self.backlog.unwrap_or(DEFAULT_BACKLOG),
			silence_threshold_secs: self
				.silence_threshold_secs
				.unwrap_or(DEFAULT_SILENCE_THRESHOLD_SECS),
			poll_interval_ms: self.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS),
			revoke_on_shutdown: self.revoke_on_shutdown.unwrap_or(false),
		}
	}
}

/// Server configuration (runtime, fully resolved).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
	pub host: String,
	pub port: u16,
	/// Pending-connection queue length passed to `listen(2)`.
	pub backlog: u32,
	/// Clients silent for longer than this are evicted.
	pub silence_threshold_secs: u64,
	/// Upper bound on a single readiness wait.
	pub poll_interval_ms: u64,
	/// Evict every open client (running the revoke hook) on SIGTERM.
	pub revoke_on_shutdown: bool,
}

impl ServerConfig {
	pub fn socket_addr(&self) -> String {
		format!("{}:{}", self.host, self.port)
	}

	pub fn silence_threshold(&self) -> Duration {
		Duration::from_secs(self.silence_threshold_secs)
	}

	pub fn poll_interval(&self) -> Duration {
		Duration::from_millis(self.poll_interval_ms)
	}
}

impl Default for ServerConfig {
	fn default() -> Self {
		ServerConfigLayer::default().finalize()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_values() {
		let config = ServerConfig::default();
		assert_eq!(config.host, "0.0.0.0");
		assert_eq!(config.port, 2884);
		assert_eq!(config.backlog, 10);
		assert_eq!(config.silence_threshold(), Duration::from_secs(10));
		assert_eq!(config.poll_interval(), Duration::from_secs(1));
		assert!(!config.revoke_on_shutdown);
	}

	#[test]
	fn test_socket_addr() {
		let config = ServerConfigLayer {
			host: Some("127.0.0.1".to_string()),
			port: Some(9000),
			..Default::default()
		}
		.finalize();
		assert_eq!(config.socket_addr(), "127.0.0.1:9000");
	}

	#[test]
	fn test_merge_keeps_unset_fields() {
		let mut base = ServerConfigLayer {
			port: Some(1000),
			backlog: Some(5),
			..Default::default()
		};
		base.merge(ServerConfigLayer {
			port: Some(2000),
			..Default::default()
		});
		assert_eq!(base.port, Some(2000));
		assert_eq!(base.backlog, Some(5));
	}

	#[test]
	fn test_deserialize_layer_partial() {
		let layer: ServerConfigLayer = toml::from_str("silence_threshold_secs = 30\n").unwrap();
		assert_eq!(layer.silence_threshold_secs, Some(30));
		assert!(layer.port.is_none());
	}
}
