// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Layered configuration for the tether gateway (`tetherd`) and presence agent.
//!
//! Precedence (highest to lowest):
//! 1. Command-line overrides
//! 2. Environment variables (`TETHER_*`)
//! 3. Config file (`--config`, or `/etc/tether/tether.toml`)
//! 4. Built-in defaults

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

use std::path::Path;

use tracing::debug;

pub use error::ConfigError;
pub use layer::TetherConfigLayer;
pub use sections::*;
pub use sources::{CliSource, ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

/// Fully resolved configuration shared by both binaries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TetherConfig {
	pub server: ServerConfig,
	pub agent: AgentConfig,
	pub hooks: HooksConfig,
	pub logging: LoggingConfig,
}

/// Load configuration from all sources.
///
/// `config_path` replaces the system config file when given; `cli` is merged
/// on top of everything else.
pub fn load_config(
	config_path: Option<&Path>,
	cli: TetherConfigLayer,
) -> Result<TetherConfig, ConfigError> {
	let file_source = match config_path {
		Some(path) => TomlSource::new(path),
		None => TomlSource::system(),
	};

	let mut sources: Vec<Box<dyn ConfigSource>> = vec![
		Box::new(DefaultsSource),
		Box::new(file_source),
		Box::new(EnvSource),
		Box::new(CliSource::new(cli)),
	];

	sources.sort_by_key(|s| s.precedence());

	let mut merged = TetherConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		merged.merge(source.load()?);
	}

	finalize(merged)
}

/// Resolve a merged layer into a validated configuration.
pub fn finalize(layer: TetherConfigLayer) -> Result<TetherConfig, ConfigError> {
	let config = TetherConfig {
		server: layer.server.unwrap_or_default().finalize(),
		agent: layer.agent.unwrap_or_default().finalize(),
		hooks: layer.hooks.unwrap_or_default().finalize(),
		logging: layer.logging.unwrap_or_default().finalize(),
	};

	validate_config(&config)?;
	Ok(config)
}

fn validate_config(config: &TetherConfig) -> Result<(), ConfigError> {
	if config.server.backlog == 0 {
		return Err(ConfigError::validation("server.backlog must be at least 1"));
	}
	if config.server.silence_threshold_secs == 0 {
		return Err(ConfigError::validation(
			"server.silence_threshold_secs must be at least 1",
		));
	}
	if config.server.poll_interval_ms == 0 {
		return Err(ConfigError::validation(
			"server.poll_interval_ms must be at least 1",
		));
	}
	if config.agent.server_port == 0 {
		return Err(ConfigError::validation("agent.server_port must not be 0"));
	}
	if config.agent.heartbeat_interval_secs == 0 {
		return Err(ConfigError::validation(
			"agent.heartbeat_interval_secs must be at least 1",
		));
	}
	if config.hooks.admit.as_os_str().is_empty() || config.hooks.revoke.as_os_str().is_empty() {
		return Err(ConfigError::validation("hook paths must not be empty"));
	}

	Ok(())
}

impl TetherConfig {
	/// Heartbeats at or above the silence threshold get a live agent evicted.
	pub fn heartbeat_outpaces_eviction(&self) -> bool {
		self.agent.heartbeat_interval_secs < self.server.silence_threshold_secs
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;
	use std::io::Write;
	use std::path::PathBuf;

	#[test]
	fn test_defaults_validate() {
		let config = finalize(TetherConfigLayer::default()).unwrap();
		assert_eq!(config.server.port, 2884);
		assert_eq!(config.agent.heartbeat_interval_secs, 5);
		assert!(config.heartbeat_outpaces_eviction());
	}

	#[test]
	fn test_zero_threshold_rejected() {
		let layer = TetherConfigLayer {
			server: Some(ServerConfigLayer {
				silence_threshold_secs: Some(0),
				..Default::default()
			}),
			..Default::default()
		};
		let err = finalize(layer).unwrap_err();
		assert!(err.to_string().contains("silence_threshold_secs"));
	}

	#[test]
	fn test_empty_hook_rejected() {
		let layer = TetherConfigLayer {
			hooks: Some(HooksConfigLayer {
				admit: Some(PathBuf::new()),
				..Default::default()
			}),
			..Default::default()
		};
		assert!(matches!(finalize(layer), Err(ConfigError::Validation(_))));
	}

	#[test]
	fn test_cli_overrides_file() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "[server]\nport = 4000\nbacklog = 64").unwrap();

		let cli = TetherConfigLayer {
			server: Some(ServerConfigLayer {
				port: Some(5000),
				..Default::default()
			}),
			..Default::default()
		};

		let config = load_config(Some(file.path()), cli).unwrap();
		assert_eq!(config.server.port, 5000);
		assert_eq!(config.server.backlog, 64);
	}

	proptest! {
		#[test]
		fn test_sufficiency_check_matches_intervals(hb in 1u64..100, threshold in 1u64..100) {
			let layer = TetherConfigLayer {
				server: Some(ServerConfigLayer {
					silence_threshold_secs: Some(threshold),
					..Default::default()
				}),
				agent: Some(AgentConfigLayer {
					heartbeat_interval_secs: Some(hb),
					..Default::default()
				}),
				..Default::default()
			};
			let config = finalize(layer).unwrap();
			prop_assert_eq!(config.heartbeat_outpaces_eviction(), hb < threshold);
		}
	}
}
