// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: defaults, TOML file, environment and CLI overrides.

use std::path::PathBuf;
use std::str::FromStr;

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::TetherConfigLayer;
use crate::sections::{
	AgentConfigLayer, HookOrdering, HooksConfigLayer, LogLevel, LoggingConfigLayer,
	ServerConfigLayer,
};

pub const SYSTEM_CONFIG_PATH: &str = "/etc/tether/tether.toml";

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
	Cli = 60,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<TetherConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<TetherConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(TetherConfigLayer::default())
	}
}

/// TOML file configuration source. A missing file is not an error.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new(SYSTEM_CONFIG_PATH)
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<TetherConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(TetherConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: TetherConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: TETHER_<SECTION>_<FIELD>
pub struct EnvSource;

impl EnvSource {
	/// Build a layer from an arbitrary variable lookup.
	pub fn load_with<F>(lookup: F) -> Result<TetherConfigLayer, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let env = EnvReader { lookup };

		Ok(TetherConfigLayer {
			server: Some(ServerConfigLayer {
				host: env.string("TETHER_SERVER_HOST"),
				port: env.parse("TETHER_SERVER_PORT")?,
				backlog: env.parse("TETHER_SERVER_BACKLOG")?,
				silence_threshold_secs: env.parse("TETHER_SERVER_SILENCE_THRESHOLD_SECS")?,
				poll_interval_ms: env.parse("TETHER_SERVER_POLL_INTERVAL_MS")?,
				revoke_on_shutdown: env.boolean("TETHER_SERVER_REVOKE_ON_SHUTDOWN"),
			}),
			agent: Some(AgentConfigLayer {
				server_host: env.string("TETHER_AGENT_SERVER_HOST"),
				server_port: env.parse("TETHER_AGENT_SERVER_PORT")?,
				heartbeat_interval_secs: env.parse("TETHER_AGENT_HEARTBEAT_INTERVAL_SECS")?,
			}),
			hooks: Some(HooksConfigLayer {
				admit: env.string("TETHER_HOOKS_ADMIT").map(PathBuf::from),
				revoke: env.string("TETHER_HOOKS_REVOKE").map(PathBuf::from),
				ordering: env.parse::<HookOrdering>("TETHER_HOOKS_ORDERING")?,
			}),
			logging: Some(LoggingConfigLayer {
				level: env.parse::<LogLevel>("TETHER_LOG_LEVEL")?,
				file: env.string("TETHER_LOG_FILE").map(PathBuf::from),
			}),
		})
	}
}

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<TetherConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Self::load_with(|name| std::env::var(name).ok())
	}
}

struct EnvReader<F> {
	lookup: F,
}

impl<F> EnvReader<F>
where
	F: Fn(&str) -> Option<String>,
{
	fn string(&self, name: &str) -> Option<String> {
		(self.lookup)(name).filter(|s| !s.is_empty())
	}

	fn boolean(&self, name: &str) -> Option<bool> {
		self
			.string(name)
			.map(|v| v.eq_ignore_ascii_case("true") || v == "1")
	}

	fn parse<T>(&self, name: &str) -> Result<Option<T>, ConfigError>
	where
		T: FromStr,
		T::Err: std::fmt::Display,
	{
		match self.string(name) {
			Some(v) => v
				.parse()
				.map(Some)
				.map_err(|e| ConfigError::invalid_value(name, format!("'{v}': {e}"))),
			None => Ok(None),
		}
	}
}

/// Command-line overrides, applied last.
pub struct CliSource {
	layer: TetherConfigLayer,
}

impl CliSource {
	pub fn new(layer: TetherConfigLayer) -> Self {
		Self { layer }
	}
}

impl ConfigSource for CliSource {
	fn name(&self) -> &'static str {
		"cli"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Cli
	}

	fn load(&self) -> Result<TetherConfigLayer, ConfigError> {
		Ok(self.layer.clone())
	}
}
