// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Logging configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Log verbosity. Each level includes everything above it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
	Error,
	Info,
	#[default]
	Debug,
}

impl LogLevel {
	pub fn as_str(&self) -> &'static str {
		match self {
			LogLevel::Error => "error",
			LogLevel::Info => "info",
			LogLevel::Debug => "debug",
		}
	}
}

impl std::str::FromStr for LogLevel {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_lowercase().as_str() {
			"error" | "0" => Ok(LogLevel::Error),
			"info" | "1" => Ok(LogLevel::Info),
			"debug" | "2" => Ok(LogLevel::Debug),
			other => Err(format!("unknown log level '{other}'")),
		}
	}
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfigLayer {
	pub level: Option<LogLevel>,
	pub file: Option<PathBuf>,
}

impl LoggingConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.level.is_some() {
			self.level = other.level;
		}
		if other.file.is_some() {
			self.file = other.file;
		}
	}

	pub fn finalize(self) -> LoggingConfig {
		LoggingConfig {
			level: self.level.unwrap_or_default(),
			file: self.file,
		}
	}
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
	pub level: LogLevel,
	/// Append-mode log file. Logs go to stderr when unset.
	pub file: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_level_ordering() {
		assert!(LogLevel::Error < LogLevel::Info);
		assert!(LogLevel::Info < LogLevel::Debug);
	}

	#[test]
	fn test_level_from_str_accepts_numeric() {
		assert_eq!("1".parse::<LogLevel>(), Ok(LogLevel::Info));
		assert_eq!("ERROR".parse::<LogLevel>(), Ok(LogLevel::Error));
		assert!("trace".parse::<LogLevel>().is_err());
	}

	#[test]
	fn test_defaults() {
		let config = LoggingConfigLayer::default().finalize();
		assert_eq!(config.level, LogLevel::Debug);
		assert!(config.file.is_none());
	}
}
