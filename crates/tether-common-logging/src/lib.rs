// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Log sink setup for the tether binaries.
//!
//! Events are written one line at a time to an append-mode file (or stderr),
//! formatted as `[<YYYY-MM-DD HH:MM:SS>] <message>`. The file handle is
//! unbuffered, so every line reaches the file as soon as it is emitted.

mod format;

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tether_common_config::{LogLevel, LoggingConfig};
use tracing::Subscriber;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::EnvFilter;

pub use format::{BracketedFormat, TIMESTAMP_FORMAT};

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
	#[error("failed to open log file {path}: {source}")]
	Open {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("failed to install tracing subscriber: {0}")]
	Init(#[from] TryInitError),
}

/// Install the global subscriber described by `config`.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init(config: &LoggingConfig) -> Result<(), LoggingError> {
	let filter = EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| EnvFilter::new(level_directive(config.level)));

	match &config.file {
		Some(path) => {
			let file = open_log_file(path)?;
			build_subscriber(filter, Arc::new(file)).try_init()?;
		}
		None => {
			build_subscriber(filter, std::io::stderr).try_init()?;
		}
	}

	Ok(())
}

/// Open `path` for appending, creating it if needed.
pub fn open_log_file(path: &Path) -> Result<File, LoggingError> {
	OpenOptions::new()
		.create(true)
		.append(true)
		.open(path)
		.map_err(|source| LoggingError::Open {
			path: path.to_path_buf(),
			source,
		})
}

pub fn build_subscriber<W>(filter: EnvFilter, writer: W) -> impl Subscriber + Send + Sync + 'static
where
	W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
	tracing_subscriber::registry().with(filter).with(
		tracing_subscriber::fmt::layer()
			.event_format(BracketedFormat)
			.with_writer(writer)
			.with_ansi(false),
	)
}

pub fn level_directive(level: LogLevel) -> &'static str {
	match level {
		LogLevel::Error => "error",
		LogLevel::Info => "info",
		LogLevel::Debug => "debug",
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::NaiveDateTime;

	fn capture(level: LogLevel, emit: impl FnOnce()) -> Vec<String> {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("auth.log");
		let file = open_log_file(&path).unwrap();

		let subscriber = build_subscriber(EnvFilter::new(level_directive(level)), Arc::new(file));
		tracing::subscriber::with_default(subscriber, emit);

		std::fs::read_to_string(&path)
			.unwrap()
			.lines()
			.map(str::to_string)
			.collect()
	}

	#[test]
	fn test_line_format() {
		let lines = capture(LogLevel::Debug, || tracing::info!("Started."));
		assert_eq!(lines.len(), 1);

		let line = &lines[0];
		assert!(line.starts_with('['));
		assert_eq!(&line[20..22], "] ");
		assert!(NaiveDateTime::parse_from_str(&line[1..20], TIMESTAMP_FORMAT).is_ok());
		assert_eq!(&line[22..], "Started.");
	}

	#[test]
	fn test_fields_follow_message() {
		let lines = capture(LogLevel::Debug, || {
			tracing::info!(handle = 4, peer = %"10.0.0.7", "New connection")
		});
		assert!(lines[0].ends_with("New connection handle=4 peer=10.0.0.7"));
	}

	#[test]
	fn test_level_filters_debug() {
		let lines = capture(LogLevel::Info, || {
			tracing::debug!("Connection timer reset");
			tracing::error!("recv failed");
		});
		assert_eq!(lines.len(), 1);
		assert!(lines[0].ends_with("recv failed"));
	}

	#[test]
	fn test_appends_to_existing_file() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("auth.log");
		std::fs::write(&path, "previous\n").unwrap();

		let file = open_log_file(&path).unwrap();
		let subscriber = build_subscriber(EnvFilter::new("info"), Arc::new(file));
		tracing::subscriber::with_default(subscriber, || tracing::info!("Started."));

		let content = std::fs::read_to_string(&path).unwrap();
		assert!(content.starts_with("previous\n"));
		assert!(content.trim_end().ends_with("Started."));
	}

	#[test]
	fn test_open_failure_reports_path() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("missing-dir").join("auth.log");
		let err = open_log_file(&path).unwrap_err();
		assert!(err.to_string().contains("missing-dir"));
	}
}
