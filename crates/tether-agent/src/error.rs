// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
	#[error("failed to resolve gateway {endpoint}: {source}")]
	Resolve {
		endpoint: String,
		#[source]
		source: std::io::Error,
	},

	#[error("gateway {0} resolved to no addresses")]
	NoAddress(String),

	#[error("failed to create socket: {0}")]
	Socket(#[source] std::io::Error),

	#[error("failed to install signal handler: {0}")]
	Signal(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AgentError>;
