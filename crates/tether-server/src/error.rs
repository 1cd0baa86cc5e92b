// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::net::SocketAddr;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
	#[error("failed to resolve listen address {addr}: {source}")]
	Resolve {
		addr: String,
		#[source]
		source: std::io::Error,
	},

	#[error("no usable listen address for {0}")]
	NoAddress(String),

	#[error("failed to bind {addr}: {source}")]
	Bind {
		addr: SocketAddr,
		#[source]
		source: std::io::Error,
	},

	#[error("cannot accept connections: {0}")]
	Accept(#[source] std::io::Error),

	#[error("failed to install signal handler: {0}")]
	Signal(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ServerError>;
