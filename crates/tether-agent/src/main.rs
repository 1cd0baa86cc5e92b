// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! tether-agent - keeps this host admitted by the tether gateway.

use std::future::Future;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tether_agent::{AgentError, ConnectionSupervisor};
use tether_common_config::{
	AgentConfigLayer, LogLevel, LoggingConfigLayer, TetherConfig, TetherConfigLayer,
};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};

/// tether-agent - holds a heartbeat connection to the gateway
#[derive(Parser, Debug)]
#[command(name = "tether-agent", version)]
struct Args {
	/// Config file (defaults to /etc/tether/tether.toml)
	#[arg(long, short, env = "TETHER_CONFIG")]
	config: Option<PathBuf>,

	/// Gateway host name or address
	#[arg(long)]
	server_host: Option<String>,

	/// Gateway port
	#[arg(long)]
	server_port: Option<u16>,

	/// Seconds between heartbeats (also the connect timeout and retry delay)
	#[arg(long)]
	heartbeat_interval_secs: Option<u64>,

	/// Log file (stderr when unset)
	#[arg(long)]
	log_file: Option<PathBuf>,

	/// Log level: error, info or debug
	#[arg(long)]
	log_level: Option<LogLevel>,
}

impl Args {
	fn overrides(&self) -> TetherConfigLayer {
		TetherConfigLayer {
			agent: Some(AgentConfigLayer {
				server_host: self.server_host.clone(),
				server_port: self.server_port,
				heartbeat_interval_secs: self.heartbeat_interval_secs,
			}),
			logging: Some(LoggingConfigLayer {
				level: self.log_level,
				file: self.log_file.clone(),
			}),
			..Default::default()
		}
	}
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
	let args = Args::parse();

	let config = match tether_common_config::load_config(args.config.as_deref(), args.overrides()) {
		Ok(config) => config,
		Err(e) => {
			eprintln!("tether-agent: {e}");
			std::process::exit(1);
		}
	};

	if let Err(e) = tether_common_logging::init(&config.logging) {
		eprintln!("tether-agent: {e}");
		std::process::exit(1);
	}

	if let Err(e) = run(config).await {
		error!("fatal error, exiting: {e:#}");
		std::process::exit(1);
	}
}

async fn run(config: TetherConfig) -> anyhow::Result<()> {
	if !config.heartbeat_outpaces_eviction() {
		warn!(
			heartbeat_interval_secs = config.agent.heartbeat_interval_secs,
			silence_threshold_secs = config.server.silence_threshold_secs,
			"heartbeat interval is not below the gateway silence threshold"
		);
	}

	let shutdown = shutdown_signal()?;

	let endpoint = config.agent.server_endpoint();
	let target = ConnectionSupervisor::resolve(&endpoint)
		.await
		.with_context(|| format!("cannot reach gateway {endpoint}"))?;

	let supervisor = ConnectionSupervisor::new(target, config.agent.heartbeat_interval());

	tokio::select! {
		result = supervisor.run() => result?,
		_ = shutdown => info!("Got termination signal, shutting down."),
	}

	Ok(())
}

/// Resolves on SIGTERM or Ctrl-C.
fn shutdown_signal() -> Result<impl Future<Output = ()>, AgentError> {
	let mut terminate = signal(SignalKind::terminate()).map_err(AgentError::Signal)?;

	Ok(async move {
		tokio::select! {
			_ = terminate.recv() => {}
			_ = tokio::signal::ctrl_c() => {}
		}
	})
}
