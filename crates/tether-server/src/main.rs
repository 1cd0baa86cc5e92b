// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! tetherd - presence gateway daemon.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tether_common_config::{
	HookOrdering, HooksConfigLayer, LogLevel, LoggingConfigLayer, ServerConfigLayer, TetherConfig,
	TetherConfigLayer,
};
use tether_server::{bind_listener, EventLoop, LoopOptions, ProcessHookRunner, ServerError};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};

/// How long queued hooks get to start after the loop stops.
const HOOK_FLUSH_GRACE: Duration = Duration::from_secs(5);

/// tetherd - admits peers for as long as they hold a connection
#[derive(Parser, Debug)]
#[command(name = "tetherd", version)]
struct Args {
	/// Config file (defaults to /etc/tether/tether.toml)
	#[arg(long, short, env = "TETHER_CONFIG")]
	config: Option<PathBuf>,

	/// Port to listen on
	#[arg(long)]
	port: Option<u16>,

	/// Drop clients silent for longer than this many seconds
	#[arg(long)]
	silence_threshold_secs: Option<u64>,

	/// Log file (stderr when unset)
	#[arg(long)]
	log_file: Option<PathBuf>,

	/// Log level: error, info or debug
	#[arg(long)]
	log_level: Option<LogLevel>,

	/// Hook ordering: concurrent or per_address
	#[arg(long)]
	hook_ordering: Option<HookOrdering>,

	/// Run the revoke hook for every connected client on shutdown
	#[arg(long)]
	revoke_on_shutdown: bool,
}

impl Args {
	fn overrides(&self) -> TetherConfigLayer {
		TetherConfigLayer {
			server: Some(ServerConfigLayer {
				port: self.port,
				silence_threshold_secs: self.silence_threshold_secs,
				revoke_on_shutdown: self.revoke_on_shutdown.then_some(true),
				..Default::default()
			}),
			hooks: Some(HooksConfigLayer {
				ordering: self.hook_ordering,
				..Default::default()
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
			eprintln!("tetherd: {e}");
			std::process::exit(1);
		}
	};

	if let Err(e) = tether_common_logging::init(&config.logging) {
		eprintln!("tetherd: {e}");
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
			"agents using this config will be evicted between heartbeats"
		);
	}

	let shutdown = shutdown_signal()?;

	let listener = bind_listener(&config.server)
		.await
		.with_context(|| format!("failed to listen on {}", config.server.socket_addr()))?;

	let hooks = Arc::new(ProcessHookRunner::spawn(&config.hooks));
	let event_loop = EventLoop::new(listener, hooks.clone(), LoopOptions::from(&config.server));

	info!(
		silence_threshold_secs = config.server.silence_threshold_secs,
		revoke_on_shutdown = config.server.revoke_on_shutdown,
		"gateway ready"
	);

	let outcome = event_loop.run(shutdown).await;
	hooks.flush(HOOK_FLUSH_GRACE).await;

	outcome.context("event loop stopped")
}

/// Resolves on SIGTERM or Ctrl-C.
fn shutdown_signal() -> Result<impl Future<Output = ()>, ServerError> {
	let mut terminate = signal(SignalKind::terminate()).map_err(ServerError::Signal)?;

	Ok(async move {
		tokio::select! {
			_ = terminate.recv() => {}
			_ = tokio::signal::ctrl_c() => {}
		}
	})
}
