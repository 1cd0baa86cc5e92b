// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Policy hooks: external executables run with the peer address when a client
//! is admitted or dropped.
//!
//! Invocation never blocks the caller. Exit status is logged, not acted on.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tether_common_config::{HookOrdering, HooksConfig};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::reaper::Reaper;

/// Idle per-address lanes shut down after this long without work.
const LANE_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
	Admit,
	Revoke,
}

impl HookKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			HookKind::Admit => "admit",
			HookKind::Revoke => "revoke",
		}
	}
}

/// Runs the admission and revocation hooks on behalf of the event loop.
pub trait HookRunner: Send + Sync {
	/// Start the hook for `peer` and return immediately.
	fn invoke(&self, kind: HookKind, peer: &str);
}

#[derive(Debug, Clone)]
struct HookPaths {
	admit: PathBuf,
	revoke: PathBuf,
}

impl HookPaths {
	fn path(&self, kind: HookKind) -> &Path {
		match kind {
			HookKind::Admit => &self.admit,
			HookKind::Revoke => &self.revoke,
		}
	}
}

struct Lane {
	tx: mpsc::UnboundedSender<HookKind>,
	handle: JoinHandle<()>,
}

/// Spawns hook executables as child processes.
///
/// With [`HookOrdering::Concurrent`] every invocation is spawned at once and
/// handed to the reaper. With [`HookOrdering::PerAddress`] invocations for the
/// same address queue behind each other, each waiting for the previous child
/// to exit.
pub struct ProcessHookRunner {
	paths: Arc<HookPaths>,
	ordering: HookOrdering,
	reaper: Reaper,
	lanes: Mutex<HashMap<String, Lane>>,
}

impl ProcessHookRunner {
	/// Must be called from within a tokio runtime.
	pub fn spawn(config: &HooksConfig) -> Self {
		let (reaper, _reaper_task) = Reaper::spawn();
		info!(
			admit = %config.admit.display(),
			revoke = %config.revoke.display(),
			ordering = config.ordering.as_str(),
			"policy hooks configured"
		);

		Self {
			paths: Arc::new(HookPaths {
				admit: config.admit.clone(),
				revoke: config.revoke.clone(),
			}),
			ordering: config.ordering,
			reaper,
			lanes: Mutex::new(HashMap::new()),
		}
	}

	/// Let queued per-address hooks start, waiting at most `grace`.
	pub async fn flush(&self, grace: Duration) {
		let lanes: Vec<Lane> = self.lanes.lock().drain().map(|(_, lane)| lane).collect();
		if lanes.is_empty() {
			return;
		}

		// Dropping the senders lets each lane finish its queue and exit.
		let handles: Vec<JoinHandle<()>> = lanes.into_iter().map(|lane| lane.handle).collect();
		if tokio::time::timeout(grace, futures::future::join_all(handles))
			.await
			.is_err()
		{
			warn!("hook queues did not drain before shutdown");
		}
	}

	fn enqueue(&self, kind: HookKind, peer: &str) {
		let mut lanes = self.lanes.lock();

		if let Some(lane) = lanes.get(peer) {
			if lane.tx.send(kind).is_ok() {
				return;
			}
		}

		lanes.retain(|_, lane| !lane.tx.is_closed());

		let (tx, rx) = mpsc::unbounded_channel();
		// The receiver is alive until run_lane starts, so this cannot fail.
		let _ = tx.send(kind);
		let handle = tokio::spawn(run_lane(Arc::clone(&self.paths), peer.to_string(), rx));
		lanes.insert(peer.to_string(), Lane { tx, handle });
	}
}

impl HookRunner for ProcessHookRunner {
	fn invoke(&self, kind: HookKind, peer: &str) {
		match self.ordering {
			HookOrdering::Concurrent => {
				if let Some(child) = launch(self.paths.path(kind), kind, peer) {
					self.reaper.adopt(kind, peer, child);
				}
			}
			HookOrdering::PerAddress => self.enqueue(kind, peer),
		}
	}
}

fn launch(path: &Path, kind: HookKind, peer: &str) -> Option<Child> {
	debug!(hook = kind.as_str(), "Executing '{} \"{}\"'", path.display(), peer);

	match Command::new(path)
		.arg(peer)
		.stdin(Stdio::null())
		.stdout(Stdio::null())
		.stderr(Stdio::null())
		.spawn()
	{
		Ok(child) => Some(child),
		Err(e) => {
			error!(
				hook = kind.as_str(),
				path = %path.display(),
				peer = %peer,
				error = %e,
				"failed to execute hook"
			);
			None
		}
	}
}

async fn run_lane(paths: Arc<HookPaths>, peer: String, mut rx: mpsc::UnboundedReceiver<HookKind>) {
	loop {
		let kind = match tokio::time::timeout(LANE_IDLE_TIMEOUT, rx.recv()).await {
			Ok(Some(kind)) => kind,
			Ok(None) => break,
			Err(_) => {
				rx.close();
				while let Ok(kind) = rx.try_recv() {
					run_to_completion(&paths, kind, &peer).await;
				}
				break;
			}
		};

		run_to_completion(&paths, kind, &peer).await;
	}
}

async fn run_to_completion(paths: &HookPaths, kind: HookKind, peer: &str) {
	let Some(mut child) = launch(paths.path(kind), kind, peer) else {
		return;
	};

	match child.wait().await {
		Ok(status) => debug!(hook = kind.as_str(), peer = %peer, %status, "Reaped hook process"),
		Err(e) => warn!(
			hook = kind.as_str(),
			peer = %peer,
			error = %e,
			"failed to wait for hook process"
		),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::os::unix::fs::PermissionsExt;
	use std::time::Instant;

	/// Writes a hook script that sleeps for `delay` and then appends
	/// `<label> <peer>` to `log`.
	fn write_hook(dir: &Path, name: &str, label: &str, delay: &str, log: &Path) -> PathBuf {
		let path = dir.join(name);
		let script = format!(
			"#!/bin/sh\nsleep {delay}\necho \"{label} $1\" >> \"{}\"\n",
			log.display()
		);
		std::fs::write(&path, script).unwrap();
		std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
		path
	}

	async fn wait_for_lines(log: &Path, count: usize) -> Vec<String> {
		let deadline = Instant::now() + Duration::from_secs(10);
		loop {
			let lines: Vec<String> = std::fs::read_to_string(log)
				.unwrap_or_default()
				.lines()
				.map(str::to_string)
				.collect();
			if lines.len() >= count || Instant::now() > deadline {
				return lines;
			}
			tokio::time::sleep(Duration::from_millis(20)).await;
		}
	}

	#[tokio::test]
	async fn test_concurrent_hook_receives_peer_address() {
		let dir = tempfile::tempdir().unwrap();
		let log = dir.path().join("hooks.log");
		let config = HooksConfig {
			admit: write_hook(dir.path(), "allow", "admit", "0", &log),
			revoke: write_hook(dir.path(), "block", "revoke", "0", &log),
			ordering: HookOrdering::Concurrent,
		};

		let runner = ProcessHookRunner::spawn(&config);
		runner.invoke(HookKind::Admit, "192.0.2.10");

		let lines = wait_for_lines(&log, 1).await;
		assert_eq!(lines, vec!["admit 192.0.2.10".to_string()]);
	}

	#[tokio::test]
	async fn test_per_address_runs_in_invocation_order() {
		let dir = tempfile::tempdir().unwrap();
		let log = dir.path().join("hooks.log");
		let config = HooksConfig {
			admit: write_hook(dir.path(), "allow", "admit", "0", &log),
			revoke: write_hook(dir.path(), "block", "revoke", "0.3", &log),
			ordering: HookOrdering::PerAddress,
		};

		let runner = ProcessHookRunner::spawn(&config);
		runner.invoke(HookKind::Revoke, "192.0.2.10");
		runner.invoke(HookKind::Admit, "192.0.2.10");

		let lines = wait_for_lines(&log, 2).await;
		assert_eq!(
			lines,
			vec![
				"revoke 192.0.2.10".to_string(),
				"admit 192.0.2.10".to_string()
			]
		);
	}

	#[tokio::test]
	async fn test_flush_waits_for_queued_hooks() {
		let dir = tempfile::tempdir().unwrap();
		let log = dir.path().join("hooks.log");
		let config = HooksConfig {
			admit: write_hook(dir.path(), "allow", "admit", "0", &log),
			revoke: write_hook(dir.path(), "block", "revoke", "0.1", &log),
			ordering: HookOrdering::PerAddress,
		};

		let runner = ProcessHookRunner::spawn(&config);
		runner.invoke(HookKind::Revoke, "192.0.2.10");
		runner.invoke(HookKind::Revoke, "192.0.2.11");
		runner.flush(Duration::from_secs(10)).await;

		let content = std::fs::read_to_string(&log).unwrap();
		assert_eq!(content.lines().count(), 2);
	}

	#[tokio::test]
	async fn test_missing_executable_is_not_fatal() {
		let dir = tempfile::tempdir().unwrap();
		let config = HooksConfig {
			admit: dir.path().join("does-not-exist"),
			revoke: dir.path().join("does-not-exist"),
			ordering: HookOrdering::Concurrent,
		};

		let runner = ProcessHookRunner::spawn(&config);
		runner.invoke(HookKind::Admit, "192.0.2.10");
		runner.invoke(HookKind::Revoke, "192.0.2.10");
	}
}
