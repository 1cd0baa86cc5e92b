// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Single-task accept/read/timeout loop.
//!
//! One iteration ([`EventLoop::turn`]):
//! 1. wait up to the poll interval for the listener or any client to become
//!    readable;
//! 2. accept a pending connection (admit hook), then read from each ready
//!    client in ascending handle order;
//! 3. sweep clients that have been silent past the threshold.
//!
//! The registry is only ever touched from this task.

use std::future::{poll_fn, Future};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use tether_common_config::ServerConfig;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::error::{Result, ServerError};
use crate::hooks::{HookKind, HookRunner};
use crate::listener::peer_address;
use crate::registry::{ClientRegistry, ConnId};
use crate::sweeper::TimeoutSweeper;

/// Bytes consumed per read. Payload content is ignored.
pub const READ_CHUNK: usize = 128;

#[derive(Debug, Clone, Copy)]
pub struct LoopOptions {
	pub poll_interval: Duration,
	pub silence_threshold: Duration,
	pub revoke_on_shutdown: bool,
}

impl From<&ServerConfig> for LoopOptions {
	fn from(config: &ServerConfig) -> Self {
		Self {
			poll_interval: config.poll_interval(),
			silence_threshold: config.silence_threshold(),
			revoke_on_shutdown: config.revoke_on_shutdown,
		}
	}
}

/// Why a client was removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eviction {
	/// Peer closed the connection.
	Closed,
	/// Read failed.
	ReadError,
	/// Silent past the threshold.
	Timeout,
	/// Gateway shutting down with `revoke_on_shutdown` set.
	Shutdown,
}

struct Readiness {
	accepted: Option<io::Result<(TcpStream, SocketAddr)>>,
	readable: Vec<ConnId>,
}

pub struct EventLoop {
	listener: TcpListener,
	registry: ClientRegistry<TcpStream>,
	sweeper: TimeoutSweeper,
	hooks: Arc<dyn HookRunner>,
	options: LoopOptions,
}

impl EventLoop {
	pub fn new(listener: TcpListener, hooks: Arc<dyn HookRunner>, options: LoopOptions) -> Self {
		Self {
			listener,
			registry: ClientRegistry::new(),
			sweeper: TimeoutSweeper::new(options.silence_threshold),
			hooks,
			options,
		}
	}

	pub fn local_addr(&self) -> io::Result<SocketAddr> {
		self.listener.local_addr()
	}

	pub fn registry(&self) -> &ClientRegistry<TcpStream> {
		&self.registry
	}

	/// Run until `shutdown` resolves or the loop hits a fatal error.
	pub async fn run<F>(mut self, shutdown: F) -> Result<()>
	where
		F: Future<Output = ()>,
	{
		info!(
			silence_threshold_secs = self.sweeper.threshold().as_secs(),
			"Started."
		);
		tokio::pin!(shutdown);

		let outcome = loop {
			tokio::select! {
				biased;
				_ = &mut shutdown => {
					info!("Got termination signal, shutting down.");
					break Ok(());
				}
				result = self.turn() => {
					if let Err(e) = result {
						break Err(e);
					}
				}
			}
		};

		self.release_clients();
		outcome
	}

	/// One full iteration: bounded wait, dispatch, sweep.
	///
	/// Fails only when the listener cannot accept for lack of resources.
	pub async fn turn(&mut self) -> Result<()> {
		// A timeout just means nothing was ready; the sweep still runs.
		if let Ok(ready) = tokio::time::timeout(self.options.poll_interval, self.wait_ready()).await {
			self.dispatch(ready)?;
		}

		self.sweep(Instant::now());
		Ok(())
	}

	/// Remove a client, run its revoke hook and close its socket.
	///
	/// Returns false, doing nothing, when `id` has already been removed.
	pub fn remove(&mut self, id: ConnId, reason: Eviction) -> bool {
		let Some(record) = self.registry.remove(id) else {
			return false;
		};

		match reason {
			Eviction::Timeout => info!(
				handle = %id,
				peer = %record.peer,
				"Client timeout, dropping connection"
			),
			_ => info!(handle = %id, peer = %record.peer, ?reason, "Connection lost"),
		}

		self.hooks.invoke(HookKind::Revoke, &record.peer);
		true
	}

	fn wait_ready(&self) -> impl Future<Output = Readiness> + '_ {
		poll_fn(move |cx| self.poll_ready(cx))
	}

	fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Readiness> {
		let readable: Vec<ConnId> = self
			.registry
			.iter()
			.filter(|record| record.stream().poll_read_ready(cx).is_ready())
			.map(|record| record.id)
			.collect();

		let accepted = match self.listener.poll_accept(cx) {
			Poll::Ready(result) => Some(result),
			Poll::Pending => None,
		};

		if accepted.is_none() && readable.is_empty() {
			return Poll::Pending;
		}

		Poll::Ready(Readiness { accepted, readable })
	}

	fn dispatch(&mut self, ready: Readiness) -> Result<()> {
		if let Some(accepted) = ready.accepted {
			self.admit(accepted)?;
		}

		for id in ready.readable {
			self.service(id);
		}
		Ok(())
	}

	fn admit(&mut self, accepted: io::Result<(TcpStream, SocketAddr)>) -> Result<()> {
		let (stream, addr) = match accepted {
			Ok(pair) => pair,
			Err(e) if is_transient_accept_error(&e) => {
				warn!(error = %e, "accept failed, connection dropped");
				return Ok(());
			}
			Err(e) => {
				error!(error = %e, "accept failed");
				return Err(ServerError::Accept(e));
			}
		};

		let peer = peer_address(&addr);
		let id = self.registry.create(stream, peer.clone(), Instant::now());
		info!(handle = %id, peer = %peer, "New connection");

		self.hooks.invoke(HookKind::Admit, &peer);
		Ok(())
	}

	fn service(&mut self, id: ConnId) {
		let mut buf = [0u8; READ_CHUNK];
		let result = match self.registry.get(id) {
			Some(record) => record.stream().try_read(&mut buf),
			None => return,
		};

		match result {
			Ok(0) => {
				self.remove(id, Eviction::Closed);
			}
			Ok(_) => {
				debug!(handle = %id, "Connection timer reset");
				self.registry.touch(id, Instant::now());
			}
			Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted) => {}
			Err(e) => {
				error!(handle = %id, error = %e, "recv failed");
				self.remove(id, Eviction::ReadError);
			}
		}
	}

	fn sweep(&mut self, now: Instant) {
		for id in self.sweeper.expired(&self.registry, now) {
			self.remove(id, Eviction::Timeout);
		}
	}

	fn release_clients(mut self) {
		if self.options.revoke_on_shutdown {
			let ids: Vec<ConnId> = self.registry.ids().collect();
			for id in ids {
				self.remove(id, Eviction::Shutdown);
			}
		} else if !self.registry.is_empty() {
			warn!(
				clients = self.registry.len(),
				"exiting with clients still admitted, revoke hooks not run"
			);
		}
	}
}

/// Failures confined to the one connection being accepted. Anything else
/// (descriptor or memory exhaustion) leaves the connection queued and the
/// listener readable, so retrying would spin.
fn is_transient_accept_error(e: &io::Error) -> bool {
	matches!(
		e.kind(),
		io::ErrorKind::ConnectionAborted
			| io::ErrorKind::ConnectionReset
			| io::ErrorKind::ConnectionRefused
			| io::ErrorKind::PermissionDenied
			| io::ErrorKind::TimedOut
			| io::ErrorKind::Interrupted
			| io::ErrorKind::WouldBlock
	)
}
