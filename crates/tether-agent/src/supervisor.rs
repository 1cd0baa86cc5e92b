// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Connect-and-retry state machine for the agent's single gateway link.
//!
//! ```text
//! Idle -> Connecting -> Connected -> Idle
//!             |
//!             +-> Failed --(interval)--> Idle
//! ```
//!
//! Connect attempts are bounded by the heartbeat interval. Failures and
//! timeouts wait one interval before the next attempt; a dropped connection
//! reconnects straight away. There is no backoff and no attempt cap.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{lookup_host, TcpSocket, TcpStream};
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::{AgentError, Result};

/// Sent whenever the link has been quiet for a full interval.
pub const HEARTBEAT: &[u8; 2] = b"!\n";

const READ_CHUNK: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttemptState {
	#[default]
	Idle,
	Connecting,
	Connected,
	/// Waiting out the retry delay after a failed attempt.
	Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SupervisorStatus {
	pub state: AttemptState,
	/// Connect attempts started since launch.
	pub attempts: u64,
	pub heartbeats_sent: u64,
}

enum State {
	Idle,
	Connecting(TcpSocket),
	Connected(TcpStream),
	Failed,
}

pub struct ConnectionSupervisor {
	target: SocketAddr,
	interval: Duration,
	status: watch::Sender<SupervisorStatus>,
}

impl ConnectionSupervisor {
	pub fn new(target: SocketAddr, interval: Duration) -> Self {
		let (status, _) = watch::channel(SupervisorStatus::default());
		Self {
			target,
			interval,
			status,
		}
	}

	/// Resolve `endpoint` (`host:port`) once; the first address is used for
	/// every attempt.
	pub async fn resolve(endpoint: &str) -> Result<SocketAddr> {
		let mut addrs = lookup_host(endpoint)
			.await
			.map_err(|source| AgentError::Resolve {
				endpoint: endpoint.to_string(),
				source,
			})?;

		addrs
			.next()
			.ok_or_else(|| AgentError::NoAddress(endpoint.to_string()))
	}

	pub fn target(&self) -> SocketAddr {
		self.target
	}

	pub fn subscribe(&self) -> watch::Receiver<SupervisorStatus> {
		self.status.subscribe()
	}

	/// Stay connected forever. Only returns when a socket cannot be created
	/// at all.
	pub async fn run(&self) -> Result<()> {
		info!(server = %self.target, interval_secs = self.interval.as_secs_f64(), "Started.");

		let mut state = State::Idle;
		loop {
			state = match state {
				State::Idle => {
					self.publish(AttemptState::Idle);
					State::Connecting(self.open_socket()?)
				}
				State::Connecting(socket) => self.connect(socket).await,
				State::Connected(stream) => {
					self.hold(stream).await;
					State::Idle
				}
				State::Failed => {
					self.publish(AttemptState::Failed);
					tokio::time::sleep(self.interval).await;
					State::Idle
				}
			};
		}
	}

	fn open_socket(&self) -> Result<TcpSocket> {
		let socket = if self.target.is_ipv4() {
			TcpSocket::new_v4()
		} else {
			TcpSocket::new_v6()
		};
		socket.map_err(AgentError::Socket)
	}

	async fn connect(&self, socket: TcpSocket) -> State {
		self.status.send_modify(|status| {
			status.state = AttemptState::Connecting;
			status.attempts += 1;
		});
		info!(server = %self.target, "Connecting");

		match timeout(self.interval, socket.connect(self.target)).await {
			Ok(Ok(stream)) => {
				info!(server = %self.target, "Connected");
				self.publish(AttemptState::Connected);
				State::Connected(stream)
			}
			Ok(Err(e)) => {
				warn!(server = %self.target, error = %e, "connect failed, retrying");
				State::Failed
			}
			Err(_) => {
				warn!(server = %self.target, "connect timed out, retrying");
				State::Failed
			}
		}
	}

	/// Heartbeat until the link drops. Inbound data is read and discarded.
	///
	/// A heartbeat goes out only after a full interval with nothing received,
	/// so a gateway that keeps sending faster than the interval suppresses
	/// heartbeats entirely.
	async fn hold(&self, mut stream: TcpStream) {
		let mut buf = [0u8; READ_CHUNK];

		loop {
			match timeout(self.interval, stream.read(&mut buf)).await {
				Err(_) => {
					debug!("Sending heartbeat");
					if let Err(e) = stream.write_all(HEARTBEAT).await {
						warn!(error = %e, "heartbeat failed, closing connection");
						return;
					}
					self.status.send_modify(|status| status.heartbeats_sent += 1);
				}
				Ok(Ok(0)) => {
					info!("Closing connection");
					return;
				}
				Ok(Ok(n)) => debug!(bytes = n, "Data from server"),
				Ok(Err(e)) if e.kind() == io::ErrorKind::Interrupted => {}
				Ok(Err(e)) => {
					warn!(error = %e, "read failed, closing connection");
					return;
				}
			}
		}
	}

	fn publish(&self, state: AttemptState) {
		self.status.send_modify(|status| status.state = state);
	}
}
