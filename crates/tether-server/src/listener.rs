// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::net::SocketAddr;

use tether_common_config::ServerConfig;
use tokio::net::{lookup_host, TcpListener, TcpSocket};
use tracing::{info, warn};

use crate::error::{Result, ServerError};

/// Bind the gateway's listening socket.
///
/// Every resolved address is tried in turn; the first one that binds wins.
pub async fn bind_listener(config: &ServerConfig) -> Result<TcpListener> {
	let endpoint = config.socket_addr();
	let addrs = lookup_host(&endpoint)
		.await
		.map_err(|source| ServerError::Resolve {
			addr: endpoint.clone(),
			source,
		})?;

	let mut last_error = None;
	for addr in addrs {
		match bind_one(addr, config.backlog) {
			Ok(listener) => {
				info!(addr = %addr, backlog = config.backlog, "listening");
				return Ok(listener);
			}
			Err(e) => {
				warn!(addr = %addr, error = %e, "bind failed, trying next address");
				last_error = Some(e);
			}
		}
	}

	Err(last_error.unwrap_or(ServerError::NoAddress(endpoint)))
}

fn bind_one(addr: SocketAddr, backlog: u32) -> Result<TcpListener> {
	let bind_err = |source| ServerError::Bind { addr, source };

	let socket = if addr.is_ipv4() {
		TcpSocket::new_v4()
	} else {
		TcpSocket::new_v6()
	}
	.map_err(bind_err)?;

	socket.set_reuseaddr(true).map_err(bind_err)?;
	socket.bind(addr).map_err(bind_err)?;
	socket.listen(backlog).map_err(bind_err)
}

/// Numeric peer address without the port. IPv4-mapped IPv6 addresses are
/// reported in dotted form.
pub fn peer_address(addr: &SocketAddr) -> String {
	addr.ip().to_canonical().to_string()
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

	#[test]
	fn test_peer_address_drops_port() {
		let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 7)), 40123);
		assert_eq!(peer_address(&addr), "192.0.2.7");
	}

	#[test]
	fn test_peer_address_unmaps_ipv4() {
		let mapped = Ipv4Addr::new(192, 0, 2, 7).to_ipv6_mapped();
		let addr = SocketAddr::new(IpAddr::V6(mapped), 1);
		assert_eq!(peer_address(&addr), "192.0.2.7");

		let v6 = SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), 1);
		assert_eq!(peer_address(&v6), "::1");
	}

	#[tokio::test]
	async fn test_bind_ephemeral_port() {
		let config = ServerConfig {
			host: "127.0.0.1".to_string(),
			port: 0,
			..Default::default()
		};
		let listener = bind_listener(&config).await.unwrap();
		assert_ne!(listener.local_addr().unwrap().port(), 0);
	}

	#[tokio::test]
	async fn test_bind_conflict_is_reported() {
		let first = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let taken = first.local_addr().unwrap();

		let config = ServerConfig {
			host: "127.0.0.1".to_string(),
			port: taken.port(),
			..Default::default()
		};
		let err = bind_listener(&config).await.unwrap_err();
		assert!(matches!(err, ServerError::Bind { .. }));
	}
}
