// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Kept in its own test binary: it uses up the whole descriptor table of the
//! process.

use std::fs::File;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tether_common_config::ServerConfig;
use tether_server::{bind_listener, EventLoop, HookKind, HookRunner, LoopOptions, ServerError};
use tokio::net::TcpSocket;

struct NoHooks;

impl HookRunner for NoHooks {
	fn invoke(&self, _kind: HookKind, _peer: &str) {}
}

#[tokio::test]
async fn test_descriptor_exhaustion_stops_the_loop() {
	let config = ServerConfig {
		host: "127.0.0.1".to_string(),
		port: 0,
		..Default::default()
	};
	let listener = bind_listener(&config).await.unwrap();
	let options = LoopOptions {
		poll_interval: Duration::from_millis(20),
		silence_threshold: Duration::from_secs(10),
		revoke_on_shutdown: false,
	};
	let mut gateway = EventLoop::new(listener, Arc::new(NoHooks), options);
	let addr = gateway.local_addr().unwrap();

	// The client socket needs its descriptor before the table fills up.
	let socket = TcpSocket::new_v4().unwrap();
	let mut hoard = Vec::new();
	while let Ok(file) = File::open("/dev/null") {
		hoard.push(file);
	}
	let _client = socket.connect(addr).await.unwrap();

	let started = Instant::now();
	let mut turns = 0u32;
	let outcome = loop {
		turns += 1;
		if let Err(e) = gateway.turn().await {
			break Some(e);
		}
		if started.elapsed() > Duration::from_millis(500) {
			break None;
		}
	};
	drop(hoard);

	let err = outcome.expect("accept failure from descriptor exhaustion should stop the loop");
	assert!(matches!(err, ServerError::Accept(_)), "unexpected error: {err}");
	assert!(turns <= 30, "loop spun {turns} times before failing");
	assert!(gateway.registry().is_empty());
}
