// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Background reaping of finished hook processes.

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::process::Child;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::hooks::HookKind;

struct Adopted {
	kind: HookKind,
	peer: String,
	child: Child,
}

/// Handle to the reaper task. Children handed over with [`Reaper::adopt`] are
/// awaited concurrently and their exit status logged; nothing else is done
/// with them.
#[derive(Clone)]
pub struct Reaper {
	tx: mpsc::UnboundedSender<Adopted>,
}

impl Reaper {
	/// Start the reaper task on the current runtime.
	pub fn spawn() -> (Reaper, JoinHandle<()>) {
		let (tx, rx) = mpsc::unbounded_channel();
		let handle = tokio::spawn(run(rx));
		(Reaper { tx }, handle)
	}

	pub fn adopt(&self, kind: HookKind, peer: &str, child: Child) {
		let adopted = Adopted {
			kind,
			peer: peer.to_string(),
			child,
		};
		if self.tx.send(adopted).is_err() {
			warn!(hook = kind.as_str(), peer = %peer, "reaper stopped, hook process left unwatched");
		}
	}
}

async fn run(mut rx: mpsc::UnboundedReceiver<Adopted>) {
	let mut pending = FuturesUnordered::new();

	loop {
		tokio::select! {
			adopted = rx.recv() => match adopted {
				Some(adopted) => pending.push(wait(adopted)),
				None => break,
			},
			Some(()) = pending.next(), if !pending.is_empty() => {}
		}
	}

	while pending.next().await.is_some() {}
}

async fn wait(mut adopted: Adopted) {
	match adopted.child.wait().await {
		Ok(status) => debug!(
			hook = adopted.kind.as_str(),
			peer = %adopted.peer,
			%status,
			"Reaped hook process"
		),
		Err(e) => warn!(
			hook = adopted.kind.as_str(),
			peer = %adopted.peer,
			error = %e,
			"failed to wait for hook process"
		),
	}
}
