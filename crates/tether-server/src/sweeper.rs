// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::time::{Duration, Instant};

use crate::registry::{ClientRegistry, ConnId};

/// Finds clients that have been silent for longer than the threshold.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutSweeper {
	threshold: Duration,
}

impl TimeoutSweeper {
	pub fn new(threshold: Duration) -> Self {
		Self { threshold }
	}

	pub fn threshold(&self) -> Duration {
		self.threshold
	}

	/// Handles whose idle time strictly exceeds the threshold, ascending.
	pub fn expired<S>(&self, registry: &ClientRegistry<S>, now: Instant) -> Vec<ConnId> {
		registry
			.iter()
			.filter(|record| record.idle_for(now) > self.threshold)
			.map(|record| record.id)
			.collect()
	}
}
