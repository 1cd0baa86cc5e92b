// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Open client connections keyed by handle.
//!
//! Each record owns its socket, so the set of watched sockets and the set of
//! records are the same collection. Dropping a record closes its socket.

use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};

/// Connection handle. Allocated from a counter, never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnId(pub u64);

impl fmt::Display for ConnId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

#[derive(Debug)]
pub struct ClientRecord<S> {
	pub id: ConnId,
	/// Numeric peer address, as passed to the policy hooks.
	pub peer: String,
	pub last_activity: Instant,
	stream: S,
}

impl<S> ClientRecord<S> {
	pub fn stream(&self) -> &S {
		&self.stream
	}

	pub fn idle_for(&self, now: Instant) -> Duration {
		now.saturating_duration_since(self.last_activity)
	}
}

#[derive(Debug)]
pub struct ClientRegistry<S> {
	clients: BTreeMap<ConnId, ClientRecord<S>>,
	next_id: u64,
}

impl<S> Default for ClientRegistry<S> {
	fn default() -> Self {
		Self::new()
	}
}

impl<S> ClientRegistry<S> {
	pub fn new() -> Self {
		ClientRegistry {
			clients: BTreeMap::new(),
			next_id: 1,
		}
	}

	/// Register a freshly accepted connection.
	pub fn create(&mut self, stream: S, peer: String, now: Instant) -> ConnId {
		let id = ConnId(self.next_id);
		self.next_id += 1;

		self.clients.insert(
			id,
			ClientRecord {
				id,
				peer,
				last_activity: now,
				stream,
			},
		);

		id
	}

	/// Refresh the activity timestamp. Returns false if `id` is not registered.
	pub fn touch(&mut self, id: ConnId, now: Instant) -> bool {
		match self.clients.get_mut(&id) {
			Some(record) => {
				record.last_activity = now;
				true
			}
			None => false,
		}
	}

	/// Take the record out of the registry. Only the first call for a given
	/// handle returns `Some`; later calls are no-ops.
	pub fn remove(&mut self, id: ConnId) -> Option<ClientRecord<S>> {
		self.clients.remove(&id)
	}

	pub fn get(&self, id: ConnId) -> Option<&ClientRecord<S>> {
		self.clients.get(&id)
	}

	pub fn contains(&self, id: ConnId) -> bool {
		self.clients.contains_key(&id)
	}

	/// Records in ascending handle order.
	pub fn iter(&self) -> impl Iterator<Item = &ClientRecord<S>> {
		self.clients.values()
	}

	pub fn ids(&self) -> impl Iterator<Item = ConnId> + '_ {
		self.clients.keys().copied()
	}

	pub fn len(&self) -> usize {
		self.clients.len()
	}

	pub fn is_empty(&self) -> bool {
		self.clients.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_record_lifecycle() {
		let mut registry = ClientRegistry::new();
		let start = Instant::now();

		let id = registry.create((), "10.0.0.1".to_string(), start);
		assert!(registry.contains(id));
		assert_eq!(registry.get(id).unwrap().peer, "10.0.0.1");

		let later = start + Duration::from_secs(3);
		assert!(registry.touch(id, later));
		assert_eq!(registry.get(id).unwrap().last_activity, later);

		let record = registry.remove(id).unwrap();
		assert_eq!(record.id, id);
		assert!(registry.is_empty());
	}

	#[test]
	fn test_remove_is_idempotent() {
		let mut registry = ClientRegistry::new();
		let id = registry.create((), "10.0.0.1".to_string(), Instant::now());

		assert!(registry.remove(id).is_some());
		assert!(registry.remove(id).is_none());
		assert!(!registry.touch(id, Instant::now()));
	}

	#[test]
	fn test_handles_are_not_reused() {
		let mut registry = ClientRegistry::new();
		let now = Instant::now();

		let first = registry.create((), "10.0.0.1".to_string(), now);
		registry.remove(first);
		let second = registry.create((), "10.0.0.1".to_string(), now);

		assert_ne!(first, second);
		assert!(second > first);
	}

	#[test]
	fn test_removing_one_leaves_other_untouched() {
		let mut registry = ClientRegistry::new();
		let start = Instant::now();

		let a = registry.create((), "10.0.0.1".to_string(), start);
		let b = registry.create((), "10.0.0.2".to_string(), start);
		registry.touch(b, start + Duration::from_secs(1));

		registry.remove(a);

		let remaining = registry.get(b).unwrap();
		assert_eq!(remaining.peer, "10.0.0.2");
		assert_eq!(remaining.last_activity, start + Duration::from_secs(1));
	}

	#[test]
	fn test_iteration_is_ascending() {
		let mut registry = ClientRegistry::new();
		let now = Instant::now();
		for i in 0..5 {
			registry.create((), format!("10.0.0.{i}"), now);
		}
		let ids: Vec<_> = registry.ids().collect();
		let mut sorted = ids.clone();
		sorted.sort();
		assert_eq!(ids, sorted);
	}
}
