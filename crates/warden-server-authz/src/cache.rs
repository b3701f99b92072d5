// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Memoized authorization decisions.
//!
//! Entries are tagged with the rule-set generation they were computed
//! against. A lookup only hits when the generation still matches, so a
//! decision computed on a snapshot that was swapped out mid-evaluation can
//! never be served after the swap.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::engine::AccessDecision;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
	subject: String,
	resource: String,
	action: String,
}

#[derive(Debug, Clone)]
struct CachedDecision {
	decision: AccessDecision,
	generation: u64,
	inserted_at: Instant,
}

#[derive(Debug)]
pub struct DecisionCache {
	ttl: Duration,
	capacity: usize,
	entries: RwLock<HashMap<CacheKey, CachedDecision>>,
}

impl DecisionCache {
	/// A zero `ttl` or `capacity` disables caching.
	pub fn new(ttl: Duration, capacity: usize) -> Self {
		Self {
			ttl,
			capacity,
			entries: RwLock::new(HashMap::new()),
		}
	}

	pub fn disabled() -> Self {
		Self::new(Duration::ZERO, 0)
	}

	fn enabled(&self) -> bool {
		!self.ttl.is_zero() && self.capacity > 0
	}

	pub fn get(
		&self,
		subject: &str,
		resource: &str,
		action: &str,
		generation: u64,
	) -> Option<AccessDecision> {
		if !self.enabled() {
			return None;
		}
		let key = CacheKey {
			subject: subject.to_string(),
			resource: resource.to_string(),
			action: action.to_string(),
		};
		let entries = self.entries.read();
		let cached = entries.get(&key)?;
		if cached.generation != generation || cached.inserted_at.elapsed() >= self.ttl {
			return None;
		}
		Some(cached.decision.clone())
	}

	pub fn insert(
		&self,
		subject: &str,
		resource: &str,
		action: &str,
		generation: u64,
		decision: AccessDecision,
	) {
		if !self.enabled() {
			return;
		}
		let mut entries = self.entries.write();
		if entries.len() >= self.capacity {
			let ttl = self.ttl;
			entries.retain(|_, c| c.generation == generation && c.inserted_at.elapsed() < ttl);
			if entries.len() >= self.capacity {
				entries.clear();
			}
		}
		entries.insert(
			CacheKey {
				subject: subject.to_string(),
				resource: resource.to_string(),
				action: action.to_string(),
			},
			CachedDecision {
				decision,
				generation,
				inserted_at: Instant::now(),
			},
		);
	}

	pub fn clear(&self) {
		self.entries.write().clear();
	}

	pub fn len(&self) -> usize {
		self.entries.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn hit_requires_matching_generation() {
		let cache = DecisionCache::new(Duration::from_secs(60), 16);
		cache.insert("alice", "/orgs/1", "read", 1, AccessDecision::allow());

		assert!(cache.get("alice", "/orgs/1", "read", 1).unwrap().allowed);
		assert!(cache.get("alice", "/orgs/1", "read", 2).is_none());
		assert!(cache.get("alice", "/orgs/1", "write", 1).is_none());
	}

	#[test]
	fn entries_expire() {
		let cache = DecisionCache::new(Duration::from_millis(20), 16);
		cache.insert("alice", "/a", "read", 0, AccessDecision::allow());
		std::thread::sleep(Duration::from_millis(40));
		assert!(cache.get("alice", "/a", "read", 0).is_none());
	}

	#[test]
	fn capacity_is_bounded() {
		let cache = DecisionCache::new(Duration::from_secs(60), 4);
		for i in 0..10 {
			cache.insert(&format!("user{i}"), "/a", "read", 0, AccessDecision::allow());
		}
		assert!(cache.len() <= 4);
	}

	#[test]
	fn disabled_cache_stores_nothing() {
		let cache = DecisionCache::disabled();
		cache.insert("alice", "/a", "read", 0, AccessDecision::allow());
		assert!(cache.is_empty());
		assert!(cache.get("alice", "/a", "read", 0).is_none());
	}

	#[test]
	fn clear_empties() {
		let cache = DecisionCache::new(Duration::from_secs(60), 4);
		cache.insert("alice", "/a", "read", 0, AccessDecision::deny("no matching policy"));
		cache.clear();
		assert!(cache.is_empty());
	}
}
