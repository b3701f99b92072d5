// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Contracts with the policy persistence layer.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::rule::PolicyRule;

/// Logical name of the pub/sub channel carrying rule-set invalidations.
pub const POLICY_INVALIDATION_CHANNEL: &str = "policy-invalidation";

/// "The authoritative rule set changed; re-fetch it."
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invalidation {
	/// Monotonic per publisher; informational only.
	pub revision: u64,
	pub issued_at: DateTime<Utc>,
}

pub type InvalidationStream = BoxStream<'static, Result<Invalidation>>;

/// Read side used by replicas: full fetch plus change notifications.
#[async_trait]
pub trait PolicySource: Send + Sync {
	async fn fetch_all_rules(&self) -> Result<Vec<PolicyRule>>;

	/// Open a subscription on the invalidation channel. The stream ending or
	/// yielding an error means the transport dropped and the caller should
	/// resubscribe.
	async fn subscribe(&self) -> Result<InvalidationStream>;
}

/// Persisted rules, owned by the authoritative process.
#[async_trait]
pub trait PolicyStore: Send + Sync {
	async fn load_rules(&self) -> Result<Vec<PolicyRule>>;
	async fn insert_rules(&self, rules: &[PolicyRule]) -> Result<()>;
	async fn delete_rules(&self, rules: &[PolicyRule]) -> Result<()>;

	/// Delete `remove` and insert `add` as one unit. On error the stored set
	/// is left as it was.
	async fn replace_rules(&self, remove: &[PolicyRule], add: &[PolicyRule]) -> Result<()>;
}

/// Process-local rule store.
#[derive(Debug, Default)]
pub struct MemoryPolicyStore {
	rules: Mutex<BTreeSet<PolicyRule>>,
}

impl MemoryPolicyStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_rules(rules: impl IntoIterator<Item = PolicyRule>) -> Self {
		Self {
			rules: Mutex::new(rules.into_iter().collect()),
		}
	}
}

#[async_trait]
impl PolicyStore for MemoryPolicyStore {
	async fn load_rules(&self) -> Result<Vec<PolicyRule>> {
		Ok(self.rules.lock().iter().cloned().collect())
	}

	async fn insert_rules(&self, rules: &[PolicyRule]) -> Result<()> {
		self.rules.lock().extend(rules.iter().cloned());
		Ok(())
	}

	async fn delete_rules(&self, rules: &[PolicyRule]) -> Result<()> {
		let mut stored = self.rules.lock();
		for rule in rules {
			stored.remove(rule);
		}
		Ok(())
	}

	async fn replace_rules(&self, remove: &[PolicyRule], add: &[PolicyRule]) -> Result<()> {
		let mut stored = self.rules.lock();
		for rule in remove {
			stored.remove(rule);
		}
		stored.extend(add.iter().cloned());
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::rule::Effect;

	#[tokio::test]
	async fn memory_store_round_trip() {
		let store = MemoryPolicyStore::new();
		let rule = PolicyRule::permission("alice", "/a", "read", Effect::Allow).unwrap();

		store.insert_rules(&[rule.clone(), rule.clone()]).await.unwrap();
		assert_eq!(store.load_rules().await.unwrap(), vec![rule.clone()]);

		store.delete_rules(&[rule]).await.unwrap();
		assert!(store.load_rules().await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn memory_store_replace_swaps_rules() {
		let old = PolicyRule::permission("alice", "/a", "read", Effect::Allow).unwrap();
		let new = PolicyRule::permission("alice", "/a", "write", Effect::Allow).unwrap();
		let store = MemoryPolicyStore::with_rules([old.clone()]);

		store.replace_rules(&[old], &[new.clone()]).await.unwrap();
		assert_eq!(store.load_rules().await.unwrap(), vec![new]);
	}

	#[test]
	fn invalidation_json_shape() {
		let json = r#"{"revision":3,"issued_at":"2025-01-01T00:00:00Z"}"#;
		let inv: Invalidation = serde_json::from_str(json).unwrap();
		assert_eq!(inv.revision, 3);
	}
}
