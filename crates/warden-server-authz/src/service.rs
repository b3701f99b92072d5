// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Write path of the authoritative process.
//!
//! Every mutation is persisted first, then applied to the local engine, and
//! finally announced to replicas. A failed publish is logged and otherwise
//! ignored: replicas catch up on their next resubscribe.
//!
//! Writers are serialized end to end, so the engine applies mutations in the
//! same order the store committed them.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::bus::InvalidationPublisher;
use crate::engine::PolicyEngine;
use crate::error::Result;
use crate::policy::Policy;
use crate::rule::PolicyRule;
use crate::store::PolicyStore;

#[derive(Clone)]
pub struct PolicyService {
	store: Arc<dyn PolicyStore>,
	engine: Arc<PolicyEngine>,
	publisher: Arc<dyn InvalidationPublisher>,
	write_lock: Arc<Mutex<()>>,
}

impl PolicyService {
	pub fn new(
		store: Arc<dyn PolicyStore>,
		engine: Arc<PolicyEngine>,
		publisher: Arc<dyn InvalidationPublisher>,
	) -> Self {
		Self {
			store,
			engine,
			publisher,
			write_lock: Arc::new(Mutex::new(())),
		}
	}

	pub fn engine(&self) -> &Arc<PolicyEngine> {
		&self.engine
	}

	/// Load the persisted rule set into the engine. Called once at startup.
	#[instrument(skip(self))]
	pub async fn load(&self) -> Result<usize> {
		let rules = self.store.load_rules().await?;
		let count = rules.len();
		self.engine.replace_rules(rules);
		info!(rules = count, "policy rules loaded from store");
		Ok(count)
	}

	/// The persisted rule set, read with no write in flight.
	#[instrument(skip(self))]
	pub async fn snapshot(&self) -> Result<Vec<PolicyRule>> {
		let _guard = self.write_lock.lock().await;
		self.store.load_rules().await
	}

	/// Returns whether the engine's rule set changed.
	#[instrument(skip(self, rules), fields(count = rules.len()))]
	pub async fn add_rules(&self, rules: &[PolicyRule]) -> Result<bool> {
		self.apply(&[], rules).await
	}

	#[instrument(skip(self, rules), fields(count = rules.len()))]
	pub async fn remove_rules(&self, rules: &[PolicyRule]) -> Result<bool> {
		self.apply(rules, &[]).await
	}

	#[instrument(skip(self, policy), fields(policy = %policy.name))]
	pub async fn create_policy(&self, policy: &Policy) -> Result<bool> {
		self.add_rules(&policy.to_rules()?).await
	}

	/// Swap the rules of `old` for those of `new`. Rules the two share are
	/// left alone, and readers see either the old or the new set, never a
	/// mixture.
	#[instrument(skip(self, old, new), fields(policy = %new.name))]
	pub async fn update_policy(&self, old: &Policy, new: &Policy) -> Result<bool> {
		let old_rules = old.to_rules()?;
		let new_rules = new.to_rules()?;
		let remove: Vec<PolicyRule> = old_rules
			.iter()
			.filter(|r| !new_rules.contains(r))
			.cloned()
			.collect();
		let add: Vec<PolicyRule> = new_rules
			.iter()
			.filter(|r| !old_rules.contains(r))
			.cloned()
			.collect();
		self.apply(&remove, &add).await
	}

	#[instrument(skip(self, policy), fields(policy = %policy.name))]
	pub async fn delete_policy(&self, policy: &Policy) -> Result<bool> {
		self.remove_rules(&policy.to_rules()?).await
	}

	pub async fn assign_role(&self, member: &str, role: &str) -> Result<bool> {
		self.add_rules(&[PolicyRule::grouping(member, role)?]).await
	}

	pub async fn revoke_role(&self, member: &str, role: &str) -> Result<bool> {
		self.remove_rules(&[PolicyRule::grouping(member, role)?]).await
	}

	async fn apply(&self, remove: &[PolicyRule], add: &[PolicyRule]) -> Result<bool> {
		let _guard = self.write_lock.lock().await;
		if remove.is_empty() && add.is_empty() {
			return Ok(false);
		}
		self.store.replace_rules(remove, add).await?;

		let changed = self.engine.update_rules(remove, add);
		if changed {
			self.announce();
		}
		Ok(changed)
	}

	fn announce(&self) {
		let publisher = Arc::clone(&self.publisher);
		tokio::spawn(async move {
			if let Err(e) = publisher.publish().await {
				warn!(error = %e, "failed to publish policy invalidation");
			}
		});
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::bus::InvalidationBus;
	use crate::error::AuthzError;
	use crate::policy::Statement;
	use crate::rule::Effect;
	use crate::store::{Invalidation, MemoryPolicyStore};
	use async_trait::async_trait;
	use futures::StreamExt;
	use std::time::Duration;

	struct Fixture {
		service: PolicyService,
		store: Arc<MemoryPolicyStore>,
		engine: Arc<PolicyEngine>,
		bus: InvalidationBus,
	}

	fn fixture() -> Fixture {
		let store = Arc::new(MemoryPolicyStore::new());
		let engine = Arc::new(PolicyEngine::default());
		let bus = InvalidationBus::new(16);
		let service = PolicyService::new(
			Arc::clone(&store) as Arc<dyn PolicyStore>,
			Arc::clone(&engine),
			Arc::new(bus.clone()),
		);
		Fixture {
			service,
			store,
			engine,
			bus,
		}
	}

	fn docs_policy(actions: &[&str]) -> Policy {
		Policy {
			name: "docs".to_string(),
			subjects: vec!["alice".to_string()],
			statements: vec![Statement {
				effect: Effect::Allow,
				resource: "/docs/*".to_string(),
				actions: actions.iter().map(|a| a.to_string()).collect(),
			}],
		}
	}

	#[tokio::test]
	async fn writes_reach_store_engine_and_bus() {
		let f = fixture();
		let mut events = f.bus.stream();

		assert!(f.service.create_policy(&docs_policy(&["read"])).await.unwrap());

		assert!(f.engine.authorize("alice", "/docs/1", "read").allowed);
		assert_eq!(f.store.load_rules().await.unwrap().len(), 1);
		let event = tokio::time::timeout(Duration::from_secs(1), events.next())
			.await
			.unwrap()
			.unwrap()
			.unwrap();
		assert_eq!(event.revision, 1);
	}

	#[tokio::test]
	async fn noop_write_does_not_publish() {
		let f = fixture();
		f.service.assign_role("alice", "admin").await.unwrap();
		tokio::time::sleep(Duration::from_millis(20)).await;
		let before = f.bus.revision();

		assert!(!f.service.assign_role("alice", "admin").await.unwrap());
		tokio::time::sleep(Duration::from_millis(20)).await;
		assert_eq!(f.bus.revision(), before);
	}

	#[tokio::test]
	async fn update_policy_replaces_only_the_difference() {
		let f = fixture();
		let old = docs_policy(&["read", "write"]);
		let new = docs_policy(&["read", "delete"]);
		f.service.create_policy(&old).await.unwrap();

		assert!(f.service.update_policy(&old, &new).await.unwrap());

		assert!(f.engine.authorize("alice", "/docs/1", "read").allowed);
		assert!(f.engine.authorize("alice", "/docs/1", "delete").allowed);
		assert!(!f.engine.authorize("alice", "/docs/1", "write").allowed);
		assert_eq!(f.store.load_rules().await.unwrap().len(), 2);
	}

	#[tokio::test]
	async fn delete_policy_and_revoke_role() {
		let f = fixture();
		let policy = docs_policy(&["read"]);
		f.service.create_policy(&policy).await.unwrap();
		f.service.assign_role("bob", "alice").await.unwrap();
		assert!(f.engine.authorize("bob", "/docs/1", "read").allowed);

		f.service.revoke_role("bob", "alice").await.unwrap();
		assert!(!f.engine.authorize("bob", "/docs/1", "read").allowed);

		f.service.delete_policy(&policy).await.unwrap();
		assert!(!f.engine.authorize("alice", "/docs/1", "read").allowed);
		assert!(f.store.load_rules().await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn load_populates_engine_from_store() {
		let f = fixture();
		f.store
			.insert_rules(&[PolicyRule::permission("carol", "/x", "read", Effect::Allow).unwrap()])
			.await
			.unwrap();

		assert_eq!(f.service.load().await.unwrap(), 1);
		assert!(f.engine.authorize("carol", "/x", "read").allowed);
	}

	struct BrokenStore;

	#[async_trait]
	impl PolicyStore for BrokenStore {
		async fn load_rules(&self) -> Result<Vec<PolicyRule>> {
			Err(AuthzError::Store("disk full".into()))
		}
		async fn insert_rules(&self, _: &[PolicyRule]) -> Result<()> {
			Err(AuthzError::Store("disk full".into()))
		}
		async fn delete_rules(&self, _: &[PolicyRule]) -> Result<()> {
			Err(AuthzError::Store("disk full".into()))
		}
		async fn replace_rules(&self, _: &[PolicyRule], _: &[PolicyRule]) -> Result<()> {
			Err(AuthzError::Store("disk full".into()))
		}
	}

	struct BrokenPublisher;

	#[async_trait]
	impl InvalidationPublisher for BrokenPublisher {
		async fn publish(&self) -> Result<Invalidation> {
			Err(AuthzError::Stream("no route".into()))
		}
	}

	#[tokio::test]
	async fn store_failure_leaves_engine_untouched() {
		let engine = Arc::new(PolicyEngine::default());
		let service = PolicyService::new(
			Arc::new(BrokenStore),
			Arc::clone(&engine),
			Arc::new(InvalidationBus::default()),
		);

		assert!(service.assign_role("alice", "admin").await.is_err());
		assert_eq!(engine.stats().rules, 0);
	}

	#[tokio::test]
	async fn publish_failure_does_not_fail_the_write() {
		let engine = Arc::new(PolicyEngine::default());
		let service = PolicyService::new(
			Arc::new(MemoryPolicyStore::new()),
			Arc::clone(&engine),
			Arc::new(BrokenPublisher),
		);

		assert!(service.assign_role("alice", "admin").await.unwrap());
		assert_eq!(engine.stats().rules, 1);
	}

	/// Store that lingers after committing an insert.
	struct SlowInsertStore {
		inner: MemoryPolicyStore,
	}

	#[async_trait]
	impl PolicyStore for SlowInsertStore {
		async fn load_rules(&self) -> Result<Vec<PolicyRule>> {
			self.inner.load_rules().await
		}
		async fn insert_rules(&self, rules: &[PolicyRule]) -> Result<()> {
			self.inner.insert_rules(rules).await
		}
		async fn delete_rules(&self, rules: &[PolicyRule]) -> Result<()> {
			self.inner.delete_rules(rules).await
		}
		async fn replace_rules(&self, remove: &[PolicyRule], add: &[PolicyRule]) -> Result<()> {
			self.inner.replace_rules(remove, add).await?;
			if !add.is_empty() {
				tokio::time::sleep(Duration::from_millis(100)).await;
			}
			Ok(())
		}
	}

	#[tokio::test]
	async fn concurrent_add_and_remove_keep_store_and_engine_in_step() {
		let store = Arc::new(SlowInsertStore {
			inner: MemoryPolicyStore::new(),
		});
		let engine = Arc::new(PolicyEngine::default());
		let service = PolicyService::new(
			Arc::clone(&store) as Arc<dyn PolicyStore>,
			Arc::clone(&engine),
			Arc::new(InvalidationBus::default()),
		);
		let rule = PolicyRule::permission("alice", "/orgs/*", "read", Effect::Allow).unwrap();

		let adder = {
			let service = service.clone();
			let rule = rule.clone();
			tokio::spawn(async move { service.add_rules(&[rule]).await })
		};
		tokio::time::sleep(Duration::from_millis(20)).await;
		service.remove_rules(&[rule]).await.unwrap();
		adder.await.unwrap().unwrap();

		assert_eq!(store.load_rules().await.unwrap(), engine.rules());
		assert!(!engine.authorize("alice", "/orgs/1", "read").allowed);
	}

	#[tokio::test]
	async fn snapshot_reads_the_store() {
		let f = fixture();
		f.service.assign_role("alice", "admin").await.unwrap();
		assert_eq!(f.service.snapshot().await.unwrap(), f.store.load_rules().await.unwrap());
	}

	#[tokio::test]
	async fn invalid_policy_is_rejected_before_persisting() {
		let f = fixture();
		let policy = docs_policy(&["read", ""]);

		let err = f.service.create_policy(&policy).await.unwrap_err();

		assert!(matches!(err, AuthzError::InvalidRule(_)));
		assert!(f.store.load_rules().await.unwrap().is_empty());
		assert_eq!(f.engine.stats().rules, 0);
		assert!(f.service.assign_role("", "admin").await.is_err());
	}
}
