// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-memory policy evaluation.
//!
//! A request `(subject, resource, action)` is allowed iff some `allow`
//! permission rule matches it and no `deny` rule does. A rule matches when:
//!
//! 1. its subject is the request subject or a role the subject holds,
//!    directly or transitively through `g` rules
//! 2. its resource pattern matches via [`resource_match`]
//! 3. its action is equal to the request action or `*`
//!
//! The rule set is an immutable snapshot behind an `Arc`. Mutations build a
//! new snapshot and swap it in under a brief write lock, so readers always
//! evaluate against a complete rule set.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, field, info, instrument};

use crate::cache::DecisionCache;
use crate::matcher::{action_match, resource_match};
use crate::rule::{Effect, PolicyRule, RuleType};

/// Bound on `g` rule chains so cyclic role graphs terminate.
pub const MAX_ROLE_DEPTH: usize = 10;

pub const REASON_NO_MATCH: &str = "no matching policy";
pub const REASON_DENIED: &str = "denied by policy";

/// Outcome of an authorization check. Denial is a value, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessDecision {
	pub allowed: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub reason: Option<String>,
}

impl AccessDecision {
	pub fn allow() -> Self {
		Self {
			allowed: true,
			reason: None,
		}
	}

	pub fn deny(reason: impl Into<String>) -> Self {
		Self {
			allowed: false,
			reason: Some(reason.into()),
		}
	}
}

#[derive(Debug, Clone)]
struct Permission {
	resource: String,
	action: String,
	effect: Effect,
}

/// One immutable generation of the rule set plus its lookup indexes.
#[derive(Debug, Default)]
struct RuleSet {
	generation: u64,
	rules: BTreeSet<PolicyRule>,
	permissions: HashMap<String, Vec<Permission>>,
	roles: HashMap<String, Vec<String>>,
}

impl RuleSet {
	fn build(rules: BTreeSet<PolicyRule>, generation: u64) -> Self {
		let mut permissions: HashMap<String, Vec<Permission>> = HashMap::new();
		let mut roles: HashMap<String, Vec<String>> = HashMap::new();

		for rule in &rules {
			match rule.rule_type() {
				RuleType::Permission => {
					permissions
						.entry(rule.subject().to_string())
						.or_default()
						.push(Permission {
							resource: rule.resource().to_string(),
							action: rule.action().to_string(),
							effect: rule.effect(),
						})
				}
				RuleType::Grouping => roles
					.entry(rule.v(0).to_string())
					.or_default()
					.push(rule.v(1).to_string()),
			}
		}

		Self {
			generation,
			rules,
			permissions,
			roles,
		}
	}

	/// The subject followed by every role it reaches through `g` rules.
	fn subject_closure<'a>(&'a self, subject: &'a str) -> Vec<&'a str> {
		let mut seen: HashSet<&str> = HashSet::from([subject]);
		let mut ordered = vec![subject];
		let mut queue = VecDeque::from([(subject, 0usize)]);

		while let Some((current, depth)) = queue.pop_front() {
			if depth >= MAX_ROLE_DEPTH {
				continue;
			}
			for role in self.roles.get(current).into_iter().flatten() {
				if seen.insert(role.as_str()) {
					ordered.push(role.as_str());
					queue.push_back((role.as_str(), depth + 1));
				}
			}
		}

		ordered
	}

	fn evaluate(&self, subject: &str, resource: &str, action: &str) -> AccessDecision {
		let mut allowed = false;

		for candidate in self.subject_closure(subject) {
			for permission in self.permissions.get(candidate).into_iter().flatten() {
				if !action_match(&permission.action, action) || !resource_match(&permission.resource, resource)
				{
					continue;
				}
				match permission.effect {
					Effect::Deny => return AccessDecision::deny(REASON_DENIED),
					Effect::Allow => allowed = true,
				}
			}
		}

		if allowed {
			AccessDecision::allow()
		} else {
			AccessDecision::deny(REASON_NO_MATCH)
		}
	}
}

/// Snapshot statistics for health reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EngineStats {
	pub generation: u64,
	pub rules: usize,
	pub cached_decisions: usize,
}

pub struct PolicyEngine {
	snapshot: RwLock<Arc<RuleSet>>,
	/// Serializes writers; readers never take it.
	write_lock: Mutex<()>,
	cache: DecisionCache,
}

impl PolicyEngine {
	pub fn new(cache: DecisionCache) -> Self {
		Self {
			snapshot: RwLock::new(Arc::new(RuleSet::default())),
			write_lock: Mutex::new(()),
			cache,
		}
	}

	fn snapshot(&self) -> Arc<RuleSet> {
		Arc::clone(&self.snapshot.read())
	}

	#[instrument(
		level = "debug",
		skip(self),
		fields(generation = field::Empty, allowed = field::Empty)
	)]
	pub fn authorize(&self, subject: &str, resource: &str, action: &str) -> AccessDecision {
		let action = action.to_lowercase();
		let snapshot = self.snapshot();
		let span = tracing::Span::current();
		span.record("generation", snapshot.generation);

		if let Some(decision) = self.cache.get(subject, resource, &action, snapshot.generation) {
			span.record("allowed", decision.allowed);
			return decision;
		}

		let decision = snapshot.evaluate(subject, resource, &action);
		span.record("allowed", decision.allowed);
		self
			.cache
			.insert(subject, resource, &action, snapshot.generation, decision.clone());
		decision
	}

	/// Returns `true` if at least one rule was not already present.
	pub fn add_rules(&self, rules: &[PolicyRule]) -> bool {
		self.update_rules(&[], rules)
	}

	/// Returns `true` if at least one rule was present and removed.
	pub fn remove_rules(&self, rules: &[PolicyRule]) -> bool {
		self.update_rules(rules, &[])
	}

	/// Remove then add in one swap, so readers never observe the gap
	/// between the two halves of a policy update.
	pub fn update_rules(&self, remove: &[PolicyRule], add: &[PolicyRule]) -> bool {
		let _guard = self.write_lock.lock();
		let current = self.snapshot();
		let mut rules = current.rules.clone();

		let mut changed = false;
		for rule in remove {
			changed |= rules.remove(rule);
		}
		for rule in add {
			changed |= rules.insert(rule.clone());
		}

		if changed {
			self.swap(rules, current.generation + 1);
			debug!(
				removed = remove.len(),
				added = add.len(),
				"policy rules updated"
			);
		}
		changed
	}

	/// Replace the whole rule set. Returns `true` if the contents changed.
	pub fn replace_rules(&self, rules: Vec<PolicyRule>) -> bool {
		let _guard = self.write_lock.lock();
		let current = self.snapshot();
		let rules: BTreeSet<PolicyRule> = rules.into_iter().collect();

		if rules == current.rules {
			return false;
		}

		let count = rules.len();
		self.swap(rules, current.generation + 1);
		info!(rules = count, "policy rule set replaced");
		true
	}

	fn swap(&self, rules: BTreeSet<PolicyRule>, generation: u64) {
		let next = Arc::new(RuleSet::build(rules, generation));
		*self.snapshot.write() = next;
		self.cache.clear();
	}

	/// Every rule in canonical order.
	pub fn rules(&self) -> Vec<PolicyRule> {
		self.snapshot().rules.iter().cloned().collect()
	}

	pub fn generation(&self) -> u64 {
		self.snapshot().generation
	}

	pub fn stats(&self) -> EngineStats {
		let snapshot = self.snapshot();
		EngineStats {
			generation: snapshot.generation,
			rules: snapshot.rules.len(),
			cached_decisions: self.cache.len(),
		}
	}
}

impl Default for PolicyEngine {
	fn default() -> Self {
		Self::new(DecisionCache::disabled())
	}
}

impl std::fmt::Debug for PolicyEngine {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("PolicyEngine")
			.field("stats", &self.stats())
			.finish()
	}
}
