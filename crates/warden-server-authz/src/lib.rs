// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authorization for Warden.
//!
//! Policies are stored as flat `p`/`g` rules and evaluated in memory by a
//! [`PolicyEngine`]. The authoritative process mutates rules through a
//! [`PolicyService`]; replicas mirror them with a [`PolicyReplicator`] that
//! re-fetches the full rule set whenever an invalidation arrives.

pub mod authorizer;
pub mod bus;
pub mod cache;
pub mod engine;
pub mod error;
pub mod matcher;
pub mod policy;
pub mod remote;
pub mod replicator;
pub mod rule;
pub mod service;
pub mod store;

pub use authorizer::Authorizer;
pub use bus::{InvalidationBus, InvalidationPublisher, LocalPolicySource};
pub use cache::DecisionCache;
pub use engine::{AccessDecision, EngineStats, PolicyEngine};
pub use error::{AuthzError, Result};
pub use policy::{Policy, Statement};
pub use remote::{AuthorizeRequest, HttpAuthorizer, HttpPolicySource, RulesResponse};
pub use replicator::{PolicyReplicator, ReplicatorConfig, ReplicatorHandle, ReplicatorStatus};
pub use rule::{Effect, PolicyRule, RuleType};
pub use service::PolicyService;
pub use store::{
	Invalidation, InvalidationStream, MemoryPolicyStore, PolicySource, PolicyStore,
	POLICY_INVALIDATION_CHANNEL,
};
