// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Policy engine and replication configuration.
//!
//! The credential a replica presents upstream is read from
//! `WARDEN_SERVER_AUTHZ_UPSTREAM_CREDENTIAL` (or its `_FILE` variant), never
//! from the TOML file.

use serde::Deserialize;
use std::time::Duration;
use warden_common_secret::SecretString;

/// Whether this process owns the policy store or mirrors one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthzRole {
	/// Owns the policy store, accepts writes and publishes invalidations.
	#[default]
	Authoritative,
	/// Loads rules from `upstream_url` and follows its invalidation stream.
	Replica,
	/// Holds no rules and forwards every decision to `upstream_url`.
	Delegated,
}

impl AuthzRole {
	/// Whether this role talks to an upstream authoritative node.
	pub fn needs_upstream(&self) -> bool {
		matches!(self, AuthzRole::Replica | AuthzRole::Delegated)
	}
}

impl std::str::FromStr for AuthzRole {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"authoritative" => Ok(AuthzRole::Authoritative),
			"replica" => Ok(AuthzRole::Replica),
			"delegated" => Ok(AuthzRole::Delegated),
			other => Err(format!("unknown authz role '{other}'")),
		}
	}
}

#[derive(Debug, Clone)]
pub struct AuthzConfig {
	pub role: AuthzRole,
	pub upstream_url: Option<String>,
	/// Sent as a bearer credential on every upstream request.
	pub upstream_credential: Option<SecretString>,
	pub decision_cache_ttl_secs: u64,
	pub decision_cache_capacity: usize,
	pub fetch_max_attempts: u32,
	pub fetch_timeout_secs: u64,
	pub reconnect_base_ms: u64,
	pub reconnect_max_ms: u64,
	pub channel_capacity: usize,
}

impl AuthzConfig {
	pub fn decision_cache_ttl(&self) -> Duration {
		Duration::from_secs(self.decision_cache_ttl_secs)
	}

	pub fn fetch_timeout(&self) -> Duration {
		Duration::from_secs(self.fetch_timeout_secs)
	}
}

impl Default for AuthzConfig {
	fn default() -> Self {
		AuthzConfigLayer::default().finalize(None)
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthzConfigLayer {
	#[serde(default)]
	pub role: Option<AuthzRole>,
	#[serde(default)]
	pub upstream_url: Option<String>,
	#[serde(default)]
	pub decision_cache_ttl_secs: Option<u64>,
	#[serde(default)]
	pub decision_cache_capacity: Option<usize>,
	#[serde(default)]
	pub fetch_max_attempts: Option<u32>,
	#[serde(default)]
	pub fetch_timeout_secs: Option<u64>,
	#[serde(default)]
	pub reconnect_base_ms: Option<u64>,
	#[serde(default)]
	pub reconnect_max_ms: Option<u64>,
	#[serde(default)]
	pub channel_capacity: Option<usize>,
}

impl AuthzConfigLayer {
	pub fn merge(&mut self, other: AuthzConfigLayer) {
		if other.role.is_some() {
			self.role = other.role;
		}
		if other.upstream_url.is_some() {
			self.upstream_url = other.upstream_url;
		}
		if other.decision_cache_ttl_secs.is_some() {
			self.decision_cache_ttl_secs = other.decision_cache_ttl_secs;
		}
		if other.decision_cache_capacity.is_some() {
			self.decision_cache_capacity = other.decision_cache_capacity;
		}
		if other.fetch_max_attempts.is_some() {
			self.fetch_max_attempts = other.fetch_max_attempts;
		}
		if other.fetch_timeout_secs.is_some() {
			self.fetch_timeout_secs = other.fetch_timeout_secs;
		}
		if other.reconnect_base_ms.is_some() {
			self.reconnect_base_ms = other.reconnect_base_ms;
		}
		if other.reconnect_max_ms.is_some() {
			self.reconnect_max_ms = other.reconnect_max_ms;
		}
		if other.channel_capacity.is_some() {
			self.channel_capacity = other.channel_capacity;
		}
	}

	pub fn finalize(self, upstream_credential: Option<SecretString>) -> AuthzConfig {
		AuthzConfig {
			role: self.role.unwrap_or_default(),
			upstream_url: self
				.upstream_url
				.map(|url| url.trim_end_matches('/').to_string()),
			upstream_credential,
			decision_cache_ttl_secs: self.decision_cache_ttl_secs.unwrap_or(60),
			decision_cache_capacity: self.decision_cache_capacity.unwrap_or(10_000),
			fetch_max_attempts: self.fetch_max_attempts.unwrap_or(3),
			fetch_timeout_secs: self.fetch_timeout_secs.unwrap_or(10),
			reconnect_base_ms: self.reconnect_base_ms.unwrap_or(1_000),
			reconnect_max_ms: self.reconnect_max_ms.unwrap_or(30_000),
			channel_capacity: self.channel_capacity.unwrap_or(256),
		}
	}
}
