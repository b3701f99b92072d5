// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! API keys: a public key id plus a secret.
//!
//! The key id is `wk_` followed by 32 hex characters and is stored in the
//! clear. The secret is 32 random bytes, hex encoded, shown to its owner once
//! and persisted only as a SHA-256 digest. A secret already has full
//! entropy, so a slow password hash would add cost without adding strength.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use warden_common_secret::SecretString;
use warden_server_token::PrincipalType;

use crate::error::{AuthError, Result};

pub const API_KEY_PREFIX: &str = "wk_";
const KEY_ID_BYTES: usize = 16;
const SECRET_BYTES: usize = 32;
/// Compared against when no key was found. No SHA-256 output is all zeros.
const UNKNOWN_KEY_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiKeyStatus {
	Active,
	Inactive,
	Expired,
}

impl ApiKeyStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			ApiKeyStatus::Active => "active",
			ApiKeyStatus::Inactive => "inactive",
			ApiKeyStatus::Expired => "expired",
		}
	}
}

impl fmt::Display for ApiKeyStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for ApiKeyStatus {
	type Err = AuthError;

	fn from_str(s: &str) -> Result<Self> {
		match s {
			"active" => Ok(ApiKeyStatus::Active),
			"inactive" => Ok(ApiKeyStatus::Inactive),
			"expired" => Ok(ApiKeyStatus::Expired),
			other => Err(AuthError::Store(format!("unknown API key status: {other}"))),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKey {
	pub key: String,
	/// Hex SHA-256 of the secret.
	#[serde(skip_serializing)]
	pub secret_hash: String,
	pub owner_id: String,
	pub owner_identity: String,
	pub owner_type: PrincipalType,
	pub status: ApiKeyStatus,
	pub expires_at: Option<DateTime<Utc>>,
	pub created_at: DateTime<Utc>,
	pub last_used_at: Option<DateTime<Utc>>,
	pub usage_count: u64,
}

impl ApiKey {
	/// Active status and not past `expires_at`.
	pub fn is_active(&self, now: DateTime<Utc>) -> bool {
		self.status == ApiKeyStatus::Active && !self.is_expired(now)
	}

	pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
		self.status == ApiKeyStatus::Expired || self.expires_at.is_some_and(|at| at <= now)
	}

	pub fn secret_matches(&self, secret: &str) -> bool {
		verify_secret_hash(Some(self), &hash_api_secret(secret))
	}
}

/// Compare an already hashed secret with `key`'s in constant time. A missing
/// key costs the same comparison and never matches.
pub fn verify_secret_hash(key: Option<&ApiKey>, presented_hash: &str) -> bool {
	let stored = key.map_or(UNKNOWN_KEY_HASH, |key| key.secret_hash.as_str());
	let matches: bool = presented_hash.as_bytes().ct_eq(stored.as_bytes()).into();
	matches && key.is_some()
}

/// A freshly minted key. The secret exists only here.
pub struct GeneratedApiKey {
	pub key: String,
	pub secret: SecretString,
	pub secret_hash: String,
}

impl fmt::Debug for GeneratedApiKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("GeneratedApiKey")
			.field("key", &self.key)
			.field("secret", &self.secret)
			.finish_non_exhaustive()
	}
}

pub fn generate_api_key() -> GeneratedApiKey {
	let mut rng = rand::thread_rng();
	let mut id = [0u8; KEY_ID_BYTES];
	let mut secret = [0u8; SECRET_BYTES];
	rng.fill_bytes(&mut id);
	rng.fill_bytes(&mut secret);

	let secret = hex::encode(secret);
	GeneratedApiKey {
		key: format!("{API_KEY_PREFIX}{}", hex::encode(id)),
		secret_hash: hash_api_secret(&secret),
		secret: SecretString::new(secret),
	}
}

pub fn hash_api_secret(secret: &str) -> String {
	hex::encode(Sha256::digest(secret.as_bytes()))
}

/// Shape check only; says nothing about whether the key exists.
pub fn is_api_key_format(key: &str) -> bool {
	key.strip_prefix(API_KEY_PREFIX)
		.is_some_and(|hex| hex.len() == KEY_ID_BYTES * 2 && hex.bytes().all(|b| b.is_ascii_hexdigit()))
}

#[async_trait]
pub trait ApiKeyStore: Send + Sync {
	async fn find_by_key(&self, key: &str) -> Result<Option<ApiKey>>;

	async fn insert(&self, key: &ApiKey) -> Result<()>;

	async fn set_status(&self, key: &str, status: ApiKeyStatus) -> Result<bool>;

	/// Bump the usage counter and last-used time.
	async fn record_usage(&self, key: &str, at: DateTime<Utc>) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryApiKeyStore {
	keys: Mutex<HashMap<String, ApiKey>>,
}

impl MemoryApiKeyStore {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl ApiKeyStore for MemoryApiKeyStore {
	async fn find_by_key(&self, key: &str) -> Result<Option<ApiKey>> {
		Ok(self.keys.lock().get(key).cloned())
	}

	async fn insert(&self, key: &ApiKey) -> Result<()> {
		self.keys.lock().insert(key.key.clone(), key.clone());
		Ok(())
	}

	async fn set_status(&self, key: &str, status: ApiKeyStatus) -> Result<bool> {
		Ok(self
			.keys
			.lock()
			.get_mut(key)
			.map(|k| k.status = status)
			.is_some())
	}

	async fn record_usage(&self, key: &str, at: DateTime<Utc>) -> Result<()> {
		if let Some(k) = self.keys.lock().get_mut(key) {
			k.usage_count += 1;
			k.last_used_at = Some(at);
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::Duration;
	use proptest::prelude::*;

	fn key(status: ApiKeyStatus, expires_at: Option<DateTime<Utc>>) -> ApiKey {
		let generated = generate_api_key();
		ApiKey {
			key: generated.key,
			secret_hash: generated.secret_hash,
			owner_id: "svc-1".to_string(),
			owner_identity: "ci".to_string(),
			owner_type: PrincipalType::Service,
			status,
			expires_at,
			created_at: Utc::now(),
			last_used_at: None,
			usage_count: 0,
		}
	}

	mod generation {
		use super::*;

		#[test]
		fn keys_have_prefix_and_fixed_length() {
			let generated = generate_api_key();
			assert!(is_api_key_format(&generated.key));
			assert_eq!(generated.key.len(), API_KEY_PREFIX.len() + 32);
			assert_eq!(generated.secret.expose().len(), 64);
		}

		#[test]
		fn stored_hash_matches_secret() {
			let generated = generate_api_key();
			assert_eq!(generated.secret_hash, hash_api_secret(generated.secret.expose()));
		}

		#[test]
		fn debug_hides_secret() {
			let generated = generate_api_key();
			let rendered = format!("{generated:?}");
			assert!(!rendered.contains(generated.secret.expose().as_str()));
		}
	}

	mod secret_check {
		use super::*;

		#[test]
		fn unknown_key_never_matches() {
			assert!(!verify_secret_hash(None, &hash_api_secret("anything")));
			assert!(!verify_secret_hash(None, UNKNOWN_KEY_HASH));
		}

		#[test]
		fn presented_hash_is_compared_with_the_stored_one() {
			let generated = generate_api_key();
			let mut k = key(ApiKeyStatus::Active, None);
			k.secret_hash = generated.secret_hash.clone();
			assert!(verify_secret_hash(Some(&k), &hash_api_secret(generated.secret.expose())));
			assert!(!verify_secret_hash(Some(&k), &hash_api_secret("wrong")));
		}
	}

	mod activity {
		use super::*;

		#[test]
		fn active_without_expiry() {
			assert!(key(ApiKeyStatus::Active, None).is_active(Utc::now()));
		}

		#[test]
		fn inactive_status() {
			assert!(!key(ApiKeyStatus::Inactive, None).is_active(Utc::now()));
		}

		#[test]
		fn past_expiry_is_inactive_even_if_status_active() {
			let now = Utc::now();
			let k = key(ApiKeyStatus::Active, Some(now - Duration::seconds(1)));
			assert!(!k.is_active(now));
			assert!(k.is_expired(now));
		}

		#[test]
		fn future_expiry_is_active() {
			let now = Utc::now();
			assert!(key(ApiKeyStatus::Active, Some(now + Duration::hours(1))).is_active(now));
		}
	}

	mod store {
		use super::*;

		#[tokio::test]
		async fn records_usage() {
			let store = MemoryApiKeyStore::new();
			let k = key(ApiKeyStatus::Active, None);
			store.insert(&k).await.unwrap();

			let at = Utc::now();
			store.record_usage(&k.key, at).await.unwrap();
			store.record_usage(&k.key, at).await.unwrap();

			let stored = store.find_by_key(&k.key).await.unwrap().unwrap();
			assert_eq!(stored.usage_count, 2);
			assert_eq!(stored.last_used_at, Some(at));
		}

		#[tokio::test]
		async fn set_status_reports_missing_keys() {
			let store = MemoryApiKeyStore::new();
			assert!(!store.set_status("wk_missing", ApiKeyStatus::Inactive).await.unwrap());
		}
	}

	mod proptests {
		use super::*;

		proptest! {
			#[test]
			fn only_the_right_secret_matches(other in "[0-9a-f]{64}") {
				let generated = generate_api_key();
				let k = ApiKey {
					secret_hash: generated.secret_hash.clone(),
					..key(ApiKeyStatus::Active, None)
				};
				prop_assert!(k.secret_matches(generated.secret.expose()));
				if other != *generated.secret.expose() {
					prop_assert!(!k.secret_matches(&other));
				}
			}
		}
	}
}
