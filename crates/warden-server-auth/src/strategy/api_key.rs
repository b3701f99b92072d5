// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use http::HeaderMap;
use tracing::{debug, instrument, warn};

use super::AuthStrategy;
use crate::api_key::{hash_api_secret, verify_secret_hash, ApiKeyStore};
use crate::error::{AuthError, Result};
use crate::extract::extract_api_key;
use crate::principal::{AuthMethod, Principal};

/// Key/secret pairs from `Bearer key:secret` or `X-Api-Key`/`X-Api-Secret`.
///
/// The presented secret is hashed before the lookup and compared even when
/// the key is unknown, so response time does not reveal which keys exist.
/// The secret is checked before the key's status, so only a holder of the
/// secret learns that a key is inactive or expired.
pub struct ApiKeyStrategy {
	store: Arc<dyn ApiKeyStore>,
}

impl ApiKeyStrategy {
	pub fn new(store: Arc<dyn ApiKeyStore>) -> Self {
		Self { store }
	}
}

#[async_trait]
impl AuthStrategy for ApiKeyStrategy {
	#[instrument(skip_all, fields(api_key))]
	async fn authenticate(&self, headers: &HeaderMap) -> Result<Principal> {
		let creds = extract_api_key(headers)?;
		tracing::Span::current().record("api_key", creds.key.as_str());

		let presented = hash_api_secret(creds.secret.expose());
		let found = self.store.find_by_key(&creds.key).await?;
		let known = found.is_some();
		let matched = verify_secret_hash(found.as_ref(), &presented);
		let Some(key) = found.filter(|_| matched) else {
			debug!(known, "API key rejected");
			return Err(AuthError::ApiKeyInvalid);
		};

		let now = Utc::now();
		if key.is_expired(now) {
			return Err(AuthError::ApiKeyExpired);
		}
		if !key.is_active(now) {
			return Err(AuthError::ApiKeyInactive);
		}

		let store = Arc::clone(&self.store);
		let key_id = key.key.clone();
		tokio::spawn(async move {
			if let Err(e) = store.record_usage(&key_id, now).await {
				warn!(api_key = %key_id, error = %e, "failed to record API key usage");
			}
		});

		Ok(Principal {
			id: key.owner_id,
			identity: key.owner_identity,
			principal_type: key.owner_type,
			auth_method: AuthMethod::ApiKey,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::api_key::{generate_api_key, ApiKey, ApiKeyStatus, MemoryApiKeyStore};
	use crate::strategy::test_support::authorization;
	use chrono::Duration;
	use http::HeaderValue;
	use warden_server_token::PrincipalType;

	struct Fixture {
		store: Arc<MemoryApiKeyStore>,
		strategy: ApiKeyStrategy,
		key: String,
		secret: String,
	}

	async fn fixture(status: ApiKeyStatus, expires_in: Option<Duration>) -> Fixture {
		let generated = generate_api_key();
		let now = Utc::now();
		let store = Arc::new(MemoryApiKeyStore::new());
		store
			.insert(&ApiKey {
				key: generated.key.clone(),
				secret_hash: generated.secret_hash.clone(),
				owner_id: "svc_ci".to_string(),
				owner_identity: "ci-bot".to_string(),
				owner_type: PrincipalType::Service,
				status,
				expires_at: expires_in.map(|d| now + d),
				created_at: now,
				last_used_at: None,
				usage_count: 0,
			})
			.await
			.unwrap();
		Fixture {
			strategy: ApiKeyStrategy::new(store.clone()),
			store,
			key: generated.key,
			secret: generated.secret.expose().clone(),
		}
	}

	fn structured(f: &Fixture) -> HeaderMap {
		authorization(&format!("Bearer {}:{}", f.key, f.secret))
	}

	#[tokio::test]
	async fn structured_header_authenticates() {
		let f = fixture(ApiKeyStatus::Active, None).await;
		let principal = f.strategy.authenticate(&structured(&f)).await.unwrap();
		assert_eq!(principal.id, "svc_ci");
		assert_eq!(principal.subject(), "ci-bot");
		assert_eq!(principal.principal_type, PrincipalType::Service);
		assert_eq!(principal.auth_method, AuthMethod::ApiKey);
	}

	#[tokio::test]
	async fn dedicated_headers_authenticate() {
		let f = fixture(ApiKeyStatus::Active, Some(Duration::hours(1))).await;
		let mut headers = HeaderMap::new();
		headers.insert("x-api-key", HeaderValue::from_str(&f.key).unwrap());
		headers.insert("x-api-secret", HeaderValue::from_str(&f.secret).unwrap());
		assert!(f.strategy.authenticate(&headers).await.is_ok());
	}

	#[tokio::test]
	async fn usage_is_recorded_in_the_background() {
		let f = fixture(ApiKeyStatus::Active, None).await;
		f.strategy.authenticate(&structured(&f)).await.unwrap();

		for _ in 0..50 {
			let stored = f.store.find_by_key(&f.key).await.unwrap().unwrap();
			if stored.usage_count == 1 {
				assert!(stored.last_used_at.is_some());
				return;
			}
			tokio::task::yield_now().await;
		}
		panic!("usage was never recorded");
	}

	#[tokio::test]
	async fn wrong_secret_and_unknown_key_are_invalid() {
		let f = fixture(ApiKeyStatus::Active, None).await;
		let err = f
			.strategy
			.authenticate(&authorization(&format!("Bearer {}:{}", f.key, "00".repeat(32))))
			.await
			.unwrap_err();
		assert!(matches!(err, AuthError::ApiKeyInvalid));

		let other = generate_api_key();
		let err = f
			.strategy
			.authenticate(&authorization(&format!("Bearer {}:{}", other.key, f.secret)))
			.await
			.unwrap_err();
		assert!(matches!(err, AuthError::ApiKeyInvalid));
	}

	#[tokio::test]
	async fn inactive_key_is_rejected() {
		let f = fixture(ApiKeyStatus::Inactive, None).await;
		let err = f.strategy.authenticate(&structured(&f)).await.unwrap_err();
		assert!(matches!(err, AuthError::ApiKeyInactive));
	}

	#[tokio::test]
	async fn key_past_expiry_is_rejected() {
		let f = fixture(ApiKeyStatus::Active, Some(Duration::seconds(-1))).await;
		let err = f.strategy.authenticate(&structured(&f)).await.unwrap_err();
		assert!(matches!(err, AuthError::ApiKeyExpired));
	}

	#[tokio::test]
	async fn status_is_hidden_without_the_secret() {
		let f = fixture(ApiKeyStatus::Inactive, None).await;
		let err = f
			.strategy
			.authenticate(&authorization(&format!("Bearer {}:{}", f.key, "wrong")))
			.await
			.unwrap_err();
		assert!(matches!(err, AuthError::ApiKeyInvalid));
	}
}
