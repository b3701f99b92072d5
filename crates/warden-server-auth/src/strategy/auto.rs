// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use http::HeaderMap;
use tracing::{instrument, trace};

use super::{ApiKeyStrategy, AuthStrategy, BearerStrategy, PasswordStrategy};
use crate::error::{AuthError, Result};
use crate::extract::{has_api_key, parse_authorization, AuthScheme};
use crate::principal::Principal;

/// Dispatches on the `Authorization` scheme: `Basic` to the password
/// strategy, `Bearer` to the token strategy.
///
/// With an API key strategy configured, `Bearer wk_…` and the `X-Api-Key`
/// header go there instead. Any other scheme fails outright; there is no
/// fallback between strategies.
pub struct AutoStrategy {
	password: PasswordStrategy,
	bearer: BearerStrategy,
	api_key: Option<ApiKeyStrategy>,
}

impl AutoStrategy {
	pub fn new(password: PasswordStrategy, bearer: BearerStrategy) -> Self {
		Self {
			password,
			bearer,
			api_key: None,
		}
	}

	pub fn with_api_keys(mut self, api_key: ApiKeyStrategy) -> Self {
		self.api_key = Some(api_key);
		self
	}
}

#[async_trait]
impl AuthStrategy for AutoStrategy {
	#[instrument(skip_all)]
	async fn authenticate(&self, headers: &HeaderMap) -> Result<Principal> {
		if let Some(api_key) = &self.api_key {
			if has_api_key(headers) {
				trace!("dispatching to API key strategy");
				return api_key.authenticate(headers).await;
			}
		}

		match parse_authorization(headers)? {
			Some((AuthScheme::Basic, _)) => {
				trace!("dispatching to password strategy");
				self.password.authenticate(headers).await
			}
			Some((AuthScheme::Bearer, _)) => {
				trace!("dispatching to bearer strategy");
				self.bearer.authenticate(headers).await
			}
			None => Err(AuthError::MissingCredentials),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::api_key::{generate_api_key, ApiKey, ApiKeyStatus, ApiKeyStore, MemoryApiKeyStore};
	use crate::principal::AuthMethod;
	use crate::strategy::test_support::{authorization, directory, issuer, ALICE_ID, ALICE_PASSWORD};
	use base64::engine::general_purpose::STANDARD;
	use base64::Engine;
	use chrono::Utc;
	use std::sync::Arc;
	use warden_server_token::{IssueRequest, PrincipalType, TokenIssuer, TokenType};

	fn auto() -> (AutoStrategy, Arc<TokenIssuer>) {
		let issuer = issuer();
		let directory = directory();
		let auto = AutoStrategy::new(
			PasswordStrategy::new(directory.clone()),
			BearerStrategy::new(Arc::clone(&issuer), directory),
		);
		(auto, issuer)
	}

	#[tokio::test]
	async fn basic_goes_to_password() {
		let (auto, _) = auto();
		let encoded = STANDARD.encode(format!("alice:{ALICE_PASSWORD}"));
		let principal = auto
			.authenticate(&authorization(&format!("Basic {encoded}")))
			.await
			.unwrap();
		assert_eq!(principal.auth_method, AuthMethod::Password);
	}

	#[tokio::test]
	async fn bearer_goes_to_token() {
		let (auto, issuer) = auto();
		let token = issuer
			.issue(IssueRequest::new(ALICE_ID, TokenType::Access))
			.unwrap()
			.token;
		let principal = auto
			.authenticate(&authorization(&format!("Bearer {token}")))
			.await
			.unwrap();
		assert_eq!(principal.auth_method, AuthMethod::Bearer);
	}

	#[tokio::test]
	async fn unknown_scheme_is_a_hard_failure() {
		let (auto, _) = auto();
		let err = auto
			.authenticate(&authorization("Negotiate YII="))
			.await
			.unwrap_err();
		assert!(matches!(err, AuthError::UnsupportedScheme));
		assert_eq!(err.kind(), "authentication_failed");
	}

	#[tokio::test]
	async fn no_header_is_missing_credentials() {
		let (auto, _) = auto();
		let err = auto.authenticate(&HeaderMap::new()).await.unwrap_err();
		assert!(matches!(err, AuthError::MissingCredentials));
	}

	#[tokio::test]
	async fn api_keys_route_only_when_configured() {
		let generated = generate_api_key();
		let store = Arc::new(MemoryApiKeyStore::new());
		store
			.insert(&ApiKey {
				key: generated.key.clone(),
				secret_hash: generated.secret_hash.clone(),
				owner_id: "svc_ci".to_string(),
				owner_identity: "ci-bot".to_string(),
				owner_type: PrincipalType::Service,
				status: ApiKeyStatus::Active,
				expires_at: None,
				created_at: Utc::now(),
				last_used_at: None,
				usage_count: 0,
			})
			.await
			.unwrap();
		let headers = authorization(&format!("Bearer {}:{}", generated.key, generated.secret.expose()));

		let (without, _) = auto();
		let err = without.authenticate(&headers).await.unwrap_err();
		assert!(matches!(err, AuthError::Token(_)));

		let (with, _) = auto();
		let with = with.with_api_keys(ApiKeyStrategy::new(store));
		let principal = with.authenticate(&headers).await.unwrap();
		assert_eq!(principal.auth_method, AuthMethod::ApiKey);
		assert_eq!(principal.subject(), "ci-bot");
	}
}
