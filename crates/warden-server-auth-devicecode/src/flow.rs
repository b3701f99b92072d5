// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The three device-flow operations.
//!
//! ```text
//! device                     server                       browser
//!   │  create(client, scope)   │                             │
//!   │─────────────────────────>│                             │
//!   │  device code, user code  │                             │
//!   │<─────────────────────────│                             │
//!   │                          │  verify(user code, approve) │
//!   │                          │<────────────────────────────│
//!   │  token(device code)      │                             │
//!   │─────────────────────────>│  (repeated every interval)  │
//!   │  access token            │                             │
//!   │<─────────────────────────│                             │
//! ```
//!
//! A successful exchange deletes the record, so a device code yields at most
//! one token.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use warden_server_token::{IssueRequest, PrincipalType, TokenIssuer, TokenType};

use crate::client::ClientRegistry;
use crate::codes::normalize_user_code;
use crate::error::{DeviceFlowError, Result};
use crate::model::{DeviceAuthorization, DeviceStatus};
use crate::store::DeviceCodeStore;

/// Attempts at generating a code pair that does not collide.
const MAX_CODE_ATTEMPTS: usize = 3;

pub const DEFAULT_CODE_TTL: Duration = Duration::from_secs(600);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct DeviceFlowConfig {
	pub code_ttl: Duration,
	pub poll_interval: Duration,
	/// Page where the user enters the code.
	pub verification_uri: String,
}

impl Default for DeviceFlowConfig {
	fn default() -> Self {
		Self {
			code_ttl: DEFAULT_CODE_TTL,
			poll_interval: DEFAULT_POLL_INTERVAL,
			verification_uri: "http://localhost:8080/device".to_string(),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceAuthorizationResponse {
	pub device_code: String,
	pub user_code: String,
	#[serde(rename = "verificationURI")]
	pub verification_uri: String,
	#[serde(rename = "verificationURIComplete")]
	pub verification_uri_complete: String,
	pub expires_in: u64,
	pub interval: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceTokenResponse {
	pub access_token: String,
	pub token_type: String,
	pub expires_in: u64,
	pub scope: String,
}

pub struct DeviceFlow {
	store: Arc<dyn DeviceCodeStore>,
	clients: Arc<dyn ClientRegistry>,
	issuer: Arc<TokenIssuer>,
	config: DeviceFlowConfig,
}

impl DeviceFlow {
	pub fn new(
		store: Arc<dyn DeviceCodeStore>,
		clients: Arc<dyn ClientRegistry>,
		issuer: Arc<TokenIssuer>,
		config: DeviceFlowConfig,
	) -> Self {
		Self {
			store,
			clients,
			issuer,
			config,
		}
	}

	pub fn config(&self) -> &DeviceFlowConfig {
		&self.config
	}

	#[instrument(skip(self))]
	pub async fn create(&self, client_id: &str, scope: &str) -> Result<DeviceAuthorizationResponse> {
		if self.clients.lookup(client_id).await?.is_none() {
			debug!("device flow requested by unknown client");
			return Err(DeviceFlowError::ClientNotFound);
		}

		let ttl = chrono::Duration::from_std(self.config.code_ttl)
			.map_err(|e| DeviceFlowError::Store(format!("invalid code ttl: {e}")))?;

		let mut attempt = 0;
		let record = loop {
			attempt += 1;
			let record = DeviceAuthorization::new(client_id, scope, ttl, Utc::now());
			match self.store.insert(&record).await {
				Ok(()) => break record,
				Err(DeviceFlowError::DuplicateCode) if attempt < MAX_CODE_ATTEMPTS => {
					warn!(attempt, "device code collision, regenerating");
				}
				Err(e) => return Err(e),
			}
		};

		info!(user_code = %record.user_code, expires_at = %record.expires_at, "device authorization created");

		Ok(DeviceAuthorizationResponse {
			verification_uri_complete: format!("{}?user_code={}", self.config.verification_uri, record.user_code),
			verification_uri: self.config.verification_uri.clone(),
			device_code: record.device_code,
			user_code: record.user_code,
			expires_in: self.config.code_ttl.as_secs(),
			interval: self.config.poll_interval.as_secs(),
		})
	}

	/// Record the user's decision for `user_code`.
	///
	/// A denial is reported back as [`DeviceFlowError::AuthorizationDenied`]
	/// once recorded, so the approval page can show the outcome.
	#[instrument(skip(self))]
	pub async fn verify(&self, user_code: &str, approved: bool, user_id: &str) -> Result<()> {
		let user_code = normalize_user_code(user_code).ok_or(DeviceFlowError::DeviceCodeInvalid)?;

		let now = Utc::now();
		let record = self
			.store
			.find_by_user_code(&user_code)
			.await?
			.ok_or(DeviceFlowError::DeviceCodeInvalid)?;

		match record.status_at(now) {
			DeviceStatus::Pending => {}
			DeviceStatus::Expired => return Err(DeviceFlowError::DeviceCodeExpired),
			DeviceStatus::Approved | DeviceStatus::Denied => return Err(DeviceFlowError::DeviceCodeInvalid),
		}

		if !approved {
			self.store.deny(&user_code, now).await?;
			info!("device authorization denied by user");
			return Err(DeviceFlowError::AuthorizationDenied);
		}

		// Lost a race with another approval or denial.
		if !self.store.approve(&user_code, user_id, now).await? {
			return Err(DeviceFlowError::DeviceCodeInvalid);
		}

		info!("device authorization approved");
		Ok(())
	}

	/// Poll for, and on approval redeem, the token for `device_code`.
	#[instrument(skip_all)]
	pub async fn token(&self, device_code: &str) -> Result<DeviceTokenResponse> {
		let now = Utc::now();
		let record = self
			.store
			.find_by_device_code(device_code)
			.await?
			.ok_or(DeviceFlowError::DeviceCodeInvalid)?;

		match record.status_at(now) {
			DeviceStatus::Expired => return Err(DeviceFlowError::DeviceCodeExpired),
			DeviceStatus::Denied => return Err(DeviceFlowError::AuthorizationDenied),
			DeviceStatus::Pending => return Err(DeviceFlowError::AuthorizationPending),
			DeviceStatus::Approved => {}
		}

		// Another poller redeemed it between the read and here.
		let record = self
			.store
			.consume(device_code, now)
			.await?
			.ok_or(DeviceFlowError::DeviceCodeInvalid)?;
		let user_id = record.user_id.as_deref().ok_or(DeviceFlowError::DeviceCodeInvalid)?;

		let ttl = self.issuer.config().ttls.device;
		let issued = self.issuer.issue(
			IssueRequest::new(user_id, TokenType::Access)
				.principal_type(PrincipalType::User)
				.audience([record.client_id.as_str()])
				.scopes(record.scopes())
				.ttl(ttl),
		)?;

		info!(client_id = %record.client_id, "device code exchanged for access token");

		Ok(DeviceTokenResponse {
			access_token: issued.token,
			token_type: "Bearer".to_string(),
			expires_in: issued.expires_in.unwrap_or(ttl.as_secs()),
			scope: record.scope,
		})
	}

	/// Delete expired records.
	pub async fn sweep_expired(&self) -> Result<u64> {
		let removed = self.store.delete_expired(Utc::now()).await?;
		if removed > 0 {
			debug!(removed, "expired device authorizations swept");
		}
		Ok(removed)
	}
}
