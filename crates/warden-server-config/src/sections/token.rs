// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Token issuance and signing key configuration.
//!
//! Key material never comes from the TOML file; it is read from
//! `WARDEN_SERVER_TOKEN_HMAC_SECRET` and `WARDEN_SERVER_TOKEN_RSA_PRIVATE_KEY`
//! (or their `_FILE` variants).

use serde::Deserialize;
use std::time::Duration;
use warden_common_secret::SecretString;

/// Secret inputs to the key manager, resolved from the environment.
#[derive(Debug, Clone, Default)]
pub struct TokenSecrets {
	pub hmac_secret: Option<SecretString>,
	pub rsa_private_key_pem: Option<SecretString>,
}

#[derive(Debug, Clone)]
pub struct TokenConfig {
	pub issuer: String,
	pub max_clock_skew_secs: u64,
	pub access_ttl_secs: u64,
	pub refresh_ttl_secs: u64,
	pub id_ttl_secs: u64,
	pub device_ttl_secs: u64,
	pub authorization_code_ttl_secs: u64,
	/// Ceiling on any lifetime a caller asks for.
	pub max_ttl_secs: u64,
	pub secrets: TokenSecrets,
}

impl TokenConfig {
	pub fn max_clock_skew(&self) -> Duration {
		Duration::from_secs(self.max_clock_skew_secs)
	}
}

impl Default for TokenConfig {
	fn default() -> Self {
		TokenConfigLayer::default().finalize(TokenSecrets::default())
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenConfigLayer {
	#[serde(default)]
	pub issuer: Option<String>,
	#[serde(default)]
	pub max_clock_skew_secs: Option<u64>,
	#[serde(default)]
	pub access_ttl_secs: Option<u64>,
	#[serde(default)]
	pub refresh_ttl_secs: Option<u64>,
	#[serde(default)]
	pub id_ttl_secs: Option<u64>,
	#[serde(default)]
	pub device_ttl_secs: Option<u64>,
	#[serde(default)]
	pub authorization_code_ttl_secs: Option<u64>,
	#[serde(default)]
	pub max_ttl_secs: Option<u64>,
}

impl TokenConfigLayer {
	pub fn merge(&mut self, other: TokenConfigLayer) {
		if other.issuer.is_some() {
			self.issuer = other.issuer;
		}
		if other.max_clock_skew_secs.is_some() {
			self.max_clock_skew_secs = other.max_clock_skew_secs;
		}
		if other.access_ttl_secs.is_some() {
			self.access_ttl_secs = other.access_ttl_secs;
		}
		if other.refresh_ttl_secs.is_some() {
			self.refresh_ttl_secs = other.refresh_ttl_secs;
		}
		if other.id_ttl_secs.is_some() {
			self.id_ttl_secs = other.id_ttl_secs;
		}
		if other.device_ttl_secs.is_some() {
			self.device_ttl_secs = other.device_ttl_secs;
		}
		if other.authorization_code_ttl_secs.is_some() {
			self.authorization_code_ttl_secs = other.authorization_code_ttl_secs;
		}
		if other.max_ttl_secs.is_some() {
			self.max_ttl_secs = other.max_ttl_secs;
		}
	}

	pub fn finalize(self, secrets: TokenSecrets) -> TokenConfig {
		TokenConfig {
			issuer: self.issuer.unwrap_or_else(|| "warden".to_string()),
			max_clock_skew_secs: self.max_clock_skew_secs.unwrap_or(5),
			access_ttl_secs: self.access_ttl_secs.unwrap_or(60 * 60),
			refresh_ttl_secs: self.refresh_ttl_secs.unwrap_or(30 * 24 * 60 * 60),
			id_ttl_secs: self.id_ttl_secs.unwrap_or(60 * 60),
			device_ttl_secs: self.device_ttl_secs.unwrap_or(60 * 60),
			authorization_code_ttl_secs: self.authorization_code_ttl_secs.unwrap_or(10 * 60),
			max_ttl_secs: self.max_ttl_secs.unwrap_or(365 * 24 * 60 * 60),
			secrets,
		}
	}
}
