// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TokenError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
	Access,
	Refresh,
	/// Long-lived; the only type that may be issued without `exp`.
	Static,
	Id,
	AuthorizationCode,
	Device,
}

impl TokenType {
	pub fn as_str(&self) -> &'static str {
		match self {
			TokenType::Access => "access",
			TokenType::Refresh => "refresh",
			TokenType::Static => "static",
			TokenType::Id => "id",
			TokenType::AuthorizationCode => "authorization_code",
			TokenType::Device => "device",
		}
	}

	/// ID tokens are verified by third parties against the JWKS, so they
	/// are signed with the RSA key. Everything else uses the HMAC secret.
	pub fn is_asymmetric(&self) -> bool {
		matches!(self, TokenType::Id)
	}
}

impl fmt::Display for TokenType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for TokenType {
	type Err = TokenError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"access" => Ok(TokenType::Access),
			"refresh" => Ok(TokenType::Refresh),
			"static" => Ok(TokenType::Static),
			"id" => Ok(TokenType::Id),
			"authorization_code" => Ok(TokenType::AuthorizationCode),
			"device" => Ok(TokenType::Device),
			other => Err(TokenError::InvalidRequest(format!("unknown token type: {other}"))),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalType {
	#[default]
	User,
	Service,
	Device,
}

impl PrincipalType {
	pub fn as_str(&self) -> &'static str {
		match self {
			PrincipalType::User => "user",
			PrincipalType::Service => "service",
			PrincipalType::Device => "device",
		}
	}
}

impl fmt::Display for PrincipalType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for PrincipalType {
	type Err = TokenError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"user" => Ok(PrincipalType::User),
			"service" => Ok(PrincipalType::Service),
			"device" => Ok(PrincipalType::Device),
			other => Err(TokenError::InvalidRequest(format!("unknown principal type: {other}"))),
		}
	}
}

/// OIDC profile claims, carried mostly by ID tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileClaims {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub email: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub nonce: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub preferred_username: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub locale: Option<String>,
}

/// JWT payload. Timestamps are seconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
	pub iss: String,
	/// Durable identifier of the principal.
	pub sub: String,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub aud: Vec<String>,
	pub iat: i64,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub nbf: Option<i64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub exp: Option<i64>,
	pub jti: String,
	pub token_type: TokenType,
	#[serde(default)]
	pub principal_type: PrincipalType,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub scopes: Vec<String>,
	#[serde(flatten)]
	pub profile: ProfileClaims,
}

impl TokenClaims {
	/// Seconds until expiry at `now`, or `None` for long-lived tokens.
	pub fn expires_in(&self, now: i64) -> Option<u64> {
		self.exp.map(|exp| exp.saturating_sub(now).max(0) as u64)
	}

	pub fn has_scope(&self, scope: &str) -> bool {
		self.scopes.iter().any(|s| s == scope)
	}

	/// Space-separated, as used in OAuth responses.
	pub fn scope_string(&self) -> String {
		self.scopes.join(" ")
	}
}
