// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TokenError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
	/// Not a JWT, undecodable claims, or an unsupported algorithm.
	#[error("token is malformed")]
	Malformed,

	#[error("token signature is invalid")]
	InvalidSignature,

	#[error("token has expired")]
	Expired,

	/// `iat` or `nbf` lies beyond the tolerated clock skew.
	#[error("token is not yet valid")]
	NotYetValid,

	#[error("invalid token request: {0}")]
	InvalidRequest(String),

	#[error("failed to sign token: {0}")]
	Signing(String),

	#[error("failed to load signing keys: {0}")]
	KeyLoadFailed(String),
}

impl TokenError {
	/// Stable machine-readable name, used in HTTP error bodies.
	pub fn kind(&self) -> &'static str {
		match self {
			TokenError::Malformed | TokenError::InvalidSignature => "token_invalid",
			TokenError::Expired => "token_expired",
			TokenError::NotYetValid => "token_not_yet_valid",
			TokenError::InvalidRequest(_) => "invalid_request",
			TokenError::Signing(_) => "internal_error",
			TokenError::KeyLoadFailed(_) => "key_load_failed",
		}
	}
}
