// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use http::StatusCode;
use thiserror::Error;
use warden_server_token::TokenError;

pub type Result<T> = std::result::Result<T, AuthError>;

/// Why a request could not be authenticated.
///
/// The variants are distinct so callers and logs can tell them apart, but
/// [`AuthError::kind`] and [`AuthError::public_message`] collapse every
/// credential failure into one answer, so a response never reveals whether
/// a username or key exists.
#[derive(Debug, Error)]
pub enum AuthError {
	#[error("no credentials supplied")]
	MissingCredentials,

	#[error("unsupported authorization scheme")]
	UnsupportedScheme,

	#[error("malformed credentials")]
	MalformedCredentials,

	#[error("incorrect username or password")]
	PasswordIncorrect,

	#[error("token rejected: {0}")]
	Token(#[from] TokenError),

	/// A valid token of a type other than `access` was presented.
	#[error("token type not accepted here")]
	WrongTokenType,

	/// The token's subject no longer resolves to a principal.
	#[error("principal not found")]
	PrincipalNotFound,

	#[error("invalid API key")]
	ApiKeyInvalid,

	#[error("API key is inactive")]
	ApiKeyInactive,

	#[error("API key has expired")]
	ApiKeyExpired,

	#[error("credential store error: {0}")]
	Store(String),

	#[error("internal authentication error: {0}")]
	Internal(String),
}

impl AuthError {
	pub fn kind(&self) -> &'static str {
		match self {
			AuthError::Token(TokenError::Expired) => "token_expired",
			AuthError::Token(TokenError::NotYetValid) => "token_not_yet_valid",
			AuthError::Token(TokenError::Malformed | TokenError::InvalidSignature) | AuthError::WrongTokenType => {
				"token_invalid"
			}
			_ if self.is_internal() => "internal_error",
			_ => "authentication_failed",
		}
	}

	pub fn status_code(&self) -> StatusCode {
		if self.is_internal() {
			StatusCode::INTERNAL_SERVER_ERROR
		} else {
			StatusCode::UNAUTHORIZED
		}
	}

	/// Faults of the server rather than of the presented credentials.
	pub fn is_internal(&self) -> bool {
		matches!(
			self,
			AuthError::Store(_)
				| AuthError::Internal(_)
				| AuthError::Token(TokenError::Signing(_) | TokenError::KeyLoadFailed(_) | TokenError::InvalidRequest(_))
		)
	}

	/// Text safe to return to the client.
	pub fn public_message(&self) -> &'static str {
		match self.kind() {
			"token_expired" => "token has expired",
			"token_not_yet_valid" => "token is not yet valid",
			"token_invalid" => "invalid token",
			"internal_error" => "internal error",
			_ => "authentication failed",
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn credential_failures_are_indistinguishable() {
		let failures = [
			AuthError::PasswordIncorrect,
			AuthError::PrincipalNotFound,
			AuthError::ApiKeyInvalid,
			AuthError::ApiKeyInactive,
			AuthError::ApiKeyExpired,
			AuthError::MissingCredentials,
		];
		for e in failures {
			assert_eq!(e.kind(), "authentication_failed");
			assert_eq!(e.public_message(), "authentication failed");
			assert_eq!(e.status_code(), StatusCode::UNAUTHORIZED);
		}
	}

	#[test]
	fn token_failures_keep_their_kind() {
		assert_eq!(AuthError::Token(TokenError::Expired).kind(), "token_expired");
		assert_eq!(AuthError::Token(TokenError::NotYetValid).kind(), "token_not_yet_valid");
		assert_eq!(AuthError::Token(TokenError::InvalidSignature).kind(), "token_invalid");
		assert_eq!(AuthError::WrongTokenType.kind(), "token_invalid");
	}

	#[test]
	fn store_faults_are_internal() {
		let e = AuthError::Store("connection reset".into());
		assert!(e.is_internal());
		assert_eq!(e.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
		assert_eq!(e.public_message(), "internal error");
	}
}
