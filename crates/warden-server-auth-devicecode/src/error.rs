// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;
use warden_server_token::TokenError;

pub type Result<T> = std::result::Result<T, DeviceFlowError>;

/// Every variant except `Store`, `DuplicateCode` and `Token` is an expected,
/// user-facing outcome of the flow.
#[derive(Debug, Error)]
pub enum DeviceFlowError {
	#[error("unknown client")]
	ClientNotFound,

	#[error("invalid or unknown device code")]
	DeviceCodeInvalid,

	#[error("authorization pending")]
	AuthorizationPending,

	#[error("authorization denied")]
	AuthorizationDenied,

	#[error("device code expired")]
	DeviceCodeExpired,

	/// A generated code collided with an existing record.
	#[error("device or user code already exists")]
	DuplicateCode,

	#[error("device code store error: {0}")]
	Store(String),

	#[error("failed to issue token: {0}")]
	Token(#[from] TokenError),
}

impl DeviceFlowError {
	/// Error code as used on the wire, following RFC 8628 where it names one.
	pub fn kind(&self) -> &'static str {
		match self {
			DeviceFlowError::ClientNotFound => "invalid_client",
			DeviceFlowError::DeviceCodeInvalid => "invalid_grant",
			DeviceFlowError::AuthorizationPending => "authorization_pending",
			DeviceFlowError::AuthorizationDenied => "access_denied",
			DeviceFlowError::DeviceCodeExpired => "expired_token",
			DeviceFlowError::DuplicateCode | DeviceFlowError::Store(_) | DeviceFlowError::Token(_) => {
				"server_error"
			}
		}
	}

	pub fn is_internal(&self) -> bool {
		self.kind() == "server_error"
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn polling_outcomes_use_rfc_names() {
		assert_eq!(DeviceFlowError::AuthorizationPending.kind(), "authorization_pending");
		assert_eq!(DeviceFlowError::AuthorizationDenied.kind(), "access_denied");
		assert_eq!(DeviceFlowError::DeviceCodeExpired.kind(), "expired_token");
	}

	#[test]
	fn only_backend_faults_are_internal() {
		assert!(DeviceFlowError::Store("locked".into()).is_internal());
		assert!(!DeviceFlowError::DeviceCodeInvalid.is_internal());
	}
}
