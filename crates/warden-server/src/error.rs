// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Server error types and HTTP response conversions.

use axum::{
	http::StatusCode,
	response::{IntoResponse, Response},
	Json,
};
use serde::{Deserialize, Serialize};
use warden_server_auth::AuthError;
use warden_server_auth_devicecode::DeviceFlowError;
use warden_server_authz::AuthzError;
use warden_server_db::DbError;
use warden_server_token::TokenError;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
	#[error(transparent)]
	Auth(#[from] AuthError),

	/// Authenticated, but the policy engine said no.
	#[error("permission denied")]
	PermissionDenied,

	#[error(transparent)]
	Token(#[from] TokenError),

	#[error(transparent)]
	Device(#[from] DeviceFlowError),

	#[error(transparent)]
	Authz(#[from] AuthzError),

	#[error(transparent)]
	Db(#[from] DbError),

	#[error("Invalid request: {0}")]
	BadRequest(String),

	#[error("Internal error: {0}")]
	Internal(String),
}

/// Error response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
	pub error: String,
	pub message: String,
}

impl ErrorResponse {
	pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
		Self {
			error: error.into(),
			message: message.into(),
		}
	}
}

impl ServerError {
	fn parts(&self) -> (StatusCode, ErrorResponse) {
		match self {
			ServerError::Auth(e) => (e.status_code(), ErrorResponse::new(e.kind(), e.public_message())),
			ServerError::PermissionDenied => (
				StatusCode::FORBIDDEN,
				ErrorResponse::new("permission_denied", "Insufficient permissions"),
			),
			ServerError::Token(e) => match e {
				TokenError::Malformed | TokenError::InvalidSignature => (
					StatusCode::UNAUTHORIZED,
					ErrorResponse::new(e.kind(), "invalid token"),
				),
				TokenError::Expired => (StatusCode::UNAUTHORIZED, ErrorResponse::new(e.kind(), "token has expired")),
				TokenError::NotYetValid => (
					StatusCode::UNAUTHORIZED,
					ErrorResponse::new(e.kind(), "token is not yet valid"),
				),
				TokenError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, ErrorResponse::new(e.kind(), msg.clone())),
				TokenError::Signing(_) | TokenError::KeyLoadFailed(_) => internal(),
			},
			ServerError::Device(e) => {
				let status = match e {
					DeviceFlowError::ClientNotFound => StatusCode::UNAUTHORIZED,
					_ if e.is_internal() => return internal(),
					_ => StatusCode::BAD_REQUEST,
				};
				(status, ErrorResponse::new(e.kind(), e.to_string()))
			}
			ServerError::Authz(AuthzError::InvalidRule(msg)) => {
				(StatusCode::BAD_REQUEST, ErrorResponse::new("invalid_request", msg.clone()))
			}
			ServerError::Authz(_) | ServerError::Db(_) | ServerError::Internal(_) => internal(),
			ServerError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ErrorResponse::new("invalid_request", msg.clone())),
		}
	}
}

fn internal() -> (StatusCode, ErrorResponse) {
	(
		StatusCode::INTERNAL_SERVER_ERROR,
		ErrorResponse::new("internal_error", "An internal error occurred"),
	)
}

impl IntoResponse for ServerError {
	fn into_response(self) -> Response {
		let (status, body) = self.parts();
		if status.is_server_error() {
			tracing::error!(error = %self, "request failed");
		} else {
			tracing::debug!(error = %self, kind = %body.error, "request rejected");
		}
		(status, Json(body)).into_response()
	}
}

pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn credential_failures_are_uniform() {
		for e in [AuthError::PasswordIncorrect, AuthError::ApiKeyInactive, AuthError::PrincipalNotFound] {
			let (status, body) = ServerError::Auth(e).parts();
			assert_eq!(status, StatusCode::UNAUTHORIZED);
			assert_eq!(body, ErrorResponse::new("authentication_failed", "authentication failed"));
		}
	}

	#[test]
	fn device_errors_follow_rfc_8628() {
		let (status, body) = ServerError::Device(DeviceFlowError::AuthorizationPending).parts();
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body.error, "authorization_pending");

		let (status, body) = ServerError::Device(DeviceFlowError::ClientNotFound).parts();
		assert_eq!(status, StatusCode::UNAUTHORIZED);
		assert_eq!(body.error, "invalid_client");

		let (status, _) = ServerError::Device(DeviceFlowError::Store("locked".into())).parts();
		assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
	}

	#[test]
	fn internal_details_are_not_exposed() {
		let (status, body) = ServerError::Internal("secret path /etc/x".into()).parts();
		assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
		assert!(!body.message.contains("/etc/x"));
	}

	#[test]
	fn permission_denied_is_forbidden() {
		let (status, body) = ServerError::PermissionDenied.parts();
		assert_eq!(status, StatusCode::FORBIDDEN);
		assert_eq!(body.error, "permission_denied");
	}
}
