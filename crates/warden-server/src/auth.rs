// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Request authentication and permission checks.

use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::{debug, instrument};
use warden_server_auth::Principal;

use crate::error::{ServerError, ServerResult};
use crate::state::AppState;

/// Extractor for handlers that need an authenticated caller.
///
/// Runs the configured strategy against the request headers and rejects
/// with 401 when it fails. The rejection body never says which part of the
/// credential was wrong.
///
/// ```ignore
/// async fn handler(AuthContext(principal): AuthContext) -> String {
///     principal.identity
/// }
/// ```
pub struct AuthContext(pub Principal);

impl FromRequestParts<AppState> for AuthContext {
	type Rejection = ServerError;

	#[instrument(name = "AuthContext::from_request_parts", skip_all)]
	async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
		let principal = state.auth.authenticate(&parts.headers).await?;
		debug!(principal_id = %principal.id, method = %principal.auth_method, "request authenticated");
		Ok(AuthContext(principal))
	}
}

/// Ask the policy engine whether `principal` may perform `action` on
/// `resource`; a denial becomes [`ServerError::PermissionDenied`].
#[instrument(skip(state, principal), fields(subject = %principal.subject()))]
pub async fn require_permission(
	state: &AppState,
	principal: &Principal,
	resource: &str,
	action: &str,
) -> ServerResult<()> {
	let decision = state
		.authorizer
		.authorize(principal.subject(), resource, action)
		.await?;
	if decision.allowed {
		Ok(())
	} else {
		debug!(reason = ?decision.reason, "permission denied");
		Err(ServerError::PermissionDenied)
	}
}
