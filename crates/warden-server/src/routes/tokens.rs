// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Token issuance, verification and the public key document.

use std::time::Duration;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use warden_server_token::{IssueRequest, IssuedToken, Jwks, TokenClaims, TokenType};

use crate::auth::{require_permission, AuthContext};
use crate::error::{ServerError, ServerResult};
use crate::state::AppState;

pub const TOKENS_PATH: &str = "/v1/tokens";

#[derive(Debug, Deserialize)]
pub struct CreateTokenRequest {
	#[serde(default = "default_token_type")]
	pub token_type: TokenType,
	#[serde(default)]
	pub scopes: Vec<String>,
	#[serde(default)]
	pub audience: Vec<String>,
	/// Falls back to the per-type default.
	#[serde(default)]
	pub ttl_secs: Option<u64>,
}

fn default_token_type() -> TokenType {
	TokenType::Access
}

#[derive(Debug, Deserialize)]
pub struct VerifyTokenRequest {
	pub token: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyTokenResponse {
	pub valid: bool,
	pub claims: TokenClaims,
}

/// POST /v1/tokens - mint a token for the authenticated caller.
///
/// Device and authorization-code tokens only come out of their own flows.
/// Anything beyond an access token with at most the default lifetime needs
/// `post:<type>` on `/v1/tokens`, e.g. `post:refresh`, so a short-lived
/// credential cannot be traded for a longer one.
#[instrument(skip_all, fields(principal_id = %principal.id, token_type = %request.token_type))]
pub async fn create_token(
	State(state): State<AppState>,
	AuthContext(principal): AuthContext,
	Json(request): Json<CreateTokenRequest>,
) -> ServerResult<Json<IssuedToken>> {
	if matches!(request.token_type, TokenType::Device | TokenType::AuthorizationCode) {
		return Err(ServerError::BadRequest(format!(
			"{} tokens cannot be requested directly",
			request.token_type
		)));
	}

	let default_ttl = state.issuer.config().ttls.for_type(request.token_type);
	let extends_lifetime = matches!(
		(request.ttl_secs, default_ttl),
		(Some(secs), Some(default)) if secs > default.as_secs()
	);
	if request.token_type != TokenType::Access || extends_lifetime {
		let action = format!("post:{}", request.token_type);
		require_permission(&state, &principal, TOKENS_PATH, &action).await?;
	}

	let mut issue = IssueRequest::new(principal.id.clone(), request.token_type)
		.principal_type(principal.principal_type)
		.scopes(request.scopes)
		.audience(request.audience);
	if let Some(secs) = request.ttl_secs {
		issue = issue.ttl(Duration::from_secs(secs));
	}

	let issued = state.issuer.issue(issue)?;
	info!(jti = %issued.claims.jti, "token issued");
	Ok(Json(issued))
}

/// POST /v1/tokens/verify
pub async fn verify_token(
	State(state): State<AppState>,
	Json(request): Json<VerifyTokenRequest>,
) -> ServerResult<Json<VerifyTokenResponse>> {
	let claims = state.issuer.verify(&request.token)?;
	Ok(Json(VerifyTokenResponse { valid: true, claims }))
}

/// GET /.well-known/jwks.json
pub async fn jwks(State(state): State<AppState>) -> Json<Jwks> {
	Json(state.issuer.keys().jwks())
}
