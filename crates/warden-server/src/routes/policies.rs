// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Policy administration on the authoritative node.
//!
//! Callers are authenticated, then authorized against the rule set itself
//! with the request path as resource and the lower-cased method as action,
//! e.g. `("admin", "/v1/authz/policies", "post")`.

use axum::{
	extract::State,
	http::{Method, Uri},
	Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use warden_server_auth::Principal;
use warden_server_authz::{Policy, PolicyService};

use crate::auth::{require_permission, AuthContext};
use crate::error::{ServerError, ServerResult};
use crate::state::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyChange {
	/// Whether the live rule set changed. Re-creating an existing policy is
	/// not an error, it just changes nothing.
	pub changed: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePolicyRequest {
	pub old: Policy,
	pub new: Policy,
}

#[derive(Debug, Deserialize)]
pub struct RoleAssignment {
	pub member: String,
	pub role: String,
}

async fn authorize_admin<'a>(
	state: &'a AppState,
	principal: &Principal,
	method: &Method,
	uri: &Uri,
) -> ServerResult<&'a PolicyService> {
	let service = state
		.policies
		.as_ref()
		.ok_or_else(|| ServerError::BadRequest("policy writes are only accepted by the authoritative node".to_string()))?;
	require_permission(state, principal, uri.path(), &method.as_str().to_ascii_lowercase()).await?;
	Ok(service)
}

/// POST /v1/authz/policies
#[instrument(skip_all, fields(policy = %policy.name, principal_id = %principal.id))]
pub async fn create_policy(
	State(state): State<AppState>,
	method: Method,
	uri: Uri,
	AuthContext(principal): AuthContext,
	Json(policy): Json<Policy>,
) -> ServerResult<Json<PolicyChange>> {
	let service = authorize_admin(&state, &principal, &method, &uri).await?;
	let changed = service.create_policy(&policy).await?;
	info!(changed, "policy created");
	Ok(Json(PolicyChange { changed }))
}

/// PUT /v1/authz/policies
#[instrument(skip_all, fields(policy = %request.new.name, principal_id = %principal.id))]
pub async fn update_policy(
	State(state): State<AppState>,
	method: Method,
	uri: Uri,
	AuthContext(principal): AuthContext,
	Json(request): Json<UpdatePolicyRequest>,
) -> ServerResult<Json<PolicyChange>> {
	let service = authorize_admin(&state, &principal, &method, &uri).await?;
	let changed = service.update_policy(&request.old, &request.new).await?;
	info!(changed, "policy updated");
	Ok(Json(PolicyChange { changed }))
}

/// DELETE /v1/authz/policies
#[instrument(skip_all, fields(policy = %policy.name, principal_id = %principal.id))]
pub async fn delete_policy(
	State(state): State<AppState>,
	method: Method,
	uri: Uri,
	AuthContext(principal): AuthContext,
	Json(policy): Json<Policy>,
) -> ServerResult<Json<PolicyChange>> {
	let service = authorize_admin(&state, &principal, &method, &uri).await?;
	let changed = service.delete_policy(&policy).await?;
	info!(changed, "policy deleted");
	Ok(Json(PolicyChange { changed }))
}

/// POST /v1/authz/roles
#[instrument(skip_all, fields(member = %body.member, role = %body.role))]
pub async fn assign_role(
	State(state): State<AppState>,
	method: Method,
	uri: Uri,
	AuthContext(principal): AuthContext,
	Json(body): Json<RoleAssignment>,
) -> ServerResult<Json<PolicyChange>> {
	let service = authorize_admin(&state, &principal, &method, &uri).await?;
	let changed = service.assign_role(&body.member, &body.role).await?;
	Ok(Json(PolicyChange { changed }))
}

/// DELETE /v1/authz/roles
#[instrument(skip_all, fields(member = %body.member, role = %body.role))]
pub async fn revoke_role(
	State(state): State<AppState>,
	method: Method,
	uri: Uri,
	AuthContext(principal): AuthContext,
	Json(body): Json<RoleAssignment>,
) -> ServerResult<Json<PolicyChange>> {
	let service = authorize_admin(&state, &principal, &method, &uri).await?;
	let changed = service.revoke_role(&body.member, &body.role).await?;
	Ok(Json(PolicyChange { changed }))
}
