// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Router construction.

use axum::{
	routing::{get, post},
	Router,
};
use warden_server_authz::remote::{AUTHORIZE_PATH, RULES_PATH, STREAM_PATH};

use crate::routes::{authz, device, health, policies, tokens, whoami};
use crate::state::AppState;

/// Build the application router.
///
/// Policy administration and the replication feed (`rules`, `stream`) are
/// only mounted on the authoritative node. Replicas answer decisions from
/// their synced copy and delegated nodes forward them upstream.
pub fn create_router(state: AppState) -> Router {
	let mut router = Router::new()
		.route("/health", get(health::health_check))
		.route(AUTHORIZE_PATH, post(authz::authorize))
		.route(tokens::TOKENS_PATH, post(tokens::create_token))
		.route("/v1/tokens/verify", post(tokens::verify_token))
		.route("/.well-known/jwks.json", get(tokens::jwks))
		.route("/v1/device/code", post(device::start))
		.route("/v1/device/verify", post(device::verify))
		.route("/v1/device/token", post(device::token))
		.route("/v1/whoami", get(whoami::whoami));

	if state.is_authoritative() {
		router = router
			.route(RULES_PATH, get(authz::rules))
			.route(STREAM_PATH, get(authz::stream))
			.route(
				"/v1/authz/policies",
				post(policies::create_policy)
					.put(policies::update_policy)
					.delete(policies::delete_policy),
			)
			.route(
				"/v1/authz/roles",
				post(policies::assign_role).delete(policies::revoke_role),
			);
	}

	router.with_state(state)
}
