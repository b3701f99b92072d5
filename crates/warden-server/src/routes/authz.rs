// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Decision endpoint and the replication feed consumed by replicas.
//!
//! Every route here needs an authenticated caller. Asking about any subject
//! other than yourself needs `post` on the decision path, and reading the
//! feed needs `get` on the feed path, so a replica's credential must belong
//! to a principal granted those.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
	extract::State,
	response::sse::{Event, KeepAlive, Sse},
	Json,
};
use futures::{Stream, StreamExt};
use tracing::{debug, instrument, warn};
use warden_server_authz::remote::{AUTHORIZE_PATH, RULES_PATH, STREAM_PATH};
use warden_server_authz::{AccessDecision, AuthorizeRequest, RulesResponse, POLICY_INVALIDATION_CHANNEL};

use crate::auth::{require_permission, AuthContext};
use crate::error::{ServerError, ServerResult};
use crate::state::AppState;

pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// POST /v1/authz/authorize
///
/// Internal RPC for services that hold no rules of their own.
#[instrument(skip_all, fields(caller = %principal.subject(), subject = %request.subject, resource = %request.resource, action = %request.action))]
pub async fn authorize(
	State(state): State<AppState>,
	AuthContext(principal): AuthContext,
	Json(request): Json<AuthorizeRequest>,
) -> ServerResult<Json<AccessDecision>> {
	if request.subject != principal.subject() {
		require_permission(&state, &principal, AUTHORIZE_PATH, "post").await?;
	}
	let decision = state
		.authorizer
		.authorize(&request.subject, &request.resource, &request.action)
		.await?;
	Ok(Json(decision))
}

/// GET /v1/authz/rules - full rule set for replica bootstrap and refresh,
/// read from the store.
#[instrument(skip_all, fields(caller = %principal.subject()))]
pub async fn rules(
	State(state): State<AppState>,
	AuthContext(principal): AuthContext,
) -> ServerResult<Json<RulesResponse>> {
	let (Some(service), Some(bus)) = (state.policies.as_ref(), state.bus.as_ref()) else {
		return Err(ServerError::Internal("rules requested from a non-authoritative node".to_string()));
	};
	require_permission(&state, &principal, RULES_PATH, "get").await?;
	let rules = service.snapshot().await?;
	debug!(revision = bus.revision(), rules = rules.len(), "serving rule set");
	Ok(Json(RulesResponse {
		revision: bus.revision(),
		rules,
	}))
}

/// GET /v1/authz/stream - server-sent invalidation events.
#[instrument(skip_all, fields(caller = %principal.subject()))]
pub async fn stream(
	State(state): State<AppState>,
	AuthContext(principal): AuthContext,
) -> ServerResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
	let bus = state
		.bus
		.clone()
		.ok_or_else(|| ServerError::Internal("stream requested from a non-authoritative node".to_string()))?;
	require_permission(&state, &principal, STREAM_PATH, "get").await?;
	debug!(subscribers = bus.subscriber_count() + 1, "replica subscribed to invalidations");

	let events = bus.stream().filter_map(|item| async move {
		let invalidation = item.ok()?;
		match serde_json::to_string(&invalidation) {
			Ok(data) => Some(Ok(Event::default().event(POLICY_INVALIDATION_CHANNEL).data(data))),
			Err(e) => {
				warn!(error = %e, "failed to encode invalidation");
				None
			}
		}
	});

	Ok(Sse::new(events).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL).text("keep-alive")))
}
