// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Liveness and readiness report.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use tracing::warn;
use warden_server_authz::{EngineStats, ReplicatorStatus};
use warden_server_config::AuthzRole;

use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
	Healthy,
	Degraded,
	Unhealthy,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
	pub status: HealthStatus,
	pub role: &'static str,
	pub database: bool,
	pub policy: EngineStats,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub replication: Option<ReplicatorStatus>,
}

/// GET /health
///
/// Unhealthy (503) when the database is unreachable. A replica whose
/// invalidation stream is down is degraded: it still answers from the last
/// synced rule set.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
	let database = match sqlx::query("SELECT 1").execute(&state.pool).await {
		Ok(_) => true,
		Err(e) => {
			warn!(error = %e, "database health check failed");
			false
		}
	};
	let replication = state.replicator.as_ref().map(|r| r.status());

	let status = if !database {
		HealthStatus::Unhealthy
	} else if replication.as_ref().is_some_and(|r| !r.connected) {
		HealthStatus::Degraded
	} else {
		HealthStatus::Healthy
	};
	let code = match status {
		HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
		_ => StatusCode::OK,
	};

	let body = HealthResponse {
		status,
		role: match state.role {
			AuthzRole::Authoritative => "authoritative",
			AuthzRole::Replica => "replica",
			AuthzRole::Delegated => "delegated",
		},
		database,
		policy: state.engine.stats(),
		replication,
	};
	(code, Json(body))
}
