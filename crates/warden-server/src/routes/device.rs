// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Device authorization grant (RFC 8628) endpoints.

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use tracing::instrument;
use warden_server_auth_devicecode::{DeviceAuthorizationResponse, DeviceTokenResponse};

use crate::auth::AuthContext;
use crate::error::ServerResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceCodeRequest {
	#[serde(alias = "client_id")]
	pub client_id: String,
	#[serde(default)]
	pub scope: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceVerifyRequest {
	#[serde(alias = "user_code")]
	pub user_code: String,
	#[serde(default = "approve_by_default")]
	pub approved: bool,
}

fn approve_by_default() -> bool {
	true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceTokenRequest {
	#[serde(alias = "device_code")]
	pub device_code: String,
}

/// POST /v1/device/code - started by the device.
#[instrument(skip_all, fields(client_id = %request.client_id))]
pub async fn start(
	State(state): State<AppState>,
	Json(request): Json<DeviceCodeRequest>,
) -> ServerResult<Json<DeviceAuthorizationResponse>> {
	let response = state.device_flow.create(&request.client_id, &request.scope).await?;
	Ok(Json(response))
}

/// POST /v1/device/verify - the signed-in user approves or denies.
#[instrument(skip_all, fields(principal_id = %principal.id, approved = request.approved))]
pub async fn verify(
	State(state): State<AppState>,
	AuthContext(principal): AuthContext,
	Json(request): Json<DeviceVerifyRequest>,
) -> ServerResult<StatusCode> {
	state
		.device_flow
		.verify(&request.user_code, request.approved, &principal.id)
		.await?;
	Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/device/token - polled by the device.
pub async fn token(
	State(state): State<AppState>,
	Json(request): Json<DeviceTokenRequest>,
) -> ServerResult<Json<DeviceTokenResponse>> {
	let response = state.device_flow.token(&request.device_code).await?;
	Ok(Json(response))
}
