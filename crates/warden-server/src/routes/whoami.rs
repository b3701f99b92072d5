// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use axum::Json;
use warden_server_auth::Principal;

use crate::auth::AuthContext;

/// GET /v1/whoami
pub async fn whoami(AuthContext(principal): AuthContext) -> Json<Principal> {
	Json(principal)
}
