// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Warden authorization server.
//!
//! Serves policy decisions, policy administration and replication, token
//! issuance and the device authorization grant over HTTP.

pub mod api;
pub mod auth;
pub mod error;
pub mod jobs;
pub mod logging;
pub mod routes;
pub mod state;
pub mod version;

pub use api::create_router;
pub use auth::{require_permission, AuthContext};
pub use error::{ErrorResponse, ServerError, ServerResult};
pub use state::{build_state, AppState, Background};
pub use warden_server_config::ServerConfig;
