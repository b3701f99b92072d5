// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use warden_server_auth::AuthError;
use warden_server_auth_devicecode::DeviceFlowError;
use warden_server_authz::AuthzError;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
	#[error("Database error: {0}")]
	Sqlx(#[from] sqlx::Error),

	#[error("Conflict: {0}")]
	Conflict(String),

	#[error("Internal: {0}")]
	Internal(String),
}

pub type Result<T> = std::result::Result<T, DbError>;

impl DbError {
	/// Maps unique-constraint violations to [`DbError::Conflict`].
	pub(crate) fn from_insert(e: sqlx::Error, what: &str) -> Self {
		match &e {
			sqlx::Error::Database(db) if db.is_unique_violation() => DbError::Conflict(format!("{what} already exists")),
			_ => DbError::Sqlx(e),
		}
	}
}

impl From<DbError> for AuthzError {
	fn from(e: DbError) -> Self {
		AuthzError::Store(e.to_string())
	}
}

impl From<DbError> for DeviceFlowError {
	fn from(e: DbError) -> Self {
		match e {
			DbError::Conflict(_) => DeviceFlowError::DuplicateCode,
			other => DeviceFlowError::Store(other.to_string()),
		}
	}
}

impl From<DbError> for AuthError {
	fn from(e: DbError) -> Self {
		AuthError::Store(e.to_string())
	}
}
