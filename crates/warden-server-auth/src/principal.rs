// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::fmt;

use serde::{Deserialize, Serialize};
use warden_server_token::PrincipalType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
	Password,
	Bearer,
	ApiKey,
}

impl AuthMethod {
	pub fn as_str(&self) -> &'static str {
		match self {
			AuthMethod::Password => "password",
			AuthMethod::Bearer => "bearer",
			AuthMethod::ApiKey => "api_key",
		}
	}
}

impl fmt::Display for AuthMethod {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// The authenticated caller of one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
	/// Durable instance identifier; the `sub` of tokens issued to it.
	pub id: String,
	/// Name policies refer to, e.g. a username.
	pub identity: String,
	pub principal_type: PrincipalType,
	pub auth_method: AuthMethod,
}

impl Principal {
	/// Subject to pass to the policy engine.
	pub fn subject(&self) -> &str {
		&self.identity
	}
}

/// A principal as held by the user directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipalRecord {
	pub id: String,
	pub identity: String,
	pub principal_type: PrincipalType,
}

impl PrincipalRecord {
	pub fn into_principal(self, auth_method: AuthMethod) -> Principal {
		Principal {
			id: self.id,
			identity: self.identity,
			principal_type: self.principal_type,
			auth_method,
		}
	}
}
