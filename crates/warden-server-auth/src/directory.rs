// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use warden_server_token::PrincipalType;

use crate::error::Result;
use crate::principal::PrincipalRecord;

/// Login name and password hash for password authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordCredentials {
	pub principal: PrincipalRecord,
	/// PHC string, see [`crate::password::hash_password`].
	pub password_hash: String,
}

/// Lookup of principals owned by the user management layer.
#[async_trait]
pub trait UserDirectory: Send + Sync {
	async fn get_by_id(&self, id: &str) -> Result<Option<PrincipalRecord>>;

	async fn find_credentials(&self, username: &str) -> Result<Option<PasswordCredentials>>;
}

#[derive(Debug, Default)]
pub struct MemoryUserDirectory {
	users: RwLock<HashMap<String, PasswordCredentials>>,
}

impl MemoryUserDirectory {
	pub fn new() -> Self {
		Self::default()
	}

	/// Add a user, keyed by both id and username.
	pub fn insert(&self, id: impl Into<String>, username: impl Into<String>, password_hash: impl Into<String>) {
		let credentials = PasswordCredentials {
			principal: PrincipalRecord {
				id: id.into(),
				identity: username.into(),
				principal_type: PrincipalType::User,
			},
			password_hash: password_hash.into(),
		};
		self.users
			.write()
			.insert(credentials.principal.id.clone(), credentials);
	}

	pub fn remove(&self, id: &str) {
		self.users.write().remove(id);
	}
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
	async fn get_by_id(&self, id: &str) -> Result<Option<PrincipalRecord>> {
		Ok(self.users.read().get(id).map(|c| c.principal.clone()))
	}

	async fn find_credentials(&self, username: &str) -> Result<Option<PasswordCredentials>> {
		Ok(self
			.users
			.read()
			.values()
			.find(|c| c.principal.identity == username)
			.cloned())
	}
}
