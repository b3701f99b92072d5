// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use async_trait::async_trait;
use http::HeaderMap;
use tracing::{debug, instrument};

use super::AuthStrategy;
use crate::directory::UserDirectory;
use crate::error::{AuthError, Result};
use crate::extract::extract_basic;
use crate::password::{dummy_verify, verify_password};
use crate::principal::{AuthMethod, Principal};

/// `Authorization: Basic` against argon2 password hashes.
///
/// Unknown users and wrong passwords both yield
/// [`AuthError::PasswordIncorrect`] after the same amount of hashing work.
pub struct PasswordStrategy {
	directory: Arc<dyn UserDirectory>,
}

impl PasswordStrategy {
	pub fn new(directory: Arc<dyn UserDirectory>) -> Self {
		Self { directory }
	}
}

#[async_trait]
impl AuthStrategy for PasswordStrategy {
	#[instrument(skip_all, fields(username))]
	async fn authenticate(&self, headers: &HeaderMap) -> Result<Principal> {
		let creds = extract_basic(headers)?;
		tracing::Span::current().record("username", creds.username.as_str());

		let found = self.directory.find_credentials(&creds.username).await?;
		let password = creds.password;

		// argon2 is CPU bound; keep it off the async workers.
		let (record, matched) = tokio::task::spawn_blocking(move || match found {
			Some(found) => verify_password(password.expose(), &found.password_hash).map(|ok| (Some(found.principal), ok)),
			None => {
				dummy_verify(password.expose());
				Ok((None, false))
			}
		})
		.await
		.map_err(|e| AuthError::Internal(format!("password verification task failed: {e}")))??;

		match record {
			Some(record) if matched => Ok(record.into_principal(AuthMethod::Password)),
			_ => {
				debug!("password authentication failed");
				Err(AuthError::PasswordIncorrect)
			}
		}
	}
}
