// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use async_trait::async_trait;
use http::HeaderMap;
use tracing::{debug, instrument};
use warden_server_token::{TokenIssuer, TokenType};

use super::AuthStrategy;
use crate::directory::UserDirectory;
use crate::error::{AuthError, Result};
use crate::extract::extract_bearer;
use crate::principal::{AuthMethod, Principal};

/// `Authorization: Bearer <jwt>`. Only access tokens are accepted; refresh,
/// id and other tokens are rejected even with a good signature.
pub struct BearerStrategy {
	issuer: Arc<TokenIssuer>,
	directory: Arc<dyn UserDirectory>,
}

impl BearerStrategy {
	pub fn new(issuer: Arc<TokenIssuer>, directory: Arc<dyn UserDirectory>) -> Self {
		Self { issuer, directory }
	}
}

#[async_trait]
impl AuthStrategy for BearerStrategy {
	#[instrument(skip_all)]
	async fn authenticate(&self, headers: &HeaderMap) -> Result<Principal> {
		let token = extract_bearer(headers)?;
		let claims = self.issuer.verify(token.expose()).map_err(|e| {
			debug!(error = %e, "bearer token rejected");
			AuthError::Token(e)
		})?;

		if claims.token_type != TokenType::Access {
			debug!(token_type = %claims.token_type, "non-access token presented as bearer");
			return Err(AuthError::WrongTokenType);
		}

		let record = self
			.directory
			.get_by_id(&claims.sub)
			.await?
			.ok_or(AuthError::PrincipalNotFound)?;
		Ok(record.into_principal(AuthMethod::Bearer))
	}
}
