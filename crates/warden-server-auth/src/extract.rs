// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Credential extraction from request headers.
//!
//! Extracted secrets are wrapped in [`SecretString`] straight away so they
//! cannot end up in logs by accident.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use http::header::AUTHORIZATION;
use http::HeaderMap;
use tracing::instrument;
use warden_common_secret::SecretString;

use crate::api_key::API_KEY_PREFIX;
use crate::error::{AuthError, Result};

pub const API_KEY_HEADER: &str = "x-api-key";
pub const API_SECRET_HEADER: &str = "x-api-secret";

/// The scheme token of an `Authorization` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
	Basic,
	Bearer,
}

/// Split `Authorization` into scheme and credentials. Scheme names are
/// case-insensitive.
pub fn parse_authorization(headers: &HeaderMap) -> Result<Option<(AuthScheme, &str)>> {
	let Some(value) = headers.get(AUTHORIZATION) else {
		return Ok(None);
	};
	let value = value.to_str().map_err(|_| AuthError::MalformedCredentials)?;
	let (scheme, rest) = value.trim().split_once(' ').ok_or(AuthError::MalformedCredentials)?;

	let scheme = if scheme.eq_ignore_ascii_case("basic") {
		AuthScheme::Basic
	} else if scheme.eq_ignore_ascii_case("bearer") {
		AuthScheme::Bearer
	} else {
		return Err(AuthError::UnsupportedScheme);
	};
	Ok(Some((scheme, rest.trim())))
}

pub struct BasicCredentials {
	pub username: String,
	pub password: SecretString,
}

#[instrument(level = "trace", skip_all)]
pub fn extract_basic(headers: &HeaderMap) -> Result<BasicCredentials> {
	match parse_authorization(headers)? {
		Some((AuthScheme::Basic, encoded)) => decode_basic(encoded),
		Some(_) => Err(AuthError::UnsupportedScheme),
		None => Err(AuthError::MissingCredentials),
	}
}

pub fn decode_basic(encoded: &str) -> Result<BasicCredentials> {
	let decoded = STANDARD
		.decode(encoded)
		.map_err(|_| AuthError::MalformedCredentials)?;
	let decoded = String::from_utf8(decoded).map_err(|_| AuthError::MalformedCredentials)?;
	let (username, password) = decoded.split_once(':').ok_or(AuthError::MalformedCredentials)?;
	if username.is_empty() {
		return Err(AuthError::MalformedCredentials);
	}
	Ok(BasicCredentials {
		username: username.to_string(),
		password: SecretString::new(password.to_string()),
	})
}

#[instrument(level = "trace", skip_all)]
pub fn extract_bearer(headers: &HeaderMap) -> Result<SecretString> {
	match parse_authorization(headers)? {
		Some((AuthScheme::Bearer, token)) if !token.is_empty() => Ok(SecretString::new(token.to_string())),
		Some((AuthScheme::Bearer, _)) => Err(AuthError::MalformedCredentials),
		Some(_) => Err(AuthError::UnsupportedScheme),
		None => Err(AuthError::MissingCredentials),
	}
}

pub struct ApiKeyCredentials {
	pub key: String,
	pub secret: SecretString,
}

/// `Authorization: Bearer wk_…:secret`, or the `X-Api-Key` and
/// `X-Api-Secret` pair.
#[instrument(level = "trace", skip_all)]
pub fn extract_api_key(headers: &HeaderMap) -> Result<ApiKeyCredentials> {
	if let Some((AuthScheme::Bearer, token)) = parse_authorization(headers)? {
		let (key, secret) = token.split_once(':').ok_or(AuthError::MalformedCredentials)?;
		return api_key_credentials(key, secret);
	}

	match (headers.get(API_KEY_HEADER), headers.get(API_SECRET_HEADER)) {
		(Some(key), Some(secret)) => {
			let key = key.to_str().map_err(|_| AuthError::MalformedCredentials)?;
			let secret = secret.to_str().map_err(|_| AuthError::MalformedCredentials)?;
			api_key_credentials(key.trim(), secret.trim())
		}
		(None, None) => Err(AuthError::MissingCredentials),
		_ => Err(AuthError::MalformedCredentials),
	}
}

fn api_key_credentials(key: &str, secret: &str) -> Result<ApiKeyCredentials> {
	if key.is_empty() || secret.is_empty() {
		return Err(AuthError::MalformedCredentials);
	}
	Ok(ApiKeyCredentials {
		key: key.to_string(),
		secret: SecretString::new(secret.to_string()),
	})
}

/// Whether the request carries API key material rather than a user
/// credential.
pub fn has_api_key(headers: &HeaderMap) -> bool {
	if headers.contains_key(API_KEY_HEADER) {
		return true;
	}
	matches!(
		parse_authorization(headers),
		Ok(Some((AuthScheme::Bearer, token))) if token.starts_with(API_KEY_PREFIX)
	)
}
