// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! API key repository. Only the SHA-256 digest of each secret is stored.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePool, Row};
use warden_server_auth::{ApiKey, ApiKeyStatus, ApiKeyStore, AuthError};
use warden_server_token::PrincipalType;

use crate::error::{DbError, Result};
use crate::time;

#[derive(Clone)]
pub struct ApiKeyRepository {
	pool: SqlitePool,
}

impl ApiKeyRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	#[tracing::instrument(skip(self, key), fields(api_key = %key.key, owner_id = %key.owner_id))]
	pub async fn insert(&self, key: &ApiKey) -> Result<()> {
		sqlx::query(
			r#"
			INSERT INTO api_keys (
				key, secret_hash, owner_id, owner_identity, owner_type, status,
				expires_at, created_at, last_used_at, usage_count
			) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(&key.key)
		.bind(&key.secret_hash)
		.bind(&key.owner_id)
		.bind(&key.owner_identity)
		.bind(key.owner_type.as_str())
		.bind(key.status.as_str())
		.bind(key.expires_at.map(time::encode))
		.bind(time::encode(key.created_at))
		.bind(key.last_used_at.map(time::encode))
		.bind(key.usage_count as i64)
		.execute(&self.pool)
		.await
		.map_err(|e| DbError::from_insert(e, "API key"))?;

		tracing::debug!("API key created");
		Ok(())
	}

	#[tracing::instrument(skip(self))]
	pub async fn find_by_key(&self, key: &str) -> Result<Option<ApiKey>> {
		let row = sqlx::query(
			r#"
			SELECT key, secret_hash, owner_id, owner_identity, owner_type, status,
			       expires_at, created_at, last_used_at, usage_count
			FROM api_keys
			WHERE key = ?
			"#,
		)
		.bind(key)
		.fetch_optional(&self.pool)
		.await?;
		row.as_ref().map(parse_api_key_row).transpose()
	}

	#[tracing::instrument(skip(self))]
	pub async fn set_status(&self, key: &str, status: ApiKeyStatus) -> Result<bool> {
		let result = sqlx::query("UPDATE api_keys SET status = ? WHERE key = ?")
			.bind(status.as_str())
			.bind(key)
			.execute(&self.pool)
			.await?;
		Ok(result.rows_affected() > 0)
	}

	#[tracing::instrument(skip(self))]
	pub async fn record_usage(&self, key: &str, at: DateTime<Utc>) -> Result<()> {
		sqlx::query(
			r#"
			UPDATE api_keys
			SET usage_count = usage_count + 1, last_used_at = ?
			WHERE key = ?
			"#,
		)
		.bind(time::encode(at))
		.bind(key)
		.execute(&self.pool)
		.await?;
		Ok(())
	}
}

fn parse_api_key_row(row: &sqlx::sqlite::SqliteRow) -> Result<ApiKey> {
	let owner_type: String = row.get("owner_type");
	let status: String = row.get("status");
	let created_at: String = row.get("created_at");
	let usage_count: i64 = row.get("usage_count");

	Ok(ApiKey {
		key: row.get("key"),
		secret_hash: row.get("secret_hash"),
		owner_id: row.get("owner_id"),
		owner_identity: row.get("owner_identity"),
		owner_type: owner_type
			.parse::<PrincipalType>()
			.map_err(|e| DbError::Internal(e.to_string()))?,
		status: status
			.parse::<ApiKeyStatus>()
			.map_err(|e| DbError::Internal(e.to_string()))?,
		expires_at: time::decode_opt(row.get("expires_at"), "expires_at")?,
		created_at: time::decode(&created_at, "created_at")?,
		last_used_at: time::decode_opt(row.get("last_used_at"), "last_used_at")?,
		usage_count: usage_count.max(0) as u64,
	})
}

#[async_trait]
impl ApiKeyStore for ApiKeyRepository {
	async fn find_by_key(&self, key: &str) -> std::result::Result<Option<ApiKey>, AuthError> {
		Ok(ApiKeyRepository::find_by_key(self, key).await?)
	}

	async fn insert(&self, key: &ApiKey) -> std::result::Result<(), AuthError> {
		Ok(ApiKeyRepository::insert(self, key).await?)
	}

	async fn set_status(&self, key: &str, status: ApiKeyStatus) -> std::result::Result<bool, AuthError> {
		Ok(ApiKeyRepository::set_status(self, key, status).await?)
	}

	async fn record_usage(&self, key: &str, at: DateTime<Utc>) -> std::result::Result<(), AuthError> {
		Ok(ApiKeyRepository::record_usage(self, key, at).await?)
	}
}
