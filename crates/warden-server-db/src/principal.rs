// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Principals and their password hashes.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{sqlite::SqlitePool, Row};
use warden_server_auth::{AuthError, PasswordCredentials, PrincipalRecord, UserDirectory};
use warden_server_token::PrincipalType;

use crate::error::{DbError, Result};
use crate::time;

#[derive(Clone)]
pub struct PrincipalRepository {
	pool: SqlitePool,
}

impl PrincipalRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// `password_hash` is `None` for principals that never log in with a
	/// password, such as services.
	#[tracing::instrument(skip(self, record, password_hash), fields(principal_id = %record.id))]
	pub async fn create(&self, record: &PrincipalRecord, password_hash: Option<&str>) -> Result<()> {
		sqlx::query(
			r#"
			INSERT INTO principals (id, identity, principal_type, password_hash, created_at)
			VALUES (?, ?, ?, ?, ?)
			"#,
		)
		.bind(&record.id)
		.bind(&record.identity)
		.bind(record.principal_type.as_str())
		.bind(password_hash)
		.bind(time::encode(Utc::now()))
		.execute(&self.pool)
		.await
		.map_err(|e| DbError::from_insert(e, "principal"))?;
		Ok(())
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_by_id(&self, id: &str) -> Result<Option<PrincipalRecord>> {
		let row = sqlx::query("SELECT id, identity, principal_type FROM principals WHERE id = ?")
			.bind(id)
			.fetch_optional(&self.pool)
			.await?;
		row.as_ref().map(parse_principal_row).transpose()
	}

	#[tracing::instrument(skip(self))]
	pub async fn find_credentials(&self, identity: &str) -> Result<Option<PasswordCredentials>> {
		let row = sqlx::query(
			r#"
			SELECT id, identity, principal_type, password_hash
			FROM principals
			WHERE identity = ? AND password_hash IS NOT NULL
			"#,
		)
		.bind(identity)
		.fetch_optional(&self.pool)
		.await?;

		match row {
			Some(row) => Ok(Some(PasswordCredentials {
				principal: parse_principal_row(&row)?,
				password_hash: row.get("password_hash"),
			})),
			None => Ok(None),
		}
	}
}

fn parse_principal_row(row: &sqlx::sqlite::SqliteRow) -> Result<PrincipalRecord> {
	let principal_type: String = row.get("principal_type");
	Ok(PrincipalRecord {
		id: row.get("id"),
		identity: row.get("identity"),
		principal_type: principal_type
			.parse::<PrincipalType>()
			.map_err(|e| DbError::Internal(e.to_string()))?,
	})
}

#[async_trait]
impl UserDirectory for PrincipalRepository {
	async fn get_by_id(&self, id: &str) -> std::result::Result<Option<PrincipalRecord>, AuthError> {
		Ok(PrincipalRepository::get_by_id(self, id).await?)
	}

	async fn find_credentials(&self, username: &str) -> std::result::Result<Option<PasswordCredentials>, AuthError> {
		Ok(PrincipalRepository::find_credentials(self, username).await?)
	}
}
