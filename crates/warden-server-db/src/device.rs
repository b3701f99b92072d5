// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Device authorization repository.
//!
//! State changes are single conditional statements, so concurrent approvals
//! or redemptions of one code resolve inside SQLite with exactly one winner.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePool, Row};
use warden_server_auth_devicecode::{DeviceAuthorization, DeviceCodeStore, DeviceFlowError, DeviceStatus};

use crate::error::{DbError, Result};
use crate::time;

const COLUMNS: &str =
	"device_code, user_code, client_id, scope, status, created_at, expires_at, user_id, approved_at";

#[derive(Clone)]
pub struct DeviceCodeRepository {
	pool: SqlitePool,
}

impl DeviceCodeRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	#[tracing::instrument(skip(self, record), fields(client_id = %record.client_id))]
	pub async fn insert(&self, record: &DeviceAuthorization) -> Result<()> {
		sqlx::query(
			r#"
			INSERT INTO device_codes (
				device_code, user_code, client_id, scope, status, created_at, expires_at, user_id, approved_at
			) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(&record.device_code)
		.bind(&record.user_code)
		.bind(&record.client_id)
		.bind(&record.scope)
		.bind(record.status.as_str())
		.bind(time::encode(record.created_at))
		.bind(time::encode(record.expires_at))
		.bind(&record.user_id)
		.bind(record.approved_at.map(time::encode))
		.execute(&self.pool)
		.await
		.map_err(|e| DbError::from_insert(e, "device code"))?;
		Ok(())
	}

	#[tracing::instrument(skip(self, device_code))]
	pub async fn find_by_device_code(&self, device_code: &str) -> Result<Option<DeviceAuthorization>> {
		let row = sqlx::query(&format!("SELECT {COLUMNS} FROM device_codes WHERE device_code = ?"))
			.bind(device_code)
			.fetch_optional(&self.pool)
			.await?;
		row.as_ref().map(parse_row).transpose()
	}

	#[tracing::instrument(skip(self))]
	pub async fn find_by_user_code(&self, user_code: &str) -> Result<Option<DeviceAuthorization>> {
		let row = sqlx::query(&format!("SELECT {COLUMNS} FROM device_codes WHERE user_code = ?"))
			.bind(user_code)
			.fetch_optional(&self.pool)
			.await?;
		row.as_ref().map(parse_row).transpose()
	}

	#[tracing::instrument(skip(self))]
	pub async fn approve(&self, user_code: &str, user_id: &str, now: DateTime<Utc>) -> Result<bool> {
		let result = sqlx::query(
			r#"
			UPDATE device_codes
			SET status = 'approved', user_id = ?, approved_at = ?
			WHERE user_code = ? AND status = 'pending' AND expires_at > ?
			"#,
		)
		.bind(user_id)
		.bind(time::encode(now))
		.bind(user_code)
		.bind(time::encode(now))
		.execute(&self.pool)
		.await?;
		Ok(result.rows_affected() == 1)
	}

	#[tracing::instrument(skip(self))]
	pub async fn deny(&self, user_code: &str, now: DateTime<Utc>) -> Result<bool> {
		let result = sqlx::query(
			r#"
			UPDATE device_codes
			SET status = 'denied'
			WHERE user_code = ? AND status = 'pending' AND expires_at > ?
			"#,
		)
		.bind(user_code)
		.bind(time::encode(now))
		.execute(&self.pool)
		.await?;
		Ok(result.rows_affected() == 1)
	}

	/// Delete-and-return in one statement; a second caller finds no row.
	#[tracing::instrument(skip(self, device_code))]
	pub async fn consume(&self, device_code: &str, now: DateTime<Utc>) -> Result<Option<DeviceAuthorization>> {
		let row = sqlx::query(&format!(
			"DELETE FROM device_codes WHERE device_code = ? AND status = 'approved' AND expires_at > ? RETURNING {COLUMNS}"
		))
		.bind(device_code)
		.bind(time::encode(now))
		.fetch_optional(&self.pool)
		.await?;
		row.as_ref().map(parse_row).transpose()
	}

	#[tracing::instrument(skip(self))]
	pub async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
		let result = sqlx::query("DELETE FROM device_codes WHERE expires_at <= ?")
			.bind(time::encode(now))
			.execute(&self.pool)
			.await?;
		if result.rows_affected() > 0 {
			tracing::debug!(deleted = result.rows_affected(), "expired device codes removed");
		}
		Ok(result.rows_affected())
	}
}

fn parse_row(row: &sqlx::sqlite::SqliteRow) -> Result<DeviceAuthorization> {
	let status: String = row.get("status");
	let created_at: String = row.get("created_at");
	let expires_at: String = row.get("expires_at");

	Ok(DeviceAuthorization {
		device_code: row.get("device_code"),
		user_code: row.get("user_code"),
		client_id: row.get("client_id"),
		scope: row.get("scope"),
		status: status
			.parse::<DeviceStatus>()
			.map_err(|e| DbError::Internal(e.to_string()))?,
		created_at: time::decode(&created_at, "created_at")?,
		expires_at: time::decode(&expires_at, "expires_at")?,
		user_id: row.get("user_id"),
		approved_at: time::decode_opt(row.get("approved_at"), "approved_at")?,
	})
}

#[async_trait]
impl DeviceCodeStore for DeviceCodeRepository {
	async fn insert(&self, record: &DeviceAuthorization) -> std::result::Result<(), DeviceFlowError> {
		Ok(DeviceCodeRepository::insert(self, record).await?)
	}

	async fn find_by_device_code(
		&self,
		device_code: &str,
	) -> std::result::Result<Option<DeviceAuthorization>, DeviceFlowError> {
		Ok(DeviceCodeRepository::find_by_device_code(self, device_code).await?)
	}

	async fn find_by_user_code(
		&self,
		user_code: &str,
	) -> std::result::Result<Option<DeviceAuthorization>, DeviceFlowError> {
		Ok(DeviceCodeRepository::find_by_user_code(self, user_code).await?)
	}

	async fn approve(
		&self,
		user_code: &str,
		user_id: &str,
		now: DateTime<Utc>,
	) -> std::result::Result<bool, DeviceFlowError> {
		Ok(DeviceCodeRepository::approve(self, user_code, user_id, now).await?)
	}

	async fn deny(&self, user_code: &str, now: DateTime<Utc>) -> std::result::Result<bool, DeviceFlowError> {
		Ok(DeviceCodeRepository::deny(self, user_code, now).await?)
	}

	async fn consume(
		&self,
		device_code: &str,
		now: DateTime<Utc>,
	) -> std::result::Result<Option<DeviceAuthorization>, DeviceFlowError> {
		Ok(DeviceCodeRepository::consume(self, device_code, now).await?)
	}

	async fn delete_expired(&self, now: DateTime<Utc>) -> std::result::Result<u64, DeviceFlowError> {
		Ok(DeviceCodeRepository::delete_expired(self, now).await?)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::create_test_pool;
	use chrono::Duration;

	async fn repo() -> DeviceCodeRepository {
		DeviceCodeRepository::new(create_test_pool().await)
	}

	fn record(now: DateTime<Utc>) -> DeviceAuthorization {
		DeviceAuthorization::new("warden-cli", "openid profile", Duration::minutes(10), now)
	}

	#[tokio::test]
	async fn insert_and_find_by_either_code() {
		let repo = repo().await;
		let now = Utc::now();
		let r = record(now);
		repo.insert(&r).await.unwrap();

		let by_device = repo.find_by_device_code(&r.device_code).await.unwrap().unwrap();
		let by_user = repo.find_by_user_code(&r.user_code).await.unwrap().unwrap();
		assert_eq!(by_device, by_user);
		assert_eq!(by_device.status, DeviceStatus::Pending);
		assert_eq!(by_device.scope, "openid profile");
		assert!(repo.find_by_device_code("nope").await.unwrap().is_none());
	}

	#[tokio::test]
	async fn duplicate_user_code_is_reported() {
		let repo = repo().await;
		let now = Utc::now();
		let first = record(now);
		let mut second = record(now);
		second.user_code = first.user_code.clone();

		repo.insert(&first).await.unwrap();
		let err = DeviceCodeStore::insert(&repo, &second).await.unwrap_err();
		assert!(matches!(err, DeviceFlowError::DuplicateCode));
	}

	#[tokio::test]
	async fn approval_is_conditional() {
		let repo = repo().await;
		let now = Utc::now();
		let r = record(now);
		repo.insert(&r).await.unwrap();

		assert!(repo.approve(&r.user_code, "usr_1", now).await.unwrap());
		assert!(!repo.approve(&r.user_code, "usr_2", now).await.unwrap());
		assert!(!repo.deny(&r.user_code, now).await.unwrap());

		let stored = repo.find_by_user_code(&r.user_code).await.unwrap().unwrap();
		assert_eq!(stored.status, DeviceStatus::Approved);
		assert_eq!(stored.user_id.as_deref(), Some("usr_1"));
		assert!(stored.approved_at.is_some());
	}

	#[tokio::test]
	async fn expired_codes_cannot_be_approved() {
		let repo = repo().await;
		let now = Utc::now();
		let r = record(now);
		repo.insert(&r).await.unwrap();

		let later = now + Duration::minutes(11);
		assert!(!repo.approve(&r.user_code, "usr_1", later).await.unwrap());
	}

	#[tokio::test]
	async fn consume_requires_approval_and_happens_once() {
		let repo = repo().await;
		let now = Utc::now();
		let r = record(now);
		repo.insert(&r).await.unwrap();

		assert!(repo.consume(&r.device_code, now).await.unwrap().is_none());

		repo.approve(&r.user_code, "usr_1", now).await.unwrap();
		let consumed = repo.consume(&r.device_code, now).await.unwrap().unwrap();
		assert_eq!(consumed.user_id.as_deref(), Some("usr_1"));
		assert!(repo.consume(&r.device_code, now).await.unwrap().is_none());
		assert!(repo.find_by_device_code(&r.device_code).await.unwrap().is_none());
	}

	#[tokio::test]
	async fn concurrent_consumers_have_one_winner() {
		let repo = repo().await;
		let now = Utc::now();
		let r = record(now);
		repo.insert(&r).await.unwrap();
		repo.approve(&r.user_code, "usr_1", now).await.unwrap();

		let mut handles = Vec::new();
		for _ in 0..8 {
			let repo = repo.clone();
			let device_code = r.device_code.clone();
			handles.push(tokio::spawn(async move { repo.consume(&device_code, now).await.unwrap() }));
		}
		let mut winners = 0;
		for handle in handles {
			if handle.await.unwrap().is_some() {
				winners += 1;
			}
		}
		assert_eq!(winners, 1);
	}

	#[tokio::test]
	async fn sweep_deletes_only_expired() {
		let repo = repo().await;
		let now = Utc::now();
		let old = DeviceAuthorization::new("warden-cli", "", Duration::minutes(10), now - Duration::minutes(20));
		let fresh = record(now);
		repo.insert(&old).await.unwrap();
		repo.insert(&fresh).await.unwrap();

		assert_eq!(repo.delete_expired(now).await.unwrap(), 1);
		assert!(repo.find_by_device_code(&old.device_code).await.unwrap().is_none());
		assert!(repo.find_by_device_code(&fresh.device_code).await.unwrap().is_some());
	}
}
