// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Registered device-flow clients.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{sqlite::SqlitePool, Row};
use warden_server_auth_devicecode::{Client, ClientRegistry, DeviceFlowError};

use crate::error::Result;
use crate::time;

#[derive(Clone)]
pub struct ClientRepository {
	pool: SqlitePool,
}

impl ClientRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Insert or rename a client.
	#[tracing::instrument(skip(self, client), fields(client_id = %client.client_id))]
	pub async fn upsert(&self, client: &Client) -> Result<()> {
		sqlx::query(
			r#"
			INSERT INTO device_clients (client_id, name, created_at)
			VALUES (?, ?, ?)
			ON CONFLICT(client_id) DO UPDATE SET name = excluded.name
			"#,
		)
		.bind(&client.client_id)
		.bind(&client.name)
		.bind(time::encode(Utc::now()))
		.execute(&self.pool)
		.await?;
		Ok(())
	}

	#[tracing::instrument(skip(self))]
	pub async fn get(&self, client_id: &str) -> Result<Option<Client>> {
		let row = sqlx::query("SELECT client_id, name FROM device_clients WHERE client_id = ?")
			.bind(client_id)
			.fetch_optional(&self.pool)
			.await?;
		Ok(row.map(|row| Client {
			client_id: row.get("client_id"),
			name: row.get("name"),
		}))
	}
}

#[async_trait]
impl ClientRegistry for ClientRepository {
	async fn lookup(&self, client_id: &str) -> std::result::Result<Option<Client>, DeviceFlowError> {
		Ok(self.get(client_id).await?)
	}
}
