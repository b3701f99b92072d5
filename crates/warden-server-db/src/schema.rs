// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Table definitions. Every statement is idempotent so startup can run them
//! unconditionally.

use sqlx::sqlite::SqlitePool;

use crate::error::Result;

const STATEMENTS: &[&str] = &[
	r#"
	CREATE TABLE IF NOT EXISTS policy_rules (
		ptype TEXT NOT NULL,
		v0 TEXT NOT NULL DEFAULT '',
		v1 TEXT NOT NULL DEFAULT '',
		v2 TEXT NOT NULL DEFAULT '',
		v3 TEXT NOT NULL DEFAULT '',
		v4 TEXT NOT NULL DEFAULT '',
		v5 TEXT NOT NULL DEFAULT '',
		PRIMARY KEY (ptype, v0, v1, v2, v3, v4, v5)
	)
	"#,
	r#"
	CREATE TABLE IF NOT EXISTS device_codes (
		device_code TEXT PRIMARY KEY,
		user_code TEXT NOT NULL UNIQUE,
		client_id TEXT NOT NULL,
		scope TEXT NOT NULL DEFAULT '',
		status TEXT NOT NULL CHECK (status IN ('pending', 'approved', 'denied', 'expired')),
		created_at TEXT NOT NULL,
		expires_at TEXT NOT NULL,
		user_id TEXT,
		approved_at TEXT
	)
	"#,
	"CREATE INDEX IF NOT EXISTS idx_device_codes_expires_at ON device_codes(expires_at)",
	r#"
	CREATE TABLE IF NOT EXISTS device_clients (
		client_id TEXT PRIMARY KEY,
		name TEXT NOT NULL,
		created_at TEXT NOT NULL
	)
	"#,
	r#"
	CREATE TABLE IF NOT EXISTS principals (
		id TEXT PRIMARY KEY,
		identity TEXT NOT NULL UNIQUE,
		principal_type TEXT NOT NULL CHECK (principal_type IN ('user', 'service', 'device')),
		password_hash TEXT,
		created_at TEXT NOT NULL
	)
	"#,
	r#"
	CREATE TABLE IF NOT EXISTS api_keys (
		key TEXT PRIMARY KEY,
		secret_hash TEXT NOT NULL,
		owner_id TEXT NOT NULL,
		owner_identity TEXT NOT NULL,
		owner_type TEXT NOT NULL,
		status TEXT NOT NULL CHECK (status IN ('active', 'inactive', 'expired')),
		expires_at TEXT,
		created_at TEXT NOT NULL,
		last_used_at TEXT,
		usage_count INTEGER NOT NULL DEFAULT 0
	)
	"#,
	"CREATE INDEX IF NOT EXISTS idx_api_keys_owner_id ON api_keys(owner_id)",
];

#[tracing::instrument(skip(pool))]
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
	for statement in STATEMENTS {
		sqlx::query(statement).execute(pool).await?;
	}
	tracing::info!(statements = STATEMENTS.len(), "database schema up to date");
	Ok(())
}
