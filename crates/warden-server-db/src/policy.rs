// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Policy rule repository.
//!
//! Rules are stored as `(ptype, v0..v5)` rows; unused slots hold `''`.

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnection, SqlitePool};
use sqlx::Row;
use warden_server_authz::rule::MAX_RULE_VALUES;
use warden_server_authz::{AuthzError, PolicyRule, PolicyStore, RuleType};

use crate::error::{DbError, Result};

/// Persisted rule set for the authoritative process.
#[derive(Clone)]
pub struct PolicyRepository {
	pool: SqlitePool,
}

impl PolicyRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	#[tracing::instrument(skip(self))]
	pub async fn load_rules(&self) -> Result<Vec<PolicyRule>> {
		let rows = sqlx::query(
			r#"
			SELECT ptype, v0, v1, v2, v3, v4, v5
			FROM policy_rules
			ORDER BY rowid
			"#,
		)
		.fetch_all(&self.pool)
		.await?;

		let mut rules = Vec::with_capacity(rows.len());
		for row in rows {
			let ptype: String = row.get("ptype");
			let values: Vec<String> = (0..MAX_RULE_VALUES).map(|i| row.get::<String, _>(i + 1)).collect();
			let rule_type = RuleType::parse(&ptype).map_err(|e| DbError::Internal(e.to_string()))?;
			rules.push(PolicyRule::new(rule_type, values).map_err(|e| DbError::Internal(e.to_string()))?);
		}

		tracing::debug!(count = rules.len(), "policy rules loaded");
		Ok(rules)
	}

	/// Insert in one transaction; rules already present are skipped.
	#[tracing::instrument(skip(self, rules), fields(count = rules.len()))]
	pub async fn insert_rules(&self, rules: &[PolicyRule]) -> Result<()> {
		self.replace_rules(&[], rules).await
	}

	#[tracing::instrument(skip(self, rules), fields(count = rules.len()))]
	pub async fn delete_rules(&self, rules: &[PolicyRule]) -> Result<()> {
		self.replace_rules(rules, &[]).await
	}

	/// Delete `remove` then insert `add` in a single transaction. Nothing is
	/// committed unless every statement succeeds.
	#[tracing::instrument(skip(self, remove, add), fields(remove = remove.len(), add = add.len()))]
	pub async fn replace_rules(&self, remove: &[PolicyRule], add: &[PolicyRule]) -> Result<()> {
		let mut tx = self.pool.begin().await?;
		for rule in remove {
			delete_rule(&mut tx, rule).await?;
		}
		for rule in add {
			insert_rule(&mut tx, rule).await?;
		}
		tx.commit().await?;
		Ok(())
	}
}

async fn insert_rule(conn: &mut SqliteConnection, rule: &PolicyRule) -> Result<()> {
	let [ptype, v0, v1, v2, v3, v4, v5] = columns(rule);
	sqlx::query(
		r#"
		INSERT OR IGNORE INTO policy_rules (ptype, v0, v1, v2, v3, v4, v5)
		VALUES (?, ?, ?, ?, ?, ?, ?)
		"#,
	)
	.bind(ptype)
	.bind(v0)
	.bind(v1)
	.bind(v2)
	.bind(v3)
	.bind(v4)
	.bind(v5)
	.execute(conn)
	.await?;
	Ok(())
}

async fn delete_rule(conn: &mut SqliteConnection, rule: &PolicyRule) -> Result<()> {
	let [ptype, v0, v1, v2, v3, v4, v5] = columns(rule);
	sqlx::query(
		r#"
		DELETE FROM policy_rules
		WHERE ptype = ? AND v0 = ? AND v1 = ? AND v2 = ? AND v3 = ? AND v4 = ? AND v5 = ?
		"#,
	)
	.bind(ptype)
	.bind(v0)
	.bind(v1)
	.bind(v2)
	.bind(v3)
	.bind(v4)
	.bind(v5)
	.execute(conn)
	.await?;
	Ok(())
}

fn columns(rule: &PolicyRule) -> [String; MAX_RULE_VALUES + 1] {
	let mut out: [String; MAX_RULE_VALUES + 1] = Default::default();
	out[0] = rule.rule_type().as_str().to_string();
	for (i, slot) in out.iter_mut().skip(1).enumerate() {
		*slot = rule.v(i).to_string();
	}
	out
}

#[async_trait]
impl PolicyStore for PolicyRepository {
	async fn load_rules(&self) -> std::result::Result<Vec<PolicyRule>, AuthzError> {
		Ok(PolicyRepository::load_rules(self).await?)
	}

	async fn insert_rules(&self, rules: &[PolicyRule]) -> std::result::Result<(), AuthzError> {
		Ok(PolicyRepository::insert_rules(self, rules).await?)
	}

	async fn delete_rules(&self, rules: &[PolicyRule]) -> std::result::Result<(), AuthzError> {
		Ok(PolicyRepository::delete_rules(self, rules).await?)
	}

	async fn replace_rules(
		&self,
		remove: &[PolicyRule],
		add: &[PolicyRule],
	) -> std::result::Result<(), AuthzError> {
		Ok(PolicyRepository::replace_rules(self, remove, add).await?)
	}
}
