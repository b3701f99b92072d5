// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The Policy aggregate and its expansion into flat rules.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::rule::{Effect, PolicyRule};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
	#[serde(default)]
	pub effect: Effect,
	pub resource: String,
	pub actions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
	pub name: String,
	pub subjects: Vec<String>,
	pub statements: Vec<Statement>,
}

impl Policy {
	/// One permission rule per subject × statement × action, in declaration
	/// order, with duplicates removed. Action names are lower-cased.
	///
	/// Fails with [`AuthzError::InvalidRule`](crate::AuthzError::InvalidRule)
	/// if any subject, resource or action is empty.
	pub fn to_rules(&self) -> Result<Vec<PolicyRule>> {
		let mut seen = HashSet::new();
		let mut rules = Vec::new();

		for subject in &self.subjects {
			for statement in &self.statements {
				for action in &statement.actions {
					let rule = PolicyRule::permission(
						subject.as_str(),
						statement.resource.as_str(),
						action,
						statement.effect,
					)?;
					if seen.insert(rule.clone()) {
						rules.push(rule);
					}
				}
			}
		}

		Ok(rules)
	}
}
