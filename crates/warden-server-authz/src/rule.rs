// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Flat policy rules as evaluated by the engine and carried over the wire.
//!
//! A rule is `(ptype, v0..v5)`. On the wire it is a JSON array with empty
//! trailing fields omitted, e.g. `["p","alice","/orgs/*","read"]` or
//! `["g","alice","admin"]`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AuthzError, Result};

/// Number of value slots after the rule type.
pub const MAX_RULE_VALUES: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RuleType {
	/// `p`: subject, resource pattern, action, effect.
	Permission,
	/// `g`: member, role.
	Grouping,
}

impl RuleType {
	pub fn as_str(&self) -> &'static str {
		match self {
			RuleType::Permission => "p",
			RuleType::Grouping => "g",
		}
	}

	pub fn parse(s: &str) -> Result<Self> {
		match s {
			"p" => Ok(RuleType::Permission),
			"g" => Ok(RuleType::Grouping),
			other => Err(AuthzError::InvalidRule(format!("unknown rule type '{other}'"))),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
	#[default]
	Allow,
	Deny,
}

impl Effect {
	pub fn as_str(&self) -> &'static str {
		match self {
			Effect::Allow => "allow",
			Effect::Deny => "deny",
		}
	}

	/// An empty effect slot means allow.
	pub fn parse(s: &str) -> Result<Self> {
		if s.is_empty() || s.eq_ignore_ascii_case("allow") {
			Ok(Effect::Allow)
		} else if s.eq_ignore_ascii_case("deny") {
			Ok(Effect::Deny)
		} else {
			Err(AuthzError::InvalidRule(format!("unknown effect '{s}'")))
		}
	}
}

impl fmt::Display for Effect {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A single flattened rule. Identity is the full tuple.
///
/// Values are normalised on construction (trailing empty slots dropped) so
/// that equal tuples compare and hash equal regardless of how they arrived.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "Vec<String>", try_from = "Vec<String>")]
pub struct PolicyRule {
	rule_type: RuleType,
	values: Vec<String>,
}

impl PolicyRule {
	pub fn new(rule_type: RuleType, values: Vec<String>) -> Result<Self> {
		if values.len() > MAX_RULE_VALUES {
			return Err(AuthzError::InvalidRule(format!(
				"{} values exceeds the maximum of {MAX_RULE_VALUES}",
				values.len()
			)));
		}

		let rule = Self {
			rule_type,
			values: trim_trailing_empty(values),
		};

		match rule_type {
			RuleType::Permission => {
				if rule.subject().is_empty() || rule.resource().is_empty() || rule.action().is_empty() {
					return Err(AuthzError::InvalidRule(
						"permission rules need subject, resource and action".to_string(),
					));
				}
				Effect::parse(rule.v(3))?;
			}
			RuleType::Grouping => {
				if rule.v(0).is_empty() || rule.v(1).is_empty() {
					return Err(AuthzError::InvalidRule(
						"grouping rules need member and role".to_string(),
					));
				}
			}
		}

		Ok(rule)
	}

	/// `p, subject, resource, action, effect`. Actions are lower-cased.
	pub fn permission(
		subject: impl Into<String>,
		resource: impl Into<String>,
		action: impl AsRef<str>,
		effect: Effect,
	) -> Result<Self> {
		Self::new(
			RuleType::Permission,
			vec![
				subject.into(),
				resource.into(),
				action.as_ref().to_lowercase(),
				effect.as_str().to_string(),
			],
		)
	}

	/// `g, member, role`: `member` inherits every permission of `role`.
	pub fn grouping(member: impl Into<String>, role: impl Into<String>) -> Result<Self> {
		Self::new(RuleType::Grouping, vec![member.into(), role.into()])
	}

	pub fn rule_type(&self) -> RuleType {
		self.rule_type
	}

	/// Value slot `i`, or `""` when unset.
	pub fn v(&self, i: usize) -> &str {
		self.values.get(i).map(String::as_str).unwrap_or("")
	}

	pub fn subject(&self) -> &str {
		self.v(0)
	}

	pub fn resource(&self) -> &str {
		self.v(1)
	}

	pub fn action(&self) -> &str {
		self.v(2)
	}

	/// Effect of a permission rule. Validated at construction.
	pub fn effect(&self) -> Effect {
		Effect::parse(self.v(3)).unwrap_or(Effect::Deny)
	}
}

fn trim_trailing_empty(mut values: Vec<String>) -> Vec<String> {
	while values.last().is_some_and(|v| v.is_empty()) {
		values.pop();
	}
	values
}

impl From<PolicyRule> for Vec<String> {
	fn from(rule: PolicyRule) -> Self {
		let mut out = Vec::with_capacity(rule.values.len() + 1);
		out.push(rule.rule_type.as_str().to_string());
		out.extend(rule.values);
		out
	}
}

impl TryFrom<Vec<String>> for PolicyRule {
	type Error = AuthzError;

	fn try_from(mut tuple: Vec<String>) -> Result<Self> {
		if tuple.is_empty() {
			return Err(AuthzError::InvalidRule("empty rule tuple".to_string()));
		}
		let rule_type = RuleType::parse(&tuple.remove(0))?;
		PolicyRule::new(rule_type, tuple)
	}
}

impl fmt::Display for PolicyRule {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.rule_type.as_str())?;
		for value in &self.values {
			write!(f, ", {value}")?;
		}
		Ok(())
	}
}
