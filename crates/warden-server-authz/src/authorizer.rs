// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;

use crate::engine::{AccessDecision, PolicyEngine};
use crate::error::Result;

/// Answers "may `subject` perform `action` on `resource`?".
///
/// Implemented by the local [`PolicyEngine`] and by
/// [`HttpAuthorizer`](crate::remote::HttpAuthorizer), so callers can be
/// pointed at either.
#[async_trait]
pub trait Authorizer: Send + Sync {
	async fn authorize(&self, subject: &str, resource: &str, action: &str) -> Result<AccessDecision>;
}

#[async_trait]
impl Authorizer for PolicyEngine {
	async fn authorize(&self, subject: &str, resource: &str, action: &str) -> Result<AccessDecision> {
		Ok(PolicyEngine::authorize(self, subject, resource, action))
	}
}
