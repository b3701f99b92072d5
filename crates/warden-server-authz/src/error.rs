// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;
use warden_common_http::{is_retryable_status, RetryableError};

pub type Result<T> = std::result::Result<T, AuthzError>;

#[derive(Debug, Error)]
pub enum AuthzError {
	#[error("invalid policy rule: {0}")]
	InvalidRule(String),

	#[error("policy store error: {0}")]
	Store(String),

	#[error("transport error: {0}")]
	Transport(#[from] reqwest::Error),

	#[error("upstream returned {status}: {message}")]
	Upstream { status: u16, message: String },

	#[error("invalidation stream error: {0}")]
	Stream(String),

	#[error("failed to decode payload: {0}")]
	Decode(String),

	/// Fetching the authoritative rule set failed after all retries.
	#[error("policy sync failed: {0}")]
	PolicySyncFailed(String),
}

impl RetryableError for AuthzError {
	fn is_retryable(&self) -> bool {
		match self {
			AuthzError::Transport(e) => e.is_retryable(),
			AuthzError::Upstream { status, .. } => reqwest::StatusCode::from_u16(*status)
				.map(is_retryable_status)
				.unwrap_or(false),
			AuthzError::Store(_) | AuthzError::Stream(_) => true,
			AuthzError::InvalidRule(_) | AuthzError::Decode(_) | AuthzError::PolicySyncFailed(_) => {
				false
			}
		}
	}
}
