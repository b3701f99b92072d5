// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Shared HTTP utilities for Warden.
//!
//! - [`builder`] / [`new_client`]: reqwest clients carrying the Warden User-Agent
//! - [`retry`]: bounded retry with exponential backoff for transient failures

mod client;
mod retry;

pub use client::{builder, new_client, user_agent};
pub use retry::{is_retryable_status, retry, RetryConfig, RetryableError};
