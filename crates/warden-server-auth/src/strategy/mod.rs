// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Request authentication strategies.
//!
//! Each strategy turns the credential material in a request's headers into
//! a [`Principal`]. [`AutoStrategy`] picks one per request from the
//! `Authorization` scheme.

mod api_key;
mod auto;
mod basic;
mod bearer;

use async_trait::async_trait;
use http::HeaderMap;

use crate::error::Result;
use crate::principal::Principal;

pub use api_key::ApiKeyStrategy;
pub use auto::AutoStrategy;
pub use basic::PasswordStrategy;
pub use bearer::BearerStrategy;

#[async_trait]
pub trait AuthStrategy: Send + Sync {
	async fn authenticate(&self, headers: &HeaderMap) -> Result<Principal>;
}
