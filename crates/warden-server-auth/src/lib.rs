// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Request authentication for Warden.
//!
//! Three strategies (password, bearer token, API key) each turn request
//! headers into a [`Principal`]; [`AutoStrategy`] selects among them by the
//! `Authorization` scheme.

pub mod api_key;
mod argon2_config;
pub mod directory;
pub mod error;
pub mod extract;
pub mod password;
pub mod principal;
pub mod strategy;

pub use api_key::{
	generate_api_key, hash_api_secret, is_api_key_format, ApiKey, ApiKeyStatus, ApiKeyStore, GeneratedApiKey,
	MemoryApiKeyStore, API_KEY_PREFIX,
};
pub use directory::{MemoryUserDirectory, PasswordCredentials, UserDirectory};
pub use error::{AuthError, Result};
pub use password::{hash_password, verify_password};
pub use principal::{AuthMethod, Principal, PrincipalRecord};
pub use strategy::{ApiKeyStrategy, AuthStrategy, AutoStrategy, BearerStrategy, PasswordStrategy};
