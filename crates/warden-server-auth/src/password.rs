// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Salted one-way password hashes in PHC string form.

use std::sync::OnceLock;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};

use crate::argon2_config::argon2_instance;
use crate::error::{AuthError, Result};

pub fn hash_password(password: &str) -> Result<String> {
	let salt = SaltString::generate(&mut OsRng);
	argon2_instance()
		.hash_password(password.as_bytes(), &salt)
		.map(|hash| hash.to_string())
		.map_err(|e| AuthError::Internal(format!("failed to hash password: {e}")))
}

/// `Ok(false)` on mismatch; `Err` only if `hash` is not a PHC string.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
	let parsed = PasswordHash::new(hash).map_err(|_| AuthError::Internal("invalid password hash format".to_string()))?;
	Ok(argon2_instance()
		.verify_password(password.as_bytes(), &parsed)
		.is_ok())
}

/// Burn the same work as a real verification, for unknown users.
pub fn dummy_verify(password: &str) {
	static DUMMY_HASH: OnceLock<Option<String>> = OnceLock::new();
	let hash = DUMMY_HASH.get_or_init(|| hash_password("warden-dummy-password").ok());
	if let Some(hash) = hash {
		let _ = verify_password(password, hash);
	}
}
