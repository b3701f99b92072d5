// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Device and user code generation.
//!
//! - **device code**: 32 random bytes, hex encoded. Held by the device and
//!   never shown to a person.
//! - **user code**: 8 characters from a consonant-only alphabet, shown as
//!   `XXXX-XXXX`. No vowels means no accidental words, and no digits means
//!   no `0`/`O` or `1`/`I` confusion. 20^8 is about 34 bits, which is plenty
//!   for a code that lives ten minutes.

use rand::{Rng, RngCore};

pub const USER_CODE_CHARSET: &[u8] = b"BCDFGHJKLMNPQRSTVWXZ";
pub const USER_CODE_LEN: usize = 8;
pub const USER_CODE_GROUP: usize = 4;
pub const DEVICE_CODE_BYTES: usize = 32;

pub fn generate_device_code() -> String {
	let mut bytes = [0u8; DEVICE_CODE_BYTES];
	rand::thread_rng().fill_bytes(&mut bytes);
	hex::encode(bytes)
}

/// A fresh user code in display form, e.g. `BDFG-HJKL`.
pub fn generate_user_code() -> String {
	let mut rng = rand::thread_rng();
	let raw: String = (0..USER_CODE_LEN)
		.map(|_| USER_CODE_CHARSET[rng.gen_range(0..USER_CODE_CHARSET.len())] as char)
		.collect();
	format_user_code(&raw)
}

/// Insert the group separator into a bare code.
pub fn format_user_code(raw: &str) -> String {
	let (head, tail) = raw.split_at(USER_CODE_GROUP.min(raw.len()));
	if tail.is_empty() {
		head.to_string()
	} else {
		format!("{head}-{tail}")
	}
}

/// Canonicalise what a person typed: upper-case, separators and spaces
/// removed, then re-grouped. Returns `None` if the result cannot be a user
/// code.
pub fn normalize_user_code(input: &str) -> Option<String> {
	let raw: String = input
		.chars()
		.filter(|c| !matches!(c, '-' | ' ' | '\t'))
		.map(|c| c.to_ascii_uppercase())
		.collect();

	if raw.len() != USER_CODE_LEN || !raw.bytes().all(|b| USER_CODE_CHARSET.contains(&b)) {
		return None;
	}
	Some(format_user_code(&raw))
}

pub fn is_valid_user_code_format(code: &str) -> bool {
	normalize_user_code(code).is_some_and(|normalized| normalized == code)
}

#[cfg(test)]
mod tests {
	use super::*;

	mod user_code {
		use super::*;

		#[test]
		fn generates_grouped_codes() {
			for _ in 0..100 {
				let code = generate_user_code();
				assert_eq!(code.len(), USER_CODE_LEN + 1);
				assert!(is_valid_user_code_format(&code), "invalid format: {code}");
			}
		}

		#[test]
		fn normalizes_typed_input() {
			assert_eq!(normalize_user_code("bdfg-hjkl").as_deref(), Some("BDFG-HJKL"));
			assert_eq!(normalize_user_code(" BDFG HJKL ").as_deref(), Some("BDFG-HJKL"));
			assert_eq!(normalize_user_code("BDFGHJKL").as_deref(), Some("BDFG-HJKL"));
		}

		#[test]
		fn rejects_wrong_length_and_alphabet() {
			assert_eq!(normalize_user_code(""), None);
			assert_eq!(normalize_user_code("BDFG-HJK"), None);
			assert_eq!(normalize_user_code("BDFG-HJKLM"), None);
			assert_eq!(normalize_user_code("ABCD-EFGH"), None);
			assert_eq!(normalize_user_code("1234-5678"), None);
		}

		#[test]
		fn format_requires_canonical_form() {
			assert!(is_valid_user_code_format("BDFG-HJKL"));
			assert!(!is_valid_user_code_format("bdfg-hjkl"));
			assert!(!is_valid_user_code_format("BDFGHJKL"));
		}

		#[test]
		fn codes_are_likely_unique() {
			let codes: std::collections::HashSet<String> = (0..200).map(|_| generate_user_code()).collect();
			assert!(codes.len() > 195);
		}
	}

	mod device_code {
		use super::*;

		#[test]
		fn is_hex_of_expected_length() {
			let code = generate_device_code();
			assert_eq!(code.len(), DEVICE_CODE_BYTES * 2);
			assert!(code.chars().all(|c| c.is_ascii_hexdigit()));
		}

		#[test]
		fn is_unique() {
			assert_ne!(generate_device_code(), generate_device_code());
		}
	}

	mod proptests {
		use super::*;
		use proptest::prelude::*;

		proptest! {
			#[test]
			fn normalization_is_idempotent(input in "[a-zA-Z -]{0,12}") {
				if let Some(code) = normalize_user_code(&input) {
					prop_assert_eq!(normalize_user_code(&code), Some(code.clone()));
					prop_assert!(is_valid_user_code_format(&code));
				}
			}

			#[test]
			fn generated_codes_normalize_to_themselves(_seed in 0u64..500) {
				let code = generate_user_code();
				prop_assert_eq!(normalize_user_code(&code.to_lowercase()), Some(code));
			}
		}
	}
}
