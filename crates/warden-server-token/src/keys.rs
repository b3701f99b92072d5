// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Signing material: one HMAC secret and one RSA key pair.
//!
//! The set is built once at startup and never mutated. The RSA key id is a
//! digest of the public key, so rotating the key changes the id.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::{DecodingKey, EncodingKey};
use rand::RngCore;
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey, EncodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use warden_common_secret::{SecretBytes, SecretString};

use crate::error::{Result, TokenError};

pub const RSA_KEY_BITS: usize = 2048;
pub const GENERATED_HMAC_SECRET_LEN: usize = 32;
/// Shorter configured secrets are refused.
pub const MIN_HMAC_SECRET_LEN: usize = 32;

/// Length in bytes of the digest prefix used as key id.
const KEY_ID_BYTES: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyUse {
	Sig,
}

/// Public half of the RSA key in JSON Web Key form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
	pub kty: String,
	pub kid: String,
	pub alg: String,
	#[serde(rename = "use")]
	pub use_field: KeyUse,
	pub n: String,
	pub e: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwks {
	pub keys: Vec<Jwk>,
}

pub struct SigningKeySet {
	hmac_encoding: EncodingKey,
	hmac_decoding: DecodingKey,
	rsa_encoding: EncodingKey,
	rsa_decoding: DecodingKey,
	key_id: String,
	jwk: Jwk,
	public_key_pem: String,
}

impl SigningKeySet {
	/// Build from configured material, generating whatever is missing.
	///
	/// Configured material that cannot be used is an error, never silently
	/// replaced by a generated key.
	pub fn load(hmac_secret: Option<&SecretString>, rsa_private_key_pem: Option<&SecretString>) -> Result<Self> {
		let hmac = match hmac_secret {
			Some(secret) => {
				let bytes = secret.expose().as_bytes().to_vec();
				if bytes.len() < MIN_HMAC_SECRET_LEN {
					return Err(TokenError::KeyLoadFailed(format!(
						"HMAC secret must be at least {MIN_HMAC_SECRET_LEN} bytes"
					)));
				}
				bytes
			}
			None => {
				warn!("no HMAC secret configured, generating an ephemeral one; symmetric tokens will not survive a restart");
				generate_hmac_secret()
			}
		};

		let rsa = match rsa_private_key_pem {
			Some(pem) => parse_rsa_private_key(pem.expose())?,
			None => {
				warn!(bits = RSA_KEY_BITS, "no RSA private key configured, generating an ephemeral key pair");
				generate_rsa_key()?
			}
		};

		Self::from_parts(hmac, &rsa)
	}

	/// The HMAC secret is wiped once the signing keys are derived from it.
	pub fn from_parts(hmac_secret: impl Into<SecretBytes>, rsa: &RsaPrivateKey) -> Result<Self> {
		let hmac_secret: SecretBytes = hmac_secret.into();
		if hmac_secret.expose().is_empty() {
			return Err(TokenError::KeyLoadFailed("HMAC secret is empty".to_string()));
		}

		let public = rsa.to_public_key();
		let key_id = derive_key_id(&public)?;
		let jwk = Jwk {
			kty: "RSA".to_string(),
			kid: key_id.clone(),
			alg: "RS256".to_string(),
			use_field: KeyUse::Sig,
			n: URL_SAFE_NO_PAD.encode(public.n().to_bytes_be()),
			e: URL_SAFE_NO_PAD.encode(public.e().to_bytes_be()),
		};

		let private_der = rsa
			.to_pkcs1_der()
			.map_err(|e| TokenError::KeyLoadFailed(format!("encode RSA private key: {e}")))?;
		let rsa_encoding = EncodingKey::from_rsa_der(private_der.as_bytes());
		let rsa_decoding = DecodingKey::from_rsa_components(&jwk.n, &jwk.e)
			.map_err(|e| TokenError::KeyLoadFailed(format!("build RSA verification key: {e}")))?;
		let public_key_pem = public
			.to_public_key_pem(LineEnding::LF)
			.map_err(|e| TokenError::KeyLoadFailed(format!("encode RSA public key: {e}")))?;

		info!(kid = %key_id, "signing keys loaded");

		Ok(Self {
			hmac_encoding: EncodingKey::from_secret(hmac_secret.expose()),
			hmac_decoding: DecodingKey::from_secret(hmac_secret.expose()),
			rsa_encoding,
			rsa_decoding,
			key_id,
			jwk,
			public_key_pem,
		})
	}

	pub fn key_id(&self) -> &str {
		&self.key_id
	}

	pub fn jwks(&self) -> Jwks {
		Jwks {
			keys: vec![self.jwk.clone()],
		}
	}

	/// SubjectPublicKeyInfo PEM of the RSA public key.
	pub fn public_key_pem(&self) -> &str {
		&self.public_key_pem
	}

	pub(crate) fn hmac_encoding(&self) -> &EncodingKey {
		&self.hmac_encoding
	}

	pub(crate) fn hmac_decoding(&self) -> &DecodingKey {
		&self.hmac_decoding
	}

	pub(crate) fn rsa_encoding(&self) -> &EncodingKey {
		&self.rsa_encoding
	}

	pub(crate) fn rsa_decoding(&self) -> &DecodingKey {
		&self.rsa_decoding
	}
}

impl std::fmt::Debug for SigningKeySet {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SigningKeySet")
			.field("key_id", &self.key_id)
			.finish_non_exhaustive()
	}
}

/// Accepts PKCS#8 (`BEGIN PRIVATE KEY`) or PKCS#1 (`BEGIN RSA PRIVATE KEY`).
pub fn parse_rsa_private_key(pem: &str) -> Result<RsaPrivateKey> {
	RsaPrivateKey::from_pkcs8_pem(pem)
		.or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
		.map_err(|e| TokenError::KeyLoadFailed(format!("invalid RSA private key: {e}")))
}

pub fn generate_rsa_key() -> Result<RsaPrivateKey> {
	RsaPrivateKey::new(&mut rand::thread_rng(), RSA_KEY_BITS)
		.map_err(|e| TokenError::KeyLoadFailed(format!("generate RSA key: {e}")))
}

fn generate_hmac_secret() -> Vec<u8> {
	let mut secret = vec![0u8; GENERATED_HMAC_SECRET_LEN];
	rand::thread_rng().fill_bytes(&mut secret);
	secret
}

/// Hex of the leading bytes of SHA-256 over the PKCS#1 DER public key.
pub fn derive_key_id(public: &RsaPublicKey) -> Result<String> {
	let der = public
		.to_pkcs1_der()
		.map_err(|e| TokenError::KeyLoadFailed(format!("encode RSA public key: {e}")))?;
	let digest = Sha256::digest(der.as_bytes());
	Ok(hex::encode(&digest[..KEY_ID_BYTES]))
}

#[cfg(test)]
pub(crate) mod test_support {
	use super::*;
	use std::sync::OnceLock;

	/// RSA generation is slow; tests share one key.
	pub fn shared_rsa_key() -> &'static RsaPrivateKey {
		static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
		KEY.get_or_init(|| generate_rsa_key().unwrap())
	}

	pub fn test_keys() -> SigningKeySet {
		SigningKeySet::from_parts(b"0123456789abcdef0123456789abcdef".to_vec(), shared_rsa_key()).unwrap()
	}
}

#[cfg(test)]
mod tests {
	use super::test_support::*;
	use super::*;
	use rsa::pkcs8::EncodePrivateKey;

	mod key_id {
		use super::*;

		#[test]
		fn is_stable_for_the_same_key() {
			let key = shared_rsa_key();
			let a = SigningKeySet::from_parts(vec![1; 32], key).unwrap();
			let b = SigningKeySet::from_parts(vec![2; 32], key).unwrap();
			assert_eq!(a.key_id(), b.key_id());
			assert_eq!(a.key_id().len(), KEY_ID_BYTES * 2);
		}

		#[test]
		fn changes_with_the_key() {
			let other = generate_rsa_key().unwrap();
			let a = test_keys();
			let b = SigningKeySet::from_parts(vec![1; 32], &other).unwrap();
			assert_ne!(a.key_id(), b.key_id());
		}
	}

	mod loading {
		use super::*;

		#[test]
		fn accepts_pkcs8_and_pkcs1_pem() {
			let key = shared_rsa_key();
			let pkcs8 = key.to_pkcs8_pem(LineEnding::LF).unwrap();
			let pkcs1 = key.to_pkcs1_pem(LineEnding::LF).unwrap();

			assert_eq!(&parse_rsa_private_key(&pkcs8).unwrap(), key);
			assert_eq!(&parse_rsa_private_key(&pkcs1).unwrap(), key);
		}

		#[test]
		fn configured_material_is_used() {
			let pem = shared_rsa_key().to_pkcs8_pem(LineEnding::LF).unwrap();
			let keys = SigningKeySet::load(
				Some(&SecretString::new("x".repeat(MIN_HMAC_SECRET_LEN))),
				Some(&SecretString::new(pem.to_string())),
			)
			.unwrap();
			assert_eq!(keys.key_id(), test_keys().key_id());
		}

		#[test]
		fn garbage_pem_is_a_load_failure() {
			let err = SigningKeySet::load(None, Some(&SecretString::new("not a key".to_string()))).unwrap_err();
			assert!(matches!(err, TokenError::KeyLoadFailed(_)));
		}

		#[test]
		fn short_hmac_secret_is_rejected() {
			let err = SigningKeySet::load(Some(&SecretString::new("short".to_string())), None).unwrap_err();
			assert!(matches!(err, TokenError::KeyLoadFailed(_)));
		}

		#[test]
		fn debug_output_redacts_secret() {
			let rendered = format!("{:?}", test_keys());
			assert!(!rendered.contains("0123456789abcdef"));
			assert!(rendered.contains("key_id"));
		}

		#[test]
		fn hmac_keys_follow_the_configured_secret() {
			use jsonwebtoken::{decode, encode, Algorithm, Header, Validation};

			let claims = serde_json::json!({ "sub": "usr_alice", "exp": 4_102_444_800u64 });
			let a = test_keys();
			let token = encode(&Header::new(Algorithm::HS256), &claims, a.hmac_encoding()).unwrap();

			let same = SigningKeySet::from_parts(b"0123456789abcdef0123456789abcdef".to_vec(), shared_rsa_key()).unwrap();
			let other = SigningKeySet::from_parts(vec![7; 32], shared_rsa_key()).unwrap();
			let validation = Validation::new(Algorithm::HS256);
			assert!(decode::<serde_json::Value>(&token, same.hmac_decoding(), &validation).is_ok());
			assert!(decode::<serde_json::Value>(&token, other.hmac_decoding(), &validation).is_err());
		}
	}

	mod jwks {
		use super::*;

		#[test]
		fn publishes_single_rs256_signing_key() {
			let keys = test_keys();
			let jwks = keys.jwks();
			assert_eq!(jwks.keys.len(), 1);

			let jwk = &jwks.keys[0];
			assert_eq!(jwk.kid, keys.key_id());
			assert_eq!(jwk.alg, "RS256");
			assert_eq!(jwk.e, "AQAB");
		}

		#[test]
		fn serializes_use_field() {
			let json = serde_json::to_value(test_keys().jwks()).unwrap();
			assert_eq!(json["keys"][0]["use"], "sig");
			assert_eq!(json["keys"][0]["kty"], "RSA");
		}

		#[test]
		fn public_pem_is_spki() {
			assert!(test_keys().public_key_pem().starts_with("-----BEGIN PUBLIC KEY-----"));
		}
	}
}
