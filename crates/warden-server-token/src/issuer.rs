// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Token issuance and verification.
//!
//! Access, refresh, static, device and authorization-code tokens are HS256
//! signed with the HMAC secret. ID tokens are RS256 signed and carry the key
//! id in their header.
//!
//! Verification picks the key from the header algorithm. A `kid` can only
//! select among keys this process already holds; it never introduces one.
//! Time claims are checked by hand so that each failure has its own error:
//!
//! - `exp`, when present, must be strictly after now
//! - `iat` and `nbf` must not be later than now plus the clock skew

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, encode, Algorithm, DecodingKey, Header, Validation};
use serde::Serialize;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::claims::{PrincipalType, ProfileClaims, TokenClaims, TokenType};
use crate::error::{Result, TokenError};
use crate::keys::SigningKeySet;

/// Lifetimes applied when a request does not carry its own.
#[derive(Debug, Clone)]
pub struct TokenTtls {
	pub access: Duration,
	pub refresh: Duration,
	pub id: Duration,
	pub device: Duration,
	pub authorization_code: Duration,
}

impl Default for TokenTtls {
	fn default() -> Self {
		Self {
			access: Duration::from_secs(3600),
			refresh: Duration::from_secs(30 * 24 * 3600),
			id: Duration::from_secs(3600),
			device: Duration::from_secs(3600),
			authorization_code: Duration::from_secs(600),
		}
	}
}

impl TokenTtls {
	/// `None` for static tokens, which do not expire unless asked to.
	pub fn for_type(&self, token_type: TokenType) -> Option<Duration> {
		match token_type {
			TokenType::Access => Some(self.access),
			TokenType::Refresh => Some(self.refresh),
			TokenType::Id => Some(self.id),
			TokenType::Device => Some(self.device),
			TokenType::AuthorizationCode => Some(self.authorization_code),
			TokenType::Static => None,
		}
	}
}

#[derive(Debug, Clone)]
pub struct IssuerConfig {
	pub issuer: String,
	pub max_clock_skew: Duration,
	pub ttls: TokenTtls,
	/// Requests asking for a longer lifetime are refused.
	pub max_ttl: Duration,
}

impl Default for IssuerConfig {
	fn default() -> Self {
		Self {
			issuer: "warden".to_string(),
			max_clock_skew: Duration::from_secs(5),
			ttls: TokenTtls::default(),
			max_ttl: Duration::from_secs(365 * 24 * 3600),
		}
	}
}

#[derive(Debug, Clone)]
pub struct IssueRequest {
	pub subject: String,
	pub token_type: TokenType,
	pub principal_type: PrincipalType,
	pub audience: Vec<String>,
	pub scopes: Vec<String>,
	/// Overrides the per-type default.
	pub ttl: Option<Duration>,
	pub profile: ProfileClaims,
}

impl IssueRequest {
	pub fn new(subject: impl Into<String>, token_type: TokenType) -> Self {
		Self {
			subject: subject.into(),
			token_type,
			principal_type: PrincipalType::User,
			audience: Vec::new(),
			scopes: Vec::new(),
			ttl: None,
			profile: ProfileClaims::default(),
		}
	}

	pub fn principal_type(mut self, principal_type: PrincipalType) -> Self {
		self.principal_type = principal_type;
		self
	}

	pub fn audience(mut self, audience: impl IntoIterator<Item = impl Into<String>>) -> Self {
		self.audience = audience.into_iter().map(Into::into).collect();
		self
	}

	pub fn scopes(mut self, scopes: impl IntoIterator<Item = impl Into<String>>) -> Self {
		self.scopes = scopes.into_iter().map(Into::into).collect();
		self
	}

	pub fn ttl(mut self, ttl: Duration) -> Self {
		self.ttl = Some(ttl);
		self
	}

	pub fn profile(mut self, profile: ProfileClaims) -> Self {
		self.profile = profile;
		self
	}
}

#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
	pub token: String,
	pub token_type: TokenType,
	/// Seconds; absent for long-lived tokens.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub expires_in: Option<u64>,
	#[serde(skip)]
	pub claims: TokenClaims,
}

#[derive(Debug, Clone)]
pub struct TokenIssuer {
	keys: Arc<SigningKeySet>,
	config: IssuerConfig,
}

impl TokenIssuer {
	pub fn new(keys: Arc<SigningKeySet>, config: IssuerConfig) -> Self {
		Self { keys, config }
	}

	pub fn keys(&self) -> &Arc<SigningKeySet> {
		&self.keys
	}

	pub fn config(&self) -> &IssuerConfig {
		&self.config
	}

	#[instrument(skip_all, fields(token_type = %request.token_type, sub = %request.subject))]
	pub fn issue(&self, request: IssueRequest) -> Result<IssuedToken> {
		if request.subject.is_empty() {
			return Err(TokenError::InvalidRequest("subject is required".to_string()));
		}
		let ttl = request.ttl.or_else(|| self.config.ttls.for_type(request.token_type));
		if ttl.is_some_and(|ttl| ttl.as_secs() == 0) {
			return Err(TokenError::InvalidRequest(
				"token lifetime must be at least one second".to_string(),
			));
		}
		if ttl.is_some_and(|ttl| ttl > self.config.max_ttl) {
			return Err(TokenError::InvalidRequest(format!(
				"token lifetime may not exceed {} seconds",
				self.config.max_ttl.as_secs()
			)));
		}

		let now = Utc::now().timestamp();
		let exp = ttl.map(|ttl| expiry(now, ttl)).transpose()?;
		let claims = TokenClaims {
			iss: self.config.issuer.clone(),
			sub: request.subject,
			aud: request.audience,
			iat: now,
			nbf: Some(now),
			exp,
			jti: Uuid::new_v4().to_string(),
			token_type: request.token_type,
			principal_type: request.principal_type,
			scopes: request.scopes,
			profile: request.profile,
		};
		self.issue_claims(claims)
	}

	/// Sign `claims` as given. Callers are responsible for their validity.
	pub fn issue_claims(&self, claims: TokenClaims) -> Result<IssuedToken> {
		let (header, key) = if claims.token_type.is_asymmetric() {
			let mut header = Header::new(Algorithm::RS256);
			header.kid = Some(self.keys.key_id().to_string());
			(header, self.keys.rsa_encoding())
		} else {
			(Header::new(Algorithm::HS256), self.keys.hmac_encoding())
		};

		let token = encode(&header, &claims, key).map_err(|e| TokenError::Signing(e.to_string()))?;
		debug!(jti = %claims.jti, alg = ?header.alg, "token issued");

		Ok(IssuedToken {
			token,
			token_type: claims.token_type,
			expires_in: claims.expires_in(claims.iat),
			claims,
		})
	}

	#[instrument(skip_all)]
	pub fn verify(&self, token: &str) -> Result<TokenClaims> {
		let header = decode_header(token).map_err(|_| TokenError::Malformed)?;
		let key = self.verification_key(&header)?;

		let mut validation = Validation::new(header.alg);
		validation.validate_exp = false;
		validation.validate_nbf = false;
		validation.validate_aud = false;
		validation.required_spec_claims.clear();

		let claims = decode::<TokenClaims>(token, key, &validation)
			.map_err(|e| match e.kind() {
				ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm | ErrorKind::InvalidKeyFormat => {
					TokenError::InvalidSignature
				}
				_ => TokenError::Malformed,
			})?
			.claims;

		if claims.token_type.is_asymmetric() != (header.alg == Algorithm::RS256) {
			debug!(token_type = %claims.token_type, alg = ?header.alg, "algorithm does not match token type");
			return Err(TokenError::InvalidSignature);
		}

		self.check_times(&claims, Utc::now().timestamp())?;
		debug!(jti = %claims.jti, token_type = %claims.token_type, "token verified");
		Ok(claims)
	}

	fn verification_key(&self, header: &Header) -> Result<&DecodingKey> {
		match header.alg {
			Algorithm::HS256 => Ok(self.keys.hmac_decoding()),
			Algorithm::RS256 => match header.kid.as_deref() {
				Some(kid) if kid == self.keys.key_id() => Ok(self.keys.rsa_decoding()),
				_ => Err(TokenError::InvalidSignature),
			},
			_ => Err(TokenError::Malformed),
		}
	}

	fn check_times(&self, claims: &TokenClaims, now: i64) -> Result<()> {
		let skew = self.config.max_clock_skew.as_secs() as i64;

		if claims.exp.is_some_and(|exp| exp <= now) {
			return Err(TokenError::Expired);
		}
		if claims.iat > now.saturating_add(skew) {
			return Err(TokenError::NotYetValid);
		}
		if claims.nbf.is_some_and(|nbf| nbf > now.saturating_add(skew)) {
			return Err(TokenError::NotYetValid);
		}
		Ok(())
	}
}

/// `now + ttl`, refusing lifetimes that do not fit a timestamp.
fn expiry(now: i64, ttl: Duration) -> Result<i64> {
	i64::try_from(ttl.as_secs())
		.ok()
		.and_then(|secs| now.checked_add(secs))
		.ok_or_else(|| TokenError::InvalidRequest("token lifetime is out of range".to_string()))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::keys::test_support::{shared_rsa_key, test_keys};
	use base64::engine::general_purpose::URL_SAFE_NO_PAD;
	use base64::Engine;
	use proptest::prelude::*;

	fn issuer_with_skew(skew: Duration) -> TokenIssuer {
		TokenIssuer::new(
			Arc::new(test_keys()),
			IssuerConfig {
				max_clock_skew: skew,
				..IssuerConfig::default()
			},
		)
	}

	fn issuer() -> TokenIssuer {
		issuer_with_skew(Duration::from_secs(5))
	}

	mod issue {
		use super::*;

		#[test]
		fn round_trip_recovers_subject_and_type() {
			let issuer = issuer();
			let issued = issuer
				.issue(
					IssueRequest::new("user-42", TokenType::Access)
						.scopes(["read", "write"])
						.audience(["api"]),
				)
				.unwrap();

			let claims = issuer.verify(&issued.token).unwrap();
			assert_eq!(claims.sub, "user-42");
			assert_eq!(claims.token_type, TokenType::Access);
			assert_eq!(claims.scopes, vec!["read", "write"]);
			assert_eq!(claims.aud, vec!["api"]);
			assert_eq!(claims.iss, "warden");
			assert_eq!(issued.expires_in, Some(3600));
		}

		#[test]
		fn default_ttl_depends_on_type() {
			let issuer = issuer();
			let refresh = issuer.issue(IssueRequest::new("u", TokenType::Refresh)).unwrap();
			let code = issuer
				.issue(IssueRequest::new("u", TokenType::AuthorizationCode))
				.unwrap();
			assert_eq!(refresh.expires_in, Some(30 * 24 * 3600));
			assert_eq!(code.expires_in, Some(600));
		}

		#[test]
		fn static_tokens_have_no_expiry() {
			let issuer = issuer();
			let issued = issuer.issue(IssueRequest::new("svc", TokenType::Static)).unwrap();
			assert_eq!(issued.expires_in, None);
			assert_eq!(issuer.verify(&issued.token).unwrap().exp, None);
		}

		#[test]
		fn zero_ttl_is_rejected() {
			let err = issuer()
				.issue(IssueRequest::new("u", TokenType::Access).ttl(Duration::ZERO))
				.unwrap_err();
			assert!(matches!(err, TokenError::InvalidRequest(_)));
		}

		#[test]
		fn lifetime_beyond_the_ceiling_is_rejected() {
			let issuer = issuer();
			for ttl in [issuer.config().max_ttl + Duration::from_secs(1), Duration::from_secs(u64::MAX)] {
				let err = issuer
					.issue(IssueRequest::new("u", TokenType::Refresh).ttl(ttl))
					.unwrap_err();
				assert!(matches!(err, TokenError::InvalidRequest(_)));
			}

			let issued = issuer
				.issue(IssueRequest::new("u", TokenType::Refresh).ttl(issuer.config().max_ttl))
				.unwrap();
			assert!(issued.claims.exp.unwrap() > issued.claims.iat);
		}

		#[test]
		fn expiry_never_wraps() {
			assert!(expiry(i64::MAX - 10, Duration::from_secs(60)).is_err());
			assert!(expiry(0, Duration::from_secs(u64::MAX)).is_err());
			assert_eq!(expiry(100, Duration::from_secs(60)).unwrap(), 160);
		}

		#[test]
		fn empty_subject_is_rejected() {
			let err = issuer().issue(IssueRequest::new("", TokenType::Access)).unwrap_err();
			assert!(matches!(err, TokenError::InvalidRequest(_)));
		}

		#[test]
		fn each_token_gets_a_fresh_jti() {
			let issuer = issuer();
			let a = issuer.issue(IssueRequest::new("u", TokenType::Access)).unwrap();
			let b = issuer.issue(IssueRequest::new("u", TokenType::Access)).unwrap();
			assert_ne!(a.claims.jti, b.claims.jti);
		}
	}

	mod algorithms {
		use super::*;

		#[test]
		fn id_tokens_are_rs256_with_kid() {
			let issuer = issuer();
			let issued = issuer.issue(IssueRequest::new("u", TokenType::Id)).unwrap();

			let header = decode_header(&issued.token).unwrap();
			assert_eq!(header.alg, Algorithm::RS256);
			assert_eq!(header.kid.as_deref(), Some(issuer.keys().key_id()));
			assert_eq!(issuer.verify(&issued.token).unwrap().token_type, TokenType::Id);
		}

		#[test]
		fn access_tokens_are_hs256() {
			let issued = issuer().issue(IssueRequest::new("u", TokenType::Access)).unwrap();
			let header = decode_header(&issued.token).unwrap();
			assert_eq!(header.alg, Algorithm::HS256);
			assert_eq!(header.kid, None);
		}

		#[test]
		fn id_tokens_verify_against_published_jwk() {
			let issuer = issuer();
			let issued = issuer.issue(IssueRequest::new("u", TokenType::Id)).unwrap();
			let jwk = issuer.keys().jwks().keys.into_iter().next().unwrap();

			let key = DecodingKey::from_rsa_components(&jwk.n, &jwk.e).unwrap();
			let mut validation = Validation::new(Algorithm::RS256);
			validation.validate_aud = false;
			let data = decode::<TokenClaims>(&issued.token, &key, &validation).unwrap();
			assert_eq!(data.claims.sub, "u");
		}

		#[test]
		fn unknown_kid_is_invalid_signature() {
			let issuer = issuer();
			let issued = issuer.issue(IssueRequest::new("u", TokenType::Id)).unwrap();

			let mut header = Header::new(Algorithm::RS256);
			header.kid = Some("someone-elses-key".to_string());
			let forged = encode(&header, &issued.claims, issuer.keys().rsa_encoding()).unwrap();

			assert_eq!(issuer.verify(&forged).unwrap_err(), TokenError::InvalidSignature);
		}

		#[test]
		fn token_from_another_secret_is_rejected() {
			let other = TokenIssuer::new(
				Arc::new(SigningKeySet::from_parts(vec![9; 32], shared_rsa_key()).unwrap()),
				IssuerConfig::default(),
			);
			let issued = other.issue(IssueRequest::new("u", TokenType::Access)).unwrap();
			assert_eq!(issuer().verify(&issued.token).unwrap_err(), TokenError::InvalidSignature);
		}

		#[test]
		fn id_token_signed_with_hmac_is_rejected() {
			let issuer = issuer();
			let mut claims = issuer.issue(IssueRequest::new("u", TokenType::Access)).unwrap().claims;
			claims.token_type = TokenType::Id;
			let forged = encode(&Header::new(Algorithm::HS256), &claims, issuer.keys().hmac_encoding()).unwrap();

			assert_eq!(issuer.verify(&forged).unwrap_err(), TokenError::InvalidSignature);
		}

		#[test]
		fn unsupported_algorithm_is_malformed() {
			let issuer = issuer();
			let claims = issuer.issue(IssueRequest::new("u", TokenType::Access)).unwrap().claims;
			let hs512 = encode(
				&Header::new(Algorithm::HS512),
				&claims,
				&jsonwebtoken::EncodingKey::from_secret(b"0123456789abcdef0123456789abcdef"),
			)
			.unwrap();

			assert_eq!(issuer.verify(&hs512).unwrap_err(), TokenError::Malformed);
		}
	}

	mod tampering {
		use super::*;

		#[test]
		fn altered_payload_fails_signature() {
			let issuer = issuer();
			let issued = issuer.issue(IssueRequest::new("alice", TokenType::Access)).unwrap();

			let mut claims = issued.claims.clone();
			claims.sub = "mallory".to_string();
			let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).unwrap());

			let parts: Vec<&str> = issued.token.split('.').collect();
			let tampered = format!("{}.{}.{}", parts[0], payload, parts[2]);
			assert_eq!(issuer.verify(&tampered).unwrap_err(), TokenError::InvalidSignature);
		}

		#[test]
		fn garbage_is_malformed() {
			assert_eq!(issuer().verify("not-a-token").unwrap_err(), TokenError::Malformed);
			assert_eq!(issuer().verify("").unwrap_err(), TokenError::Malformed);
		}
	}

	mod time_claims {
		use super::*;

		fn future_claims(issuer: &TokenIssuer, ahead: i64) -> TokenClaims {
			let mut claims = issuer.issue(IssueRequest::new("u", TokenType::Access)).unwrap().claims;
			claims.iat += ahead;
			claims.nbf = None;
			claims
		}

		#[test]
		fn expired_after_ttl() {
			let issuer = issuer();
			let issued = issuer
				.issue(IssueRequest::new("u", TokenType::Access).ttl(Duration::from_secs(1)))
				.unwrap();
			std::thread::sleep(Duration::from_secs(2));
			assert_eq!(issuer.verify(&issued.token).unwrap_err(), TokenError::Expired);
		}

		#[test]
		fn future_iat_within_skew_is_accepted() {
			let issuer = issuer_with_skew(Duration::from_secs(2));
			let claims = future_claims(&issuer, 2);
			let token = issuer.issue_claims(claims).unwrap().token;
			assert!(issuer.verify(&token).is_ok());
		}

		#[test]
		fn future_iat_without_skew_is_rejected() {
			let issuer = issuer_with_skew(Duration::ZERO);
			let claims = future_claims(&issuer, 2);
			let token = issuer.issue_claims(claims).unwrap().token;
			assert_eq!(issuer.verify(&token).unwrap_err(), TokenError::NotYetValid);
		}

		#[test]
		fn future_nbf_is_not_yet_valid() {
			let issuer = issuer_with_skew(Duration::from_secs(1));
			let mut claims = future_claims(&issuer, 0);
			claims.nbf = Some(claims.iat + 60);
			let token = issuer.issue_claims(claims).unwrap().token;
			assert_eq!(issuer.verify(&token).unwrap_err(), TokenError::NotYetValid);
		}
	}

	mod proptests {
		use super::*;

		proptest! {
			#![proptest_config(ProptestConfig::with_cases(32))]

			#[test]
			fn subject_survives_round_trip(subject in "[a-zA-Z0-9_-]{1,40}") {
				let issuer = issuer();
				let issued = issuer.issue(IssueRequest::new(subject.clone(), TokenType::Refresh)).unwrap();
				let claims = issuer.verify(&issued.token).unwrap();
				prop_assert_eq!(claims.sub, subject);
			}

			#[test]
			fn verify_never_panics_on_junk(junk in ".{0,200}") {
				let _ = issuer().verify(&junk);
			}
		}
	}
}
