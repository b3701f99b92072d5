// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Signing keys and tokens for Warden.

pub mod claims;
pub mod error;
pub mod issuer;
pub mod keys;

pub use claims::{PrincipalType, ProfileClaims, TokenClaims, TokenType};
pub use error::{Result, TokenError};
pub use issuer::{IssueRequest, IssuedToken, IssuerConfig, TokenIssuer, TokenTtls};
pub use keys::{Jwk, Jwks, KeyUse, SigningKeySet};
