// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration for the Warden authorization server.
//!
//! Layers are merged in precedence order:
//! 1. Environment variables (`WARDEN_SERVER_*`)
//! 2. Config file (`$WARDEN_SERVER_CONFIG` or `/etc/warden/server.toml`)
//! 3. Built-in defaults
//!
//! Signing key material is only ever read from the environment (see
//! [`sections::token`]).

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::ServerConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use tracing::{debug, info};
use warden_common_secret::{load_secret_env, SecretString};

pub const HMAC_SECRET_ENV: &str = "WARDEN_SERVER_TOKEN_HMAC_SECRET";
pub const RSA_PRIVATE_KEY_ENV: &str = "WARDEN_SERVER_TOKEN_RSA_PRIVATE_KEY";
pub const UPSTREAM_CREDENTIAL_ENV: &str = "WARDEN_SERVER_AUTHZ_UPSTREAM_CREDENTIAL";

/// Fully resolved server configuration.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
	pub http: HttpConfig,
	pub database: DatabaseConfig,
	pub logging: LoggingConfig,
	pub authz: AuthzConfig,
	pub token: TokenConfig,
	pub device: DeviceConfig,
}

impl ServerConfig {
	pub fn socket_addr(&self) -> String {
		format!("{}:{}", self.http.host, self.http.port)
	}

	/// Verification URI handed to devices, e.g. `https://iam.example.com/device`.
	pub fn verification_uri(&self) -> String {
		format!("{}{}", self.http.base_url, self.device.verification_path)
	}
}

/// Load configuration from all sources with standard precedence.
pub fn load_config() -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration with an explicit config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

fn load_from_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<ServerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ServerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		merged.merge(source.load()?);
	}

	let secrets = TokenSecrets {
		hmac_secret: load_secret_env(HMAC_SECRET_ENV)?,
		rsa_private_key_pem: load_secret_env(RSA_PRIVATE_KEY_ENV)?,
	};
	let upstream_credential = load_secret_env(UPSTREAM_CREDENTIAL_ENV)?;
	finalize(merged, secrets, upstream_credential)
}

fn finalize(
	layer: ServerConfigLayer,
	secrets: TokenSecrets,
	upstream_credential: Option<SecretString>,
) -> Result<ServerConfig, ConfigError> {
	let config = ServerConfig {
		http: layer.http.unwrap_or_default().finalize(),
		database: layer.database.unwrap_or_default().finalize(),
		logging: layer.logging.unwrap_or_default().finalize(),
		authz: layer.authz.unwrap_or_default().finalize(upstream_credential),
		token: layer.token.unwrap_or_default().finalize(secrets),
		device: layer.device.unwrap_or_default().finalize(),
	};

	validate_config(&config)?;

	info!(
		host = %config.http.host,
		port = config.http.port,
		database = %config.database.url,
		authz_role = ?config.authz.role,
		upstream_credential_configured = config.authz.upstream_credential.is_some(),
		issuer = %config.token.issuer,
		hmac_secret_configured = config.token.secrets.hmac_secret.is_some(),
		rsa_key_configured = config.token.secrets.rsa_private_key_pem.is_some(),
		"Server configuration loaded"
	);

	Ok(config)
}

/// Validate cross-field configuration rules.
pub fn validate_config(config: &ServerConfig) -> Result<(), ConfigError> {
	if config.authz.role.needs_upstream() {
		if config.authz.upstream_url.is_none() {
			return Err(ConfigError::Validation(format!(
				"authz.role = {:?} requires authz.upstream_url (WARDEN_SERVER_AUTHZ_UPSTREAM_URL)",
				config.authz.role
			)));
		}
		if config.authz.upstream_credential.is_none() {
			return Err(ConfigError::Validation(format!(
				"authz.role = {:?} requires an upstream credential ({UPSTREAM_CREDENTIAL_ENV})",
				config.authz.role
			)));
		}
	}
	if config.authz.fetch_max_attempts == 0 {
		return Err(ConfigError::Validation(
			"authz.fetch_max_attempts must be at least 1".to_string(),
		));
	}
	if config.device.code_ttl_secs == 0 || config.device.poll_interval_secs == 0 {
		return Err(ConfigError::Validation(
			"device.code_ttl_secs and device.poll_interval_secs must be positive".to_string(),
		));
	}
	if config.device.sweep_interval_secs == 0 {
		return Err(ConfigError::Validation(
			"device.sweep_interval_secs must be positive".to_string(),
		));
	}
	if config.token.access_ttl_secs == 0 || config.token.device_ttl_secs == 0 {
		return Err(ConfigError::Validation(
			"token TTLs must be positive".to_string(),
		));
	}
	let token = &config.token;
	let longest_default = [
		token.access_ttl_secs,
		token.refresh_ttl_secs,
		token.id_ttl_secs,
		token.device_ttl_secs,
		token.authorization_code_ttl_secs,
	]
	.into_iter()
	.max()
	.unwrap_or(0);
	if token.max_ttl_secs < longest_default {
		return Err(ConfigError::Validation(
			"token.max_ttl_secs must not be shorter than any per-type TTL".to_string(),
		));
	}
	Ok(())
}
