// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: built-in defaults, a TOML file and the environment.

use std::path::PathBuf;
use std::str::FromStr;

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::ServerConfigLayer;
use crate::sections::{
	AuthzConfigLayer, DatabaseConfigLayer, DeviceConfigLayer, HttpConfigLayer, LoggingConfigLayer,
	TokenConfigLayer,
};

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "WARDEN_SERVER_CONFIG";

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<ServerConfigLayer, ConfigError>;
}

pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		Ok(ServerConfigLayer::default())
	}
}

/// TOML file source. A missing file contributes nothing.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	/// `$WARDEN_SERVER_CONFIG`, falling back to `/etc/warden/server.toml`.
	pub fn system() -> Self {
		Self::new(env_var(CONFIG_PATH_ENV).unwrap_or_else(|| "/etc/warden/server.toml".to_string()))
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(ServerConfigLayer::default());
		}

		let content = std::fs::read_to_string(&self.path).map_err(|source| ConfigError::FileRead {
			path: self.path.clone(),
			source,
		})?;

		let layer: ServerConfigLayer =
			toml::from_str(&content).map_err(|source| ConfigError::TomlParse {
				path: self.path.clone(),
				source,
			})?;

		trace!(path = %self.path.display(), "parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: `WARDEN_SERVER_<SECTION>_<FIELD>`.
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		Ok(ServerConfigLayer {
			http: Some(HttpConfigLayer {
				host: env_var("WARDEN_SERVER_HOST"),
				port: env_parse("WARDEN_SERVER_PORT")?,
				base_url: env_var("WARDEN_SERVER_BASE_URL"),
			}),
			database: Some(DatabaseConfigLayer {
				url: env_var("WARDEN_SERVER_DATABASE_URL"),
				max_connections: env_parse("WARDEN_SERVER_DATABASE_MAX_CONNECTIONS")?,
			}),
			logging: Some(LoggingConfigLayer {
				level: env_var("WARDEN_SERVER_LOG_LEVEL"),
				format: env_parse("WARDEN_SERVER_LOG_FORMAT")?,
			}),
			authz: Some(AuthzConfigLayer {
				role: env_parse("WARDEN_SERVER_AUTHZ_ROLE")?,
				upstream_url: env_var("WARDEN_SERVER_AUTHZ_UPSTREAM_URL"),
				decision_cache_ttl_secs: env_parse("WARDEN_SERVER_AUTHZ_DECISION_CACHE_TTL_SECS")?,
				decision_cache_capacity: env_parse("WARDEN_SERVER_AUTHZ_DECISION_CACHE_CAPACITY")?,
				fetch_max_attempts: env_parse("WARDEN_SERVER_AUTHZ_FETCH_MAX_ATTEMPTS")?,
				fetch_timeout_secs: env_parse("WARDEN_SERVER_AUTHZ_FETCH_TIMEOUT_SECS")?,
				reconnect_base_ms: env_parse("WARDEN_SERVER_AUTHZ_RECONNECT_BASE_MS")?,
				reconnect_max_ms: env_parse("WARDEN_SERVER_AUTHZ_RECONNECT_MAX_MS")?,
				channel_capacity: env_parse("WARDEN_SERVER_AUTHZ_CHANNEL_CAPACITY")?,
			}),
			token: Some(TokenConfigLayer {
				issuer: env_var("WARDEN_SERVER_TOKEN_ISSUER"),
				max_clock_skew_secs: env_parse("WARDEN_SERVER_TOKEN_MAX_CLOCK_SKEW_SECS")?,
				access_ttl_secs: env_parse("WARDEN_SERVER_TOKEN_ACCESS_TTL_SECS")?,
				refresh_ttl_secs: env_parse("WARDEN_SERVER_TOKEN_REFRESH_TTL_SECS")?,
				id_ttl_secs: env_parse("WARDEN_SERVER_TOKEN_ID_TTL_SECS")?,
				device_ttl_secs: env_parse("WARDEN_SERVER_TOKEN_DEVICE_TTL_SECS")?,
				authorization_code_ttl_secs: env_parse(
					"WARDEN_SERVER_TOKEN_AUTHORIZATION_CODE_TTL_SECS",
				)?,
				max_ttl_secs: env_parse("WARDEN_SERVER_TOKEN_MAX_TTL_SECS")?,
			}),
			device: Some(DeviceConfigLayer {
				code_ttl_secs: env_parse("WARDEN_SERVER_DEVICE_CODE_TTL_SECS")?,
				poll_interval_secs: env_parse("WARDEN_SERVER_DEVICE_POLL_INTERVAL_SECS")?,
				verification_path: env_var("WARDEN_SERVER_DEVICE_VERIFICATION_PATH"),
				sweep_interval_secs: env_parse("WARDEN_SERVER_DEVICE_SWEEP_INTERVAL_SECS")?,
				clients: env_list("WARDEN_SERVER_DEVICE_CLIENTS"),
			}),
		})
	}
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_parse<T>(name: &str) -> Result<Option<T>, ConfigError>
where
	T: FromStr,
	T::Err: std::fmt::Display,
{
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|e: T::Err| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("'{v}': {e}"),
		}),
		None => Ok(None),
	}
}

fn env_list(name: &str) -> Option<Vec<String>> {
	env_var(name).map(|s| {
		s.split(',')
			.map(|s| s.trim().to_string())
			.filter(|s| !s.is_empty())
			.collect()
	})
}
