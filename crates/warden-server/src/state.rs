// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Shared request state and its construction from configuration.

use std::sync::Arc;
use std::time::Duration;

use sqlx::sqlite::SqlitePool;
use tracing::{info, instrument};
use warden_common_http::RetryConfig;
use warden_server_auth::{
	ApiKeyStrategy, AuthStrategy, AutoStrategy, BearerStrategy, PasswordStrategy, UserDirectory,
};
use warden_server_auth_devicecode::{Client, DeviceFlow, DeviceFlowConfig};
use warden_common_secret::SecretString;
use warden_server_authz::{
	Authorizer, DecisionCache, HttpAuthorizer, HttpPolicySource, InvalidationBus, PolicyEngine,
	PolicyReplicator, PolicyService, ReplicatorConfig, ReplicatorHandle,
};
use warden_server_config::{AuthzRole, ServerConfig};
use warden_server_db::{
	ApiKeyRepository, ClientRepository, DeviceCodeRepository, PolicyRepository, PrincipalRepository,
};
use warden_server_token::{IssuerConfig, SigningKeySet, TokenIssuer, TokenTtls};

/// Everything handlers need, cheap to clone per request.
#[derive(Clone)]
pub struct AppState {
	pub role: AuthzRole,
	/// Local rule set; stays empty on a delegated node.
	pub engine: Arc<PolicyEngine>,
	/// Answers every decision: the local engine, or the upstream node when
	/// delegated.
	pub authorizer: Arc<dyn Authorizer>,
	/// Write path; only present on the authoritative node.
	pub policies: Option<PolicyService>,
	/// Invalidation fan-out to replicas; authoritative only.
	pub bus: Option<InvalidationBus>,
	/// Present on replicas.
	pub replicator: Option<Arc<PolicyReplicator>>,
	pub issuer: Arc<TokenIssuer>,
	pub device_flow: Arc<DeviceFlow>,
	pub auth: Arc<dyn AuthStrategy>,
	pub pool: SqlitePool,
}

impl AppState {
	pub fn is_authoritative(&self) -> bool {
		self.policies.is_some()
	}
}

/// Background pieces that must be shut down with the server.
#[derive(Default)]
pub struct Background {
	pub replicator: Option<ReplicatorHandle>,
}

impl Background {
	pub async fn shutdown(self) {
		if let Some(handle) = self.replicator {
			handle.shutdown().await;
		}
	}
}

pub fn issuer_config(config: &ServerConfig) -> IssuerConfig {
	let token = &config.token;
	IssuerConfig {
		issuer: token.issuer.clone(),
		max_clock_skew: token.max_clock_skew(),
		ttls: TokenTtls {
			access: Duration::from_secs(token.access_ttl_secs),
			refresh: Duration::from_secs(token.refresh_ttl_secs),
			id: Duration::from_secs(token.id_ttl_secs),
			device: Duration::from_secs(token.device_ttl_secs),
			authorization_code: Duration::from_secs(token.authorization_code_ttl_secs),
		},
		max_ttl: Duration::from_secs(token.max_ttl_secs),
	}
}

/// Upstream URL and credential; both are required outside the authoritative role.
fn upstream(config: &ServerConfig) -> anyhow::Result<(String, SecretString)> {
	let url = config
		.authz
		.upstream_url
		.clone()
		.ok_or_else(|| anyhow::anyhow!("{:?} role requires authz.upstream_url", config.authz.role))?;
	let credential = config
		.authz
		.upstream_credential
		.clone()
		.ok_or_else(|| anyhow::anyhow!("{:?} role requires an upstream credential", config.authz.role))?;
	Ok((url, credential))
}

fn replicator_config(config: &ServerConfig) -> ReplicatorConfig {
	let authz = &config.authz;
	ReplicatorConfig {
		fetch_retry: RetryConfig::with_max_attempts(authz.fetch_max_attempts),
		reconnect_base_delay: Duration::from_millis(authz.reconnect_base_ms),
		reconnect_max_delay: Duration::from_millis(authz.reconnect_max_ms),
	}
}

/// Wire up every component for `config.authz.role`.
///
/// Fails when the signing keys cannot be loaded, when the authoritative
/// rule set cannot be read, or when a replica's initial sync fails. In each
/// case the process must not start serving.
#[instrument(skip_all, fields(role = ?config.authz.role))]
pub async fn build_state(config: &ServerConfig, pool: SqlitePool) -> anyhow::Result<(AppState, Background)> {
	let keys = SigningKeySet::load(
		config.token.secrets.hmac_secret.as_ref(),
		config.token.secrets.rsa_private_key_pem.as_ref(),
	)?;
	info!(kid = %keys.key_id(), "signing keys loaded");
	let issuer = Arc::new(TokenIssuer::new(Arc::new(keys), issuer_config(config)));

	let engine = Arc::new(PolicyEngine::new(DecisionCache::new(
		config.authz.decision_cache_ttl(),
		config.authz.decision_cache_capacity,
	)));

	let mut background = Background::default();
	let local: Arc<dyn Authorizer> = Arc::clone(&engine) as Arc<dyn Authorizer>;
	let (policies, bus, replicator, authorizer) = match config.authz.role {
		AuthzRole::Authoritative => {
			let bus = InvalidationBus::new(config.authz.channel_capacity);
			let service = PolicyService::new(
				Arc::new(PolicyRepository::new(pool.clone())),
				Arc::clone(&engine),
				Arc::new(bus.clone()),
			);
			let rules = service.load().await?;
			info!(rules, "policy rules loaded from database");
			(Some(service), Some(bus), None, local)
		}
		AuthzRole::Replica => {
			let (url, credential) = upstream(config)?;
			let client = warden_common_http::builder().build()?;
			let source =
				HttpPolicySource::new(client, url, config.authz.fetch_timeout()).with_credential(credential);
			let replicator = PolicyReplicator::new(Arc::clone(&engine), Arc::new(source), replicator_config(config));
			background.replicator = Some(replicator.start().await?);
			(None, None, Some(replicator), local)
		}
		AuthzRole::Delegated => {
			let (url, credential) = upstream(config)?;
			info!(upstream = %url, "delegating authorization decisions upstream");
			let client = warden_common_http::builder().build()?;
			let remote = HttpAuthorizer::new(client, url, config.authz.fetch_timeout()).with_credential(credential);
			(None, None, None, Arc::new(remote) as Arc<dyn Authorizer>)
		}
	};

	let clients = ClientRepository::new(pool.clone());
	for client_id in &config.device.clients {
		clients
			.upsert(&Client {
				client_id: client_id.clone(),
				name: client_id.clone(),
			})
			.await?;
	}
	let device_flow = Arc::new(DeviceFlow::new(
		Arc::new(DeviceCodeRepository::new(pool.clone())),
		Arc::new(clients),
		Arc::clone(&issuer),
		DeviceFlowConfig {
			code_ttl: config.device.code_ttl(),
			poll_interval: config.device.poll_interval(),
			verification_uri: config.verification_uri(),
		},
	));

	let directory: Arc<dyn UserDirectory> = Arc::new(PrincipalRepository::new(pool.clone()));
	let auth = AutoStrategy::new(
		PasswordStrategy::new(Arc::clone(&directory)),
		BearerStrategy::new(Arc::clone(&issuer), directory),
	)
	.with_api_keys(ApiKeyStrategy::new(Arc::new(ApiKeyRepository::new(pool.clone()))));

	let state = AppState {
		role: config.authz.role,
		authorizer,
		engine,
		policies,
		bus,
		replicator,
		issuer,
		device_flow,
		auth: Arc::new(auth),
		pool,
	};
	Ok((state, background))
}
