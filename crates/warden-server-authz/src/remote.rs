// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! HTTP clients for talking to an authoritative Warden server.
//!
//! The authoritative server only answers authenticated callers, so both
//! clients carry an optional bearer credential (an API key or a long-lived
//! token) that is attached to every request.

use std::time::Duration;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use warden_common_secret::SecretString;

use crate::authorizer::Authorizer;
use crate::engine::AccessDecision;
use crate::error::{AuthzError, Result};
use crate::rule::PolicyRule;
use crate::store::{Invalidation, InvalidationStream, PolicySource};

pub const RULES_PATH: &str = "/v1/authz/rules";
pub const STREAM_PATH: &str = "/v1/authz/stream";
pub const AUTHORIZE_PATH: &str = "/v1/authz/authorize";

/// Body of `GET /v1/authz/rules`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesResponse {
	pub revision: u64,
	pub rules: Vec<PolicyRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizeRequest {
	pub subject: String,
	pub resource: String,
	pub action: String,
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
	if response.status().is_success() {
		return Ok(response);
	}
	Err(AuthzError::Upstream {
		status: response.status().as_u16(),
		message: response.text().await.unwrap_or_default(),
	})
}

fn endpoint(base_url: &str, path: &str) -> String {
	format!("{}{path}", base_url.trim_end_matches('/'))
}

fn with_auth(request: RequestBuilder, credential: Option<&SecretString>) -> RequestBuilder {
	match credential {
		Some(credential) => request.bearer_auth(credential.expose()),
		None => request,
	}
}

/// Replica-side source backed by the authoritative server's HTTP API.
///
/// The client must not carry a total request timeout: the invalidation
/// stream stays open until the server or the network closes it. Full
/// fetches are bounded by `fetch_timeout` instead.
#[derive(Clone)]
pub struct HttpPolicySource {
	client: Client,
	base_url: String,
	fetch_timeout: Duration,
	credential: Option<SecretString>,
}

impl HttpPolicySource {
	pub fn new(client: Client, base_url: impl Into<String>, fetch_timeout: Duration) -> Self {
		Self {
			client,
			base_url: base_url.into(),
			fetch_timeout,
			credential: None,
		}
	}

	pub fn with_credential(mut self, credential: SecretString) -> Self {
		self.credential = Some(credential);
		self
	}
}

#[async_trait]
impl PolicySource for HttpPolicySource {
	#[instrument(skip(self), fields(base_url = %self.base_url))]
	async fn fetch_all_rules(&self) -> Result<Vec<PolicyRule>> {
		let request = self
			.client
			.get(endpoint(&self.base_url, RULES_PATH))
			.timeout(self.fetch_timeout);
		let response = with_auth(request, self.credential.as_ref()).send().await?;
		let body: RulesResponse = check_status(response)
			.await?
			.json()
			.await
			.map_err(|e| AuthzError::Decode(e.to_string()))?;
		debug!(
			revision = body.revision,
			rules = body.rules.len(),
			"fetched authoritative rule set"
		);
		Ok(body.rules)
	}

	async fn subscribe(&self) -> Result<InvalidationStream> {
		let request = self
			.client
			.get(endpoint(&self.base_url, STREAM_PATH))
			.header("Accept", "text/event-stream")
			.header("Cache-Control", "no-cache");
		let response = with_auth(request, self.credential.as_ref()).send().await?;
		let response = check_status(response).await?;

		let stream = response
			.bytes_stream()
			.eventsource()
			.filter_map(|item| async move {
				match item {
					Ok(event) if event.data.is_empty() => None,
					Ok(event) => Some(serde_json::from_str::<Invalidation>(&event.data).map_err(|e| {
						warn!(data = %event.data, error = %e, "failed to parse invalidation event");
						AuthzError::Decode(e.to_string())
					})),
					Err(e) => Some(Err(AuthzError::Stream(e.to_string()))),
				}
			})
			.boxed();

		Ok(stream)
	}
}

/// Delegates decisions to a remote authorizer instead of holding rules.
#[derive(Clone)]
pub struct HttpAuthorizer {
	client: Client,
	base_url: String,
	timeout: Duration,
	credential: Option<SecretString>,
}

impl HttpAuthorizer {
	pub fn new(client: Client, base_url: impl Into<String>, timeout: Duration) -> Self {
		Self {
			client,
			base_url: base_url.into(),
			timeout,
			credential: None,
		}
	}

	pub fn with_credential(mut self, credential: SecretString) -> Self {
		self.credential = Some(credential);
		self
	}
}

#[async_trait]
impl Authorizer for HttpAuthorizer {
	#[instrument(skip(self), fields(base_url = %self.base_url))]
	async fn authorize(&self, subject: &str, resource: &str, action: &str) -> Result<AccessDecision> {
		let request = AuthorizeRequest {
			subject: subject.to_string(),
			resource: resource.to_string(),
			action: action.to_string(),
		};
		let request = self
			.client
			.post(endpoint(&self.base_url, AUTHORIZE_PATH))
			.timeout(self.timeout)
			.json(&request);
		let response = with_auth(request, self.credential.as_ref()).send().await?;
		check_status(response)
			.await?
			.json()
			.await
			.map_err(|e| AuthzError::Decode(e.to_string()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::rule::Effect;
	use wiremock::matchers::{body_json, header, method, path};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	fn client() -> Client {
		warden_common_http::builder().build().unwrap()
	}

	fn source(base_url: impl Into<String>) -> HttpPolicySource {
		HttpPolicySource::new(client(), base_url, Duration::from_secs(5))
	}

	mod policy_source {
		use super::*;

		#[tokio::test]
		async fn fetches_rules() {
			let server = MockServer::start().await;
			Mock::given(method("GET"))
				.and(path(RULES_PATH))
				.respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
					"revision": 4,
					"rules": [["p", "alice", "/orgs/*", "read", "allow"], ["g", "alice", "admin"]]
				})))
				.mount(&server)
				.await;

			let source = source(format!("{}/", server.uri()));
			let rules = source.fetch_all_rules().await.unwrap();
			assert_eq!(
				rules,
				vec![
					PolicyRule::permission("alice", "/orgs/*", "read", Effect::Allow).unwrap(),
					PolicyRule::grouping("alice", "admin").unwrap(),
				]
			);
		}

		#[tokio::test]
		async fn credential_is_sent_on_fetch_and_subscribe() {
			let server = MockServer::start().await;
			Mock::given(method("GET"))
				.and(path(RULES_PATH))
				.and(header("authorization", "Bearer wk_replica:s3cret"))
				.respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
					"revision": 1,
					"rules": []
				})))
				.expect(1)
				.mount(&server)
				.await;
			Mock::given(method("GET"))
				.and(path(STREAM_PATH))
				.and(header("authorization", "Bearer wk_replica:s3cret"))
				.respond_with(ResponseTemplate::new(200).insert_header("content-type", "text/event-stream"))
				.expect(1)
				.mount(&server)
				.await;

			let source = source(server.uri()).with_credential(SecretString::new("wk_replica:s3cret".to_string()));
			assert!(source.fetch_all_rules().await.unwrap().is_empty());
			assert!(source.subscribe().await.is_ok());
		}

		#[tokio::test]
		async fn server_error_maps_to_upstream() {
			let server = MockServer::start().await;
			Mock::given(method("GET"))
				.and(path(RULES_PATH))
				.respond_with(ResponseTemplate::new(503).set_body_string("down"))
				.mount(&server)
				.await;

			let source = source(server.uri());
			let err = source.fetch_all_rules().await.unwrap_err();
			assert!(matches!(err, AuthzError::Upstream { status: 503, .. }));
		}

		#[tokio::test]
		async fn invalid_rule_is_a_decode_error() {
			let server = MockServer::start().await;
			Mock::given(method("GET"))
				.and(path(RULES_PATH))
				.respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
					"revision": 1,
					"rules": [["x", "alice"]]
				})))
				.mount(&server)
				.await;

			let source = source(server.uri());
			let err = source.fetch_all_rules().await.unwrap_err();
			assert!(matches!(err, AuthzError::Decode(_)));
		}

		#[tokio::test]
		async fn subscription_yields_invalidations() {
			let server = MockServer::start().await;
			let body = concat!(
				": keep-alive\n\n",
				"data: {\"revision\":1,\"issued_at\":\"2025-01-01T00:00:00Z\"}\n\n",
				"data: {\"revision\":2,\"issued_at\":\"2025-01-01T00:00:01Z\"}\n\n",
			);
			Mock::given(method("GET"))
				.and(path(STREAM_PATH))
				.and(header("accept", "text/event-stream"))
				.respond_with(
					ResponseTemplate::new(200)
						.insert_header("content-type", "text/event-stream")
						.set_body_string(body),
				)
				.mount(&server)
				.await;

			let source = source(server.uri());
			let events: Vec<_> = source.subscribe().await.unwrap().collect().await;

			let revisions: Vec<u64> = events.into_iter().map(|e| e.unwrap().revision).collect();
			assert_eq!(revisions, vec![1, 2]);
		}

		#[tokio::test]
		async fn subscription_rejected_by_server() {
			let server = MockServer::start().await;
			Mock::given(method("GET"))
				.and(path(STREAM_PATH))
				.respond_with(ResponseTemplate::new(401))
				.mount(&server)
				.await;

			let source = source(server.uri());
			let err = source.subscribe().await.err().unwrap();
			assert!(matches!(err, AuthzError::Upstream { status: 401, .. }));
		}
	}

	mod http_authorizer {
		use super::*;

		#[tokio::test]
		async fn posts_request_and_returns_decision() {
			let server = MockServer::start().await;
			Mock::given(method("POST"))
				.and(path(AUTHORIZE_PATH))
				.and(body_json(serde_json::json!({
					"subject": "alice",
					"resource": "/orgs/1",
					"action": "read"
				})))
				.respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
					"allowed": false,
					"reason": "denied by policy"
				})))
				.mount(&server)
				.await;

			let authorizer = HttpAuthorizer::new(client(), server.uri(), Duration::from_secs(2));
			let decision = authorizer.authorize("alice", "/orgs/1", "read").await.unwrap();
			assert_eq!(decision, AccessDecision::deny("denied by policy"));
		}

		#[tokio::test]
		async fn credential_is_sent_with_decisions() {
			let server = MockServer::start().await;
			Mock::given(method("POST"))
				.and(path(AUTHORIZE_PATH))
				.and(header("authorization", "Bearer wk_gateway:s3cret"))
				.respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "allowed": true })))
				.expect(1)
				.mount(&server)
				.await;

			let authorizer = HttpAuthorizer::new(client(), server.uri(), Duration::from_secs(2))
				.with_credential(SecretString::new("wk_gateway:s3cret".to_string()));
			assert!(authorizer.authorize("alice", "/orgs/1", "read").await.unwrap().allowed);
		}

		#[tokio::test]
		async fn slow_upstream_times_out() {
			let server = MockServer::start().await;
			Mock::given(method("POST"))
				.and(path(AUTHORIZE_PATH))
				.respond_with(
					ResponseTemplate::new(200)
						.set_body_json(serde_json::json!({ "allowed": true }))
						.set_delay(Duration::from_millis(500)),
				)
				.mount(&server)
				.await;

			let authorizer = HttpAuthorizer::new(client(), server.uri(), Duration::from_millis(50));
			let err = authorizer.authorize("alice", "/orgs/1", "read").await.unwrap_err();
			assert!(matches!(err, AuthzError::Transport(ref e) if e.is_timeout()));
		}
	}
}
