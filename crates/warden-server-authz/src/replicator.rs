// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Keeps a local [`PolicyEngine`] in step with the authoritative store.
//!
//! Startup loads the full rule set and fails hard if that is impossible.
//! Afterwards two background tasks run until shutdown:
//!
//! - the subscription loop holds an invalidation subscription open,
//!   resubscribing with exponential backoff whenever the transport drops
//! - the refresh worker re-fetches and atomically replaces the rule set
//!   whenever it is signalled
//!
//! Signals go through a [`Notify`], which stores at most one permit, so a
//! burst of invalidations received during a refresh collapses into a single
//! follow-up refresh. Direct [`PolicyReplicator::refresh`] calls are
//! single-flight as well.
//!
//! A replica converges within one notification delivery plus one fetch
//! round-trip of the authoritative write.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::{broadcast, Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use warden_common_http::{retry, RetryConfig};

use crate::engine::PolicyEngine;
use crate::error::{AuthzError, Result};
use crate::store::PolicySource;

#[derive(Debug, Clone)]
pub struct ReplicatorConfig {
	/// Retry policy for each full fetch.
	pub fetch_retry: RetryConfig,
	pub reconnect_base_delay: Duration,
	pub reconnect_max_delay: Duration,
}

impl Default for ReplicatorConfig {
	fn default() -> Self {
		Self {
			fetch_retry: RetryConfig::with_max_attempts(3),
			reconnect_base_delay: Duration::from_secs(1),
			reconnect_max_delay: Duration::from_secs(30),
		}
	}
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplicatorStatus {
	pub connected: bool,
	pub refreshes: u64,
	pub failed_refreshes: u64,
	pub coalesced_refreshes: u64,
	pub reconnects: u64,
	pub last_synced_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct Counters {
	connected: AtomicBool,
	/// Refreshes that began a fetch; also the single-flight ticket.
	started: AtomicU64,
	failed: AtomicU64,
	coalesced: AtomicU64,
	reconnects: AtomicU64,
}

pub struct PolicyReplicator {
	engine: Arc<PolicyEngine>,
	source: Arc<dyn PolicySource>,
	config: ReplicatorConfig,
	/// Held for the duration of a refresh; holds that refresh's outcome.
	refresh_gate: Mutex<std::result::Result<usize, String>>,
	refresh_signal: Notify,
	counters: Counters,
	last_synced_at: RwLock<Option<DateTime<Utc>>>,
}

impl PolicyReplicator {
	pub fn new(
		engine: Arc<PolicyEngine>,
		source: Arc<dyn PolicySource>,
		config: ReplicatorConfig,
	) -> Arc<Self> {
		Arc::new(Self {
			engine,
			source,
			config,
			refresh_gate: Mutex::new(Ok(0)),
			refresh_signal: Notify::new(),
			counters: Counters::default(),
			last_synced_at: RwLock::new(None),
		})
	}

	/// Initial load followed by the background tasks.
	///
	/// An error here means the replica must not serve: it would otherwise
	/// authorize against an empty rule set.
	pub async fn start(self: &Arc<Self>) -> Result<ReplicatorHandle> {
		let rules = self.refresh().await?;
		info!(rules, "initial policy load complete");

		let (shutdown_tx, _) = broadcast::channel::<()>(1);

		let subscription = {
			let this = Arc::clone(self);
			let shutdown_rx = shutdown_tx.subscribe();
			tokio::spawn(async move { this.run_subscription(shutdown_rx).await })
		};
		let worker = {
			let this = Arc::clone(self);
			let shutdown_rx = shutdown_tx.subscribe();
			tokio::spawn(async move { this.run_refresh_worker(shutdown_rx).await })
		};

		Ok(ReplicatorHandle {
			replicator: Arc::clone(self),
			shutdown_tx,
			tasks: vec![subscription, worker],
		})
	}

	/// Fetch the full rule set and replace the engine's contents.
	///
	/// Returns the number of rules now loaded. On failure the previous rule
	/// set stays in place. A caller that queued behind a refresh which
	/// started after it asked is served by that refresh instead of fetching
	/// again, and gets that refresh's result, error included.
	#[instrument(skip(self))]
	pub async fn refresh(&self) -> Result<usize> {
		let ticket = self.counters.started.load(Ordering::SeqCst);
		let mut outcome = self.refresh_gate.lock().await;

		if self.counters.started.load(Ordering::SeqCst) != ticket {
			self.counters.coalesced.fetch_add(1, Ordering::SeqCst);
			debug!("refresh coalesced into a concurrent one");
			return outcome.clone().map_err(AuthzError::PolicySyncFailed);
		}
		self.counters.started.fetch_add(1, Ordering::SeqCst);

		let source = Arc::clone(&self.source);
		let fetched = retry(&self.config.fetch_retry, || {
			let source = Arc::clone(&source);
			async move { source.fetch_all_rules().await }
		})
		.await;

		match fetched {
			Ok(rules) => {
				let count = rules.len();
				let changed = self.engine.replace_rules(rules);
				*self.last_synced_at.write() = Some(Utc::now());
				debug!(rules = count, changed, "policy refresh applied");
				*outcome = Ok(count);
				Ok(count)
			}
			Err(e) => {
				self.counters.failed.fetch_add(1, Ordering::SeqCst);
				error!(error = %e, "policy refresh failed, keeping previous rule set");
				*outcome = Err(e.to_string());
				Err(AuthzError::PolicySyncFailed(e.to_string()))
			}
		}
	}

	/// Ask the background worker for a refresh without waiting for it.
	pub fn request_refresh(&self) {
		self.refresh_signal.notify_one();
	}

	pub fn status(&self) -> ReplicatorStatus {
		ReplicatorStatus {
			connected: self.counters.connected.load(Ordering::SeqCst),
			refreshes: self.counters.started.load(Ordering::SeqCst),
			failed_refreshes: self.counters.failed.load(Ordering::SeqCst),
			coalesced_refreshes: self.counters.coalesced.load(Ordering::SeqCst),
			reconnects: self.counters.reconnects.load(Ordering::SeqCst),
			last_synced_at: *self.last_synced_at.read(),
		}
	}

	async fn run_refresh_worker(&self, mut shutdown_rx: broadcast::Receiver<()>) {
		loop {
			tokio::select! {
				_ = self.refresh_signal.notified() => {
					// Failure is already logged; the old rules stay in place.
					let _ = self.refresh().await;
				}
				_ = shutdown_rx.recv() => {
					debug!("refresh worker shutting down");
					break;
				}
			}
		}
	}

	async fn run_subscription(&self, mut shutdown_rx: broadcast::Receiver<()>) {
		let mut consecutive_failures: u32 = 0;

		loop {
			match self.source.subscribe().await {
				Ok(mut stream) => {
					self.counters.connected.store(true, Ordering::SeqCst);
					consecutive_failures = 0;
					info!("subscribed to policy invalidations");
					// Anything published while we were disconnected was missed.
					self.request_refresh();

					loop {
						tokio::select! {
							item = stream.next() => match item {
								Some(Ok(event)) => {
									debug!(revision = event.revision, "policy invalidation received");
									self.request_refresh();
								}
								Some(Err(e)) => {
									warn!(error = %e, "invalidation stream failed");
									consecutive_failures += 1;
									break;
								}
								None => {
									debug!("invalidation stream ended");
									break;
								}
							},
							_ = shutdown_rx.recv() => {
								self.counters.connected.store(false, Ordering::SeqCst);
								info!("policy subscription shutting down");
								return;
							}
						}
					}
				}
				Err(e) => {
					warn!(error = %e, "failed to subscribe to policy invalidations");
					consecutive_failures += 1;
				}
			}

			self.counters.connected.store(false, Ordering::SeqCst);
			self.counters.reconnects.fetch_add(1, Ordering::SeqCst);

			let delay = self.backoff(consecutive_failures);
			warn!(
				delay_ms = delay.as_millis() as u64,
				attempts = consecutive_failures,
				"resubscribing to policy invalidations"
			);

			tokio::select! {
				_ = tokio::time::sleep(delay) => {}
				_ = shutdown_rx.recv() => {
					info!("policy subscription shutting down during backoff");
					return;
				}
			}
		}
	}

	fn backoff(&self, consecutive_failures: u32) -> Duration {
		let factor = 2u64.saturating_pow(consecutive_failures.min(10));
		let delay_ms = (self.config.reconnect_base_delay.as_millis() as u64).saturating_mul(factor);
		Duration::from_millis(delay_ms.min(self.config.reconnect_max_delay.as_millis() as u64))
	}
}

/// Owns the background tasks. Dropping it aborts them.
pub struct ReplicatorHandle {
	replicator: Arc<PolicyReplicator>,
	shutdown_tx: broadcast::Sender<()>,
	tasks: Vec<JoinHandle<()>>,
}

impl ReplicatorHandle {
	pub fn replicator(&self) -> &Arc<PolicyReplicator> {
		&self.replicator
	}

	pub async fn shutdown(mut self) {
		let _ = self.shutdown_tx.send(());
		for task in self.tasks.drain(..) {
			let _ = task.await;
		}
	}
}

impl Drop for ReplicatorHandle {
	fn drop(&mut self) {
		for task in &self.tasks {
			task.abort();
		}
	}
}
