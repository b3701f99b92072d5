// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-process invalidation channel and the source built on it.
//!
//! The authoritative process publishes on an [`InvalidationBus`]; local
//! replicators subscribe to it directly and remote replicas receive the same
//! events relayed over SSE by the HTTP layer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

use crate::error::Result;
use crate::rule::PolicyRule;
use crate::store::{Invalidation, InvalidationStream, PolicySource, PolicyStore};

pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Publishes rule-set invalidations to every replica.
#[async_trait]
pub trait InvalidationPublisher: Send + Sync {
	async fn publish(&self) -> Result<Invalidation>;
}

#[derive(Clone)]
pub struct InvalidationBus {
	sender: broadcast::Sender<Invalidation>,
	revision: Arc<AtomicU64>,
}

impl InvalidationBus {
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity.max(1));
		Self {
			sender,
			revision: Arc::new(AtomicU64::new(0)),
		}
	}

	pub fn subscribe(&self) -> broadcast::Receiver<Invalidation> {
		self.sender.subscribe()
	}

	pub fn subscriber_count(&self) -> usize {
		self.sender.receiver_count()
	}

	pub fn revision(&self) -> u64 {
		self.revision.load(Ordering::SeqCst)
	}

	/// Broadcast a new invalidation. Having no subscribers is not an error.
	pub fn send(&self) -> Invalidation {
		let event = Invalidation {
			revision: self.revision.fetch_add(1, Ordering::SeqCst) + 1,
			issued_at: Utc::now(),
		};
		match self.sender.send(event.clone()) {
			Ok(receivers) => debug!(revision = event.revision, receivers, "policy invalidation sent"),
			Err(_) => debug!(revision = event.revision, "policy invalidation sent with no subscribers"),
		}
		event
	}

	/// Subscription as a stream. A lagged receiver yields a synthetic
	/// invalidation: events were missed, so the rule set certainly changed.
	pub fn stream(&self) -> InvalidationStream {
		let revision = Arc::clone(&self.revision);
		BroadcastStream::new(self.subscribe())
			.map(move |item| match item {
				Ok(event) => Ok(event),
				Err(BroadcastStreamRecvError::Lagged(skipped)) => {
					warn!(skipped, "invalidation subscriber lagged");
					Ok(Invalidation {
						revision: revision.load(Ordering::SeqCst),
						issued_at: Utc::now(),
					})
				}
			})
			.boxed()
	}
}

impl Default for InvalidationBus {
	fn default() -> Self {
		Self::new(DEFAULT_CHANNEL_CAPACITY)
	}
}

#[async_trait]
impl InvalidationPublisher for InvalidationBus {
	async fn publish(&self) -> Result<Invalidation> {
		Ok(self.send())
	}
}

/// Direct source for a replicator living in the same process as the store.
pub struct LocalPolicySource {
	store: Arc<dyn PolicyStore>,
	bus: InvalidationBus,
}

impl LocalPolicySource {
	pub fn new(store: Arc<dyn PolicyStore>, bus: InvalidationBus) -> Self {
		Self { store, bus }
	}
}

#[async_trait]
impl PolicySource for LocalPolicySource {
	async fn fetch_all_rules(&self) -> Result<Vec<PolicyRule>> {
		self.store.load_rules().await
	}

	async fn subscribe(&self) -> Result<InvalidationStream> {
		Ok(self.bus.stream())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::store::MemoryPolicyStore;

	#[tokio::test]
	async fn subscribers_receive_published_events() {
		let bus = InvalidationBus::new(8);
		let mut stream = bus.stream();

		let sent = bus.publish().await.unwrap();
		let received = stream.next().await.unwrap().unwrap();
		assert_eq!(received, sent);
		assert_eq!(bus.revision(), 1);
	}

	#[tokio::test]
	async fn publish_without_subscribers_is_fine() {
		let bus = InvalidationBus::default();
		assert_eq!(bus.subscriber_count(), 0);
		assert_eq!(bus.send().revision, 1);
	}

	#[tokio::test]
	async fn lagging_subscriber_still_sees_a_change() {
		let bus = InvalidationBus::new(1);
		let mut stream = bus.stream();
		for _ in 0..5 {
			bus.send();
		}
		assert!(stream.next().await.unwrap().is_ok());
	}

	#[tokio::test]
	async fn local_source_reads_store() {
		let store = Arc::new(MemoryPolicyStore::with_rules([PolicyRule::grouping(
			"alice", "admin",
		)
		.unwrap()]));
		let source = LocalPolicySource::new(store, InvalidationBus::default());
		assert_eq!(source.fetch_all_rules().await.unwrap().len(), 1);
	}
}
