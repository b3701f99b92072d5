// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Periodic maintenance tasks.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use warden_server_auth_devicecode::DeviceFlow;

/// A running background job and the means to stop it.
pub struct JobHandle {
	shutdown: watch::Sender<bool>,
	task: JoinHandle<()>,
}

impl JobHandle {
	pub async fn shutdown(self) {
		let _ = self.shutdown.send(true);
		if let Err(e) = self.task.await {
			warn!(error = %e, "background job ended abnormally");
		}
	}
}

/// Delete expired device authorizations every `interval`.
///
/// Expired records are already unusable, so a failed sweep is only logged
/// and retried on the next tick.
pub fn spawn_device_sweep(flow: Arc<DeviceFlow>, interval: Duration) -> JobHandle {
	let (shutdown, mut stop) = watch::channel(false);
	let task = tokio::spawn(async move {
		let mut ticker = tokio::time::interval(interval);
		ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
		// The first tick completes immediately.
		ticker.tick().await;
		loop {
			tokio::select! {
				_ = ticker.tick() => sweep_once(&flow).await,
				_ = stop.changed() => break,
			}
		}
		info!("device code sweep stopped");
	});
	JobHandle { shutdown, task }
}

#[instrument(skip_all, fields(job_id = "device-code-sweep"))]
async fn sweep_once(flow: &DeviceFlow) {
	match flow.sweep_expired().await {
		Ok(0) => {}
		Ok(removed) => debug!(removed, "expired device codes removed"),
		Err(e) => warn!(error = %e, "device code sweep failed"),
	}
}
