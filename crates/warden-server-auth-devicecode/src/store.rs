// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Persistence contract for device authorizations.
//!
//! The state-changing operations are conditional: each checks and updates
//! in one atomic step, so concurrent approvals or concurrent exchanges of
//! the same code have exactly one winner.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::error::{DeviceFlowError, Result};
use crate::model::{DeviceAuthorization, DeviceStatus};

#[async_trait]
pub trait DeviceCodeStore: Send + Sync {
	/// Fails with [`DeviceFlowError::DuplicateCode`] if either code exists.
	async fn insert(&self, record: &DeviceAuthorization) -> Result<()>;

	async fn find_by_device_code(&self, device_code: &str) -> Result<Option<DeviceAuthorization>>;

	async fn find_by_user_code(&self, user_code: &str) -> Result<Option<DeviceAuthorization>>;

	/// `Pending → Approved` if still pending and unexpired at `now`.
	/// Returns whether this call made the transition.
	async fn approve(&self, user_code: &str, user_id: &str, now: DateTime<Utc>) -> Result<bool>;

	/// `Pending → Denied` if still pending and unexpired at `now`.
	async fn deny(&self, user_code: &str, now: DateTime<Utc>) -> Result<bool>;

	/// Delete and return the record if it is approved and unexpired at
	/// `now`. Only one caller can ever receive a given record.
	async fn consume(&self, device_code: &str, now: DateTime<Utc>) -> Result<Option<DeviceAuthorization>>;

	/// Remove every record whose expiry has passed. Returns how many.
	async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}

/// Process-local store, for tests and single-node deployments.
#[derive(Debug, Default)]
pub struct MemoryDeviceCodeStore {
	inner: Mutex<MemoryInner>,
}

#[derive(Debug, Default)]
struct MemoryInner {
	by_device_code: HashMap<String, DeviceAuthorization>,
	/// user code → device code
	user_codes: HashMap<String, String>,
}

impl MemoryInner {
	fn by_user_code_mut(&mut self, user_code: &str) -> Option<&mut DeviceAuthorization> {
		let device_code = self.user_codes.get(user_code)?;
		self.by_device_code.get_mut(device_code)
	}

	fn transition(&mut self, user_code: &str, now: DateTime<Utc>, apply: impl FnOnce(&mut DeviceAuthorization)) -> bool {
		match self.by_user_code_mut(user_code) {
			Some(record) if record.status_at(now) == DeviceStatus::Pending => {
				apply(record);
				true
			}
			_ => false,
		}
	}
}

impl MemoryDeviceCodeStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn len(&self) -> usize {
		self.inner.lock().by_device_code.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

#[async_trait]
impl DeviceCodeStore for MemoryDeviceCodeStore {
	async fn insert(&self, record: &DeviceAuthorization) -> Result<()> {
		let mut inner = self.inner.lock();
		if inner.by_device_code.contains_key(&record.device_code) || inner.user_codes.contains_key(&record.user_code) {
			return Err(DeviceFlowError::DuplicateCode);
		}
		inner
			.user_codes
			.insert(record.user_code.clone(), record.device_code.clone());
		inner
			.by_device_code
			.insert(record.device_code.clone(), record.clone());
		Ok(())
	}

	async fn find_by_device_code(&self, device_code: &str) -> Result<Option<DeviceAuthorization>> {
		Ok(self.inner.lock().by_device_code.get(device_code).cloned())
	}

	async fn find_by_user_code(&self, user_code: &str) -> Result<Option<DeviceAuthorization>> {
		let inner = self.inner.lock();
		Ok(inner
			.user_codes
			.get(user_code)
			.and_then(|device_code| inner.by_device_code.get(device_code))
			.cloned())
	}

	async fn approve(&self, user_code: &str, user_id: &str, now: DateTime<Utc>) -> Result<bool> {
		Ok(self.inner.lock().transition(user_code, now, |record| {
			record.status = DeviceStatus::Approved;
			record.user_id = Some(user_id.to_string());
			record.approved_at = Some(now);
		}))
	}

	async fn deny(&self, user_code: &str, now: DateTime<Utc>) -> Result<bool> {
		Ok(self
			.inner
			.lock()
			.transition(user_code, now, |record| record.status = DeviceStatus::Denied))
	}

	async fn consume(&self, device_code: &str, now: DateTime<Utc>) -> Result<Option<DeviceAuthorization>> {
		let mut inner = self.inner.lock();
		let redeemable = inner
			.by_device_code
			.get(device_code)
			.is_some_and(|record| record.status_at(now) == DeviceStatus::Approved);
		if !redeemable {
			return Ok(None);
		}

		let record = inner.by_device_code.remove(device_code);
		if let Some(record) = &record {
			inner.user_codes.remove(&record.user_code);
		}
		Ok(record)
	}

	async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
		let mut inner = self.inner.lock();
		let expired: Vec<DeviceAuthorization> = inner
			.by_device_code
			.values()
			.filter(|record| record.is_expired_at(now))
			.cloned()
			.collect();
		for record in &expired {
			inner.by_device_code.remove(&record.device_code);
			inner.user_codes.remove(&record.user_code);
		}
		Ok(expired.len() as u64)
	}
}
