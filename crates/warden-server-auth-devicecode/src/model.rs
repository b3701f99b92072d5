// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The device authorization record and its state machine.
//!
//! ```text
//! Pending ──approve──> Approved ──exchange──> (deleted)
//!    │
//!    └────deny──────> Denied
//!
//! Pending | Approved ──(expires_at passes)──> Expired
//! ```
//!
//! Expiry is never written; it is derived on read from `expires_at`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::codes::{generate_device_code, generate_user_code};
use crate::error::DeviceFlowError;

/// Stored status. `Expired` is only ever produced by
/// [`DeviceAuthorization::status_at`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
	Pending,
	Approved,
	Denied,
	Expired,
}

impl DeviceStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			DeviceStatus::Pending => "pending",
			DeviceStatus::Approved => "approved",
			DeviceStatus::Denied => "denied",
			DeviceStatus::Expired => "expired",
		}
	}
}

impl fmt::Display for DeviceStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for DeviceStatus {
	type Err = DeviceFlowError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"pending" => Ok(DeviceStatus::Pending),
			"approved" => Ok(DeviceStatus::Approved),
			"denied" => Ok(DeviceStatus::Denied),
			"expired" => Ok(DeviceStatus::Expired),
			other => Err(DeviceFlowError::Store(format!("unknown device status: {other}"))),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceAuthorization {
	/// Polling secret held by the device.
	pub device_code: String,
	/// Short code the user types, in `XXXX-XXXX` form.
	pub user_code: String,
	pub client_id: String,
	/// Space-separated scopes requested by the device.
	pub scope: String,
	pub status: DeviceStatus,
	pub created_at: DateTime<Utc>,
	pub expires_at: DateTime<Utc>,
	/// Set on approval.
	pub user_id: Option<String>,
	pub approved_at: Option<DateTime<Utc>>,
}

impl DeviceAuthorization {
	pub fn new(client_id: impl Into<String>, scope: impl Into<String>, ttl: Duration, now: DateTime<Utc>) -> Self {
		Self {
			device_code: generate_device_code(),
			user_code: generate_user_code(),
			client_id: client_id.into(),
			scope: scope.into(),
			status: DeviceStatus::Pending,
			created_at: now,
			expires_at: now + ttl,
			user_id: None,
			approved_at: None,
		}
	}

	pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
		now >= self.expires_at
	}

	/// Status with lazy expiry applied. A denial is final and outlives the
	/// expiry time.
	pub fn status_at(&self, now: DateTime<Utc>) -> DeviceStatus {
		match self.status {
			DeviceStatus::Pending | DeviceStatus::Approved if self.is_expired_at(now) => DeviceStatus::Expired,
			status => status,
		}
	}

	pub fn scopes(&self) -> impl Iterator<Item = &str> {
		self.scope.split_whitespace()
	}
}
