// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Device authorization grant configuration.

use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct DeviceConfig {
	pub code_ttl_secs: u64,
	pub poll_interval_secs: u64,
	/// Path appended to `http.base_url` to form the verification URI.
	pub verification_path: String,
	pub sweep_interval_secs: u64,
	/// Client ids accepted when no database client registry is populated.
	pub clients: Vec<String>,
}

impl DeviceConfig {
	pub fn code_ttl(&self) -> Duration {
		Duration::from_secs(self.code_ttl_secs)
	}

	pub fn poll_interval(&self) -> Duration {
		Duration::from_secs(self.poll_interval_secs)
	}

	pub fn sweep_interval(&self) -> Duration {
		Duration::from_secs(self.sweep_interval_secs)
	}
}

impl Default for DeviceConfig {
	fn default() -> Self {
		DeviceConfigLayer::default().finalize()
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceConfigLayer {
	#[serde(default)]
	pub code_ttl_secs: Option<u64>,
	#[serde(default)]
	pub poll_interval_secs: Option<u64>,
	#[serde(default)]
	pub verification_path: Option<String>,
	#[serde(default)]
	pub sweep_interval_secs: Option<u64>,
	#[serde(default)]
	pub clients: Option<Vec<String>>,
}

impl DeviceConfigLayer {
	pub fn merge(&mut self, other: DeviceConfigLayer) {
		if other.code_ttl_secs.is_some() {
			self.code_ttl_secs = other.code_ttl_secs;
		}
		if other.poll_interval_secs.is_some() {
			self.poll_interval_secs = other.poll_interval_secs;
		}
		if other.verification_path.is_some() {
			self.verification_path = other.verification_path;
		}
		if other.sweep_interval_secs.is_some() {
			self.sweep_interval_secs = other.sweep_interval_secs;
		}
		if other.clients.is_some() {
			self.clients = other.clients;
		}
	}

	pub fn finalize(self) -> DeviceConfig {
		DeviceConfig {
			code_ttl_secs: self.code_ttl_secs.unwrap_or(10 * 60),
			poll_interval_secs: self.poll_interval_secs.unwrap_or(5),
			verification_path: self
				.verification_path
				.unwrap_or_else(|| "/device".to_string()),
			sweep_interval_secs: self.sweep_interval_secs.unwrap_or(60),
			clients: self.clients.unwrap_or_else(|| vec!["warden-cli".to_string()]),
		}
	}
}
