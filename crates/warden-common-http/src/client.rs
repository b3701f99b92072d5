// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! reqwest clients with a consistent User-Agent.

use reqwest::{Client, ClientBuilder};
use std::time::Duration;

/// Client builder preconfigured with [`user_agent`].
pub fn builder() -> ClientBuilder {
	Client::builder().user_agent(user_agent())
}

/// Build a client whose requests time out after `timeout`.
pub fn new_client(timeout: Duration) -> reqwest::Result<Client> {
	builder().timeout(timeout).build()
}

/// `warden/{version} ({os}-{arch})`
pub fn user_agent() -> String {
	format!(
		"warden/{} ({}-{})",
		env!("CARGO_PKG_VERSION"),
		std::env::consts::OS,
		std::env::consts::ARCH
	)
}
