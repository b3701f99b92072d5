// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// An application allowed to start the device flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
	pub client_id: String,
	pub name: String,
}

#[async_trait]
pub trait ClientRegistry: Send + Sync {
	async fn lookup(&self, client_id: &str) -> Result<Option<Client>>;
}

/// Fixed set of clients, typically from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticClientRegistry {
	clients: HashMap<String, Client>,
}

impl StaticClientRegistry {
	pub fn new(clients: impl IntoIterator<Item = Client>) -> Self {
		Self {
			clients: clients
				.into_iter()
				.map(|client| (client.client_id.clone(), client))
				.collect(),
		}
	}

	/// Clients named after their ids.
	pub fn from_ids(ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
		Self::new(ids.into_iter().map(|id| {
			let id = id.into();
			Client {
				name: id.clone(),
				client_id: id,
			}
		}))
	}
}

#[async_trait]
impl ClientRegistry for StaticClientRegistry {
	async fn lookup(&self, client_id: &str) -> Result<Option<Client>> {
		Ok(self.clients.get(client_id).cloned())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn looks_up_known_ids_only() {
		let registry = StaticClientRegistry::from_ids(["warden-cli"]);
		let client = registry.lookup("warden-cli").await.unwrap().unwrap();
		assert_eq!(client.name, "warden-cli");
		assert!(registry.lookup("other").await.unwrap().is_none());
	}
}
