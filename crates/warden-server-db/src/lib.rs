// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SQLite repositories behind the Warden storage contracts.

pub mod api_key;
pub mod client;
pub mod device;
pub mod error;
pub mod policy;
pub mod pool;
pub mod principal;
pub mod schema;
mod time;

#[cfg(test)]
mod testing;

pub use api_key::ApiKeyRepository;
pub use client::ClientRepository;
pub use device::DeviceCodeRepository;
pub use error::{DbError, Result};
pub use policy::PolicyRepository;
pub use pool::create_pool;
pub use principal::PrincipalRepository;
pub use schema::run_migrations;
