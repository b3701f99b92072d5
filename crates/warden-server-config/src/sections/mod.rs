// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections for warden-server.

pub mod authz;
pub mod database;
pub mod device;
pub mod http;
pub mod logging;
pub mod token;

pub use authz::{AuthzConfig, AuthzConfigLayer, AuthzRole};
pub use database::{DatabaseConfig, DatabaseConfigLayer};
pub use device::{DeviceConfig, DeviceConfigLayer};
pub use http::{HttpConfig, HttpConfigLayer};
pub use logging::{LogFormat, LoggingConfig, LoggingConfigLayer};
pub use token::{TokenConfig, TokenConfigLayer, TokenSecrets};
