// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! OAuth 2.0 Device Authorization Grant ([RFC 8628]).
//!
//! A device with no browser asks for a code pair, shows the user code to a
//! person, and polls until that person approves or denies it elsewhere.
//! Approval and redemption are atomic at the store so that neither can
//! happen twice for the same code.
//!
//! [RFC 8628]: https://www.rfc-editor.org/rfc/rfc8628

pub mod client;
pub mod codes;
pub mod error;
pub mod flow;
pub mod model;
pub mod store;

pub use client::{Client, ClientRegistry, StaticClientRegistry};
pub use codes::{generate_device_code, generate_user_code, is_valid_user_code_format, normalize_user_code};
pub use error::{DeviceFlowError, Result};
pub use flow::{DeviceAuthorizationResponse, DeviceFlow, DeviceFlowConfig, DeviceTokenResponse};
pub use model::{DeviceAuthorization, DeviceStatus};
pub use store::{DeviceCodeStore, MemoryDeviceCodeStore};
