// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! HTTP handlers, one module per resource.

pub mod authz;
pub mod device;
pub mod health;
pub mod policies;
pub mod tokens;
pub mod whoami;
