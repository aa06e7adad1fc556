// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Kerberos 5 session engine with Kerberos 4 downgrade and AFS tokens.
//!
//! Materialises a user's stashed credentials into per-session ticket caches,
//! obtains AFS tokens inside an isolated PAG, and tears both down at session
//! close.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Credential lifecycle engine behind the session hooks

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use domain::*;
