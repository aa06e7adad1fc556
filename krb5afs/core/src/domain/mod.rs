// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Credential, cache, token, and identity types with the ports the
//! application layer drives.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Values, traits, and the error taxonomy; no I/O

pub mod cache_path;
pub mod config;
pub mod credential;
pub mod error;
pub mod kdc;
pub mod principal;
pub mod stash;
pub mod token;
pub mod user;
