// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! KDC client interface
//!
//! Protocol messages are never encoded here; obtaining service tickets and
//! 524 translation are delegated to an installed Kerberos client through
//! this trait.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Port for KDC access, implemented in the infrastructure layer

use std::path::PathBuf;

use thiserror::Error;

use super::credential::{V4Credential, V5Credential};
use super::principal::Principal;

#[derive(Debug, Error)]
pub enum KdcError {
    #[error("KDC request for {service} failed: {message}")]
    RequestFailed { service: String, message: String },

    #[error("No credential for {0} was returned")]
    NoCredential(String),

    #[error("Kerberos 4 translation is not supported by this client")]
    TranslationUnsupported,

    #[error("Kerberos 4 translation failed: {0}")]
    TranslationFailed(String),

    #[error("Refusing to run Kerberos client without an absolute path: {0}")]
    UntrustedProgram(PathBuf),

    #[error("Failed to run Kerberos client: {0}")]
    Io(#[from] std::io::Error),
}

/// A request for a service ticket.
#[derive(Debug)]
pub struct ServiceRequest<'a> {
    /// Ticket-granting credential the request is made with.
    pub tgt: &'a V5Credential,
    pub service: Principal,
    /// Credential cache that already holds `tgt`, when one exists.
    pub ccache: Option<PathBuf>,
}

pub trait KdcClient {
    /// Obtain a v5 credential for `request.service`.
    fn service_credential(&self, request: &ServiceRequest<'_>) -> Result<V5Credential, KdcError>;

    /// Translate a v5 credential into its v4 equivalent through the 524 service.
    fn convert_to_v4(&self, creds: &V5Credential) -> Result<V4Credential, KdcError>;
}
