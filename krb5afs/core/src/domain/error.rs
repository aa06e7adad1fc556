// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Error taxonomy
//!
//! Component errors compose into `SessionError`, and `SessionError::host_code`
//! is the one place where an internal failure becomes a host result code.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Session error taxonomy and host code table

use std::path::PathBuf;

use thiserror::Error;

use super::cache_path::PathError;
use super::config::ConfigError;
use super::kdc::KdcError;
use super::stash::StashError;
use super::token::TokenError;
use super::user::IdentityError;

pub const PAM_SUCCESS: i32 = 0;
pub const PAM_SERVICE_ERR: i32 = 3;
pub const PAM_IGNORE: i32 = 25;

/// Malformed or unencodable cache contents.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("Unexpected end of data reading {field} at offset {offset}")]
    Truncated { field: &'static str, offset: usize },

    #[error("Unsupported credential cache version 0x{0:04x}")]
    UnsupportedVersion(u16),

    #[error("{field} is {len} bytes long and cannot be encoded")]
    FieldTooLong { field: &'static str, len: usize },

    #[error("{0} is not valid UTF-8")]
    InvalidUtf8(&'static str),

    #[error("{0} contains a NUL byte")]
    EmbeddedNul(&'static str),

    #[error("Cache holds no credentials")]
    NoCredentials,
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Path(#[from] PathError),

    #[error("Cache {path} is occupied by {existing}")]
    Occupied { path: PathBuf, existing: String },

    #[error("Cache I/O on {path} failed: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot give {path} to {uid}:{gid}: {source}")]
    Ownership {
        path: PathBuf,
        uid: u32,
        gid: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed cache {path}: {source}")]
    Codec {
        path: PathBuf,
        #[source]
        source: CodecError,
    },
}

impl CacheError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CacheError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result code returned to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostCode {
    Success,
    /// Success without a Kerberos identity; nothing was done.
    SuccessNoOp,
    ServiceError,
    IgnoreUser,
}

impl HostCode {
    pub fn as_pam(self) -> i32 {
        match self {
            HostCode::Success | HostCode::SuccessNoOp => PAM_SUCCESS,
            HostCode::ServiceError => PAM_SERVICE_ERR,
            HostCode::IgnoreUser => PAM_IGNORE,
        }
    }

    pub fn is_success(self) -> bool {
        matches!(self, HostCode::Success | HostCode::SuccessNoOp)
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("User {user} (uid {uid}) is below minimum uid {minimum}")]
    UserIgnored { user: String, uid: u32, minimum: u32 },

    #[error("No Kerberos credentials for {0}")]
    CredentialMissing(String),

    #[error("Ticket cache error: {0}")]
    CacheIo(#[from] CacheError),

    #[error("Kerberos 4 translation failed: {0}")]
    Translation(#[from] KdcError),

    #[error("Credential store error: {0}")]
    Stash(#[from] StashError),

    #[error("Token backend error: {0}")]
    TokenBackend(#[from] TokenError),

    #[error("Invalid session path: {0}")]
    Path(#[from] PathError),
}

impl SessionError {
    /// Host result code for this failure.
    pub fn host_code(&self) -> HostCode {
        match self {
            SessionError::Config(_)
            | SessionError::Identity(_)
            | SessionError::CacheIo(_)
            | SessionError::Path(_) => HostCode::ServiceError,
            SessionError::UserIgnored { .. } => HostCode::IgnoreUser,
            SessionError::CredentialMissing(_) => HostCode::SuccessNoOp,
            SessionError::Translation(_)
            | SessionError::Stash(_)
            | SessionError::TokenBackend(_) => HostCode::Success,
        }
    }

    /// Whether the failure must abort the session.
    pub fn is_fatal(&self) -> bool {
        !self.host_code().is_success()
    }
}
