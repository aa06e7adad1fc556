// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! AFS tokens
//!
//! Token values, the capability interface of the token backend, and the
//! per-cell outcome report of one acquisition run.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Token Backend port with a null-object fallback

use std::path::Path;

use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::credential::{V4Credential, V5Credential};

/// Largest ticket the kernel module accepts in a token.
pub const MAX_TICKET_LEN: usize = 12000;

/// Authentication handle marking an rxkad token built from a raw v5 ticket.
pub const RXKAD_V5_HANDLE: i32 = 256;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("No AFS token backend is available")]
    BackendUnavailable,

    #[error("Failed to create a new PAG: {0}")]
    NamespaceCreateFailed(String),

    #[error("Failed to obtain a token for {cell}: {reason}")]
    TokenAcquireFailed { cell: String, reason: String },

    #[error("Ticket is {0} bytes long, limit is {MAX_TICKET_LEN}")]
    TicketTooLarge(usize),

    #[error("Session key is {0} bytes long, tokens need an 8-byte key")]
    BadKeyLength(usize),

    #[error("Failed to discard tokens: {0}")]
    ReleaseFailed(String),

    #[error("Cannot determine the cell of {path}: {reason}")]
    CellLookupFailed { path: String, reason: String },
}

impl TokenError {
    pub fn acquire_failed(cell: &str, reason: impl ToString) -> Self {
        TokenError::TokenAcquireFailed {
            cell: cell.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Credential route a token was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRoute {
    V4,
    V5,
}

/// A token ready for installation into the kernel.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct AfsToken {
    #[zeroize(skip)]
    pub cell: String,
    pub auth_handle: i32,
    pub session_key: [u8; 8],
    pub ticket: Vec<u8>,
    pub vice_id: i32,
    pub begin: i32,
    pub end: i32,
    pub primary: bool,
}

impl AfsToken {
    /// Token keyed by a v4 credential; the handle is the key version.
    pub fn from_v4(cell: &str, creds: &V4Credential, vice_id: u32) -> Result<Self, TokenError> {
        check_ticket_len(creds.ticket.len())?;
        Ok(Self {
            cell: cell.to_string(),
            auth_handle: creds.kvno,
            session_key: creds.session,
            ticket: creds.ticket.clone(),
            vice_id: vice_id as i32,
            begin: creds.issue_date,
            end: clamp_time(creds.expires_at().timestamp()),
            primary: false,
        })
    }

    /// Token carrying a raw v5 ticket.
    pub fn from_v5(cell: &str, creds: &V5Credential, vice_id: u32) -> Result<Self, TokenError> {
        check_ticket_len(creds.ticket.len())?;
        let session_key: [u8; 8] = creds
            .keyblock
            .contents
            .as_slice()
            .try_into()
            .map_err(|_| TokenError::BadKeyLength(creds.keyblock.len()))?;
        Ok(Self {
            cell: cell.to_string(),
            auth_handle: RXKAD_V5_HANDLE,
            session_key,
            ticket: creds.ticket.clone(),
            vice_id: vice_id as i32,
            begin: clamp_time(creds.times.valid_from().timestamp()),
            end: clamp_time(creds.times.endtime.timestamp()),
            primary: false,
        })
    }

    pub fn route(&self) -> TokenRoute {
        if self.auth_handle == RXKAD_V5_HANDLE {
            TokenRoute::V5
        } else {
            TokenRoute::V4
        }
    }
}

impl std::fmt::Debug for AfsToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AfsToken")
            .field("cell", &self.cell)
            .field("auth_handle", &self.auth_handle)
            .field("ticket_len", &self.ticket.len())
            .field("vice_id", &self.vice_id)
            .field("begin", &self.begin)
            .field("end", &self.end)
            .finish()
    }
}

fn check_ticket_len(len: usize) -> Result<(), TokenError> {
    if len > MAX_TICKET_LEN {
        return Err(TokenError::TicketTooLarge(len));
    }
    Ok(())
}

fn clamp_time(secs: i64) -> i32 {
    secs.clamp(0, i64::from(i32::MAX)) as i32
}

/// Capability interface of a token backend.
///
/// Implementations are selected once at startup; `NullTokenBackend` stands
/// in when no kernel support is present.
pub trait TokenBackend {
    fn name(&self) -> &'static str;

    fn is_available(&self) -> bool;

    /// Whether tokens may be built from raw v5 tickets.
    fn supports_v5_tokens(&self) -> bool;

    /// Put the calling process into a fresh PAG.
    fn namespace_create(&self) -> Result<(), TokenError>;

    fn token_acquire(&self, token: &AfsToken) -> Result<(), TokenError>;

    /// Discard every token of the current PAG.
    fn token_release(&self) -> Result<(), TokenError>;

    /// Name of the cell that serves `path`.
    fn cell_of_path(&self, path: &Path) -> Result<String, TokenError> {
        Err(TokenError::CellLookupFailed {
            path: path.display().to_string(),
            reason: format!("{} backend cannot resolve cells", self.name()),
        })
    }
}

/// Backend used when no AFS client is loaded.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTokenBackend;

impl TokenBackend for NullTokenBackend {
    fn name(&self) -> &'static str {
        "null"
    }

    fn is_available(&self) -> bool {
        false
    }

    fn supports_v5_tokens(&self) -> bool {
        false
    }

    fn namespace_create(&self) -> Result<(), TokenError> {
        Err(TokenError::BackendUnavailable)
    }

    fn token_acquire(&self, _token: &AfsToken) -> Result<(), TokenError> {
        Err(TokenError::BackendUnavailable)
    }

    fn token_release(&self) -> Result<(), TokenError> {
        Ok(())
    }
}

/// Why an acquisition run did not contact the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoCells,
    IgnoreAfs,
    BackendUnavailable,
    NoCredentials,
    /// A fresh PAG was requested but could not be created.
    NamespaceCreateFailed,
}

/// Result of acquiring a token for one cell.
#[derive(Debug)]
pub struct CellOutcome {
    pub cell: String,
    pub result: Result<TokenRoute, TokenError>,
}

impl CellOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Outcome of one `tokens_obtain` run, in cell order.
#[derive(Debug, Default)]
pub struct TokenReport {
    pub namespace_created: bool,
    pub skipped: Option<SkipReason>,
    pub cells: Vec<CellOutcome>,
}

impl TokenReport {
    pub fn skipped(reason: SkipReason) -> Self {
        Self {
            skipped: Some(reason),
            ..Self::default()
        }
    }

    pub fn obtained(&self) -> impl Iterator<Item = &str> {
        self.cells
            .iter()
            .filter(|c| c.is_ok())
            .map(|c| c.cell.as_str())
    }

    pub fn failed(&self) -> impl Iterator<Item = &CellOutcome> {
        self.cells.iter().filter(|c| !c.is_ok())
    }
}
