// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! AFS Token Manager
//!
//! Obtains one token per configured cell, inside a fresh PAG when isolation
//! is requested, and discards them again at session close.
//!
//! Acquisition never fails the session: an unavailable backend is logged as
//! an error, and each cell succeeds or fails on its own.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Token acquisition and release use cases over `TokenBackend`

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::domain::config::{AfsCell, Krb5AfsConfig};
use crate::domain::credential::V5Credential;
use crate::domain::kdc::{KdcClient, ServiceRequest};
use crate::domain::principal::Principal;
use crate::domain::stash::Stash;
use crate::domain::token::{
    AfsToken, CellOutcome, SkipReason, TokenBackend, TokenError, TokenReport, TokenRoute,
};

/// Service principals tried for `cell`, in order.
pub fn service_candidates(cell: &AfsCell, realm: &str) -> Result<Vec<Principal>, TokenError> {
    match &cell.principal_name {
        Some(name) => Principal::parse(name, Some(realm))
            .map(|p| vec![p])
            .map_err(|e| TokenError::acquire_failed(&cell.cell, e)),
        None => Ok(vec![
            Principal::service("afs", Some(&cell.cell), realm),
            Principal::service("afs", None, realm),
        ]),
    }
}

pub struct TokenManager {
    backend: Arc<dyn TokenBackend>,
    kdc: Arc<dyn KdcClient>,
    prefer_v5: bool,
}

impl TokenManager {
    pub fn new(backend: Arc<dyn TokenBackend>, kdc: Arc<dyn KdcClient>) -> Self {
        Self {
            backend,
            kdc,
            prefer_v5: false,
        }
    }

    /// Try the raw v5 route before the v4 one.
    pub fn prefer_v5(mut self, prefer: bool) -> Self {
        self.prefer_v5 = prefer;
        self
    }

    pub fn backend(&self) -> &dyn TokenBackend {
        self.backend.as_ref()
    }

    /// Obtain tokens for every configured cell.
    ///
    /// `ccache` names a cache already holding the TGT, letting the KDC client
    /// store service tickets alongside it.
    pub fn tokens_obtain(
        &self,
        stash: &Stash,
        config: &Krb5AfsConfig,
        ccache: Option<&Path>,
    ) -> TokenReport {
        if config.ignore_afs {
            return TokenReport::skipped(SkipReason::IgnoreAfs);
        }
        let cells = config.token_cells();
        if cells.is_empty() {
            if config.debug {
                debug!("No AFS cells configured");
            }
            return TokenReport::skipped(SkipReason::NoCells);
        }
        if !self.backend.is_available() {
            error!(
                cells = cells.len(),
                backend = self.backend.name(),
                "AFS cells configured but no token backend is available"
            );
            return TokenReport::skipped(SkipReason::BackendUnavailable);
        }
        let Some(tgt) = stash.v5() else {
            debug!("No v5 credential; not obtaining tokens");
            return TokenReport::skipped(SkipReason::NoCredentials);
        };

        let mut report = TokenReport::default();
        if config.isolate_tokens {
            if let Err(e) = self.backend.namespace_create() {
                error!(error = %e, "Cannot isolate tokens; not obtaining any");
                report.skipped = Some(SkipReason::NamespaceCreateFailed);
                return report;
            }
            report.namespace_created = true;
        }

        for cell in cells {
            let result = self.acquire_cell(cell, tgt, stash, ccache);
            match &result {
                Ok(route) => info!(cell = %cell.cell, route = ?route, "Obtained AFS token"),
                Err(e) => info!(cell = %cell.cell, error = %e, "No AFS token"),
            }
            report.cells.push(CellOutcome {
                cell: cell.cell.clone(),
                result,
            });
        }
        report
    }

    /// Obtain tokens for explicitly named cells, without a new PAG.
    pub fn tokens_for_cells(
        &self,
        stash: &Stash,
        cells: &[AfsCell],
        ccache: Option<&Path>,
    ) -> TokenReport {
        let Some(tgt) = stash.v5() else {
            return TokenReport::skipped(SkipReason::NoCredentials);
        };
        if !self.backend.is_available() {
            return TokenReport::skipped(SkipReason::BackendUnavailable);
        }
        let cells = cells
            .iter()
            .map(|cell| CellOutcome {
                cell: cell.cell.clone(),
                result: self.acquire_cell(cell, tgt, stash, ccache),
            })
            .collect();
        TokenReport {
            namespace_created: false,
            skipped: None,
            cells,
        }
    }

    fn acquire_cell(
        &self,
        cell: &AfsCell,
        tgt: &V5Credential,
        stash: &Stash,
        ccache: Option<&Path>,
    ) -> Result<TokenRoute, TokenError> {
        let mut last_error = None;
        for service in service_candidates(cell, &tgt.client.realm)? {
            let request = ServiceRequest {
                tgt,
                service,
                ccache: ccache.map(Path::to_path_buf),
            };
            match self.kdc.service_credential(&request) {
                Ok(creds) => return self.install(&cell.cell, &creds, stash),
                Err(e) => {
                    debug!(cell = %cell.cell, service = %request.service, error = %e, "Service ticket unavailable");
                    last_error = Some(e);
                }
            }
        }
        Err(TokenError::acquire_failed(
            &cell.cell,
            last_error.map_or_else(|| "no service principal".to_string(), |e| e.to_string()),
        ))
    }

    fn install(&self, cell: &str, creds: &V5Credential, stash: &Stash) -> Result<TokenRoute, TokenError> {
        let routes = if self.prefer_v5 {
            [TokenRoute::V5, TokenRoute::V4]
        } else {
            [TokenRoute::V4, TokenRoute::V5]
        };

        let mut last_error = None;
        for route in routes {
            let token = match route {
                TokenRoute::V4 if stash.v4_present() => self
                    .kdc
                    .convert_to_v4(creds)
                    .map_err(|e| TokenError::acquire_failed(cell, e))
                    .and_then(|v4| AfsToken::from_v4(cell, &v4, stash.uid())),
                TokenRoute::V5 if self.backend.supports_v5_tokens() => {
                    AfsToken::from_v5(cell, creds, stash.uid())
                }
                _ => continue,
            };
            match token.and_then(|token| self.backend.token_acquire(&token)) {
                Ok(()) => return Ok(route),
                Err(e) => {
                    debug!(cell, route = ?route, error = %e, "Token route failed");
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| TokenError::acquire_failed(cell, "no usable credential route")))
    }

    /// Discard the session's tokens. Only tokens in a PAG created for this
    /// session are touched; returns whether a release was performed.
    pub fn tokens_release(&self, config: &Krb5AfsConfig) -> bool {
        if config.ignore_afs || !config.isolate_tokens || config.token_cells().is_empty() {
            return false;
        }
        if !self.backend.is_available() {
            if config.debug {
                debug!("No token backend; nothing to release");
            }
            return false;
        }
        match self.backend.token_release() {
            Ok(()) => {
                info!("Discarded AFS tokens");
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to discard AFS tokens");
                false
            }
        }
    }
}
