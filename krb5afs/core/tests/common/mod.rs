// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use krb5afs_core::application::SessionOrchestrator;
use krb5afs_core::domain::config::{AfsCell, Krb5AfsConfig};
use krb5afs_core::domain::credential::{KeyBlock, TicketTimes, V4Credential, V5Credential};
use krb5afs_core::domain::kdc::{KdcClient, KdcError, ServiceRequest};
use krb5afs_core::domain::principal::Principal;
use krb5afs_core::domain::token::{AfsToken, TokenBackend, TokenError};
use krb5afs_core::domain::user::{principal_for, IdentityError, UserInfo, UserResolver};
use krb5afs_core::infrastructure::cache_file::current_ids;
use tempfile::TempDir;

pub const REALM: &str = "EXAMPLE.COM";
pub const PID: u32 = 4242;

/// Resolves every name to the current process's uid/gid, except `uids`
/// overrides and names listed as unknown.
#[derive(Default)]
pub struct MockResolver {
    pub uids: Vec<(String, u32)>,
    pub unknown: HashSet<String>,
}

impl UserResolver for MockResolver {
    fn resolve(&self, user: &str, config: &Krb5AfsConfig) -> Result<UserInfo, IdentityError> {
        if self.unknown.contains(user) {
            return Err(IdentityError::UnknownUser(user.to_string()));
        }
        let (uid, gid) = current_ids();
        let uid = self
            .uids
            .iter()
            .find(|(name, _)| name == user)
            .map_or(uid, |(_, uid)| *uid);
        Ok(UserInfo {
            name: user.to_string(),
            uid,
            gid,
            home: PathBuf::from("/home").join(user),
            principal: principal_for(user, config)?,
        })
    }
}

/// Issues service tickets for any principal not listed in `refuse`.
#[derive(Default)]
pub struct MockKdc {
    pub refuse: HashSet<String>,
    pub convert: bool,
    pub requests: RefCell<Vec<String>>,
}

impl KdcClient for MockKdc {
    fn service_credential(&self, request: &ServiceRequest<'_>) -> Result<V5Credential, KdcError> {
        let service = request.service.to_string();
        self.requests.borrow_mut().push(service.clone());
        if self.refuse.contains(&service) {
            return Err(KdcError::RequestFailed {
                service,
                message: "Server not found in Kerberos database".to_string(),
            });
        }
        let mut creds = tgt(request.tgt.client.primary());
        creds.server = request.service.clone();
        creds.keyblock = KeyBlock::new(1, vec![0x5a; 8]);
        Ok(creds)
    }

    fn convert_to_v4(&self, creds: &V5Credential) -> Result<V4Credential, KdcError> {
        if !self.convert {
            return Err(KdcError::TranslationUnsupported);
        }
        Ok(V4Credential {
            pname: creds.client.primary().to_string(),
            pinst: String::new(),
            service: creds.server.primary().to_string(),
            instance: creds.server.instance().to_string(),
            realm: creds.server.realm.clone(),
            session: [3; 8],
            lifetime: 255,
            kvno: 7,
            ticket: vec![0x11; 32],
            issue_date: 1_700_000_000,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Probe,
    Pag,
    Token { cell: String, handle: i32 },
    Release,
}

/// Records every call; `fail_cells` refuse tokens.
pub struct MockTokenBackend {
    pub available: bool,
    pub v5_tokens: bool,
    pub pag_fails: bool,
    pub fail_cells: HashSet<String>,
    pub calls: RefCell<Vec<BackendCall>>,
}

impl Default for MockTokenBackend {
    fn default() -> Self {
        Self {
            available: true,
            v5_tokens: true,
            pag_fails: false,
            fail_cells: HashSet::new(),
            calls: RefCell::new(Vec::new()),
        }
    }
}

impl MockTokenBackend {
    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.borrow().clone()
    }

    pub fn tokens(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                BackendCall::Token { cell, .. } => Some(cell),
                _ => None,
            })
            .collect()
    }
}

impl TokenBackend for MockTokenBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn is_available(&self) -> bool {
        self.calls.borrow_mut().push(BackendCall::Probe);
        self.available
    }

    fn supports_v5_tokens(&self) -> bool {
        self.v5_tokens
    }

    fn namespace_create(&self) -> Result<(), TokenError> {
        self.calls.borrow_mut().push(BackendCall::Pag);
        if self.pag_fails {
            return Err(TokenError::NamespaceCreateFailed("setpag: EPERM".to_string()));
        }
        Ok(())
    }

    fn token_acquire(&self, token: &AfsToken) -> Result<(), TokenError> {
        self.calls.borrow_mut().push(BackendCall::Token {
            cell: token.cell.clone(),
            handle: token.auth_handle,
        });
        if self.fail_cells.contains(&token.cell) {
            return Err(TokenError::acquire_failed(&token.cell, "VIOCSETTOK: EINVAL"));
        }
        Ok(())
    }

    fn token_release(&self) -> Result<(), TokenError> {
        self.calls.borrow_mut().push(BackendCall::Release);
        Ok(())
    }
}

pub fn tgt(user: &str) -> V5Credential {
    V5Credential {
        client: Principal::new(vec![user.to_string()], REALM),
        server: Principal::tgs(REALM),
        keyblock: KeyBlock::new(18, vec![0x42; 32]),
        times: TicketTimes::from_epoch(1_700_000_000, 1_700_000_000, 1_700_036_000, 0),
        is_skey: false,
        ticket_flags: 0x40e1_0000,
        addresses: Vec::new(),
        authdata: Vec::new(),
        ticket: vec![0x61, 0x82, 0x01, 0x00],
        second_ticket: Vec::new(),
    }
}

pub fn cells(names: &[&str]) -> Vec<AfsCell> {
    names
        .iter()
        .map(|name| AfsCell {
            cell: name.to_string(),
            principal_name: None,
        })
        .collect()
}

pub fn config(dir: &TempDir) -> Krb5AfsConfig {
    let mut config = Krb5AfsConfig::for_realm(REALM);
    config.ccache_dir = dir.path().to_path_buf();
    config
}

pub struct Harness {
    pub resolver: Arc<MockResolver>,
    pub kdc: Arc<MockKdc>,
    pub backend: Arc<MockTokenBackend>,
}

impl Harness {
    pub fn new(resolver: MockResolver, kdc: MockKdc, backend: MockTokenBackend) -> Self {
        Self {
            resolver: Arc::new(resolver),
            kdc: Arc::new(kdc),
            backend: Arc::new(backend),
        }
    }

    pub fn orchestrator(&self) -> SessionOrchestrator {
        SessionOrchestrator::new(
            self.resolver.clone(),
            self.backend.clone(),
            self.kdc.clone(),
            PID,
        )
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new(
            MockResolver::default(),
            MockKdc::default(),
            MockTokenBackend::default(),
        )
    }
}
