// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Session Orchestrator
//!
//! Sequences the cache managers and the token manager at session open and
//! close.
//!
//! Open: `Init → IdentityResolved → CredentialsRetrieved → CachesWritten →
//! TokensObtained`. Stale caches for this `(uid, pid)` are removed before new
//! ones are written. A user without Kerberos credentials passes through with
//! `HostCode::SuccessNoOp`. Once credentials are confirmed, a cache failure
//! is a service error and any cache written by this call is removed again.
//! Token problems never fail the session.
//!
//! Close: `TokensReleased → CachesRemoved → Done`. Every step is attempted
//! and close reports success once the user is resolved.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Session open/close use cases

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::cache_manager::{CacheStatus, TicketCacheManager};
use super::tokens::TokenManager;
use super::translate::translate_v4;
use super::v4_cache::V4CacheManager;
use super::v5_cache::V5CacheManager;
use crate::domain::cache_path::EnvBinding;
use crate::domain::config::Krb5AfsConfig;
use crate::domain::credential::V5Credential;
use crate::domain::error::{HostCode, SessionError};
use crate::domain::kdc::KdcClient;
use crate::domain::stash::{Stash, StashRegistry};
use crate::domain::token::{TokenBackend, TokenReport};
use crate::domain::user::{UserInfo, UserResolver};
use crate::infrastructure::cache_file;

/// Furthest point a session operation reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionPhase {
    Init,
    IdentityResolved,
    CredentialsRetrieved,
    CachesWritten,
    TokensObtained,
    TokensReleased,
    CachesRemoved,
    Done,
}

/// What a session operation did, for the host to act on.
#[derive(Debug)]
pub struct SessionOutcome {
    pub code: HostCode,
    pub phase: SessionPhase,
    /// Bindings to publish into the session environment.
    pub env: Vec<EnvBinding>,
    pub v5_cache: Option<PathBuf>,
    pub v4_cache: Option<PathBuf>,
    pub tokens: Option<TokenReport>,
    pub error: Option<SessionError>,
}

impl SessionOutcome {
    fn new() -> Self {
        Self {
            code: HostCode::Success,
            phase: SessionPhase::Init,
            env: Vec::new(),
            v5_cache: None,
            v4_cache: None,
            tokens: None,
            error: None,
        }
    }

    fn fail(mut self, error: SessionError) -> Self {
        self.code = error.host_code();
        self.error = Some(error);
        self
    }

    pub fn pam_code(&self) -> i32 {
        self.code.as_pam()
    }

    pub fn is_success(&self) -> bool {
        self.code.is_success()
    }
}

pub struct SessionOrchestrator {
    resolver: Arc<dyn UserResolver>,
    kdc: Arc<dyn KdcClient>,
    tokens: TokenManager,
    v5: V5CacheManager,
    v4: V4CacheManager,
}

impl SessionOrchestrator {
    /// An orchestrator whose cache names are keyed by `pid`.
    pub fn new(
        resolver: Arc<dyn UserResolver>,
        backend: Arc<dyn TokenBackend>,
        kdc: Arc<dyn KdcClient>,
        pid: u32,
    ) -> Self {
        Self {
            resolver,
            tokens: TokenManager::new(backend, kdc.clone()),
            kdc,
            v5: V5CacheManager::new(pid),
            v4: V4CacheManager::new(pid),
        }
    }

    fn resolve(&self, name: &str, config: &Krb5AfsConfig) -> Result<UserInfo, SessionError> {
        let user = self.resolver.resolve(name, config)?;
        if let Some(minimum) = config.minimum_uid.filter(|_| config.ignores_uid(user.uid)) {
            return Err(SessionError::UserIgnored {
                user: user.name,
                uid: user.uid,
                minimum,
            });
        }
        Ok(user)
    }

    /// Deposit freshly obtained credentials for `name`, translating them to
    /// v4 when configured. Translation failure leaves the v5 credential in
    /// place.
    pub fn stash_credentials(
        &self,
        registry: &mut StashRegistry,
        name: &str,
        creds: V5Credential,
        config: &Krb5AfsConfig,
    ) -> Result<UserInfo, SessionError> {
        let user = self.resolver.resolve(name, config)?;
        let mut stash = Stash::create(user.uid, user.gid);
        stash.set_v5(creds);
        if let Err(e) = translate_v4(&mut stash, self.kdc.as_ref(), config) {
            debug!(user = %user.name, error = %e, "Continuing without v4 credential");
        }
        registry.insert(&user, stash);
        Ok(user)
    }

    pub fn open_session(
        &self,
        registry: &mut StashRegistry,
        name: &str,
        config: &Krb5AfsConfig,
    ) -> SessionOutcome {
        let mut outcome = SessionOutcome::new();

        let user = match self.resolve(name, config) {
            Ok(user) => user,
            Err(e) => {
                log_refusal(name, &e);
                return outcome.fail(e);
            }
        };
        outcome.phase = SessionPhase::IdentityResolved;

        let stash = registry.get_or_create(&user);
        outcome.phase = SessionPhase::CredentialsRetrieved;

        // Leftovers from a crashed session with the same (uid, pid).
        self.v5.destroy(stash, config);
        self.v4.destroy(stash, config);

        if !stash.is_v5_initialized() {
            info!(user = %user.name, "No Kerberos credentials; nothing to do");
            return outcome.fail(SessionError::CredentialMissing(user.name));
        }

        match self.write_caches(stash, &user, config, &mut outcome) {
            Ok(()) => outcome.phase = SessionPhase::CachesWritten,
            Err(e) => {
                error!(user = %user.name, error = %e, "Cannot write ticket caches");
                remove_written(&mut outcome);
                return outcome.fail(e);
            }
        }

        let report = self
            .tokens
            .tokens_obtain(stash, config, outcome.v5_cache.as_deref());
        if config.debug {
            debug!(
                user = %user.name,
                obtained = report.obtained().count(),
                failed = report.failed().count(),
                "Token acquisition finished"
            );
        }
        outcome.tokens = Some(report);
        outcome.phase = SessionPhase::TokensObtained;
        outcome.code = HostCode::Success;
        outcome
    }

    fn write_caches(
        &self,
        stash: &Stash,
        user: &UserInfo,
        config: &Krb5AfsConfig,
        outcome: &mut SessionOutcome,
    ) -> Result<(), SessionError> {
        match self.v5.save(stash, user, config)? {
            CacheStatus::Written(handle) => {
                outcome.v5_cache = Some(handle.path().to_path_buf());
                outcome.env.push(handle.env_binding()?);
            }
            CacheStatus::NotInitialized => {
                return Err(SessionError::CredentialMissing(user.name.clone()));
            }
        }
        if let CacheStatus::Written(handle) = self.v4.save(stash, user, config)? {
            outcome.v4_cache = Some(handle.path().to_path_buf());
            outcome.env.push(handle.env_binding()?);
        }
        Ok(())
    }

    pub fn close_session(
        &self,
        registry: &mut StashRegistry,
        name: &str,
        config: &Krb5AfsConfig,
    ) -> SessionOutcome {
        let mut outcome = SessionOutcome::new();

        let user = match self.resolve(name, config) {
            Ok(user) => user,
            Err(e) => {
                log_refusal(name, &e);
                return outcome.fail(e);
            }
        };
        outcome.phase = SessionPhase::IdentityResolved;

        self.tokens.tokens_release(config);
        outcome.phase = SessionPhase::TokensReleased;

        let placeholder;
        let stash = match registry.get(&user) {
            Some(stash) => stash,
            None => {
                placeholder = Stash::create(user.uid, user.gid);
                &placeholder
            }
        };
        self.v5.destroy(stash, config);
        self.v4.destroy(stash, config);
        outcome.phase = SessionPhase::CachesRemoved;

        if registry.remove(&user) && config.debug {
            debug!(user = %user.name, "Credentials scrubbed");
        }
        outcome.phase = SessionPhase::Done;
        outcome
    }
}

/// Undo a partial open. Only files this call published are unlinked; a file
/// that refused the write belongs to someone else.
fn remove_written(outcome: &mut SessionOutcome) {
    for path in [outcome.v5_cache.take(), outcome.v4_cache.take()]
        .into_iter()
        .flatten()
    {
        if let Err(e) = cache_file::remove(&path) {
            warn!(path = %path.display(), error = %e, "Failed to remove ticket cache");
        }
    }
    outcome.env.clear();
}

fn log_refusal(name: &str, error: &SessionError) {
    match error.host_code() {
        HostCode::IgnoreUser => info!(user = name, "{}", error),
        _ => warn!(user = name, error = %error, "Cannot resolve session user"),
    }
}
