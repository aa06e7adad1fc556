// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Ticket cache manager contract
//!
//! Both cache managers derive their path from `(uid, pid)`, publish through
//! an atomic rename, and remove best-effort. The shared mechanics live here.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** `TicketCacheManager` trait and publication helpers

use tracing::{debug, info, warn};

use crate::domain::cache_path::{CacheFormat, TicketCacheHandle};
use crate::domain::config::Krb5AfsConfig;
use crate::domain::error::CacheError;
use crate::domain::stash::Stash;
use crate::domain::user::UserInfo;
use crate::infrastructure::cache_file;

/// Result of a `save` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheStatus {
    Written(TicketCacheHandle),
    /// The stash holds no credential for this format; nothing was written.
    NotInitialized,
}

impl CacheStatus {
    pub fn handle(&self) -> Option<&TicketCacheHandle> {
        match self {
            CacheStatus::Written(handle) => Some(handle),
            CacheStatus::NotInitialized => None,
        }
    }
}

pub trait TicketCacheManager {
    fn format(&self) -> CacheFormat;

    /// Process id the cache names are keyed by.
    fn pid(&self) -> u32;

    /// Write the stash's credential for this format to its session cache.
    fn save(
        &self,
        stash: &Stash,
        user: &UserInfo,
        config: &Krb5AfsConfig,
    ) -> Result<CacheStatus, CacheError>;

    fn handle(&self, uid: u32, gid: u32, config: &Krb5AfsConfig) -> Result<TicketCacheHandle, CacheError> {
        Ok(TicketCacheHandle::derive(
            &config.ccache_dir,
            self.format(),
            uid,
            gid,
            self.pid(),
        )?)
    }

    /// Remove the session cache. Never fails; returns whether a file was removed.
    fn destroy(&self, stash: &Stash, config: &Krb5AfsConfig) -> bool {
        let handle = match self.handle(stash.uid(), stash.gid(), config) {
            Ok(handle) => handle,
            Err(e) => {
                warn!(format = %self.format(), error = %e, "Cannot derive cache path for removal");
                return false;
            }
        };
        match cache_file::remove(handle.path()) {
            Ok(true) => {
                info!(path = %handle.path().display(), "Removed {}", self.format());
                true
            }
            Ok(false) => {
                if config.debug {
                    debug!(path = %handle.path().display(), "No {} to remove", self.format());
                }
                false
            }
            Err(e) => {
                warn!(error = %e, "Failed to remove {}", self.format());
                false
            }
        }
    }
}

/// Publish `contents` at `handle` unless another identity holds the file.
///
/// `occupant` names the identity stored in an existing file, or `None` when
/// it belongs to the same identity and may be replaced.
pub(crate) fn publish(
    handle: &TicketCacheHandle,
    contents: &[u8],
    occupant: impl FnOnce(&[u8]) -> Option<String>,
) -> Result<(), CacheError> {
    if let Some(existing) = cache_file::read_existing(handle.path())? {
        if let Some(other) = occupant(existing.as_slice()) {
            return Err(CacheError::Occupied {
                path: handle.path().to_path_buf(),
                existing: other,
            });
        }
    }
    cache_file::write_atomic(handle.path(), contents, handle.uid(), handle.gid())
}
