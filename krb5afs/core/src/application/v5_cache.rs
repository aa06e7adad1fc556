// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! V5 Ticket-Cache Manager
//!
//! Writes the stashed v5 credential to `<ccache_dir>/krb5cc_<uid>_<pid>`.
//! A stash without a v5 credential yields `CacheStatus::NotInitialized` so
//! local accounts pass through untouched.

use tracing::{debug, info};

use super::cache_manager::{publish, CacheStatus, TicketCacheManager};
use crate::domain::cache_path::CacheFormat;
use crate::domain::config::Krb5AfsConfig;
use crate::domain::error::CacheError;
use crate::domain::stash::Stash;
use crate::domain::user::UserInfo;
use crate::infrastructure::ccache;

#[derive(Debug, Clone, Copy)]
pub struct V5CacheManager {
    pid: u32,
}

impl V5CacheManager {
    pub fn new(pid: u32) -> Self {
        Self { pid }
    }
}

impl TicketCacheManager for V5CacheManager {
    fn format(&self) -> CacheFormat {
        CacheFormat::V5
    }

    fn pid(&self) -> u32 {
        self.pid
    }

    fn save(
        &self,
        stash: &Stash,
        user: &UserInfo,
        config: &Krb5AfsConfig,
    ) -> Result<CacheStatus, CacheError> {
        let Some(creds) = stash.v5() else {
            debug!(user = %user.name, "No v5 credential; skipping credential cache");
            return Ok(CacheStatus::NotInitialized);
        };

        let handle = self.handle(stash.uid(), stash.gid(), config)?;
        let contents =
            ccache::encode(&creds.client, &[creds]).map_err(|source| CacheError::Codec {
                path: handle.path().to_path_buf(),
                source,
            })?;

        publish(&handle, &contents, |existing| {
            match ccache::default_principal(existing) {
                Ok(principal) if principal == creds.client => None,
                Ok(principal) => Some(principal.to_string()),
                Err(_) => Some("an unreadable cache".to_string()),
            }
        })?;

        info!(
            user = %user.name,
            principal = %creds.client,
            path = %handle.path().display(),
            "Wrote v5 credential cache"
        );
        Ok(CacheStatus::Written(handle))
    }
}
