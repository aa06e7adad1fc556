// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! V4 Ticket-Cache Manager
//!
//! Writes the translated v4 credential to `<ccache_dir>/tkt<uid>_<pid>`.
//! Runs only when translation succeeded during authentication.

use tracing::{debug, info};

use super::cache_manager::{publish, CacheStatus, TicketCacheManager};
use crate::domain::cache_path::CacheFormat;
use crate::domain::config::Krb5AfsConfig;
use crate::domain::error::CacheError;
use crate::domain::stash::Stash;
use crate::domain::user::UserInfo;
use crate::infrastructure::ticket_file;

#[derive(Debug, Clone, Copy)]
pub struct V4CacheManager {
    pid: u32,
}

impl V4CacheManager {
    pub fn new(pid: u32) -> Self {
        Self { pid }
    }
}

impl TicketCacheManager for V4CacheManager {
    fn format(&self) -> CacheFormat {
        CacheFormat::V4
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
        let Some(creds) = stash.v4() else {
            if config.debug {
                debug!(user = %user.name, "No v4 credential; skipping ticket file");
            }
            return Ok(CacheStatus::NotInitialized);
        };

        let handle = self.handle(stash.uid(), stash.gid(), config)?;
        let contents = ticket_file::encode(&[creds]).map_err(|source| CacheError::Codec {
            path: handle.path().to_path_buf(),
            source,
        })?;

        publish(&handle, &contents, |existing| match ticket_file::decode(existing) {
            Ok(file) if file.pname == creds.pname && file.pinst == creds.pinst => None,
            Ok(file) if file.pinst.is_empty() => Some(file.pname),
            Ok(file) => Some(format!("{}.{}", file.pname, file.pinst)),
            Err(_) => Some("an unreadable ticket file".to_string()),
        })?;

        info!(
            user = %user.name,
            path = %handle.path().display(),
            "Wrote v4 ticket file"
        );
        Ok(CacheStatus::Written(handle))
    }
}
