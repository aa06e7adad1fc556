// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Credential Stash
//!
//! Session-scoped container binding one user's credentials for the life of a
//! session. The authentication phase fills in the v5 credential (and, when
//! translation succeeded, the v4 one); the session hooks read it back to write
//! ticket caches and obtain tokens. Key material is scrubbed when the stash is
//! destroyed or dropped.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Credential Store; performs no I/O

use std::collections::HashMap;

use thiserror::Error;
use tracing::debug;
use zeroize::Zeroize;

use super::credential::{V4Credential, V5Credential};
use super::user::UserInfo;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StashError {
    #[error("Cannot store a v4 credential before the v5 credential is initialized")]
    V5NotInitialized,
}

/// Credentials held for one session.
#[derive(Debug)]
pub struct Stash {
    uid: u32,
    gid: u32,
    v5: Option<V5Credential>,
    v4: Option<V4Credential>,
}

impl Stash {
    /// An empty stash for the given owner.
    pub fn create(uid: u32, gid: u32) -> Self {
        Self {
            uid,
            gid,
            v5: None,
            v4: None,
        }
    }

    pub fn uid(&self) -> u32 {
        self.uid
    }

    pub fn gid(&self) -> u32 {
        self.gid
    }

    /// Store the v5 credential, scrubbing any previous one. A previously
    /// translated v4 credential no longer matches and is discarded.
    pub fn set_v5(&mut self, creds: V5Credential) {
        if let Some(mut old) = self.v5.replace(creds) {
            old.zeroize();
        }
        if let Some(mut old) = self.v4.take() {
            old.zeroize();
        }
    }

    /// Store the translated v4 credential.
    pub fn set_v4(&mut self, creds: V4Credential) -> Result<(), StashError> {
        if self.v5.is_none() {
            return Err(StashError::V5NotInitialized);
        }
        if let Some(mut old) = self.v4.replace(creds) {
            old.zeroize();
        }
        Ok(())
    }

    pub fn is_v5_initialized(&self) -> bool {
        self.v5.is_some()
    }

    pub fn v4_present(&self) -> bool {
        self.v4.is_some()
    }

    pub fn v5(&self) -> Option<&V5Credential> {
        self.v5.as_ref()
    }

    pub fn v4(&self) -> Option<&V4Credential> {
        self.v4.as_ref()
    }

    /// Zero all embedded secret material and forget the credentials.
    pub fn scrub(&mut self) {
        if let Some(mut v5) = self.v5.take() {
            v5.zeroize();
        }
        if let Some(mut v4) = self.v4.take() {
            v4.zeroize();
        }
    }

    /// Scrub and release the stash.
    pub fn destroy(mut self) {
        self.scrub();
    }
}

impl Drop for Stash {
    fn drop(&mut self) {
        self.scrub();
    }
}

/// Per-process registry of stashes, keyed by principal name.
///
/// The authentication phase deposits a stash here; the session hooks look it
/// up again. A lookup for a user with no deposited stash yields a fresh empty
/// one, which downstream treats as a local (non-Kerberos) account.
#[derive(Debug, Default)]
pub struct StashRegistry {
    stashes: HashMap<String, Stash>,
}

impl StashRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(user: &UserInfo) -> String {
        user.principal.to_string()
    }

    /// Deposit a stash for `user`, scrubbing any stash it replaces.
    pub fn insert(&mut self, user: &UserInfo, stash: Stash) {
        if let Some(old) = self.stashes.insert(Self::key(user), stash) {
            old.destroy();
        }
    }

    pub fn get_or_create(&mut self, user: &UserInfo) -> &mut Stash {
        self.stashes.entry(Self::key(user)).or_insert_with(|| {
            debug!(user = %user.name, "No stash deposited; creating an empty one");
            Stash::create(user.uid, user.gid)
        })
    }

    pub fn get(&self, user: &UserInfo) -> Option<&Stash> {
        self.stashes.get(&Self::key(user))
    }

    /// Scrub and drop the stash for `user`. Returns whether one existed.
    pub fn remove(&mut self, user: &UserInfo) -> bool {
        match self.stashes.remove(&Self::key(user)) {
            Some(stash) => {
                stash.destroy();
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.stashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stashes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::credential::fixtures;
    use crate::domain::principal::Principal;
    use std::path::PathBuf;

    fn user(name: &str, uid: u32) -> UserInfo {
        UserInfo {
            name: name.to_string(),
            uid,
            gid: uid,
            home: PathBuf::from("/home").join(name),
            principal: Principal::parse(name, Some("EXAMPLE.COM")).unwrap(),
        }
    }

    #[test]
    fn test_create_is_empty() {
        let stash = Stash::create(1001, 100);
        assert_eq!(stash.uid(), 1001);
        assert_eq!(stash.gid(), 100);
        assert!(!stash.is_v5_initialized());
        assert!(!stash.v4_present());
    }

    #[test]
    fn test_set_v4_requires_v5() {
        let mut stash = Stash::create(1001, 100);
        assert_eq!(
            stash.set_v4(fixtures::v4("alice", "EXAMPLE.COM")),
            Err(StashError::V5NotInitialized)
        );

        stash.set_v5(fixtures::tgt("alice", "EXAMPLE.COM"));
        assert!(stash.is_v5_initialized());
        stash.set_v4(fixtures::v4("alice", "EXAMPLE.COM")).unwrap();
        assert!(stash.v4_present());
    }

    #[test]
    fn test_replacing_v5_discards_v4() {
        let mut stash = Stash::create(1001, 100);
        stash.set_v5(fixtures::tgt("alice", "EXAMPLE.COM"));
        stash.set_v4(fixtures::v4("alice", "EXAMPLE.COM")).unwrap();

        stash.set_v5(fixtures::tgt("alice", "EXAMPLE.COM"));
        assert!(stash.is_v5_initialized());
        assert!(!stash.v4_present());
    }

    #[test]
    fn test_scrub_forgets_credentials() {
        let mut stash = Stash::create(1001, 100);
        stash.set_v5(fixtures::tgt("alice", "EXAMPLE.COM"));
        stash.set_v4(fixtures::v4("alice", "EXAMPLE.COM")).unwrap();

        stash.scrub();
        assert!(!stash.is_v5_initialized());
        assert!(!stash.v4_present());
    }

    #[test]
    fn test_registry_get_or_create() {
        let mut registry = StashRegistry::new();
        let alice = user("alice", 1001);

        assert!(registry.get(&alice).is_none());
        let stash = registry.get_or_create(&alice);
        assert_eq!(stash.uid(), 1001);
        assert!(!stash.is_v5_initialized());
        stash.set_v5(fixtures::tgt("alice", "EXAMPLE.COM"));

        assert!(registry.get_or_create(&alice).is_v5_initialized());
        assert_eq!(registry.len(), 1);

        assert!(registry.remove(&alice));
        assert!(!registry.remove(&alice));
        assert!(registry.is_empty());
    }
}
