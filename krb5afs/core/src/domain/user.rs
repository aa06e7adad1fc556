// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! User identity
//!
//! Maps a login name to the local account and the Kerberos principal it
//! authenticates as.

use std::path::PathBuf;

use thiserror::Error;

use super::config::Krb5AfsConfig;
use super::principal::{Principal, PrincipalError};

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Unknown user: {0}")]
    UnknownUser(String),

    #[error("Invalid login name: {0:?}")]
    InvalidName(String),

    #[error("Cannot build a principal for {user}: {source}")]
    Principal {
        user: String,
        #[source]
        source: PrincipalError,
    },

    #[error("Password database lookup for {user} failed: {message}")]
    Lookup { user: String, message: String },
}

/// Resolved identity of the session's user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    pub name: String,
    pub uid: u32,
    pub gid: u32,
    pub home: PathBuf,
    pub principal: Principal,
}

/// Resolves login names to identities.
pub trait UserResolver {
    fn resolve(&self, user: &str, config: &Krb5AfsConfig) -> Result<UserInfo, IdentityError>;
}

/// Build the principal for `user`, applying the first matching name mapping.
pub fn principal_for(user: &str, config: &Krb5AfsConfig) -> Result<Principal, IdentityError> {
    let mapped = config
        .mappings
        .iter()
        .find_map(|m| m.apply(user))
        .unwrap_or_else(|| user.to_string());

    Principal::parse(&mapped, Some(&config.realm)).map_err(|source| IdentityError::Principal {
        user: user.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::NameMapping;

    #[test]
    fn test_principal_without_mapping_uses_realm() {
        let config = Krb5AfsConfig::for_realm("EXAMPLE.COM");
        let p = principal_for("alice", &config).unwrap();
        assert_eq!(p.to_string(), "alice@EXAMPLE.COM");
    }

    #[test]
    fn test_principal_with_mapping() {
        let mut config = Krb5AfsConfig::for_realm("EXAMPLE.COM");
        config.mappings = vec![
            NameMapping::new("^ad-(.*)$", "$1@AD.EXAMPLE.COM").unwrap(),
            NameMapping::new("^(.*)\\.admin$", "$1/admin").unwrap(),
        ];

        assert_eq!(
            principal_for("ad-bob", &config).unwrap().to_string(),
            "bob@AD.EXAMPLE.COM"
        );
        assert_eq!(
            principal_for("carol.admin", &config).unwrap().to_string(),
            "carol/admin@EXAMPLE.COM"
        );
        assert_eq!(
            principal_for("dave", &config).unwrap().to_string(),
            "dave@EXAMPLE.COM"
        );
    }
}
