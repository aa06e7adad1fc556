// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Kerberos principal names
//!
//! A principal is a sequence of name components qualified by a realm, written
//! `component/component@REALM`. Separators inside a component are escaped
//! with a backslash.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// `KRB5_NT_PRINCIPAL`
pub const NT_PRINCIPAL: i32 = 1;
/// `KRB5_NT_SRV_INST`
pub const NT_SRV_INST: i32 = 2;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PrincipalError {
    #[error("Principal name is empty")]
    Empty,

    #[error("Principal '{0}' has an empty component")]
    EmptyComponent(String),

    #[error("Principal '{0}' has no realm and no default realm was given")]
    MissingRealm(String),

    #[error("Principal '{0}' ends with a dangling escape")]
    DanglingEscape(String),
}

/// A Kerberos principal name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    pub name_type: i32,
    pub components: Vec<String>,
    pub realm: String,
}

impl Principal {
    pub fn new(components: Vec<String>, realm: impl Into<String>) -> Self {
        let name_type = if components.len() > 1 {
            NT_SRV_INST
        } else {
            NT_PRINCIPAL
        };
        Self {
            name_type,
            components,
            realm: realm.into(),
        }
    }

    /// Parse `a/b@REALM`, using `default_realm` when no realm is present.
    pub fn parse(name: &str, default_realm: Option<&str>) -> Result<Self, PrincipalError> {
        if name.is_empty() {
            return Err(PrincipalError::Empty);
        }

        let mut components = Vec::new();
        let mut realm: Option<String> = None;
        let mut current = String::new();
        let mut chars = name.chars();

        while let Some(c) = chars.next() {
            let ch = match c {
                '\\' => match chars.next() {
                    Some('n') => '\n',
                    Some('t') => '\t',
                    Some('0') => '\0',
                    Some(other) => other,
                    None => return Err(PrincipalError::DanglingEscape(name.to_string())),
                },
                '/' if realm.is_none() => {
                    components.push(std::mem::take(&mut current));
                    continue;
                }
                '@' if realm.is_none() => {
                    components.push(std::mem::take(&mut current));
                    realm = Some(String::new());
                    continue;
                }
                other => other,
            };
            match realm.as_mut() {
                Some(r) => r.push(ch),
                None => current.push(ch),
            }
        }

        let realm = match realm {
            Some(r) if !r.is_empty() => r,
            Some(_) => default_realm
                .map(str::to_string)
                .ok_or_else(|| PrincipalError::MissingRealm(name.to_string()))?,
            None => {
                components.push(std::mem::take(&mut current));
                default_realm
                    .map(str::to_string)
                    .ok_or_else(|| PrincipalError::MissingRealm(name.to_string()))?
            }
        };

        if components.iter().any(String::is_empty) {
            return Err(PrincipalError::EmptyComponent(name.to_string()));
        }

        Ok(Self::new(components, realm))
    }

    /// `krbtgt/REALM@REALM`
    pub fn tgs(realm: &str) -> Self {
        Self::new(vec!["krbtgt".to_string(), realm.to_string()], realm)
    }

    /// Service principal `service[/instance]@realm`.
    pub fn service(service: &str, instance: Option<&str>, realm: &str) -> Self {
        let mut components = vec![service.to_string()];
        if let Some(instance) = instance.filter(|i| !i.is_empty()) {
            components.push(instance.to_string());
        }
        Self::new(components, realm)
    }

    pub fn primary(&self) -> &str {
        self.components.first().map(String::as_str).unwrap_or("")
    }

    pub fn instance(&self) -> &str {
        self.components.get(1).map(String::as_str).unwrap_or("")
    }

    /// Name without the realm.
    pub fn unparse_short(&self) -> String {
        self.components
            .iter()
            .map(|c| escape(c))
            .collect::<Vec<_>>()
            .join("/")
    }
}

fn escape(component: &str) -> String {
    let mut out = String::with_capacity(component.len());
    for c in component.chars() {
        match c {
            '/' | '@' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\0' => out.push_str("\\0"),
            _ => out.push(c),
        }
    }
    out
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.unparse_short(), escape(&self.realm))
    }
}
