// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Module configuration
//!
//! Resolves the module's argument tokens, per-realm defaults, and built-in
//! defaults into one immutable `Krb5AfsConfig` that every operation receives
//! explicitly. Token grammar:
//! - `name` sets a boolean; `no`, `not`, `dont` (optionally followed by `_`)
//!   in front of the name clears it
//! - `name=value` sets a string, integer, or list (split on space, tab, comma)
//!
//! Tokens win over realm defaults, which win over global defaults.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Configuration value object, option grammar and YAML realm defaults

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::cache_path::{self, PathError};

pub const DEFAULT_CCACHE_DIR: &str = "/tmp";
pub const DEFAULT_CONFIG_PATH: &str = "/etc/pam_krb5afs.yaml";
pub const CONFIG_PATH_ENV: &str = "PAM_KRB5AFS_CONFIG";

const LIST_SEPARATORS: &[char] = &[' ', '\t', ','];
const NEGATIONS: &[&str] = &["no", "not", "dont", "no_", "not_", "dont_"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No realm configured and no default realm available")]
    MissingRealm,

    #[error("Invalid name mapping pattern '{pattern}': {source}")]
    InvalidMapping {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid cache directory: {0}")]
    InvalidCacheDir(#[from] PathError),

    #[error("Invalid AFS cell entry '{0}'")]
    InvalidCell(String),

    #[error("Failed to read defaults file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse defaults file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// One AFS cell to obtain tokens for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AfsCell {
    pub cell: String,
    /// Principal to request instead of `afs/<cell>`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal_name: Option<String>,
}

impl AfsCell {
    /// Parse `cell` or `cell=principal`.
    pub fn parse(entry: &str) -> Result<Self, ConfigError> {
        let (cell, principal) = match entry.split_once('=') {
            Some((cell, principal)) => (cell, principal.trim_start_matches('=')),
            None => (entry, ""),
        };
        if cell.is_empty() || cell.contains('/') || cell.contains('\0') {
            return Err(ConfigError::InvalidCell(entry.to_string()));
        }
        Ok(Self {
            cell: cell.to_string(),
            principal_name: (!principal.is_empty()).then(|| principal.to_string()),
        })
    }
}

/// Rewrites a login name into a principal name.
#[derive(Debug, Clone)]
pub struct NameMapping {
    pattern: Regex,
    replacement: String,
}

impl NameMapping {
    pub fn new(pattern: &str, replacement: &str) -> Result<Self, ConfigError> {
        let pattern = Regex::new(pattern).map_err(|source| ConfigError::InvalidMapping {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            pattern,
            replacement: replacement.to_string(),
        })
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn replacement(&self) -> &str {
        &self.replacement
    }

    /// The rewritten name, or `None` when the pattern does not match.
    pub fn apply(&self, name: &str) -> Option<String> {
        let captures = self.pattern.captures(name)?;
        let mut out = String::new();
        captures.expand(&self.replacement, &mut out);
        Some(out)
    }
}

impl PartialEq for NameMapping {
    fn eq(&self, other: &Self) -> bool {
        self.pattern.as_str() == other.pattern.as_str() && self.replacement == other.replacement
    }
}

/// Per-realm defaults read from the YAML defaults file.
///
/// ```yaml
/// defaults:
///   default_realm: EXAMPLE.COM
///   ccache_dir: /tmp
/// realms:
///   EXAMPLE.COM:
///     afs_cells: example.com other.org=afs
///     minimum_uid: 1000
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppDefaults {
    #[serde(default)]
    pub defaults: BTreeMap<String, serde_yaml::Value>,
    #[serde(default)]
    pub realms: BTreeMap<String, BTreeMap<String, serde_yaml::Value>>,
}

impl AppDefaults {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Locate the defaults file.
    /// 1. Explicit path
    /// 2. `PAM_KRB5AFS_CONFIG` environment variable
    /// 3. `/etc/pam_krb5afs.yaml`
    pub fn discover(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }
        let system = PathBuf::from(DEFAULT_CONFIG_PATH);
        system.exists().then_some(system)
    }

    /// Load discovered defaults; a missing file yields empty defaults, an
    /// explicitly named file must exist.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match Self::discover(explicit) {
            Some(path) => {
                tracing::debug!(path = %path.display(), "Loading realm defaults");
                Self::from_yaml_file(path)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn default_realm(&self) -> Option<String> {
        self.defaults.get("default_realm").and_then(scalar_text)
    }

    /// Realm-specific value first, then the global one.
    pub fn lookup(&self, realm: &str, key: &str) -> Option<String> {
        self.realms
            .get(realm)
            .and_then(|values| values.get(key))
            .or_else(|| self.defaults.get(key))
            .and_then(scalar_text)
    }
}

fn scalar_text(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Sequence(items) => Some(
            items
                .iter()
                .filter_map(scalar_text)
                .collect::<Vec<_>>()
                .join(" "),
        ),
        _ => None,
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" | "t" | "y" => Some(true),
        "false" | "no" | "off" | "0" | "nil" | "f" | "n" => Some(false),
        _ => None,
    }
}

/// Resolves individual options against tokens and realm defaults.
pub struct OptionSource<'a> {
    args: &'a [String],
    defaults: &'a AppDefaults,
    realm: &'a str,
}

impl<'a> OptionSource<'a> {
    pub fn new(args: &'a [String], defaults: &'a AppDefaults, realm: &'a str) -> Self {
        Self {
            args,
            defaults,
            realm,
        }
    }

    /// The first token naming `name`, possibly negated, decides.
    pub fn boolean(&self, name: &str) -> Option<bool> {
        for arg in self.args {
            if arg == name {
                return Some(true);
            }
            if NEGATIONS
                .iter()
                .any(|prefix| arg.strip_prefix(prefix) == Some(name))
            {
                return Some(false);
            }
        }
        self.defaults
            .lookup(self.realm, name)
            .and_then(|v| parse_bool(&v))
    }

    pub fn string(&self, name: &str) -> Option<String> {
        for arg in self.args {
            if let Some(value) = arg
                .strip_prefix(name)
                .and_then(|rest| rest.strip_prefix('='))
            {
                return Some(value.to_string());
            }
        }
        self.defaults.lookup(self.realm, name)
    }

    pub fn list(&self, name: &str) -> Vec<String> {
        self.string(name)
            .map(|value| {
                value
                    .split(LIST_SEPARATORS)
                    .filter(|item| !item.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        self.string(name).and_then(|v| v.trim().parse().ok())
    }
}

/// Immutable module configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Krb5AfsConfig {
    pub realm: String,
    pub debug: bool,
    /// Users with a lower uid are ignored entirely.
    pub minimum_uid: Option<u32>,
    pub ccache_dir: PathBuf,
    pub afs_cells: Vec<AfsCell>,
    /// Create a fresh PAG before obtaining tokens.
    pub isolate_tokens: bool,
    pub ignore_afs: bool,
    /// Translate v5 credentials to v4 during authentication.
    pub krb4_convert: bool,
    pub mappings: Vec<NameMapping>,
}

impl Krb5AfsConfig {
    /// Built-in defaults for `realm`.
    pub fn for_realm(realm: impl Into<String>) -> Self {
        Self {
            realm: realm.into(),
            debug: false,
            minimum_uid: None,
            ccache_dir: PathBuf::from(DEFAULT_CCACHE_DIR),
            afs_cells: Vec::new(),
            isolate_tokens: true,
            ignore_afs: false,
            krb4_convert: false,
            mappings: Vec::new(),
        }
    }

    /// Resolve argument tokens against `defaults`.
    pub fn from_args<S: AsRef<str>>(args: &[S], defaults: &AppDefaults) -> Result<Self, ConfigError> {
        let args: Vec<String> = args.iter().map(|a| a.as_ref().to_string()).collect();

        let realm = args
            .iter()
            .rev()
            .find_map(|a| a.strip_prefix("realm="))
            .map(str::to_string)
            .or_else(|| defaults.default_realm())
            .filter(|r| !r.is_empty())
            .ok_or(ConfigError::MissingRealm)?;

        let options = OptionSource::new(&args, defaults, &realm);
        let mut config = Self::for_realm(realm.clone());

        config.debug = options.boolean("debug").unwrap_or(false);
        config.minimum_uid = options
            .integer("minimum_uid")
            .and_then(|uid| u32::try_from(uid).ok());
        config.ccache_dir = options
            .string("ccache_dir")
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CCACHE_DIR));
        config.isolate_tokens = options.boolean("pag").unwrap_or(true);
        config.ignore_afs = options.boolean("ignore_afs").unwrap_or(false);
        config.krb4_convert = options.boolean("krb4_convert").unwrap_or(false);

        if !config.ignore_afs {
            config.afs_cells = options
                .list("afs_cells")
                .iter()
                .map(|entry| AfsCell::parse(entry))
                .collect::<Result<_, _>>()?;
        }

        let mappings = options.list("mappings");
        if !mappings.is_empty() && mappings.len() % 2 == 0 {
            config.mappings = mappings
                .chunks(2)
                .map(|pair| NameMapping::new(&pair[0], &pair[1]))
                .collect::<Result<_, _>>()?;
        } else if !mappings.is_empty() {
            tracing::warn!(
                count = mappings.len(),
                "Ignoring name mappings: expected pattern/replacement pairs"
            );
        }

        config.validate()?;

        if config.debug {
            tracing::debug!(
                realm = %config.realm,
                ccache_dir = %config.ccache_dir.display(),
                cells = config.afs_cells.len(),
                pag = config.isolate_tokens,
                "Configuration resolved"
            );
        }

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.realm.is_empty() {
            return Err(ConfigError::MissingRealm);
        }
        cache_path::validate_dir(&self.ccache_dir)?;
        for cell in &self.afs_cells {
            if cell.cell.is_empty() || cell.cell.contains('/') || cell.cell.contains('\0') {
                return Err(ConfigError::InvalidCell(cell.cell.clone()));
            }
        }
        Ok(())
    }

    /// Cells to obtain tokens for, honouring `ignore_afs`.
    pub fn token_cells(&self) -> &[AfsCell] {
        if self.ignore_afs {
            &[]
        } else {
            &self.afs_cells
        }
    }

    /// True when `uid` falls below the configured minimum.
    pub fn ignores_uid(&self, uid: u32) -> bool {
        self.minimum_uid.is_some_and(|minimum| uid < minimum)
    }
}
