// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Ticket cache naming
//!
//! Derives the on-disk location of a session's ticket caches and the
//! environment bindings that publish them. Names are a pure function of the
//! cache format, the owning uid, and the pid of the session process, so two
//! sessions never share a file and no locking is needed.
//!
//! Every path and binding is built with an explicit length limit and
//! validated at construction.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Ticket Cache Handle value object and path derivation

use std::fmt;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

/// Longest accepted cache path, in bytes.
pub const MAX_PATH_LEN: usize = 4096;

/// Longest accepted `NAME=value` environment binding, in bytes.
pub const MAX_ENV_LEN: usize = MAX_PATH_LEN + 20;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("Cache directory must be absolute: {0}")]
    Relative(String),

    #[error("Cache directory contains a '..' component: {0}")]
    Traversal(String),

    #[error("Path contains a NUL byte")]
    NulByte,

    #[error("Path is {len} bytes long, limit is {max}")]
    TooLong { len: usize, max: usize },

    #[error("Path is not valid UTF-8: {0}")]
    NotUtf8(String),
}

/// Ticket cache flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheFormat {
    /// Kerberos 5 file credential cache.
    V5,
    /// Kerberos 4 ticket file.
    V4,
}

impl CacheFormat {
    fn file_name(self, uid: u32, pid: u32) -> String {
        match self {
            CacheFormat::V5 => format!("krb5cc_{}_{}", uid, pid),
            CacheFormat::V4 => format!("tkt{}_{}", uid, pid),
        }
    }

    /// Environment variable that points clients at the cache.
    pub fn env_name(self) -> &'static str {
        match self {
            CacheFormat::V5 => "KRB5CCNAME",
            CacheFormat::V4 => "KRBTKFILE",
        }
    }

    fn env_value(self, path: &str) -> String {
        match self {
            CacheFormat::V5 => format!("FILE:{}", path),
            CacheFormat::V4 => path.to_string(),
        }
    }
}

impl fmt::Display for CacheFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheFormat::V5 => f.write_str("v5 ccache"),
            CacheFormat::V4 => f.write_str("v4 ticket file"),
        }
    }
}

/// Check that `dir` can host cache files: absolute, no `..`, no NUL, bounded.
pub fn validate_dir(dir: &Path) -> Result<(), PathError> {
    let text = dir
        .to_str()
        .ok_or_else(|| PathError::NotUtf8(dir.display().to_string()))?;

    if text.contains('\0') {
        return Err(PathError::NulByte);
    }
    if text.len() > MAX_PATH_LEN {
        return Err(PathError::TooLong {
            len: text.len(),
            max: MAX_PATH_LEN,
        });
    }
    if !dir.is_absolute() {
        return Err(PathError::Relative(text.to_string()));
    }
    if dir.components().any(|c| c == Component::ParentDir) {
        tracing::warn!(dir = %text, "Cache directory contains a parent-dir component");
        return Err(PathError::Traversal(text.to_string()));
    }
    Ok(())
}

/// Location and ownership of one session cache file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TicketCacheHandle {
    path: PathBuf,
    format: CacheFormat,
    uid: u32,
    gid: u32,
}

impl TicketCacheHandle {
    /// Derive the cache location for `(uid, pid)` under `dir`.
    pub fn derive(
        dir: &Path,
        format: CacheFormat,
        uid: u32,
        gid: u32,
        pid: u32,
    ) -> Result<Self, PathError> {
        validate_dir(dir)?;
        let path = dir.join(format.file_name(uid, pid));
        let len = path.as_os_str().len();
        if len > MAX_PATH_LEN {
            return Err(PathError::TooLong {
                len,
                max: MAX_PATH_LEN,
            });
        }
        Ok(Self {
            path,
            format,
            uid,
            gid,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> CacheFormat {
        self.format
    }

    pub fn uid(&self) -> u32 {
        self.uid
    }

    pub fn gid(&self) -> u32 {
        self.gid
    }

    /// The binding that publishes this cache to the session environment.
    pub fn env_binding(&self) -> Result<EnvBinding, PathError> {
        EnvBinding::for_cache(self.format, &self.path)
    }
}

/// A `NAME=value` pair destined for the session environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvBinding {
    name: &'static str,
    value: String,
}

impl EnvBinding {
    pub fn for_cache(format: CacheFormat, path: &Path) -> Result<Self, PathError> {
        let text = path
            .to_str()
            .ok_or_else(|| PathError::NotUtf8(path.display().to_string()))?;
        if text.contains('\0') {
            return Err(PathError::NulByte);
        }
        let binding = Self {
            name: format.env_name(),
            value: format.env_value(text),
        };
        let len = binding.name.len() + 1 + binding.value.len();
        if len > MAX_ENV_LEN {
            return Err(PathError::TooLong {
                len,
                max: MAX_ENV_LEN,
            });
        }
        Ok(binding)
    }

    pub fn name(&self) -> &str {
        self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for EnvBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}
