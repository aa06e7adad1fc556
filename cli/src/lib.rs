// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! afs5log library - exposes testable components
//!
//! # Architecture
//!
//! - **Layer:** Interface / Presentation Layer
//! - **Purpose:** Token acquisition for an already established credential cache

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tracing::{debug, info};

use krb5afs_core::application::{translate_v4, TokenManager};
use krb5afs_core::domain::config::{AfsCell, Krb5AfsConfig};
use krb5afs_core::domain::kdc::KdcClient;
use krb5afs_core::domain::stash::Stash;
use krb5afs_core::domain::token::{SkipReason, TokenBackend, TokenReport, TokenRoute};
use krb5afs_core::infrastructure::{cache_file, ccache};

/// Directory holding per-user default caches.
pub const DEFAULT_CACHE_DIR: &str = "/tmp";

/// Options for one run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Value of `KRB5CCNAME`, or an explicit cache name.
    pub cache_name: Option<String>,
    pub cells: Vec<String>,
    /// Prefer raw v5 tokens over 524-translated ones.
    pub prefer_v5: bool,
    pub home: Option<PathBuf>,
    pub uid: u32,
    pub gid: u32,
}

/// Locate the credential cache file. Only `FILE:` caches (or bare paths) are
/// supported.
pub fn resolve_cache_path(cache_name: Option<&str>, uid: u32) -> Result<PathBuf> {
    match cache_name.filter(|name| !name.is_empty()) {
        None => Ok(Path::new(DEFAULT_CACHE_DIR).join(format!("krb5cc_{}", uid))),
        Some(name) => match name.split_once(':') {
            Some(("FILE", path)) => Ok(PathBuf::from(path)),
            Some((kind, _)) if !kind.contains('/') => {
                bail!("Unsupported credential cache type '{}'", kind)
            }
            _ => Ok(PathBuf::from(name)),
        },
    }
}

/// Cells to use when none were named: the cell of `/afs`, then the cell of
/// the home directory when it differs.
pub fn default_cells(backend: &dyn TokenBackend, home: Option<&Path>) -> Vec<String> {
    let mut cells = Vec::new();
    match backend.cell_of_path(Path::new("/afs")) {
        Ok(cell) => cells.push(cell),
        Err(e) => debug!(error = %e, "No local cell"),
    }
    if let Some(home) = home.filter(|h| h.as_os_str().len() > 1) {
        match backend.cell_of_path(home) {
            Ok(cell) if !cells.contains(&cell) => cells.push(cell),
            Ok(_) => {}
            Err(e) => debug!(error = %e, "Home directory is not in AFS"),
        }
    }
    cells
}

/// Per-cell result as printed with `--json`.
#[derive(Debug, Serialize)]
pub struct CellLine {
    pub cell: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn summarize(report: &TokenReport, requested: &[String]) -> Vec<CellLine> {
    if let Some(reason) = report.skipped {
        let error = match reason {
            SkipReason::BackendUnavailable => "AFS is not running",
            SkipReason::NoCredentials => "no Kerberos 5 credentials",
            SkipReason::NamespaceCreateFailed => "cannot create a PAG",
            SkipReason::NoCells | SkipReason::IgnoreAfs => "skipped",
        };
        return requested
            .iter()
            .map(|cell| CellLine {
                cell: cell.clone(),
                route: None,
                error: Some(error.to_string()),
            })
            .collect();
    }
    report
        .cells
        .iter()
        .map(|outcome| match &outcome.result {
            Ok(route) => CellLine {
                cell: outcome.cell.clone(),
                route: Some(match route {
                    TokenRoute::V4 => "v4",
                    TokenRoute::V5 => "v5",
                }),
                error: None,
            },
            Err(e) => CellLine {
                cell: outcome.cell.clone(),
                route: None,
                error: Some(e.to_string()),
            },
        })
        .collect()
}

/// Obtain tokens for the requested (or default) cells.
///
/// Fails only when the credential cache cannot be read.
pub fn run(
    options: &RunOptions,
    backend: Arc<dyn TokenBackend>,
    kdc: Arc<dyn KdcClient>,
) -> Result<Vec<CellLine>> {
    let cache_path = resolve_cache_path(options.cache_name.as_deref(), options.uid)?;
    let data = cache_file::read_private(&cache_path).with_context(|| {
        format!("Error reading default credential cache {}", cache_path.display())
    })?;
    let contents = ccache::decode(&data)
        .with_context(|| format!("Malformed credential cache {}", cache_path.display()))?;
    let tgt = contents
        .tgt()
        .cloned()
        .with_context(|| format!("No ticket-granting ticket in {}", cache_path.display()))?;

    let realm = tgt.client.realm.clone();
    let mut stash = Stash::create(options.uid, options.gid);
    stash.set_v5(tgt);

    if !options.prefer_v5 {
        let mut config = Krb5AfsConfig::for_realm(realm);
        config.krb4_convert = true;
        if let Err(e) = translate_v4(&mut stash, kdc.as_ref(), &config) {
            debug!(error = %e, "Using v5 tokens");
        }
    }

    let cells = if options.cells.is_empty() {
        default_cells(backend.as_ref(), options.home.as_deref())
    } else {
        options.cells.clone()
    };
    let cells: Vec<AfsCell> = cells
        .into_iter()
        .map(|cell| AfsCell {
            cell,
            principal_name: None,
        })
        .collect();
    let requested: Vec<String> = cells.iter().map(|c| c.cell.clone()).collect();

    let manager = TokenManager::new(backend, kdc).prefer_v5(options.prefer_v5);
    let report = manager.tokens_for_cells(&stash, &cells, Some(&cache_path));
    info!(
        obtained = report.obtained().count(),
        failed = report.failed().count(),
        "Done"
    );
    Ok(summarize(&report, &requested))
}
