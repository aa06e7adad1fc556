// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! KDC access through the installed Kerberos tools.
//!
//! Service tickets are fetched by running `kvno` against a file cache that
//! holds the TGT, then reading the new credential back out of that cache.
//!
//! The program must be an absolute path and runs with a cleared environment,
//! so a session hook never resolves it through the caller's `PATH`.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use super::{cache_file, ccache};
use crate::domain::credential::{V4Credential, V5Credential};
use crate::domain::kdc::{KdcClient, KdcError, ServiceRequest};

pub const DEFAULT_KVNO: &str = "/usr/bin/kvno";

/// `PATH` handed to the child in place of the caller's.
const SAFE_PATH: &str = "/usr/bin:/bin";

#[derive(Debug, Clone)]
pub struct CommandKdcClient {
    program: PathBuf,
}

impl Default for CommandKdcClient {
    fn default() -> Self {
        Self::new(DEFAULT_KVNO)
    }
}

impl CommandKdcClient {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn run_kvno(&self, cache: &Path, service: &str) -> Result<(), KdcError> {
        if !self.program.is_absolute() {
            return Err(KdcError::UntrustedProgram(self.program.clone()));
        }
        let cache_name = format!("FILE:{}", cache.display());
        debug!(service, cache = %cache_name, "Requesting service ticket");

        let output = Command::new(&self.program)
            .arg("-q")
            .arg("-c")
            .arg(&cache_name)
            .arg(service)
            .env_clear()
            .env("PATH", SAFE_PATH)
            .env("KRB5CCNAME", &cache_name)
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(KdcError::RequestFailed {
                service: service.to_string(),
                message: match stderr.trim() {
                    "" => format!("{} exited with {}", self.program.display(), output.status),
                    text => text.to_string(),
                },
            });
        }
        Ok(())
    }
}

impl KdcClient for CommandKdcClient {
    fn service_credential(&self, request: &ServiceRequest<'_>) -> Result<V5Credential, KdcError> {
        let service = request.service.to_string();
        let request_failed = |message: String| KdcError::RequestFailed {
            service: service.clone(),
            message,
        };

        // Without a cache, stage the TGT in a private temporary one.
        let staged;
        let cache_path = match &request.ccache {
            Some(path) => path.as_path(),
            None => {
                let contents = ccache::encode(&request.tgt.client, &[request.tgt])
                    .map_err(|e| request_failed(e.to_string()))?;
                let mut file = tempfile::Builder::new().prefix("krb5cc_kvno").tempfile()?;
                file.write_all(&contents)?;
                file.as_file().sync_all()?;
                staged = file;
                staged.path()
            }
        };

        self.run_kvno(cache_path, &service)?;

        let data = cache_file::read_private(cache_path)?;
        let contents = ccache::decode(&data).map_err(|e| request_failed(e.to_string()))?;
        contents
            .find(&request.service)
            .cloned()
            .ok_or(KdcError::NoCredential(service))
    }

    fn convert_to_v4(&self, _creds: &V5Credential) -> Result<V4Credential, KdcError> {
        Err(KdcError::TranslationUnsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::credential::fixtures;
    use crate::domain::principal::Principal;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn afs_request(tgt: &V5Credential) -> ServiceRequest<'_> {
        ServiceRequest {
            tgt,
            service: Principal::service("afs", None, "EXAMPLE.COM"),
            ccache: None,
        }
    }

    /// A `kvno` that leaves `marker` behind when run.
    fn plant_kvno(dir: &Path, marker: &Path) {
        let script = dir.join("kvno");
        std::fs::write(
            &script,
            format!("#!/bin/sh\ntouch '{}'\nexit 1\n", marker.display()),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn test_default_program_is_absolute() {
        assert!(CommandKdcClient::default().program().is_absolute());
    }

    #[test]
    fn test_relative_program_is_refused() {
        let dir = TempDir::new().unwrap();
        let marker = dir.path().join("ran");
        plant_kvno(dir.path(), &marker);

        let tgt = fixtures::tgt("alice", "EXAMPLE.COM");
        let result = CommandKdcClient::new("kvno").service_credential(&afs_request(&tgt));
        assert!(matches!(result, Err(KdcError::UntrustedProgram(_))));
        assert!(!marker.exists());
    }

    #[test]
    fn test_kvno_on_caller_path_is_never_run() {
        let dir = TempDir::new().unwrap();
        let marker = dir.path().join("ran");
        plant_kvno(dir.path(), &marker);

        let saved = std::env::var_os("PATH");
        std::env::set_var("PATH", dir.path());
        let tgt = fixtures::tgt("alice", "EXAMPLE.COM");
        let result = CommandKdcClient::default().service_credential(&afs_request(&tgt));
        match saved {
            Some(path) => std::env::set_var("PATH", path),
            None => std::env::remove_var("PATH"),
        }

        assert!(result.is_err());
        assert!(!marker.exists());
    }

    #[test]
    fn test_missing_program() {
        let client = CommandKdcClient::new("/nonexistent/kvno");
        let tgt = fixtures::tgt("alice", "EXAMPLE.COM");
        let request = ServiceRequest {
            tgt: &tgt,
            service: Principal::service("afs", Some("example.com"), "EXAMPLE.COM"),
            ccache: None,
        };
        assert!(matches!(
            client.service_credential(&request),
            Err(KdcError::Io(_))
        ));
    }

    #[test]
    fn test_failing_program_reports_request_failure() {
        let client = CommandKdcClient::new("/bin/false");
        let tgt = fixtures::tgt("alice", "EXAMPLE.COM");
        let request = ServiceRequest {
            tgt: &tgt,
            service: Principal::service("afs", None, "EXAMPLE.COM"),
            ccache: None,
        };
        match client.service_credential(&request) {
            Err(KdcError::RequestFailed { service, .. }) => {
                assert_eq!(service, "afs@EXAMPLE.COM")
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_translation_unsupported() {
        let client = CommandKdcClient::default();
        assert!(matches!(
            client.convert_to_v4(&fixtures::tgt("alice", "EXAMPLE.COM")),
            Err(KdcError::TranslationUnsupported)
        ));
    }
}
