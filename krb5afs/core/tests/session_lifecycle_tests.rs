// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

mod common;

use common::*;
use krb5afs_core::application::SessionPhase;
use krb5afs_core::domain::error::{HostCode, SessionError};
use krb5afs_core::domain::stash::StashRegistry;
use krb5afs_core::infrastructure::{ccache, ticket_file};
use std::collections::HashSet;
use tempfile::TempDir;

fn entries(dir: &TempDir) -> usize {
    std::fs::read_dir(dir.path()).unwrap().count()
}

#[test]
fn test_open_then_close_leaves_no_artifacts() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let harness = Harness::default();
    let orchestrator = harness.orchestrator();
    let mut registry = StashRegistry::new();

    let user = orchestrator
        .stash_credentials(&mut registry, "alice", tgt("alice"), &config)
        .unwrap();

    let opened = orchestrator.open_session(&mut registry, "alice", &config);
    assert_eq!(opened.code, HostCode::Success);
    assert_eq!(opened.phase, SessionPhase::TokensObtained);

    let v5_path = opened.v5_cache.clone().unwrap();
    assert_eq!(v5_path, dir.path().join(format!("krb5cc_{}_{}", user.uid, PID)));
    assert_eq!(opened.env.len(), 1);
    assert_eq!(opened.env[0].name(), "KRB5CCNAME");
    assert_eq!(opened.env[0].value(), format!("FILE:{}", v5_path.display()));

    let contents = ccache::decode(&std::fs::read(&v5_path).unwrap()).unwrap();
    assert_eq!(contents.default_principal.to_string(), "alice@EXAMPLE.COM");

    let closed = orchestrator.close_session(&mut registry, "alice", &config);
    assert_eq!(closed.code, HostCode::Success);
    assert_eq!(closed.phase, SessionPhase::Done);
    assert!(!v5_path.exists());
    assert_eq!(entries(&dir), 0);
    assert!(registry.is_empty());
}

#[test]
fn test_close_twice_succeeds() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let harness = Harness::default();
    let orchestrator = harness.orchestrator();
    let mut registry = StashRegistry::new();

    orchestrator
        .stash_credentials(&mut registry, "alice", tgt("alice"), &config)
        .unwrap();
    orchestrator.open_session(&mut registry, "alice", &config);

    let first = orchestrator.close_session(&mut registry, "alice", &config);
    let second = orchestrator.close_session(&mut registry, "alice", &config);
    assert_eq!(first.pam_code(), 0);
    assert_eq!(second.pam_code(), 0);
    assert_eq!(second.phase, SessionPhase::Done);
}

#[test]
fn test_local_user_passes_through() {
    let dir = TempDir::new().unwrap();
    let mut config = config(&dir);
    config.afs_cells = cells(&["example.org"]);
    let harness = Harness::default();
    let orchestrator = harness.orchestrator();
    let mut registry = StashRegistry::new();

    let outcome = orchestrator.open_session(&mut registry, "local", &config);
    assert_eq!(outcome.code, HostCode::SuccessNoOp);
    assert_eq!(outcome.pam_code(), 0);
    assert!(outcome.env.is_empty());
    assert!(outcome.v5_cache.is_none());
    assert!(matches!(outcome.error, Some(SessionError::CredentialMissing(_))));
    assert_eq!(entries(&dir), 0);
    assert!(harness.backend.calls().is_empty());
}

#[test]
fn test_minimum_uid_ignores_user_without_side_effects() {
    let dir = TempDir::new().unwrap();
    let mut config = config(&dir);
    config.minimum_uid = Some(1000);
    config.afs_cells = cells(&["example.org"]);
    let harness = Harness::new(
        MockResolver {
            uids: vec![("svc".to_string(), 500)],
            ..MockResolver::default()
        },
        MockKdc::default(),
        MockTokenBackend::default(),
    );
    let orchestrator = harness.orchestrator();
    let mut registry = StashRegistry::new();

    // A stale file that must survive untouched.
    let stale = dir.path().join(format!("krb5cc_500_{PID}"));
    std::fs::write(&stale, b"stale").unwrap();

    let outcome = orchestrator.open_session(&mut registry, "svc", &config);
    assert_eq!(outcome.code, HostCode::IgnoreUser);
    assert_eq!(outcome.pam_code(), 25);
    assert_eq!(outcome.phase, SessionPhase::Init);
    assert!(stale.exists());
    assert!(registry.is_empty());
    assert!(harness.backend.calls().is_empty());

    let closed = orchestrator.close_session(&mut registry, "svc", &config);
    assert_eq!(closed.code, HostCode::IgnoreUser);
    assert!(stale.exists());
}

#[test]
fn test_unknown_user_is_service_error() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let harness = Harness::new(
        MockResolver {
            unknown: HashSet::from(["ghost".to_string()]),
            ..MockResolver::default()
        },
        MockKdc::default(),
        MockTokenBackend::default(),
    );
    let orchestrator = harness.orchestrator();
    let mut registry = StashRegistry::new();

    let opened = orchestrator.open_session(&mut registry, "ghost", &config);
    assert_eq!(opened.code, HostCode::ServiceError);
    assert_eq!(opened.pam_code(), 3);

    let closed = orchestrator.close_session(&mut registry, "ghost", &config);
    assert_eq!(closed.code, HostCode::ServiceError);
}

#[test]
fn test_stale_cache_is_replaced() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let harness = Harness::default();
    let orchestrator = harness.orchestrator();
    let mut registry = StashRegistry::new();

    let user = orchestrator
        .stash_credentials(&mut registry, "alice", tgt("alice"), &config)
        .unwrap();

    // Garbage left behind by a crashed session with the same (uid, pid).
    let path = dir.path().join(format!("krb5cc_{}_{}", user.uid, PID));
    std::fs::write(&path, b"garbage").unwrap();

    let outcome = orchestrator.open_session(&mut registry, "alice", &config);
    assert_eq!(outcome.code, HostCode::Success);
    assert!(ccache::decode(&std::fs::read(&path).unwrap()).is_ok());
}

#[test]
fn test_no_v4_credential_means_no_ticket_file() {
    let dir = TempDir::new().unwrap();
    let mut config = config(&dir);
    config.krb4_convert = true;
    // MockKdc refuses 524 translation by default.
    let harness = Harness::default();
    let orchestrator = harness.orchestrator();
    let mut registry = StashRegistry::new();

    orchestrator
        .stash_credentials(&mut registry, "alice", tgt("alice"), &config)
        .unwrap();
    let outcome = orchestrator.open_session(&mut registry, "alice", &config);

    assert_eq!(outcome.code, HostCode::Success);
    assert!(outcome.v4_cache.is_none());
    assert!(outcome.env.iter().all(|b| b.name() != "KRBTKFILE"));
    assert_eq!(entries(&dir), 1);
}

#[test]
fn test_translated_credential_writes_ticket_file() {
    let dir = TempDir::new().unwrap();
    let mut config = config(&dir);
    config.krb4_convert = true;
    let harness = Harness::new(
        MockResolver::default(),
        MockKdc {
            convert: true,
            ..MockKdc::default()
        },
        MockTokenBackend::default(),
    );
    let orchestrator = harness.orchestrator();
    let mut registry = StashRegistry::new();

    let user = orchestrator
        .stash_credentials(&mut registry, "alice", tgt("alice"), &config)
        .unwrap();
    let outcome = orchestrator.open_session(&mut registry, "alice", &config);

    let v4_path = outcome.v4_cache.clone().unwrap();
    assert_eq!(v4_path, dir.path().join(format!("tkt{}_{}", user.uid, PID)));
    assert!(outcome
        .env
        .iter()
        .any(|b| b.name() == "KRBTKFILE" && b.value() == v4_path.to_str().unwrap()));
    assert_eq!(ticket_file::decode(&std::fs::read(&v4_path).unwrap()).unwrap().pname, "alice");

    orchestrator.close_session(&mut registry, "alice", &config);
    assert_eq!(entries(&dir), 0);
}

#[test]
fn test_unwritable_cache_dir_fails_after_credentials_confirmed() {
    let dir = TempDir::new().unwrap();
    let mut config = config(&dir);
    config.ccache_dir = dir.path().join("missing");
    config.afs_cells = cells(&["example.org"]);
    let harness = Harness::default();
    let orchestrator = harness.orchestrator();
    let mut registry = StashRegistry::new();

    orchestrator
        .stash_credentials(&mut registry, "alice", tgt("alice"), &config)
        .unwrap();
    let outcome = orchestrator.open_session(&mut registry, "alice", &config);

    assert_eq!(outcome.code, HostCode::ServiceError);
    assert_eq!(outcome.phase, SessionPhase::CredentialsRetrieved);
    assert!(outcome.env.is_empty());
    assert!(matches!(outcome.error, Some(SessionError::CacheIo(_))));
    // no tokens without a session
    assert!(harness.backend.tokens().is_empty());
}

#[test]
fn test_token_failures_do_not_fail_the_session() {
    let dir = TempDir::new().unwrap();
    let mut config = config(&dir);
    config.afs_cells = cells(&["cella.org", "cellb.org"]);
    let harness = Harness::new(
        MockResolver::default(),
        MockKdc::default(),
        MockTokenBackend {
            fail_cells: HashSet::from(["cella.org".to_string()]),
            ..MockTokenBackend::default()
        },
    );
    let orchestrator = harness.orchestrator();
    let mut registry = StashRegistry::new();

    orchestrator
        .stash_credentials(&mut registry, "alice", tgt("alice"), &config)
        .unwrap();
    let outcome = orchestrator.open_session(&mut registry, "alice", &config);
    assert_eq!(outcome.code, HostCode::Success);

    let report = outcome.tokens.unwrap();
    assert!(report.namespace_created);
    assert_eq!(report.obtained().collect::<Vec<_>>(), vec!["cellb.org"]);

    orchestrator.close_session(&mut registry, "alice", &config);
    assert_eq!(harness.backend.calls().last(), Some(&BackendCall::Release));
}
