// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Cache file publication
//!
//! Cache files are written as mode 0600 temporaries next to their final
//! location, handed to the target user, and renamed into place so readers
//! never observe a partial file.

use std::io::{ErrorKind, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use tempfile::NamedTempFile;
use zeroize::Zeroizing;

use crate::domain::error::CacheError;

/// Atomically publish `contents` at `path`, owned by `uid:gid`.
pub fn write_atomic(path: &Path, contents: &[u8], uid: u32, gid: u32) -> Result<(), CacheError> {
    let dir = path
        .parent()
        .ok_or_else(|| CacheError::io(path, std::io::Error::from(ErrorKind::InvalidInput)))?;

    let mut temp = tempfile::Builder::new()
        .prefix(".krb5afs")
        .tempfile_in(dir)
        .map_err(|e| CacheError::io(path, e))?;

    fill(&mut temp, contents).map_err(|e| CacheError::io(temp.path(), e))?;

    std::os::unix::fs::chown(temp.path(), Some(uid), Some(gid)).map_err(|source| {
        CacheError::Ownership {
            path: path.to_path_buf(),
            uid,
            gid,
            source,
        }
    })?;

    temp.persist(path)
        .map_err(|e| CacheError::io(path, e.error))?;

    tracing::debug!(path = %path.display(), uid, gid, "Cache file published");
    Ok(())
}

fn fill(temp: &mut NamedTempFile, contents: &[u8]) -> std::io::Result<()> {
    temp.as_file()
        .set_permissions(std::fs::Permissions::from_mode(0o600))?;
    temp.write_all(contents)?;
    temp.as_file().sync_all()
}

/// Read a whole credential file into a buffer that is scrubbed on drop.
pub fn read_private(path: &Path) -> std::io::Result<Zeroizing<Vec<u8>>> {
    std::fs::read(path).map(Zeroizing::new)
}

/// Read an existing cache file; `None` when there is none.
pub fn read_existing(path: &Path) -> Result<Option<Zeroizing<Vec<u8>>>, CacheError> {
    match read_private(path) {
        Ok(data) => Ok(Some(data)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(CacheError::io(path, e)),
    }
}

/// Unlink `path`. Returns whether a file was removed; absence is not an error.
pub fn remove(path: &Path) -> Result<bool, CacheError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(CacheError::io(path, e)),
    }
}

/// Uid and gid of the calling process.
pub fn current_ids() -> (u32, u32) {
    // SAFETY: getuid and getgid cannot fail.
    unsafe { (libc::getuid(), libc::getgid()) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::MetadataExt;
    use tempfile::TempDir;

    #[test]
    fn test_write_atomic_sets_mode_and_owner() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("krb5cc_test");
        let (uid, gid) = current_ids();

        write_atomic(&path, b"payload", uid, gid).unwrap();

        let meta = std::fs::metadata(&path).unwrap();
        assert_eq!(meta.mode() & 0o777, 0o600);
        assert_eq!(meta.uid(), uid);
        assert_eq!(std::fs::read(&path).unwrap(), b"payload");
        // no temporaries left behind
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_write_atomic_replaces() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tkt_test");
        let (uid, gid) = current_ids();
        write_atomic(&path, b"one", uid, gid).unwrap();
        write_atomic(&path, b"two", uid, gid).unwrap();
        let data = read_existing(&path).unwrap().unwrap();
        assert_eq!(data.as_slice(), b"two");
    }

    #[test]
    fn test_remove_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gone");
        std::fs::write(&path, b"x").unwrap();
        assert!(remove(&path).unwrap());
        assert!(!remove(&path).unwrap());
        assert!(read_existing(&path).unwrap().is_none());
    }

    #[test]
    fn test_read_private_returns_scrubbing_buffer() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("krb5cc_secret");
        std::fs::write(&path, [0x42u8; 32]).unwrap();

        let data: Zeroizing<Vec<u8>> = read_private(&path).unwrap();
        assert_eq!(data.len(), 32);
        assert!(data.iter().all(|b| *b == 0x42));

        let missing = read_private(&dir.path().join("missing")).unwrap_err();
        assert_eq!(missing.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_missing_directory_fails() {
        let (uid, gid) = current_ids();
        let err = write_atomic(Path::new("/nonexistent-krb5afs/krb5cc_1"), b"x", uid, gid)
            .unwrap_err();
        assert!(matches!(err, CacheError::Io { .. }));
    }
}
