// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! System password database lookup.

use std::ffi::{CStr, CString};
use std::path::PathBuf;

use crate::domain::config::Krb5AfsConfig;
use crate::domain::user::{principal_for, IdentityError, UserInfo, UserResolver};

const INITIAL_BUFFER: usize = 1024;
const MAX_BUFFER: usize = 1 << 20;

#[derive(Debug, Default, Clone, Copy)]
pub struct PasswdResolver;

impl PasswdResolver {
    pub fn new() -> Self {
        Self
    }
}

/// The passwd fields this crate uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswdEntry {
    pub name: String,
    pub uid: u32,
    pub gid: u32,
    pub home: PathBuf,
}

/// Look `user` up with `getpwnam_r`, growing the buffer on `ERANGE`.
pub fn lookup(user: &str) -> Result<PasswdEntry, IdentityError> {
    let c_user = CString::new(user).map_err(|_| IdentityError::InvalidName(user.to_string()))?;
    let mut buf_len = INITIAL_BUFFER;

    loop {
        let mut buf = vec![0 as libc::c_char; buf_len];
        // SAFETY: zeroed passwd is a valid out-parameter for getpwnam_r.
        let mut pwd: libc::passwd = unsafe { std::mem::zeroed() };
        let mut result: *mut libc::passwd = std::ptr::null_mut();

        // SAFETY: all pointers are valid for the duration of the call and
        // `buf` outlives every use of the strings `pwd` points into.
        let rc = unsafe {
            libc::getpwnam_r(
                c_user.as_ptr(),
                &mut pwd,
                buf.as_mut_ptr(),
                buf.len(),
                &mut result,
            )
        };

        if rc == libc::ERANGE && buf_len < MAX_BUFFER {
            buf_len *= 2;
            continue;
        }
        if rc != 0 {
            return Err(IdentityError::Lookup {
                user: user.to_string(),
                message: std::io::Error::from_raw_os_error(rc).to_string(),
            });
        }
        if result.is_null() {
            return Err(IdentityError::UnknownUser(user.to_string()));
        }

        // SAFETY: on success pw_name and pw_dir point into `buf`.
        let (name, home) = unsafe {
            (
                CStr::from_ptr(pwd.pw_name).to_string_lossy().into_owned(),
                CStr::from_ptr(pwd.pw_dir).to_string_lossy().into_owned(),
            )
        };
        return Ok(PasswdEntry {
            name,
            uid: pwd.pw_uid,
            gid: pwd.pw_gid,
            home: PathBuf::from(home),
        });
    }
}

impl UserResolver for PasswdResolver {
    fn resolve(&self, user: &str, config: &Krb5AfsConfig) -> Result<UserInfo, IdentityError> {
        if user.is_empty() {
            return Err(IdentityError::InvalidName(user.to_string()));
        }
        let entry = lookup(user)?;
        let principal = principal_for(user, config)?;
        if config.debug {
            tracing::debug!(user, uid = entry.uid, principal = %principal, "Resolved user");
        }
        Ok(UserInfo {
            name: user.to_string(),
            uid: entry.uid,
            gid: entry.gid,
            home: entry.home,
            principal,
        })
    }
}
