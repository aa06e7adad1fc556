// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Kernel AFS token backend
//!
//! Talks to the OpenAFS (or nnpfs) kernel module through its `/proc` ioctl
//! device. Every request is an `afsprocdata` block passed with `VIOC_SYSCALL`;
//! path ioctls (`pioctl`) carry a `ViceIoctl` describing their in/out buffers.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** `TokenBackend` implementation over the kernel module

use std::ffi::{CStr, CString};
use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::BufMut;
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::domain::token::{AfsToken, NullTokenBackend, TokenBackend, TokenError, MAX_TICKET_LEN};

/// Device nodes probed, in order.
pub const DEVICE_PATHS: &[&str] = &["/proc/fs/openafs/afs_ioctl", "/proc/fs/nnpfs/afs_ioctl"];

const AFSCALL_PIOCTL: libc::c_long = 20;
const AFSCALL_SETPAG: libc::c_long = 21;

const VIOCSETTOK: u32 = 3;
const VIOCUNLOG: u32 = 9;
const VIOC_FILE_CELL_NAME: u32 = 30;

/// Size of the clear token structure as the kernel sees it.
const CLEAR_TOKEN_SIZE: i32 = 24;
const MAX_CELL_NAME: usize = 256;

#[repr(C)]
struct AfsProcData {
    param4: libc::c_long,
    param3: libc::c_long,
    param2: libc::c_long,
    param1: libc::c_long,
    syscall: libc::c_long,
}

#[repr(C)]
struct ViceIoctl {
    in_buf: *const libc::c_char,
    out_buf: *mut libc::c_char,
    in_size: libc::c_short,
    out_size: libc::c_short,
}

/// Linux `_IOW(ty, nr, size)`.
const fn iow(ty: u8, nr: u32, size: usize) -> u32 {
    (1 << 30) | ((size as u32 & 0x3fff) << 16) | ((ty as u32) << 8) | nr
}

const VIOC_SYSCALL: u32 = iow(b'C', 1, std::mem::size_of::<*mut libc::c_void>());

const fn vice_ioctl(id: u32) -> u32 {
    iow(b'V', id, std::mem::size_of::<ViceIoctl>())
}

/// Serialise a token for `VIOCSETTOK`.
pub fn encode_token(token: &AfsToken) -> Result<Zeroizing<Vec<u8>>, TokenError> {
    if token.ticket.len() > MAX_TICKET_LEN {
        return Err(TokenError::TicketTooLarge(token.ticket.len()));
    }
    let mut out = Zeroizing::new(Vec::with_capacity(token.ticket.len() + 64 + token.cell.len()));
    out.put_i32_ne(token.ticket.len() as i32);
    out.put_slice(&token.ticket);
    out.put_i32_ne(CLEAR_TOKEN_SIZE);
    out.put_i32_ne(token.auth_handle);
    out.put_slice(&token.session_key);
    out.put_i32_ne(token.vice_id);
    out.put_i32_ne(token.begin);
    out.put_i32_ne(token.end);
    out.put_i32_ne(i32::from(token.primary));
    out.put_slice(token.cell.as_bytes());
    out.put_u8(0);
    Ok(out)
}

/// Token backend driving the kernel module's ioctl device.
#[derive(Debug, Clone)]
pub struct PioctlBackend {
    device: PathBuf,
    v5_tokens: bool,
}

impl PioctlBackend {
    pub fn new(device: impl Into<PathBuf>) -> Self {
        Self {
            device: device.into(),
            v5_tokens: true,
        }
    }

    /// First present device node, if any.
    pub fn probe() -> Option<Self> {
        DEVICE_PATHS
            .iter()
            .map(Path::new)
            .find(|path| path.exists())
            .map(Self::new)
    }

    pub fn with_v5_tokens(mut self, enabled: bool) -> Self {
        self.v5_tokens = enabled;
        self
    }

    pub fn device(&self) -> &Path {
        &self.device
    }

    fn open(&self) -> std::io::Result<File> {
        OpenOptions::new().read(true).write(true).open(&self.device)
    }

    fn call(&self, mut data: AfsProcData) -> std::io::Result<()> {
        let device = self.open()?;
        // SAFETY: `data` is a properly laid out afsprocdata and every pointer
        // it carries outlives the call.
        let rc = unsafe {
            libc::ioctl(
                device.as_raw_fd(),
                VIOC_SYSCALL as _,
                &mut data as *mut AfsProcData,
            )
        };
        if rc < 0 {
            return Err(std::io::Error::last_os_error());
        }
        Ok(())
    }

    fn pioctl(
        &self,
        path: Option<&CStr>,
        cmd: u32,
        vice: &mut ViceIoctl,
        follow: bool,
    ) -> std::io::Result<()> {
        self.call(AfsProcData {
            param1: path.map_or(0, |p| p.as_ptr() as libc::c_long),
            param2: vice_ioctl(cmd) as libc::c_long,
            param3: vice as *mut ViceIoctl as libc::c_long,
            param4: libc::c_long::from(follow),
            syscall: AFSCALL_PIOCTL,
        })
    }
}

impl TokenBackend for PioctlBackend {
    fn name(&self) -> &'static str {
        "pioctl"
    }

    fn is_available(&self) -> bool {
        self.open().is_ok()
    }

    fn supports_v5_tokens(&self) -> bool {
        self.v5_tokens
    }

    fn namespace_create(&self) -> Result<(), TokenError> {
        self.call(AfsProcData {
            param4: 0,
            param3: 0,
            param2: 0,
            param1: 0,
            syscall: AFSCALL_SETPAG,
        })
        .map_err(|e| TokenError::NamespaceCreateFailed(e.to_string()))?;
        debug!(device = %self.device.display(), "Created new PAG");
        Ok(())
    }

    fn token_acquire(&self, token: &AfsToken) -> Result<(), TokenError> {
        let blob = encode_token(token)?;
        let in_size = libc::c_short::try_from(blob.len())
            .map_err(|_| TokenError::acquire_failed(&token.cell, "token too large"))?;
        let mut vice = ViceIoctl {
            in_buf: blob.as_ptr() as *const libc::c_char,
            out_buf: std::ptr::null_mut(),
            in_size,
            out_size: 0,
        };
        self.pioctl(None, VIOCSETTOK, &mut vice, false)
            .map_err(|e| TokenError::acquire_failed(&token.cell, e))?;
        info!(cell = %token.cell, route = ?token.route(), "Installed AFS token");
        Ok(())
    }

    fn token_release(&self) -> Result<(), TokenError> {
        let mut vice = ViceIoctl {
            in_buf: std::ptr::null(),
            out_buf: std::ptr::null_mut(),
            in_size: 0,
            out_size: 0,
        };
        self.pioctl(None, VIOCUNLOG, &mut vice, false)
            .map_err(|e| TokenError::ReleaseFailed(e.to_string()))
    }

    fn cell_of_path(&self, path: &Path) -> Result<String, TokenError> {
        let lookup_failed = |reason: String| TokenError::CellLookupFailed {
            path: path.display().to_string(),
            reason,
        };
        let c_path = CString::new(path.as_os_str().as_encoded_bytes())
            .map_err(|_| lookup_failed("path contains a NUL byte".to_string()))?;

        let mut out = vec![0 as libc::c_char; MAX_CELL_NAME];
        let mut vice = ViceIoctl {
            in_buf: std::ptr::null(),
            out_buf: out.as_mut_ptr(),
            in_size: 0,
            out_size: MAX_CELL_NAME as libc::c_short,
        };
        self.pioctl(Some(&c_path), VIOC_FILE_CELL_NAME, &mut vice, true)
            .map_err(|e| lookup_failed(e.to_string()))?;

        let bytes: Vec<u8> = out
            .iter()
            .take_while(|c| **c != 0)
            .map(|c| *c as u8)
            .collect();
        String::from_utf8(bytes).map_err(|_| lookup_failed("cell name is not UTF-8".to_string()))
    }
}

/// Choose the token backend once, at startup.
pub fn select_backend() -> Arc<dyn TokenBackend> {
    match PioctlBackend::probe() {
        Some(backend) => {
            debug!(device = %backend.device().display(), "Using kernel AFS token backend");
            Arc::new(backend)
        }
        None => {
            debug!("No AFS kernel module found; tokens disabled");
            Arc::new(NullTokenBackend)
        }
    }
}
