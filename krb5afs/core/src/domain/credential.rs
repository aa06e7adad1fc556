// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Kerberos credentials
//!
//! In-memory forms of a Kerberos 5 credential and its translated Kerberos 4
//! counterpart. Session keys and ticket bytes are scrubbed on drop.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Credential value objects shared by the stash, the cache
//!   codecs, and the token manager

use chrono::{DateTime, TimeZone, Utc};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::principal::Principal;

/// Session key material.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct KeyBlock {
    pub enctype: i32,
    pub contents: Vec<u8>,
}

impl KeyBlock {
    pub fn new(enctype: i32, contents: Vec<u8>) -> Self {
        Self { enctype, contents }
    }

    pub fn len(&self) -> usize {
        self.contents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }
}

impl std::fmt::Debug for KeyBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyBlock")
            .field("enctype", &self.enctype)
            .field("contents", &format_args!("<{} bytes redacted>", self.contents.len()))
            .finish()
    }
}

/// Authentication, start, end, and renew-until times, in whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TicketTimes {
    pub authtime: DateTime<Utc>,
    pub starttime: DateTime<Utc>,
    pub endtime: DateTime<Utc>,
    pub renew_till: DateTime<Utc>,
}

impl TicketTimes {
    pub fn from_epoch(authtime: i64, starttime: i64, endtime: i64, renew_till: i64) -> Self {
        Self {
            authtime: epoch(authtime),
            starttime: epoch(starttime),
            endtime: epoch(endtime),
            renew_till: epoch(renew_till),
        }
    }

    /// Start of validity; the auth time when no explicit start time was issued.
    pub fn valid_from(&self) -> DateTime<Utc> {
        if self.starttime.timestamp() == 0 {
            self.authtime
        } else {
            self.starttime
        }
    }
}

impl Default for TicketTimes {
    fn default() -> Self {
        Self::from_epoch(0, 0, 0, 0)
    }
}

pub(crate) fn epoch(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostAddress {
    pub addr_type: u16,
    pub contents: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthData {
    pub ad_type: u16,
    pub contents: Vec<u8>,
}

/// A Kerberos 5 credential: a ticket for `server` held by `client`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct V5Credential {
    pub client: Principal,
    pub server: Principal,
    pub keyblock: KeyBlock,
    pub times: TicketTimes,
    pub is_skey: bool,
    pub ticket_flags: u32,
    pub addresses: Vec<HostAddress>,
    pub authdata: Vec<AuthData>,
    pub ticket: Vec<u8>,
    pub second_ticket: Vec<u8>,
}

impl V5Credential {
    /// True for a ticket-granting ticket.
    pub fn is_tgt(&self) -> bool {
        self.server.primary() == "krbtgt"
    }
}

impl Zeroize for V5Credential {
    fn zeroize(&mut self) {
        self.keyblock.zeroize();
        self.ticket.zeroize();
        self.second_ticket.zeroize();
    }
}

impl Drop for V5Credential {
    fn drop(&mut self) {
        self.zeroize();
    }
}

/// A Kerberos 4 credential, as stored in a legacy ticket file.
#[derive(Clone, PartialEq, Eq)]
pub struct V4Credential {
    pub pname: String,
    pub pinst: String,
    pub service: String,
    pub instance: String,
    pub realm: String,
    pub session: [u8; 8],
    /// Lifetime in five-minute units.
    pub lifetime: i32,
    pub kvno: i32,
    pub ticket: Vec<u8>,
    pub issue_date: i32,
}

impl V4Credential {
    /// Seconds per lifetime unit.
    pub const LIFETIME_UNIT: i64 = 5 * 60;

    pub fn expires_at(&self) -> DateTime<Utc> {
        epoch(i64::from(self.issue_date) + i64::from(self.lifetime) * Self::LIFETIME_UNIT)
    }
}

impl std::fmt::Debug for V4Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("V4Credential")
            .field("pname", &self.pname)
            .field("pinst", &self.pinst)
            .field("service", &self.service)
            .field("instance", &self.instance)
            .field("realm", &self.realm)
            .field("lifetime", &self.lifetime)
            .field("kvno", &self.kvno)
            .field("ticket_len", &self.ticket.len())
            .field("issue_date", &self.issue_date)
            .finish()
    }
}

impl Zeroize for V4Credential {
    fn zeroize(&mut self) {
        self.session.zeroize();
        self.ticket.zeroize();
    }
}

impl Drop for V4Credential {
    fn drop(&mut self) {
        self.zeroize();
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyblock_debug_redacts_contents() {
        let key = KeyBlock::new(18, vec![0xaa; 16]);
        let rendered = format!("{:?}", key);
        assert!(rendered.contains("16 bytes redacted"));
        assert!(!rendered.contains("170"));
    }

    #[test]
    fn test_zeroize_clears_secret_material() {
        let mut cred = fixtures::tgt("alice", "EXAMPLE.COM");
        cred.zeroize();
        assert!(cred.keyblock.contents.is_empty());
        assert!(cred.ticket.is_empty());

        let mut v4 = fixtures::v4("alice", "EXAMPLE.COM");
        v4.zeroize();
        assert_eq!(v4.session, [0u8; 8]);
        assert!(v4.ticket.is_empty());
    }

    #[test]
    fn test_valid_from_falls_back_to_authtime() {
        let times = TicketTimes::from_epoch(100, 0, 200, 0);
        assert_eq!(times.valid_from().timestamp(), 100);
    }

    #[test]
    fn test_v4_expiry() {
        let v4 = fixtures::v4("alice", "R");
        assert_eq!(v4.expires_at().timestamp(), 1_700_000_000 + 120 * 300);
        assert!(fixtures::tgt("alice", "R").is_tgt());
    }
}
