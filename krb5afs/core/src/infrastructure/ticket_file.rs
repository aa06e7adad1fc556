// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Kerberos 4 ticket file codec
//!
//! Layout: the NUL-terminated principal name and instance, then for each
//! credential the NUL-terminated service, instance and realm, the 8-byte
//! session key, lifetime, kvno, ticket length, the ticket, and the issue
//! date. Integers are 32-bit in host byte order.

use bytes::{Buf, BufMut};
use zeroize::Zeroizing;

use crate::domain::credential::V4Credential;
use crate::domain::error::CodecError;
use crate::domain::token::MAX_TICKET_LEN;

/// Longest name, instance, or realm the legacy format admits (ANAME_SZ).
const MAX_NAME_LEN: usize = 40;

#[derive(Debug)]
pub struct TicketFile {
    pub pname: String,
    pub pinst: String,
    pub credentials: Vec<V4Credential>,
}

pub fn encode(credentials: &[&V4Credential]) -> Result<Zeroizing<Vec<u8>>, CodecError> {
    let first = credentials.first().ok_or(CodecError::NoCredentials)?;
    let mut out = Zeroizing::new(Vec::with_capacity(512));
    put_cstr(&mut out, "pname", &first.pname)?;
    put_cstr(&mut out, "pinst", &first.pinst)?;

    for cred in credentials {
        put_cstr(&mut out, "service", &cred.service)?;
        put_cstr(&mut out, "instance", &cred.instance)?;
        put_cstr(&mut out, "realm", &cred.realm)?;
        out.put_slice(&cred.session);
        out.put_i32_ne(cred.lifetime);
        out.put_i32_ne(cred.kvno);
        if cred.ticket.len() > MAX_TICKET_LEN {
            return Err(CodecError::FieldTooLong {
                field: "ticket",
                len: cred.ticket.len(),
            });
        }
        out.put_i32_ne(cred.ticket.len() as i32);
        out.put_slice(&cred.ticket);
        out.put_i32_ne(cred.issue_date);
    }
    Ok(out)
}

fn put_cstr(out: &mut Vec<u8>, field: &'static str, value: &str) -> Result<(), CodecError> {
    if value.len() > MAX_NAME_LEN {
        return Err(CodecError::FieldTooLong {
            field,
            len: value.len(),
        });
    }
    if value.contains('\0') {
        return Err(CodecError::EmbeddedNul(field));
    }
    out.put_slice(value.as_bytes());
    out.put_u8(0);
    Ok(())
}

pub fn decode(data: &[u8]) -> Result<TicketFile, CodecError> {
    let mut buf = data;
    let pname = get_cstr(&mut buf, data.len(), "pname")?;
    let pinst = get_cstr(&mut buf, data.len(), "pinst")?;

    let mut credentials = Vec::new();
    while buf.has_remaining() {
        let service = get_cstr(&mut buf, data.len(), "service")?;
        let instance = get_cstr(&mut buf, data.len(), "instance")?;
        let realm = get_cstr(&mut buf, data.len(), "realm")?;

        need(buf, data.len(), "session key", 8 + 12)?;
        let mut session = [0u8; 8];
        buf.copy_to_slice(&mut session);
        let lifetime = buf.get_i32_ne();
        let kvno = buf.get_i32_ne();
        let ticket_len = buf.get_i32_ne();
        let ticket_len = usize::try_from(ticket_len)
            .ok()
            .filter(|len| *len <= MAX_TICKET_LEN)
            .ok_or(CodecError::FieldTooLong {
                field: "ticket",
                len: ticket_len.unsigned_abs() as usize,
            })?;

        need(buf, data.len(), "ticket", ticket_len + 4)?;
        let ticket = buf[..ticket_len].to_vec();
        buf.advance(ticket_len);
        let issue_date = buf.get_i32_ne();

        credentials.push(V4Credential {
            pname: pname.clone(),
            pinst: pinst.clone(),
            service,
            instance,
            realm,
            session,
            lifetime,
            kvno,
            ticket,
            issue_date,
        });
    }

    Ok(TicketFile {
        pname,
        pinst,
        credentials,
    })
}

fn need(buf: &[u8], total: usize, field: &'static str, n: usize) -> Result<(), CodecError> {
    if buf.remaining() < n {
        return Err(CodecError::Truncated {
            field,
            offset: total - buf.remaining(),
        });
    }
    Ok(())
}

fn get_cstr(buf: &mut &[u8], total: usize, field: &'static str) -> Result<String, CodecError> {
    let end = buf
        .iter()
        .take(MAX_NAME_LEN + 1)
        .position(|b| *b == 0)
        .ok_or(CodecError::Truncated {
            field,
            offset: total - buf.remaining(),
        })?;
    let value = std::str::from_utf8(&buf[..end])
        .map_err(|_| CodecError::InvalidUtf8(field))?
        .to_string();
    buf.advance(end + 1);
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::credential::fixtures;

    #[test]
    fn test_layout() {
        let cred = fixtures::v4("alice", "EXAMPLE.COM");
        let bytes = encode(&[&cred]).unwrap();
        assert!(bytes.starts_with(b"alice\0\0krbtgt\0EXAMPLE.COM\0EXAMPLE.COM\0"));
        let header = b"alice\0\0krbtgt\0EXAMPLE.COM\0EXAMPLE.COM\0".len();
        assert_eq!(&bytes[header..header + 8], &[7; 8]);
        assert_eq!(bytes.len(), header + 8 + 12 + 5 + 4);
    }

    #[test]
    fn test_decode_restores_credential() {
        let cred = fixtures::v4("alice", "EXAMPLE.COM");
        let bytes = encode(&[&cred]).unwrap();
        let file = decode(&bytes).unwrap();
        assert_eq!(file.pname, "alice");
        assert_eq!(file.pinst, "");
        assert_eq!(file.credentials.len(), 1);
        assert_eq!(file.credentials[0], cred);
    }

    #[test]
    fn test_encode_errors() {
        assert_eq!(encode(&[]).unwrap_err(), CodecError::NoCredentials);

        let mut cred = fixtures::v4("alice", "EXAMPLE.COM");
        cred.pname = "x".repeat(MAX_NAME_LEN + 1);
        assert!(matches!(
            encode(&[&cred]).unwrap_err(),
            CodecError::FieldTooLong { field: "pname", .. }
        ));
    }

    #[test]
    fn test_truncated_ticket() {
        let cred = fixtures::v4("alice", "EXAMPLE.COM");
        let bytes = encode(&[&cred]).unwrap();
        assert!(matches!(
            decode(&bytes[..bytes.len() - 6]).unwrap_err(),
            CodecError::Truncated { field: "ticket", .. }
        ));
    }
}
