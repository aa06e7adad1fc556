// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! File credential cache codec
//!
//! Reads and writes the Kerberos 5 file credential cache, format version 4
//! (`0x0504`). All integers are big-endian; counted strings carry a 32-bit
//! length prefix. Version 3 caches, which lack the header block, are
//! accepted on read.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** On-disk v5 cache encoding for the V5 Ticket-Cache Manager

use bytes::{Buf, BufMut};
use zeroize::Zeroizing;

use crate::domain::credential::{AuthData, HostAddress, KeyBlock, TicketTimes, V5Credential};
use crate::domain::error::CodecError;
use crate::domain::principal::Principal;

pub const VERSION_3: u16 = 0x0503;
pub const VERSION_4: u16 = 0x0504;

const TAG_DELTA_TIME: u16 = 1;

/// Realm of the configuration pseudo-credentials some clients store.
const CONFIG_REALM: &str = "X-CACHECONF:";

/// Decoded cache contents.
#[derive(Debug)]
pub struct CacheContents {
    pub default_principal: Principal,
    pub credentials: Vec<V5Credential>,
}

impl CacheContents {
    /// First real credential for `server`, skipping configuration entries.
    pub fn find(&self, server: &Principal) -> Option<&V5Credential> {
        self.credentials
            .iter()
            .filter(|c| c.server.realm != CONFIG_REALM)
            .find(|c| c.server.components == server.components && c.server.realm == server.realm)
    }

    pub fn tgt(&self) -> Option<&V5Credential> {
        let realm = &self.default_principal.realm;
        self.find(&Principal::tgs(realm))
    }
}

/// Encode a cache for `default_principal` holding `credentials`.
pub fn encode(
    default_principal: &Principal,
    credentials: &[&V5Credential],
) -> Result<Zeroizing<Vec<u8>>, CodecError> {
    let mut out = Zeroizing::new(Vec::with_capacity(1024));
    out.put_u16(VERSION_4);
    // One DeltaTime tag: zero seconds, zero microseconds.
    out.put_u16(12);
    out.put_u16(TAG_DELTA_TIME);
    out.put_u16(8);
    out.put_u32(0);
    out.put_u32(0);

    put_principal(&mut out, default_principal)?;
    for cred in credentials {
        put_credential(&mut out, cred)?;
    }
    Ok(out)
}

fn put_data(out: &mut Vec<u8>, field: &'static str, data: &[u8]) -> Result<(), CodecError> {
    let len = u32::try_from(data.len()).map_err(|_| CodecError::FieldTooLong {
        field,
        len: data.len(),
    })?;
    out.put_u32(len);
    out.put_slice(data);
    Ok(())
}

fn put_count(out: &mut Vec<u8>, field: &'static str, count: usize) -> Result<(), CodecError> {
    let count = u32::try_from(count).map_err(|_| CodecError::FieldTooLong { field, len: count })?;
    out.put_u32(count);
    Ok(())
}

fn put_principal(out: &mut Vec<u8>, principal: &Principal) -> Result<(), CodecError> {
    out.put_i32(principal.name_type);
    put_count(out, "principal", principal.components.len())?;
    put_data(out, "realm", principal.realm.as_bytes())?;
    for component in &principal.components {
        put_data(out, "principal component", component.as_bytes())?;
    }
    Ok(())
}

fn put_time(out: &mut Vec<u8>, secs: i64) {
    out.put_u32(secs.clamp(0, i64::from(u32::MAX)) as u32);
}

fn put_credential(out: &mut Vec<u8>, cred: &V5Credential) -> Result<(), CodecError> {
    put_principal(out, &cred.client)?;
    put_principal(out, &cred.server)?;

    let enctype = u16::try_from(cred.keyblock.enctype).map_err(|_| CodecError::FieldTooLong {
        field: "enctype",
        len: cred.keyblock.enctype as usize,
    })?;
    out.put_u16(enctype);
    put_data(out, "keyblock", &cred.keyblock.contents)?;

    put_time(out, cred.times.authtime.timestamp());
    put_time(out, cred.times.starttime.timestamp());
    put_time(out, cred.times.endtime.timestamp());
    put_time(out, cred.times.renew_till.timestamp());

    out.put_u8(u8::from(cred.is_skey));
    out.put_u32(cred.ticket_flags);

    put_count(out, "addresses", cred.addresses.len())?;
    for addr in &cred.addresses {
        out.put_u16(addr.addr_type);
        put_data(out, "address", &addr.contents)?;
    }
    put_count(out, "authdata", cred.authdata.len())?;
    for ad in &cred.authdata {
        out.put_u16(ad.ad_type);
        put_data(out, "authdata", &ad.contents)?;
    }

    put_data(out, "ticket", &cred.ticket)?;
    put_data(out, "second ticket", &cred.second_ticket)?;
    Ok(())
}

/// Bounds-checked big-endian reader.
struct Reader<'a> {
    buf: &'a [u8],
    total: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            total: buf.len(),
        }
    }

    fn offset(&self) -> usize {
        self.total - self.buf.remaining()
    }

    fn need(&self, field: &'static str, n: usize) -> Result<(), CodecError> {
        if self.buf.remaining() < n {
            return Err(CodecError::Truncated {
                field,
                offset: self.offset(),
            });
        }
        Ok(())
    }

    fn u8(&mut self, field: &'static str) -> Result<u8, CodecError> {
        self.need(field, 1)?;
        Ok(self.buf.get_u8())
    }

    fn u16(&mut self, field: &'static str) -> Result<u16, CodecError> {
        self.need(field, 2)?;
        Ok(self.buf.get_u16())
    }

    fn u32(&mut self, field: &'static str) -> Result<u32, CodecError> {
        self.need(field, 4)?;
        Ok(self.buf.get_u32())
    }

    fn skip(&mut self, field: &'static str, n: usize) -> Result<(), CodecError> {
        self.need(field, n)?;
        self.buf.advance(n);
        Ok(())
    }

    fn data(&mut self, field: &'static str) -> Result<Vec<u8>, CodecError> {
        let len = self.u32(field)? as usize;
        self.need(field, len)?;
        let data = self.buf[..len].to_vec();
        self.buf.advance(len);
        Ok(data)
    }

    fn string(&mut self, field: &'static str) -> Result<String, CodecError> {
        String::from_utf8(self.data(field)?).map_err(|_| CodecError::InvalidUtf8(field))
    }

    fn is_empty(&self) -> bool {
        !self.buf.has_remaining()
    }
}

/// Decode a whole cache.
pub fn decode(data: &[u8]) -> Result<CacheContents, CodecError> {
    let mut reader = Reader::new(data);
    let default_principal = read_header(&mut reader)?;

    let mut credentials = Vec::new();
    while !reader.is_empty() {
        credentials.push(read_credential(&mut reader)?);
    }
    Ok(CacheContents {
        default_principal,
        credentials,
    })
}

/// Decode only the header and default principal.
pub fn default_principal(data: &[u8]) -> Result<Principal, CodecError> {
    read_header(&mut Reader::new(data))
}

fn read_header(reader: &mut Reader<'_>) -> Result<Principal, CodecError> {
    match reader.u16("version")? {
        VERSION_4 => {
            let header_len = reader.u16("header length")? as usize;
            reader.skip("header", header_len)?;
        }
        VERSION_3 => {}
        other => return Err(CodecError::UnsupportedVersion(other)),
    }
    read_principal(reader)
}

fn read_principal(reader: &mut Reader<'_>) -> Result<Principal, CodecError> {
    let name_type = reader.u32("name type")? as i32;
    let count = reader.u32("component count")? as usize;
    let realm = reader.string("realm")?;
    let mut components = Vec::with_capacity(count.min(16));
    for _ in 0..count {
        components.push(reader.string("principal component")?);
    }
    Ok(Principal {
        name_type,
        components,
        realm,
    })
}

fn read_credential(reader: &mut Reader<'_>) -> Result<V5Credential, CodecError> {
    let client = read_principal(reader)?;
    let server = read_principal(reader)?;

    let enctype = i32::from(reader.u16("enctype")?);
    let keyblock = KeyBlock::new(enctype, reader.data("keyblock")?);

    let authtime = reader.u32("authtime")?;
    let starttime = reader.u32("starttime")?;
    let endtime = reader.u32("endtime")?;
    let renew_till = reader.u32("renew_till")?;
    let times = TicketTimes::from_epoch(
        i64::from(authtime),
        i64::from(starttime),
        i64::from(endtime),
        i64::from(renew_till),
    );

    let is_skey = reader.u8("is_skey")? != 0;
    let ticket_flags = reader.u32("ticket flags")?;

    let count = reader.u32("address count")? as usize;
    let mut addresses = Vec::with_capacity(count.min(16));
    for _ in 0..count {
        addresses.push(HostAddress {
            addr_type: reader.u16("address type")?,
            contents: reader.data("address")?,
        });
    }
    let count = reader.u32("authdata count")? as usize;
    let mut authdata = Vec::with_capacity(count.min(16));
    for _ in 0..count {
        authdata.push(AuthData {
            ad_type: reader.u16("authdata type")?,
            contents: reader.data("authdata")?,
        });
    }

    Ok(V5Credential {
        client,
        server,
        keyblock,
        times,
        is_skey,
        ticket_flags,
        addresses,
        authdata,
        ticket: reader.data("ticket")?,
        second_ticket: reader.data("second ticket")?,
    })
}
