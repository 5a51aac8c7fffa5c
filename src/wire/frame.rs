// SPDX-License-Identifier: Apache-2.0

//! Header, field and op layout (spec §6 "Wire frame"). All multi-byte
//! integers are big-endian.

use bytes::{Buf, BufMut};

use crate::errors::{Error, Result};

/// 8-byte protocol header + 22-byte command header = 30 bytes, always
/// present before any field/op data.
pub const HEADER_LEN: usize = 30;

/// Size of the leading protocol prefix read in Phase A of spec §4.5 step
/// 8: `version(1) | type(1) | length(6)`. Read on its own so a length of
/// zero (a bare keep-alive ping) can be detected before the extended
/// header is assumed to follow.
pub const PREFIX_LEN: usize = 8;

/// Size of the extended header read in Phase B once `length > 0`
/// (`HEADER_LEN - PREFIX_LEN`).
pub const EXT_HEADER_LEN: usize = HEADER_LEN - PREFIX_LEN;

const PROTO_VERSION: u8 = 2;
const PROTO_TYPE: u8 = 3;

bitflags::bitflags! {
    /// `info1` flags (spec §6).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Info1Flags: u8 {
        const READ      = 0x01;
        const GET_ALL   = 0x02;
        const NOBINDATA = 0x20;
    }
}

bitflags::bitflags! {
    /// `info2` flags (spec §6).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Info2Flags: u8 {
        const WRITE          = 0x01;
        const DELETE         = 0x02;
        const GENERATION     = 0x04;
        const GENERATION_GT  = 0x08;
        const GENERATION_DUP = 0x10;
        const WRITE_UNIQUE   = 0x20;
    }
}

bitflags::bitflags! {
    /// `info3` flags (spec §6).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Info3Flags: u8 {
        /// Final message in a multi-record stream.
        const LAST = 0x01;
    }
}

pub const INFO1_READ: u8 = Info1Flags::READ.bits();
pub const INFO1_GET_ALL: u8 = Info1Flags::GET_ALL.bits();
pub const INFO1_NOBINDATA: u8 = Info1Flags::NOBINDATA.bits();
pub const INFO2_WRITE: u8 = Info2Flags::WRITE.bits();
pub const INFO2_DELETE: u8 = Info2Flags::DELETE.bits();
pub const INFO2_GENERATION: u8 = Info2Flags::GENERATION.bits();
pub const INFO2_GENERATION_GT: u8 = Info2Flags::GENERATION_GT.bits();
pub const INFO2_GENERATION_DUP: u8 = Info2Flags::GENERATION_DUP.bits();
pub const INFO2_WRITE_UNIQUE: u8 = Info2Flags::WRITE_UNIQUE.bits();
pub const INFO3_LAST: u8 = Info3Flags::LAST.bits();

/// The fixed 30-byte header shared by every request and response.
#[derive(Debug, Clone, Default)]
pub struct Header {
    pub header_len: u8,
    pub info1: u8,
    pub info2: u8,
    pub info3: u8,
    pub result_code: u8,
    pub generation: u32,
    pub expiration: u32,
    /// Per-command server-side deadline in ms, written into bytes 22-25
    /// just before send (spec §6).
    pub transaction_ttl: u32,
    pub field_count: u16,
    pub op_count: u16,
    /// Total message length (proto header `length` field), body bytes
    /// that follow the 30-byte header.
    pub body_length: u64,
}

impl Header {
    pub fn encode(&self, buf: &mut [u8], body_length: u64) {
        assert!(buf.len() >= HEADER_LEN, "header buffer too small");
        let mut w = &mut buf[..HEADER_LEN];
        w.put_u8(PROTO_VERSION);
        w.put_u8(PROTO_TYPE);
        // `length` is 48 bits, written as 6 big-endian bytes (spec §6: the
        // 8-byte prefix is version(1) | type(1) | length(6), not a bare u64).
        w.put_uint(body_length & 0x0000_FFFF_FFFF_FFFF, 6);
        w.put_u8(22); // header_len: size of the extended header that follows
        w.put_u8(self.info1);
        w.put_u8(self.info2);
        w.put_u8(self.info3);
        w.put_u8(0); // unused
        w.put_u8(self.result_code);
        w.put_u32(self.generation);
        w.put_u32(self.expiration);
        w.put_u32(self.transaction_ttl);
        w.put_u16(self.field_count);
        w.put_u16(self.op_count);
    }

    /// Decodes the full 30-byte header in one shot. Convenience wrapper
    /// over [`Header::decode_prefix`] + [`Header::decode_extended`] for
    /// callers (tests, non-streaming fixtures) that already hold all 30
    /// bytes; the I/O loop itself reads the two parts separately so it can
    /// observe `length == 0` before assuming the extended header follows
    /// (spec §4.5 step 8 Phase A, §8 "receiving header length 0").
    pub fn decode(buf: &[u8]) -> Result<Header> {
        if buf.len() < HEADER_LEN {
            return Err(Error::parse("short header buffer"));
        }
        let body_length = Header::decode_prefix(&buf[..PREFIX_LEN])?;
        Header::decode_extended(body_length, &buf[PREFIX_LEN..HEADER_LEN])
    }

    /// Decodes the 8-byte protocol prefix and returns the 48-bit `length`
    /// field. A `length` of zero is a keep-alive ping carrying no extended
    /// header or body; callers must re-read a fresh prefix rather than
    /// treat it as a message (spec §4.5 step 8 Phase A).
    pub fn decode_prefix(buf: &[u8]) -> Result<u64> {
        if buf.len() < PREFIX_LEN {
            return Err(Error::parse("short header prefix"));
        }
        let mut r = buf;
        let version = r.get_u8();
        let msg_type = r.get_u8();
        if version != PROTO_VERSION || msg_type != PROTO_TYPE {
            return Err(Error::parse(format!(
                "unexpected protocol header version={version} type={msg_type}"
            )));
        }
        let raw_len = r.get_uint(6);
        Ok(raw_len & 0x0000_FFFF_FFFF_FFFF)
    }

    /// Decodes the 22-byte extended header that follows a non-zero-length
    /// prefix, combining it with the already-known `body_length` (the
    /// prefix's `length` field, which spec §6 defines as the byte count
    /// from the end of the 8-byte prefix to the end of the message —
    /// extended header included).
    pub fn decode_extended(body_length: u64, buf: &[u8]) -> Result<Header> {
        if buf.len() < EXT_HEADER_LEN {
            return Err(Error::parse("short extended header"));
        }
        let mut r = buf;
        let header_len = r.get_u8();
        let info1 = r.get_u8();
        let info2 = r.get_u8();
        let info3 = r.get_u8();
        let _unused = r.get_u8();
        let result_code = r.get_u8();
        let generation = r.get_u32();
        let expiration = r.get_u32();
        let transaction_ttl = r.get_u32();
        let field_count = r.get_u16();
        let op_count = r.get_u16();
        Ok(Header {
            header_len,
            info1,
            info2,
            info3,
            result_code,
            generation,
            expiration,
            transaction_ttl,
            field_count,
            op_count,
            body_length,
        })
    }

    pub fn is_last(&self) -> bool {
        self.info3 & INFO3_LAST != 0
    }

    /// Decodes a per-record header within a multi-record stream body
    /// (spec §6 "Remaining header"). Unlike the top-level message
    /// header, a per-record header has no 8-byte protocol prefix of its
    /// own — it appears directly in the response body, one per record
    /// (spec §4.6 "Parser loop").
    pub fn decode_record(buf: &[u8]) -> Result<Header> {
        if buf.len() < RECORD_HEADER_LEN {
            return Err(Error::parse("short per-record header"));
        }
        let mut r = buf;
        let header_len = r.get_u8();
        let info1 = r.get_u8();
        let info2 = r.get_u8();
        let info3 = r.get_u8();
        let _unused = r.get_u8();
        let result_code = r.get_u8();
        let generation = r.get_u32();
        let expiration = r.get_u32();
        let transaction_ttl = r.get_u32();
        let field_count = r.get_u16();
        let op_count = r.get_u16();
        Ok(Header {
            header_len,
            info1,
            info2,
            info3,
            result_code,
            generation,
            expiration,
            transaction_ttl,
            field_count,
            op_count,
            body_length: 0,
        })
    }
}

/// Size of a per-record header within a multi-record stream body (spec
/// §6): the same 22-byte layout as the extended part of the top-level
/// message header, without the 8-byte protocol prefix.
pub const RECORD_HEADER_LEN: usize = 22;

/// Field types referenced by the core (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Namespace = 0,
    Table = 1,
    DigestRipe = 4,
    DigestRipeArray = 6,
    UdfPackageName = 7,
    UdfFunction = 8,
    UdfArglist = 9,
    ScanOptions = 10,
}

impl TryFrom<u8> for FieldType {
    type Error = Error;

    fn try_from(b: u8) -> Result<Self> {
        Ok(match b {
            0 => FieldType::Namespace,
            1 => FieldType::Table,
            4 => FieldType::DigestRipe,
            6 => FieldType::DigestRipeArray,
            7 => FieldType::UdfPackageName,
            8 => FieldType::UdfFunction,
            9 => FieldType::UdfArglist,
            10 => FieldType::ScanOptions,
            other => return Err(Error::parse(format!("unknown field type {other}"))),
        })
    }
}

/// A request/response field: `len(4) | type(1) | payload(len-1)`.
#[derive(Debug, Clone)]
pub struct Field {
    pub field_type: u8,
    pub payload: Vec<u8>,
}

impl Field {
    pub fn new(field_type: FieldType, payload: Vec<u8>) -> Self {
        Field { field_type: field_type as u8, payload }
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        let len = (self.payload.len() + 1) as u32;
        out.put_u32(len);
        out.put_u8(self.field_type);
        out.extend_from_slice(&self.payload);
    }

    pub fn decode(buf: &mut &[u8]) -> Result<Field> {
        if buf.len() < 5 {
            return Err(Error::parse("short field header"));
        }
        let len = buf.get_u32() as usize;
        if len == 0 || buf.len() < len {
            return Err(Error::parse("field length exceeds buffer"));
        }
        let field_type = buf.get_u8();
        let payload = buf[..len - 1].to_vec();
        buf.advance(len - 1);
        Ok(Field { field_type, payload })
    }
}

/// An op within the Data-Segment:
/// `op_size(4) | op_type(1) | particle_type(1) | version(1) | name_len(1) |
/// name(name_len) | value(op_size-4-name_len)`.
#[derive(Debug, Clone)]
pub struct Op {
    pub op_type: u8,
    pub particle_type: u8,
    pub name: String,
    pub value: Vec<u8>,
}

impl Op {
    pub fn encode(&self, out: &mut Vec<u8>) {
        let name_bytes = self.name.as_bytes();
        let op_size = 4 + name_bytes.len() + self.value.len();
        out.put_u32(op_size as u32);
        out.put_u8(self.op_type);
        out.put_u8(self.particle_type);
        out.put_u8(0); // version
        out.put_u8(name_bytes.len() as u8);
        out.extend_from_slice(name_bytes);
        out.extend_from_slice(&self.value);
    }

    pub fn decode(buf: &mut &[u8]) -> Result<Op> {
        if buf.len() < 8 {
            return Err(Error::parse("short op header"));
        }
        let op_size = buf.get_u32() as usize;
        let op_type = buf.get_u8();
        let particle_type = buf.get_u8();
        let _version = buf.get_u8();
        let name_len = buf.get_u8() as usize;
        if op_size < 4 + name_len || buf.len() < op_size - 4 {
            return Err(Error::parse("op length exceeds buffer"));
        }
        if buf.len() < name_len {
            return Err(Error::parse("op name exceeds buffer"));
        }
        let name = String::from_utf8(buf[..name_len].to_vec())
            .map_err(|e| Error::parse(format!("op name is not utf-8: {e}")))?;
        buf.advance(name_len);
        let value_len = op_size - 4 - name_len;
        if buf.len() < value_len {
            return Err(Error::parse("op value exceeds buffer"));
        }
        let value = buf[..value_len].to_vec();
        buf.advance(value_len);
        Ok(Op { op_type, particle_type, name, value })
    }

    /// `SCAN_OPTIONS` field payload: `priority << 4 | (fail_on_cluster_change ?
    /// 0x08 : 0)`, then `scan_percent` (spec §6).
    pub fn scan_options(priority: u8, fail_on_cluster_change: bool, scan_percent: u8) -> Vec<u8> {
        let byte0 = (priority << 4) | if fail_on_cluster_change { 0x08 } else { 0 };
        vec![byte0, scan_percent]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips_through_exactly_header_len_bytes() {
        let header = Header {
            header_len: 22,
            info1: INFO1_READ,
            info2: 0,
            info3: INFO3_LAST,
            result_code: 0,
            generation: 7,
            expiration: 0,
            transaction_ttl: 1000,
            field_count: 3,
            op_count: 2,
            body_length: 0,
        };
        let mut buf = vec![0u8; HEADER_LEN];
        header.encode(&mut buf, 12345);
        assert_eq!(buf.len(), HEADER_LEN);

        let decoded = Header::decode(&buf).expect("decode");
        assert_eq!(decoded.body_length, 12345);
        assert_eq!(decoded.info1, INFO1_READ);
        assert!(decoded.is_last());
        assert_eq!(decoded.generation, 7);
        assert_eq!(decoded.transaction_ttl, 1000);
        assert_eq!(decoded.field_count, 3);
        assert_eq!(decoded.op_count, 2);
    }

    #[test]
    fn prefix_and_extended_split_matches_single_shot_decode() {
        let header = Header { info2: INFO2_WRITE, result_code: 5, ..Default::default() };
        let mut buf = vec![0u8; HEADER_LEN];
        header.encode(&mut buf, 22);

        let body_length = Header::decode_prefix(&buf[..PREFIX_LEN]).expect("prefix");
        assert_eq!(body_length, 22);
        let extended = Header::decode_extended(body_length, &buf[PREFIX_LEN..HEADER_LEN]).expect("extended");
        assert_eq!(extended.info2, INFO2_WRITE);
        assert_eq!(extended.result_code, 5);
    }

    #[test]
    fn field_round_trips() {
        let field = Field::new(FieldType::Namespace, b"test".to_vec());
        let mut out = Vec::new();
        field.encode(&mut out);
        let mut cursor = &out[..];
        let decoded = Field::decode(&mut cursor).expect("decode");
        assert_eq!(decoded.field_type, FieldType::Namespace as u8);
        assert_eq!(decoded.payload, b"test");
        assert!(cursor.is_empty());
    }

    #[test]
    fn op_round_trips() {
        let op = Op { op_type: 1, particle_type: 3, name: "greeting".to_string(), value: b"hello".to_vec() };
        let mut out = Vec::new();
        op.encode(&mut out);
        let mut cursor = &out[..];
        let decoded = Op::decode(&mut cursor).expect("decode");
        assert_eq!(decoded.name, "greeting");
        assert_eq!(decoded.value, b"hello");
        assert!(cursor.is_empty());
    }
}
