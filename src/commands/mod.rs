// SPDX-License-Identifier: Apache-2.0

//! Command execution core (spec §3, §4.5, §4.6, §4.7).

mod async_command;
mod executor;
mod listener;
mod multi;
mod record_set;
mod single;
mod state;

pub mod multi_ops;

pub use async_command::{AsyncCommand, CommandOp};
pub use executor::MultiExecutor;
pub use multi::{Framing, MultiCommand, MultiOp};
pub use record_set::RecordSet;
pub use single::{AppendCommand, DeleteCommand, ExistsCommand, GetCommand, PutCommand};
pub use state::CommandState;

use bytes::BufMut;

use crate::{
    errors::Result,
    net::AsyncConnection,
    value::{Bins, Key},
    wire::{EXT_HEADER_LEN, Field, FieldType, Header, Op, PREFIX_LEN},
};

/// Reads one top-level message header off `conn`, implementing spec
/// §4.5 step 8 Phase A/B: an 8-byte prefix carrying a 48-bit length; a
/// length of zero is a keep-alive ping with no extended header, so the
/// loop re-reads a fresh prefix instead of terminating (spec §8 "receiving
/// header length 0 does not terminate; it re-reads a fresh header").
pub(crate) async fn read_frame_header(conn: &AsyncConnection) -> Result<Header> {
    loop {
        let mut prefix = [0u8; PREFIX_LEN];
        conn.recv_async(&mut prefix).await?;
        let body_length = Header::decode_prefix(&prefix)?;
        if body_length == 0 {
            continue;
        }
        let mut ext = [0u8; EXT_HEADER_LEN];
        conn.recv_async(&mut ext).await?;
        return Header::decode_extended(body_length, &ext);
    }
}

/// Header fields a concrete command op supplies to [`encode_request`].
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderInfo {
    pub info1: u8,
    pub info2: u8,
    pub info3: u8,
    pub generation: u32,
    pub expiration: u32,
    pub transaction_ttl: u32,
}

/// Assembles a full wire message: 30-byte header, namespace/table/digest
/// fields, then the op list (spec §6).
pub fn encode_request(header: HeaderInfo, key: &Key, ops: &[Op]) -> Vec<u8> {
    let fields = [
        Field::new(FieldType::Namespace, key.namespace.as_bytes().to_vec()),
        Field::new(FieldType::Table, key.set.as_bytes().to_vec()),
        Field::new(FieldType::DigestRipe, key.digest.to_vec()),
    ];
    encode_request_fields(header, &fields, ops)
}

/// Same as [`encode_request`] but takes the field list directly, for
/// commands that don't key off a single [`Key`] (batch digest arrays,
/// scan options — spec §4.6).
pub fn encode_request_fields(header: HeaderInfo, fields: &[Field], ops: &[Op]) -> Vec<u8> {
    let mut body = Vec::new();
    for field in fields {
        field.encode(&mut body);
    }
    for op in ops {
        op.encode(&mut body);
    }

    let mut out = vec![0u8; crate::wire::HEADER_LEN];
    let head = Header {
        header_len: 22,
        info1: header.info1,
        info2: header.info2,
        info3: header.info3,
        result_code: 0,
        generation: header.generation,
        expiration: header.expiration,
        transaction_ttl: header.transaction_ttl,
        field_count: fields.len() as u16,
        op_count: ops.len() as u16,
        body_length: 0,
    };
    head.encode(&mut out, 22 + body.len() as u64);
    out.put_slice(&body);
    out
}

/// Parses the bin values out of a response body: `header.field_count`
/// fields (skipped — single-record responses echo none of interest back)
/// followed by `header.op_count` ops, each decoded into a named
/// [`crate::value::Value`] (spec §6 "Data-Segment").
pub(crate) fn parse_record_body(header: &Header, body: &[u8]) -> Result<Bins> {
    let mut cursor = body;
    for _ in 0..header.field_count {
        Field::decode(&mut cursor)?;
    }
    let mut bins = Bins::new();
    for _ in 0..header.op_count {
        let op = Op::decode(&mut cursor)?;
        let value = crate::value::Value::decode(op.particle_type, &op.value)?;
        bins.insert(op.name, value);
    }
    Ok(bins)
}
