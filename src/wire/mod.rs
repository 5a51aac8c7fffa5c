// SPDX-License-Identifier: Apache-2.0

//! Length-framed binary protocol: header layout, field/op encoding and
//! the small set of flags the command core itself must know about
//! (spec §6). The full per-opcode body layout is an external collaborator
//! concern; this module implements exactly the envelope the engine reads
//! and writes plus a minimal demo opcode set.

mod frame;
mod opcode;

pub use frame::{
    EXT_HEADER_LEN, Field, FieldType, Header, Op, HEADER_LEN, INFO1_GET_ALL, INFO1_NOBINDATA,
    INFO1_READ, INFO2_DELETE, INFO2_GENERATION, INFO2_GENERATION_GT,
    INFO2_GENERATION_DUP, INFO2_WRITE, INFO2_WRITE_UNIQUE, INFO3_LAST,
    PREFIX_LEN, RECORD_HEADER_LEN,
};
pub use opcode::{Opcode, ResultCode};
