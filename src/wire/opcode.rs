// SPDX-License-Identifier: Apache-2.0

//! Minimal demo opcode set and server result codes.
//!
//! The spec places "the wire-format byte layout of each command opcode"
//! out of scope for the core (§1); `Opcode` here is just enough surface
//! for [`crate::commands`] to dispatch on, carried in the first op's
//! `op_type` rather than in the fixed header (the header itself is
//! opcode-agnostic per §6).

use crate::errors::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    Put = 1,
    Get = 2,
    Delete = 3,
    BatchGet = 4,
    ScanAll = 5,
    Append = 6,
    /// Optional authenticate frame sent as the first op of a connection
    /// before any data command (spec §4.5 "Authenticate" step). The demo
    /// cluster never requires it; it exists so `AsyncCommand::run()`'s
    /// state machine has a real step to skip rather than a hypothetical
    /// one.
    Auth = 7,
}

impl TryFrom<u8> for Opcode {
    type Error = Error;

    fn try_from(b: u8) -> Result<Self> {
        Ok(match b {
            1 => Opcode::Put,
            2 => Opcode::Get,
            3 => Opcode::Delete,
            4 => Opcode::BatchGet,
            5 => Opcode::ScanAll,
            6 => Opcode::Append,
            7 => Opcode::Auth,
            other => return Err(Error::parse(format!("unknown opcode {other}"))),
        })
    }
}

/// Per-record/per-command server result code (header `result_code` byte,
/// and the per-record header of a multi-record stream, spec §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCode {
    Ok,
    KeyNotFound,
    GenerationMismatch,
    KeyExists,
    ServerUnavailable,
    Other(u8),
}

impl From<u8> for ResultCode {
    fn from(b: u8) -> Self {
        match b {
            0 => ResultCode::Ok,
            2 => ResultCode::KeyNotFound,
            3 => ResultCode::GenerationMismatch,
            5 => ResultCode::KeyExists,
            9 => ResultCode::ServerUnavailable,
            other => ResultCode::Other(other),
        }
    }
}

impl From<ResultCode> for u8 {
    fn from(rc: ResultCode) -> Self {
        match rc {
            ResultCode::Ok => 0,
            ResultCode::KeyNotFound => 2,
            ResultCode::GenerationMismatch => 3,
            ResultCode::KeyExists => 5,
            ResultCode::ServerUnavailable => 9,
            ResultCode::Other(b) => b,
        }
    }
}

impl ResultCode {
    /// Whether a server error at this code still leaves the connection's
    /// framing intact (spec §4.5 "Connection disposition on error").
    pub fn keep_connection(self) -> bool {
        !matches!(self, ResultCode::ServerUnavailable)
    }
}
