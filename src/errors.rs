// SPDX-License-Identifier: Apache-2.0

//! Error taxonomy for the command execution core (see spec §7).
//!
//! The public API surfaces a closed, typed [`Error`] enum rather than
//! `anyhow::Error`: retry eligibility and connection disposition are
//! decided by matching on the error kind, so callers (and the engine
//! itself) need a stable set of variants to branch on.

use std::fmt;

use thiserror::Error;

use crate::wire::ResultCode;

pub type Result<T> = std::result::Result<T, Error>;

/// The sum type of failure kinds a command can terminate with.
#[derive(Debug, Error)]
pub enum Error {
    /// Deadline exceeded while a command was in flight.
    #[error("command timed out against node {node} after {iterations} attempt(s) (timeout={timeout_ms}ms)")]
    Timeout {
        node: String,
        timeout_ms: u64,
        iterations: u32,
    },

    /// Socket connect/IO failure. Retryable.
    #[error("connection error: {0}")]
    Connection(String),

    /// The node resolved for a partition/replica is no longer part of the
    /// cluster map. Retryable by picking another node on the next attempt.
    #[error("no node available for the requested partition/replica")]
    InvalidNode,

    /// Malformed server message. Non-retryable, fatal for this command.
    #[error("failed to parse server response: {0}")]
    Parse(String),

    /// Client-side encoding failure. Non-retryable.
    #[error("failed to serialize command: {0}")]
    Serialize(String),

    /// A scan was aborted, by the user or by a peer failure.
    #[error("scan terminated: {0}")]
    ScanTerminated(String),

    /// A query was aborted, by the user or by a peer failure.
    #[error("query terminated: {0}")]
    QueryTerminated(String),

    /// The event-context pool was exhausted and the command was submitted
    /// in non-blocking admission mode.
    #[error("command rejected: event context pool exhausted")]
    CommandRejected,

    /// Any non-zero server result code outside the small retryable/benign
    /// set (`Ok`, `KeyNotFound`).
    #[error("server returned error code {code:?}")]
    ServerError {
        code: ResultCode,
        /// Whether the error left the connection's framing intact, so it
        /// can be returned to the pool instead of closed.
        keep_connection: bool,
    },
}

impl Error {
    /// Whether this error class is eligible for retry at all, independent
    /// of the policy's `max_retries`/`retry_on_timeout` knobs (§7
    /// "Retry policy").
    pub fn is_retry_class(&self) -> bool {
        matches!(self, Error::Connection(_) | Error::InvalidNode)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    /// Whether the connection that produced this error may be returned to
    /// the pool (§4.5 "Connection disposition on error").
    pub fn keep_connection(&self) -> bool {
        match self {
            Error::ServerError { keep_connection, .. } => *keep_connection,
            _ => false,
        }
    }

    pub fn connection<S: fmt::Display>(msg: S) -> Self {
        Error::Connection(msg.to_string())
    }

    pub fn parse<S: fmt::Display>(msg: S) -> Self {
        Error::Parse(msg.to_string())
    }

    pub fn serialize<S: fmt::Display>(msg: S) -> Self {
        Error::Serialize(msg.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        // The timeout supervisor forces a socket close to propagate a
        // cancellation; depending on platform this can surface as a
        // "not connected"/broken-pipe IO error rather than an ordinary
        // recv error. Both are folded into the same retryable class
        // (spec §9 "Open questions").
        Error::Connection(e.to_string())
    }
}
