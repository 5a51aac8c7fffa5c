// SPDX-License-Identifier: Apache-2.0

//! Asynchronous command execution core for a partitioned key-value
//! database client: per-command timeouts, bounded retries, connection
//! pooling and buffer reuse across a cluster of server nodes.

pub mod buffer;
pub mod client;
pub mod cluster;
pub mod commands;
pub mod config;
pub mod errors;
pub mod events;
pub mod logging;
pub mod net;
pub mod policy;
pub mod timeout;
pub mod value;
pub mod wire;
