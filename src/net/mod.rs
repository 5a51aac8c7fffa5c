// SPDX-License-Identifier: Apache-2.0

//! Connection-layer primitives: a single connection (§4.2) and a
//! per-node bounded pool of them (§4.3).

mod connection;
mod pool;

pub use connection::AsyncConnection;
pub use pool::{NodeConnectionPool, spawn_tender};
