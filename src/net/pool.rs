// SPDX-License-Identifier: Apache-2.0

//! Per-node bounded pool of live connections (spec §4.3).

use std::{collections::VecDeque, sync::Arc, time::Duration};

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::connection::AsyncConnection;

/// Bounded queue of warm connections to a single node.
pub struct NodeConnectionPool {
    addr: String,
    capacity: usize,
    idle: Mutex<VecDeque<Arc<AsyncConnection>>>,
    max_socket_idle: Duration,
}

impl NodeConnectionPool {
    pub fn new(addr: impl Into<String>, capacity: usize, max_socket_idle: Duration) -> Self {
        NodeConnectionPool {
            addr: addr.into(),
            capacity,
            idle: Mutex::new(VecDeque::with_capacity(capacity)),
            max_socket_idle,
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Returns an existing warm connection, or `None` if the caller must
    /// create one (spec §4.3).
    pub async fn get(&self) -> Option<Arc<AsyncConnection>> {
        self.idle.lock().await.pop_front()
    }

    /// Returns a connection to the pool if there is room. The caller is
    /// expected to have already decided the connection is healthy (spec
    /// §4.5 "Connection disposition on error" / `keep_connection`).
    pub async fn put(&self, conn: Arc<AsyncConnection>) {
        conn.update_last_used().await;
        let mut idle = self.idle.lock().await;
        if idle.len() < self.capacity {
            idle.push_back(conn);
        }
        // else: let the Arc drop, closing the socket once the last
        // reference (this one) is released.
    }

    /// Closes and drops every connection idle past `max_socket_idle_s`.
    /// Intended to run periodically from a background tender task.
    pub async fn evict_idle(&self) {
        let mut idle = self.idle.lock().await;
        let mut keep = VecDeque::with_capacity(idle.len());
        while let Some(conn) = idle.pop_front() {
            if conn.idle_for().await > self.max_socket_idle {
                debug!(addr = %self.addr, "closing idle connection");
                conn.close().await;
            } else {
                keep.push_back(conn);
            }
        }
        *idle = keep;
    }

    pub async fn len(&self) -> usize {
        self.idle.lock().await.len()
    }
}

/// Spawns the background tender loop that periodically evicts idle
/// connections across a set of node pools, until `shutdown` is cancelled.
pub fn spawn_tender(
    pools: Arc<dashmap::DashMap<String, Arc<NodeConnectionPool>>>,
    tick: Duration,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tick);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    for entry in pools.iter() {
                        entry.value().evict_idle().await;
                    }
                }
                _ = shutdown.cancelled() => return,
            }
        }
    })
}
