// SPDX-License-Identifier: Apache-2.0

//! Cluster interface (spec §2): resolves a key to a serving node and
//! owns the shared resources every command borrows from (spec §4.1,
//! §4.3).
//!
//! This crate ships one concrete implementation, [`StaticCluster`], which
//! treats its configured seed list as the whole topology. It does not
//! perform partition-map discovery or node health gossip — those are
//! explicitly out of scope (spec §1 Non-goals) — but it implements the
//! same borrowing contract a discovering cluster would, so `commands`
//! code never has to know the difference.

use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::{
    buffer::BufferPool,
    config::Config,
    errors::{Error, Result},
    events::{AdmissionMode, AsyncCommandQueue, EventPool},
    net::{AsyncConnection, NodeConnectionPool, spawn_tender},
    timeout::TimeoutSupervisor,
    value::Key,
};

/// A single serving endpoint and its connection pool.
pub struct Node {
    addr: String,
    pool: Arc<NodeConnectionPool>,
}

impl Node {
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Borrows a warm connection, or dials a fresh one if the pool is
    /// empty (spec §4.3).
    pub async fn get_connection(&self) -> Result<Arc<AsyncConnection>> {
        if let Some(conn) = self.pool.get().await {
            return Ok(conn);
        }
        Ok(Arc::new(AsyncConnection::connect(&self.addr).await?))
    }

    /// Returns a connection to its pool (healthy) or lets it drop
    /// (unhealthy), per the command's `keep_connection` verdict (spec
    /// §4.5).
    pub async fn put_connection(&self, conn: Arc<AsyncConnection>, keep: bool) {
        if keep {
            self.pool.put(conn).await;
        }
    }
}

/// Shared, cluster-wide resources every command borrows from.
pub struct StaticCluster {
    nodes: Vec<Arc<Node>>,
    pools_by_addr: Arc<DashMap<String, Arc<NodeConnectionPool>>>,
    pub buffer_pool: Arc<BufferPool>,
    /// Admission control fronting the shared [`EventPool`] (spec §4.7).
    pub event_queue: Arc<AsyncCommandQueue>,
    /// Single deadline-enforcement task shared by every in-flight command
    /// (spec §4.4).
    pub timeout_supervisor: Arc<TimeoutSupervisor>,
    /// Cancelled on drop so the tender and supervisor background tasks
    /// stop instead of outliving every handle to this cluster (teacher's
    /// `stop_writes`/`cancel` pattern in `client/client.rs`).
    shutdown: CancellationToken,
    _tender: tokio::task::JoinHandle<()>,
    _supervisor_task: tokio::task::JoinHandle<()>,
}

impl StaticCluster {
    /// Builds a cluster over a fixed set of `host:port` seeds. No
    /// discovery round-trip occurs; every seed is assumed reachable and
    /// authoritative for the whole key space (spec §1 Non-goals).
    pub fn new(seeds: &[String], pool_capacity: usize, max_socket_idle: Duration, buffer_pool_capacity: usize) -> Result<Arc<Self>> {
        Self::new_with_event_pool(seeds, pool_capacity, max_socket_idle, buffer_pool_capacity, buffer_pool_capacity, Duration::from_millis(50))
    }

    /// Builds a cluster from a loaded [`Config`] (the demo binary's
    /// entry point into this module).
    pub fn from_config(cfg: &Config) -> Result<Arc<Self>> {
        Self::new_with_event_pool(
            &cfg.cluster.seeds,
            cfg.cluster.pool_capacity,
            cfg.cluster.max_socket_idle,
            cfg.cluster.buffer_pool_capacity,
            cfg.cluster.event_pool_capacity,
            Duration::from_millis(cfg.cluster.supervisor_tick_ms),
        )
    }

    fn new_with_event_pool(
        seeds: &[String],
        pool_capacity: usize,
        max_socket_idle: Duration,
        buffer_pool_capacity: usize,
        event_pool_capacity: usize,
        supervisor_tick: Duration,
    ) -> Result<Arc<Self>> {
        if seeds.is_empty() {
            return Err(Error::InvalidNode);
        }
        let pools_by_addr = Arc::new(DashMap::new());
        let mut nodes = Vec::with_capacity(seeds.len());
        for addr in seeds {
            let pool = Arc::new(NodeConnectionPool::new(addr.clone(), pool_capacity, max_socket_idle));
            pools_by_addr.insert(addr.clone(), Arc::clone(&pool));
            nodes.push(Arc::new(Node { addr: addr.clone(), pool }));
        }
        let shutdown = CancellationToken::new();
        let tender = spawn_tender(Arc::clone(&pools_by_addr), Duration::from_secs(1), shutdown.clone());
        let buffer_pool = Arc::new(BufferPool::new(buffer_pool_capacity));
        let event_pool = EventPool::new(&buffer_pool, event_pool_capacity);
        let event_queue = Arc::new(AsyncCommandQueue::new(event_pool, AdmissionMode::Blocking));
        let timeout_supervisor = TimeoutSupervisor::new();
        let supervisor_task = timeout_supervisor.spawn(supervisor_tick, shutdown.clone());
        Ok(Arc::new(StaticCluster {
            nodes,
            pools_by_addr,
            buffer_pool,
            event_queue,
            timeout_supervisor,
            shutdown,
            _tender: tender,
            _supervisor_task: supervisor_task,
        }))
    }

    /// Number of nodes in the cluster.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> &[Arc<Node>] {
        &self.nodes
    }

    /// Resolves the node that should serve `key`.
    ///
    /// A real client hashes the key's partition ID against a partition
    /// map kept current by cluster tending; this crate has no partition
    /// map (spec §1 Non-goals), so it distributes by hashing the digest
    /// across the seed list instead — deterministic per key, but not
    /// migration-aware.
    pub fn node_for_key(&self, key: &Key) -> Result<Arc<Node>> {
        if self.nodes.is_empty() {
            return Err(Error::InvalidNode);
        }
        let idx = (key.digest[0] as usize) % self.nodes.len();
        Ok(Arc::clone(&self.nodes[idx]))
    }

    /// Picks a node at random, used for fan-out operations that target
    /// every node rather than a specific key (scan/query, spec §4.6).
    pub fn random_node(&self) -> Result<Arc<Node>> {
        if self.nodes.is_empty() {
            return Err(Error::InvalidNode);
        }
        let idx = rand::rng().random_range(0..self.nodes.len());
        Ok(Arc::clone(&self.nodes[idx]))
    }

    pub fn node_by_addr(&self, addr: &str) -> Option<Arc<Node>> {
        self.nodes.iter().find(|n| n.addr == addr).cloned()
    }

    /// Forces an idle sweep across every node pool outside of the
    /// tender's own schedule (used by tests).
    pub async fn evict_idle(&self) {
        for entry in self.pools_by_addr.iter() {
            entry.value().evict_idle().await;
        }
    }
}

impl Drop for StaticCluster {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
